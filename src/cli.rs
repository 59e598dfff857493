use crate::config::{ChecksumType, CodecConfig, HoleMode, DEFAULT_CHUNK_SIZE};
use crate::counters::{CounterSnapshot, Counters, ProgressSignal};
use crate::error::SparseError;
use crate::pipeline::{self, CodecStats};
use crate::sink::{HoleSink, ZeroFillSink};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Parser)]
#[command(author, version, about, long_about = "Encode sparse files for byte-stream transport and restore their holes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encodes a file, replacing long zero runs with run-length tokens
    Encode {
        /// Input file (default: standard input)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output file (default: standard output)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Read size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Show a progress bar on stderr
        #[arg(short, long)]
        progress: bool,
    },
    /// Decodes a stream, recreating long zero runs as holes
    Decode {
        /// Input file (default: standard input)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output file (default: standard output)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// How to write long zero runs [auto, seek, fill]
        #[arg(long, default_value = "auto")]
        holes: HoleMode,

        /// Read size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Show a progress bar on stderr
        #[arg(short, long)]
        progress: bool,
    },
    /// Describes what a stream decodes to without writing it
    Info {
        /// Input file (default: standard input)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Digest of the decoded content [crc32, sha256]
        #[arg(short, long, default_value = "crc32")]
        checksum: ChecksumType,
    },
}

static SIGNAL: OnceLock<ProgressSignal> = OnceLock::new();

pub fn run() -> Result<(), SparseError> {
    let cli = Cli::parse();
    let signal = install_signal_handlers();

    match cli.command {
        Commands::Encode { input, output, chunk_size, progress } => {
            let config = CodecConfig::default().with_chunk_size(chunk_size);
            config.validate()?;

            let (mut reader, input_len) = open_input(input.as_deref())?;
            let mut writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };

            let mut counters = make_counters(signal, progress, input_len)?;
            let stats = pipeline::encode(&mut reader, &mut writer, &config, &mut counters)?;
            print_summary("Encoding", &stats);
        }
        Commands::Decode { input, output, holes, chunk_size, progress } => {
            let config = CodecConfig::default().with_chunk_size(chunk_size).with_hole_mode(holes);
            config.validate()?;

            let (mut reader, input_len) = open_input(input.as_deref())?;
            let mut counters = make_counters(signal, progress, input_len)?;

            let stats = match decode_target(output.as_deref(), holes)? {
                DecodeTarget::Holes(file) => decode_into(&mut reader, BufWriter::new(file), &config, &mut counters)?,
                DecodeTarget::Fill(file) => {
                    decode_into(&mut reader, ZeroFillSink::new(BufWriter::new(file)), &config, &mut counters)?
                }
                DecodeTarget::Stdout => {
                    decode_into(&mut reader, ZeroFillSink::new(BufWriter::new(io::stdout().lock())), &config, &mut counters)?
                }
            };
            print_summary("Decoding", &stats);
        }
        Commands::Info { input, checksum } => {
            let config = CodecConfig::default().with_checksum(checksum);
            let (mut reader, _) = open_input(input.as_deref())?;
            let info = pipeline::inspect(&mut reader, &config)?;

            let label = match checksum {
                ChecksumType::CRC32 => "CRC32",
                ChecksumType::SHA256 => "SHA-256",
            };
            println!("Encoded size:  {} bytes", info.encoded_size);
            println!("Decoded size:  {} bytes", info.decoded_size);
            println!("Hole bytes:    {} bytes", info.hole_bytes);
            println!(
                "Tokens:        {} literal, {} short run, {} long run",
                info.tokens.literal_spans, info.tokens.short_runs, info.tokens.long_runs
            );
            println!("{:<15}{}", format!("{}:", label), info.checksum);
        }
    }

    Ok(())
}

fn decode_into<R: Read, S: HoleSink>(
    reader: &mut R,
    mut sink: S,
    config: &CodecConfig,
    counters: &mut Counters,
) -> Result<CodecStats, SparseError> {
    pipeline::decode(reader, &mut sink, config, counters)
}

/// Where decoded output goes and how holes reach it.
#[derive(Debug)]
enum DecodeTarget {
    Holes(File),
    Fill(File),
    /// Standard output is always zero-filled; it may be a pipe or opened for append.
    Stdout,
}

fn decode_target(output: Option<&Path>, mode: HoleMode) -> Result<DecodeTarget, SparseError> {
    let Some(path) = output else {
        if mode == HoleMode::Seek {
            return Err(SparseError::ConfigError("standard output cannot seek".to_string()));
        }
        return Ok(DecodeTarget::Stdout);
    };

    let file = File::create(path)?;
    if use_holes(&file, mode)? {
        Ok(DecodeTarget::Holes(file))
    } else {
        Ok(DecodeTarget::Fill(file))
    }
}

/// Decides between real holes and zero-fill for an opened output.
fn use_holes(target: &File, mode: HoleMode) -> Result<bool, SparseError> {
    match mode {
        HoleMode::Seek => Ok(true),
        HoleMode::Fill => Ok(false),
        HoleMode::Auto => {
            let is_file = target.metadata()?.is_file();
            if !is_file {
                log::warn!("output is not a regular file, writing holes as zeros");
            }
            Ok(is_file)
        }
    }
}

fn open_input(path: Option<&Path>) -> Result<(Box<dyn Read>, Option<u64>), SparseError> {
    match path {
        Some(path) => {
            let file = File::open(path)?;
            let len = file.metadata().ok().filter(|m| m.is_file()).map(|m| m.len());
            Ok((Box::new(BufReader::new(file)), len))
        }
        None => Ok((Box::new(io::stdin().lock()), None)),
    }
}

fn make_counters(signal: ProgressSignal, progress: bool, input_len: Option<u64>) -> Result<Counters, SparseError> {
    let mut counters = Counters::new().with_signal(signal).with_reporter(report);
    if progress {
        let bar = match input_len {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .map_err(|e| SparseError::ConfigError(e.to_string()))?
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
                        .map_err(|e| SparseError::ConfigError(e.to_string()))?,
                );
                bar
            }
        };
        counters = counters.with_progress_bar(bar);
    }
    Ok(counters)
}

fn report(snapshot: &CounterSnapshot) {
    eprintln!(
        "sparsify: read {} bytes, wrote {} bytes ({} in holes)",
        snapshot.bytes_read, snapshot.bytes_written, snapshot.hole_bytes_written
    );
}

fn print_summary(operation: &str, stats: &CodecStats) {
    eprintln!("{} successful!", operation);
    eprintln!("  Bytes Read:       {}", stats.counters.bytes_read);
    eprintln!("  Bytes Written:    {}", stats.counters.bytes_written);
    if stats.counters.hole_bytes_written > 0 {
        eprintln!("  Hole Bytes:       {}", stats.counters.hole_bytes_written);
    }
    eprintln!("  Ratio:            {:.4}", stats.ratio());
    eprintln!("  Elapsed Time:     {:.2?}", stats.elapsed);
}

fn install_signal_handlers() -> ProgressSignal {
    let signal = SIGNAL.get_or_init(ProgressSignal::new).clone();

    let cancel = signal.clone();
    let installed = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            // second interrupt while blocked on I/O
            std::process::exit(130);
        }
        cancel.request_cancel();
    });
    if let Err(e) = installed {
        log::warn!("could not install interrupt handler: {}", e);
    }

    #[cfg(unix)]
    install_report_handler();

    signal
}

#[cfg(unix)]
extern "C" fn on_report_signal(_: libc::c_int) {
    if let Some(signal) = SIGNAL.get() {
        signal.request_report();
    }
}

/// SIGUSR1 (and SIGINFO where it exists) asks for a progress line.
#[cfg(unix)]
fn install_report_handler() {
    let handler = on_report_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only performs an atomic store through a static
    unsafe {
        libc::signal(libc::SIGUSR1, handler);
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd", target_os = "dragonfly"))]
        libc::signal(libc::SIGINFO, handler);
    }
}
