use sparsify::{cli, SparseError};

fn main() {
	env_logger::init();
	if let Err(e) = cli::run() {
		eprintln!("Error: {}", e);
		let code = if matches!(e, SparseError::Cancelled { .. }) { 130 } else { 1 };
		std::process::exit(code);
	}
}
