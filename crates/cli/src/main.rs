use shmprobe::ClientConfig;
use shmprobe_cli::{logging, run};
use tracing::error;

fn main() {
	logging::init_logging();

	if let Err(err) = run(ClientConfig::default()) {
		error!(target = "shmprobe", error = %format_args!("{err:#}"), "test client failed");
		std::process::exit(1);
	}
}
