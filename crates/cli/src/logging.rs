use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(true).init();
}
