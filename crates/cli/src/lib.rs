//! Process-level plumbing for the `shm-test-client` binary.

pub mod logging;

use anyhow::Context;
use shmprobe::{ClientConfig, Error, PosixShm, TeardownReport, run_session};
use shmprobe_runtime::WaylandBackend;
use tracing::info;

/// Connects to the display named by the environment and runs one session.
pub fn run(config: ClientConfig) -> anyhow::Result<TeardownReport> {
	info!(target = "shmprobe.runtime", width = config.width, height = config.height, "starting shared-memory test client");
	let backend = WaylandBackend::connect().map_err(Error::Connection)?;
	info!(target = "shmprobe.runtime", "connected to display server");
	run_session(backend, &mut PosixShm, config).context("session failed")
}
