//! One client session: setup, the two dispatch phases and the single teardown.

use shmprobe_runtime::DisplayBackend;
use tracing::{info, warn};

use crate::buffer::{self, ShmBuffer};
use crate::config::ClientConfig;
use crate::dispatch::DispatchLoop;
use crate::error::Result;
use crate::memory::BackingStore;
use crate::registry::{self, CapabilityRegistry, CapabilitySet};
use crate::resources::{ResourceArena, TeardownReport};
use crate::surface::{SurfaceConfigurator, SurfaceState};

/// Everything the event handlers mutate, passed to them by reference.
///
/// Handles live in the [`ResourceArena`]; the typed fields below only name
/// them, so a partially set up session is torn down by the same code path as a
/// complete one.
pub struct Session<B: DisplayBackend> {
	pub(crate) backend: B,
	pub(crate) config: ClientConfig,
	pub(crate) resources: ResourceArena,
	pub(crate) registry: Option<CapabilityRegistry>,
	pub(crate) capabilities: Option<CapabilitySet>,
	pub(crate) surface: Option<SurfaceConfigurator>,
	pub(crate) buffer: Option<ShmBuffer>,
	pub(crate) shm_formats: Vec<u32>,
	pub(crate) running: bool,
}

impl<B: DisplayBackend> Session<B> {
	pub fn new(backend: B, config: ClientConfig) -> Self {
		Self {
			backend,
			config,
			resources: ResourceArena::new(),
			registry: None,
			capabilities: None,
			surface: None,
			buffer: None,
			shm_formats: Vec::new(),
			running: true,
		}
	}

	/// Discovers capabilities, creates the window and its buffer, and sends the
	/// initial commit. On error whatever was acquired stays in the arena for
	/// [`Session::teardown`].
	pub fn setup<S: BackingStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
		let (registry, capabilities) = registry::discover(&mut self.backend, &mut self.resources)?;
		self.registry = Some(registry);
		self.capabilities = Some(capabilities);

		let surface = SurfaceConfigurator::create(&mut self.backend, &mut self.resources, &capabilities, &self.config)?;
		let surface = self.surface.insert(surface);

		let buffer = buffer::allocate(
			&mut self.backend,
			&mut self.resources,
			store,
			capabilities.shm,
			self.config.width,
			self.config.height,
		)?;
		self.buffer = Some(buffer);

		surface.initial_commit(&mut self.backend)?;
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn is_configured(&self) -> bool {
		self.surface.as_ref().is_some_and(SurfaceConfigurator::is_configured)
	}

	pub fn surface_state(&self) -> Option<SurfaceState> {
		self.surface.as_ref().map(SurfaceConfigurator::state)
	}

	pub fn surface(&self) -> Option<&SurfaceConfigurator> {
		self.surface.as_ref()
	}

	pub fn buffer(&self) -> Option<&ShmBuffer> {
		self.buffer.as_ref()
	}

	pub fn capabilities(&self) -> Option<CapabilitySet> {
		self.capabilities
	}

	/// Pixel format codes the server advertised on `wl_shm`.
	pub fn shm_formats(&self) -> &[u32] {
		&self.shm_formats
	}

	pub fn resources(&self) -> &ResourceArena {
		&self.resources
	}

	pub fn dispatcher(&mut self) -> DispatchLoop<'_, B> {
		DispatchLoop::new(self)
	}

	/// Releases every held resource in dependency order and closes the connection.
	pub fn teardown(mut self) -> TeardownReport {
		info!(target = "shmprobe.teardown", live = self.resources.live(), "cleaning up");
		let report = self.resources.release_all(&mut self.backend);
		if report.failures > 0 {
			warn!(target = "shmprobe.teardown", failures = report.failures, "some releases failed");
		}
		self.backend.disconnect();
		info!(target = "shmprobe.teardown", released = report.released.len(), "disconnected");
		report
	}
}

/// Runs a whole session on `backend`: setup, wait for the first configure,
/// dispatch until close, then tear down whatever the outcome was.
pub fn run_session<B, S>(backend: B, store: &mut S, config: ClientConfig) -> Result<TeardownReport>
where
	B: DisplayBackend,
	S: BackingStore + ?Sized,
{
	let mut session = Session::new(backend, config);
	let outcome = drive(&mut session, store);
	let report = session.teardown();
	outcome?;
	info!(target = "shmprobe.teardown", "shutdown complete");
	Ok(report)
}

fn drive<B: DisplayBackend, S: BackingStore + ?Sized>(session: &mut Session<B>, store: &mut S) -> Result<()> {
	session.setup(store)?;
	let mut dispatcher = session.dispatcher();
	dispatcher.run_until_configured()?;
	dispatcher.run()
}

impl<B: DisplayBackend> std::fmt::Debug for Session<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("running", &self.running)
			.field("surface", &self.surface_state())
			.field("live", &self.resources.live())
			.finish_non_exhaustive()
	}
}
