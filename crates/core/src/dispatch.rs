//! The blocking event loop.
//!
//! Each iteration blocks once on the backend, then routes every delivered
//! event, in arrival order, to the component that owns its source object.

use shmprobe_protocol::{ClientEvent, Event, ObjectKind, ShmFormat};
use shmprobe_runtime::DisplayBackend;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::surface::answer_ping;

pub struct DispatchLoop<'s, B: DisplayBackend> {
	session: &'s mut Session<B>,
}

impl<'s, B: DisplayBackend> DispatchLoop<'s, B> {
	pub fn new(session: &'s mut Session<B>) -> Self {
		Self { session }
	}

	/// Dispatches until the first configure is acknowledged or the window closes.
	pub fn run_until_configured(&mut self) -> Result<()> {
		while self.session.running && !self.session.is_configured() {
			self.dispatch_once()?;
		}
		if self.session.is_configured() {
			info!(target = "shmprobe.dispatch", "surface configured; window visible");
		}
		Ok(())
	}

	/// Dispatches until the window is closed.
	pub fn run(&mut self) -> Result<()> {
		if self.session.running {
			info!(target = "shmprobe.dispatch", "entering main loop; close the window to exit");
		}
		while self.session.running {
			self.dispatch_once()?;
		}
		info!(target = "shmprobe.dispatch", "main loop finished");
		Ok(())
	}

	/// One blocking read followed by routing of everything it delivered.
	pub fn dispatch_once(&mut self) -> Result<usize> {
		let events = self.session.backend.blocking_dispatch().map_err(Error::Dispatch)?;
		let delivered = events.len();
		for event in events {
			self.route(event)?;
		}
		Ok(delivered)
	}

	fn route(&mut self, event: ClientEvent) -> Result<()> {
		let session = &mut *self.session;
		let source = event.source;
		let Some(kind) = session.resources.kind_of(source) else {
			debug!(target = "shmprobe.dispatch", %source, event = ?event.event, "event for unknown object dropped");
			return Ok(());
		};

		match (kind, event.event) {
			(ObjectKind::Registry, event) => match session.registry.as_mut() {
				Some(registry) => registry.handle_event(&mut session.backend, &mut session.resources, &event)?,
				None => debug!(target = "shmprobe.dispatch", %source, "registry event before discovery"),
			},
			(ObjectKind::Shm, Event::ShmFormat { format }) => {
				debug!(target = "shmprobe.dispatch", format, "shm format advertised");
				session.shm_formats.push(format);
			}
			(ObjectKind::ShellBase, Event::Ping { serial }) => answer_ping(&mut session.backend, source, serial)?,
			(ObjectKind::ShellSurface, Event::Configure { serial }) => {
				let Some(surface) = session.surface.as_mut() else {
					debug!(target = "shmprobe.dispatch", %source, serial, "configure without a configurator");
					return Ok(());
				};
				if surface.acknowledged() == 0 && !session.shm_formats.contains(&ShmFormat::Argb8888.code()) {
					warn!(target = "shmprobe.dispatch", formats = ?session.shm_formats, "server has not advertised ARGB8888");
				}
				surface.handle_configure(&mut session.backend, serial, session.buffer.as_ref())?;
			}
			(ObjectKind::Toplevel, Event::ToplevelConfigure { width, height }) => {
				if let Some(surface) = session.surface.as_mut() {
					surface.handle_toplevel_configure(width, height);
				}
			}
			(ObjectKind::Toplevel, Event::Close) => {
				if let Some(surface) = session.surface.as_mut() {
					surface.handle_close();
				}
				session.running = false;
			}
			(ObjectKind::Buffer, Event::BufferRelease) => {
				if let Some(buffer) = session.buffer.as_mut() {
					buffer.on_release();
				}
			}
			(kind, event) => debug!(target = "shmprobe.dispatch", %source, %kind, ?event, "event ignored"),
		}
		Ok(())
	}
}
