//! The window: surface, shell surface and toplevel, and their configure handshake.
//!
//! ```text
//! Created --initial commit--> AwaitingFirstConfigure --first ack + attach--> Configured
//!    \______________________________ close ______________________________/--> Closing
//! ```
//!
//! Every configure is acknowledged with its own serial before anything else is
//! sent for the surface. Only the first acknowledgement attaches the buffer;
//! later ones are acknowledged and nothing more.

use shmprobe_protocol::{ObjectId, ObjectKind, Request};
use shmprobe_runtime::DisplayBackend;
use tracing::{debug, info};

use crate::buffer::ShmBuffer;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::registry::CapabilitySet;
use crate::request::{create, send};
use crate::resources::ResourceArena;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
	/// Objects exist and the title is set; nothing committed yet.
	Created,
	/// The initial empty commit went out; waiting for the first configure.
	AwaitingFirstConfigure,
	/// First configure acknowledged and the buffer attached.
	Configured,
	/// The server asked the window to close. Terminal.
	Closing,
}

/// What handling a configure event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
	/// First acknowledgement: the buffer was attached, damaged and committed.
	Attached,
	/// Acknowledged without touching the surface contents.
	Acknowledged,
	/// Arrived after close; nothing was sent.
	Ignored,
}

#[derive(Debug)]
pub struct SurfaceConfigurator {
	surface: ObjectId,
	shell_surface: ObjectId,
	toplevel: ObjectId,
	state: SurfaceState,
	acknowledged: u32,
	suggested_size: Option<(i32, i32)>,
}

impl SurfaceConfigurator {
	/// Creates the surface, gives it the toplevel role and sets title and app id.
	pub fn create<B: DisplayBackend>(backend: &mut B, resources: &mut ResourceArena, capabilities: &CapabilitySet, config: &ClientConfig) -> Result<Self> {
		let surface = create(
			backend,
			Request::CreateSurface {
				compositor: capabilities.compositor,
			},
			ObjectKind::Surface,
		)?;
		resources.track(surface, ObjectKind::Surface);
		info!(target = "shmprobe.surface", id = %surface, "created wl_surface");

		let shell_surface = create(
			backend,
			Request::GetShellSurface {
				shell_base: capabilities.shell_base,
				surface,
			},
			ObjectKind::ShellSurface,
		)?;
		resources.track(shell_surface, ObjectKind::ShellSurface);
		info!(target = "shmprobe.surface", id = %shell_surface, "created xdg_surface");

		let toplevel = create(backend, Request::GetToplevel { shell_surface }, ObjectKind::Toplevel)?;
		resources.track(toplevel, ObjectKind::Toplevel);
		send(backend, Request::SetTitle { toplevel, title: &config.title })?;
		send(backend, Request::SetAppId { toplevel, app_id: &config.app_id })?;
		info!(target = "shmprobe.surface", id = %toplevel, title = %config.title, "created xdg_toplevel");

		Ok(Self {
			surface,
			shell_surface,
			toplevel,
			state: SurfaceState::Created,
			acknowledged: 0,
			suggested_size: None,
		})
	}

	pub fn state(&self) -> SurfaceState {
		self.state
	}

	pub fn surface(&self) -> ObjectId {
		self.surface
	}

	pub fn shell_surface(&self) -> ObjectId {
		self.shell_surface
	}

	pub fn toplevel(&self) -> ObjectId {
		self.toplevel
	}

	/// Number of configure events acknowledged so far.
	pub fn acknowledged(&self) -> u32 {
		self.acknowledged
	}

	/// Last size hint from the toplevel; `(0, 0)` means the client decides.
	pub fn suggested_size(&self) -> Option<(i32, i32)> {
		self.suggested_size
	}

	pub fn is_configured(&self) -> bool {
		self.state == SurfaceState::Configured
	}

	/// Sends the empty commit that makes the server issue the first configure.
	pub fn initial_commit<B: DisplayBackend>(&mut self, backend: &mut B) -> Result<()> {
		if self.state != SurfaceState::Created {
			debug!(target = "shmprobe.surface", state = ?self.state, "initial commit already sent");
			return Ok(());
		}
		send(backend, Request::Commit { surface: self.surface })?;
		self.state = SurfaceState::AwaitingFirstConfigure;
		info!(target = "shmprobe.surface", "committed initial surface");
		Ok(())
	}

	/// Acknowledges a configure and, the first time only, shows the buffer.
	///
	/// Once the toplevel has been asked to close no request is issued for the
	/// surface any more, so a configure arriving after close is not
	/// acknowledged, even within the same dispatch batch.
	///
	/// Without a buffer the configure is still acknowledged but the surface
	/// stays unconfigured.
	pub fn handle_configure<B: DisplayBackend>(&mut self, backend: &mut B, serial: u32, buffer: Option<&ShmBuffer>) -> Result<ConfigureOutcome> {
		if self.state == SurfaceState::Closing {
			debug!(target = "shmprobe.surface", serial, "configure after close ignored");
			return Ok(ConfigureOutcome::Ignored);
		}

		send(
			backend,
			Request::AckConfigure {
				shell_surface: self.shell_surface,
				serial,
			},
		)?;
		self.acknowledged += 1;

		if self.state == SurfaceState::Configured {
			debug!(target = "shmprobe.surface", serial, "configure acknowledged");
			return Ok(ConfigureOutcome::Acknowledged);
		}
		info!(target = "shmprobe.surface", serial, "xdg_surface configured");

		let Some(buffer) = buffer else {
			debug!(target = "shmprobe.surface", serial, "no buffer to attach yet");
			return Ok(ConfigureOutcome::Acknowledged);
		};
		let layout = buffer.layout();
		send(
			backend,
			Request::Attach {
				surface: self.surface,
				buffer: buffer.id(),
				x: 0,
				y: 0,
			},
		)?;
		send(
			backend,
			Request::Damage {
				surface: self.surface,
				x: 0,
				y: 0,
				width: layout.wire_width(),
				height: layout.wire_height(),
			},
		)?;
		send(backend, Request::Commit { surface: self.surface })?;
		self.state = SurfaceState::Configured;
		info!(target = "shmprobe.surface", buffer = %buffer.id(), "attached buffer and committed surface");
		Ok(ConfigureOutcome::Attached)
	}

	/// Records the toplevel's size hint. The buffer is never resized.
	pub fn handle_toplevel_configure(&mut self, width: i32, height: i32) {
		self.suggested_size = Some((width, height));
		if width > 0 && height > 0 {
			info!(target = "shmprobe.surface", width, height, "toplevel configure");
		} else {
			debug!(target = "shmprobe.surface", width, height, "toplevel configure without size hint");
		}
	}

	/// Enters the terminal state; nothing is sent for the surface afterwards.
	pub fn handle_close(&mut self) {
		if self.state != SurfaceState::Closing {
			info!(target = "shmprobe.surface", "window close requested");
		}
		self.state = SurfaceState::Closing;
	}
}

/// Answers a shell-base ping, whatever the surface is doing.
pub fn answer_ping<B: DisplayBackend>(backend: &mut B, shell_base: ObjectId, serial: u32) -> Result<()> {
	send(backend, Request::Pong { shell_base, serial })?;
	debug!(target = "shmprobe.surface", serial, "pong");
	Ok(())
}
