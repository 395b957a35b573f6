//! Typed events delivered by the display server.

use crate::ObjectId;

/// Payload of a decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// `wl_registry.global`: a capability was advertised.
	Global { name: u32, interface: String, version: u32 },
	/// `wl_registry.global_remove`
	GlobalRemove { name: u32 },
	/// `wl_shm.format`: the server accepts this pixel format code.
	ShmFormat { format: u32 },
	/// `xdg_wm_base.ping`: must be answered with a pong carrying `serial`.
	Ping { serial: u32 },
	/// `xdg_surface.configure`: must be acknowledged with `serial`.
	Configure { serial: u32 },
	/// `xdg_toplevel.configure`: size hint, zero meaning "client decides".
	ToplevelConfigure { width: i32, height: i32 },
	/// `xdg_toplevel.close`
	Close,
	/// `wl_buffer.release`: the server no longer reads the buffer.
	BufferRelease,
}

/// An event together with the handle of the object that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
	pub source: ObjectId,
	pub event: Event,
}

impl ClientEvent {
	pub fn new(source: ObjectId, event: Event) -> Self {
		Self { source, event }
	}
}
