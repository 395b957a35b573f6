//! Client-side object handles.

use std::fmt;

/// Opaque handle naming one protocol object owned by this client.
///
/// Handles are assigned by the backend when an object is created and are
/// never reused within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
	/// Wraps a raw backend-assigned handle value.
	pub const fn new(raw: u32) -> Self {
		Self(raw)
	}

	/// Returns the raw handle value.
	pub const fn raw(self) -> u32 {
		self.0
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Kind of protocol object behind an [`ObjectId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
	Registry,
	Compositor,
	Shm,
	ShellBase,
	Surface,
	ShellSurface,
	Toplevel,
	Pool,
	Buffer,
}

impl ObjectKind {
	/// Wire interface name for this kind of object.
	pub const fn interface(self) -> &'static str {
		match self {
			Self::Registry => "wl_registry",
			Self::Compositor => "wl_compositor",
			Self::Shm => "wl_shm",
			Self::ShellBase => "xdg_wm_base",
			Self::Surface => "wl_surface",
			Self::ShellSurface => "xdg_surface",
			Self::Toplevel => "xdg_toplevel",
			Self::Pool => "wl_shm_pool",
			Self::Buffer => "wl_buffer",
		}
	}

	/// Whether releasing this object sends a destructor request.
	///
	/// `wl_registry`, `wl_compositor` and `wl_shm` (v1) have none, so releasing
	/// them only drops the client-side proxy.
	pub const fn has_destructor(self) -> bool {
		!matches!(self, Self::Registry | Self::Compositor | Self::Shm)
	}
}

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.interface())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_id_displays_with_hash_prefix() {
		assert_eq!(ObjectId::new(7).to_string(), "#7");
		assert_eq!(ObjectId::new(7).raw(), 7);
	}

	#[test]
	fn only_globals_without_destructor_are_proxy_released() {
		assert!(!ObjectKind::Registry.has_destructor());
		assert!(!ObjectKind::Compositor.has_destructor());
		assert!(!ObjectKind::Shm.has_destructor());
		assert!(ObjectKind::ShellBase.has_destructor());
		assert!(ObjectKind::Buffer.has_destructor());
	}
}
