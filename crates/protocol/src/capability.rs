//! The server capabilities this client requires.

use std::fmt;

use crate::ObjectKind;

/// A global the session must bind before it can create a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
	/// Surface-compositor factory (`wl_compositor`).
	Compositor,
	/// Shared-memory-pool factory (`wl_shm`).
	Shm,
	/// Shell base (`xdg_wm_base`).
	ShellBase,
}

impl Capability {
	/// Every required capability, in bind-report order.
	pub const ALL: [Capability; 3] = [Capability::Compositor, Capability::Shm, Capability::ShellBase];

	/// Interface name the server advertises this capability under.
	pub const fn interface(self) -> &'static str {
		self.object_kind().interface()
	}

	/// Fixed protocol version the client binds at.
	pub const fn version(self) -> u32 {
		match self {
			Self::Compositor => 4,
			Self::Shm => 1,
			Self::ShellBase => 1,
		}
	}

	/// Kind of the object produced by binding this capability.
	pub const fn object_kind(self) -> ObjectKind {
		match self {
			Self::Compositor => ObjectKind::Compositor,
			Self::Shm => ObjectKind::Shm,
			Self::ShellBase => ObjectKind::ShellBase,
		}
	}

	/// Matches an advertised interface name against the required set.
	pub fn from_interface(interface: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|cap| cap.interface() == interface)
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.interface())
	}
}
