//! Requests the client issues to the display server.

use std::os::fd::BorrowedFd;

use crate::{Capability, ObjectId, ObjectKind};

/// Pixel formats understood by the shared-memory factory.
///
/// Values are the `wl_shm` format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShmFormat {
	/// 32-bit ARGB, 8 bits per channel, little-endian.
	Argb8888,
	/// 32-bit RGB with an unused alpha byte, little-endian.
	Xrgb8888,
}

impl ShmFormat {
	/// Bytes per pixel for every supported format.
	pub const BYTES_PER_PIXEL: u32 = 4;

	/// Wire format code.
	pub const fn code(self) -> u32 {
		match self {
			Self::Argb8888 => 0,
			Self::Xrgb8888 => 1,
		}
	}

	/// Looks up a wire format code.
	pub const fn from_code(code: u32) -> Option<Self> {
		match code {
			0 => Some(Self::Argb8888),
			1 => Some(Self::Xrgb8888),
			_ => None,
		}
	}
}

/// A single protocol request.
///
/// Creation requests yield a new [`ObjectId`] from the backend; all other
/// requests target an existing object.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
	/// `wl_display.get_registry`
	GetRegistry,
	/// `wl_registry.bind`
	Bind {
		registry: ObjectId,
		name: u32,
		capability: Capability,
		version: u32,
	},
	/// `wl_compositor.create_surface`
	CreateSurface { compositor: ObjectId },
	/// `xdg_wm_base.get_xdg_surface`
	GetShellSurface { shell_base: ObjectId, surface: ObjectId },
	/// `xdg_surface.get_toplevel`
	GetToplevel { shell_surface: ObjectId },
	/// `xdg_toplevel.set_title`
	SetTitle { toplevel: ObjectId, title: &'a str },
	/// `xdg_toplevel.set_app_id`
	SetAppId { toplevel: ObjectId, app_id: &'a str },
	/// `wl_shm.create_pool`; the descriptor is duplicated onto the wire.
	CreatePool { shm: ObjectId, fd: BorrowedFd<'a>, size: i32 },
	/// `wl_shm_pool.create_buffer`
	CreateBuffer {
		pool: ObjectId,
		offset: i32,
		width: i32,
		height: i32,
		stride: i32,
		format: ShmFormat,
	},
	/// `wl_surface.attach`
	Attach { surface: ObjectId, buffer: ObjectId, x: i32, y: i32 },
	/// `wl_surface.damage`
	Damage {
		surface: ObjectId,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
	},
	/// `wl_surface.commit`
	Commit { surface: ObjectId },
	/// `xdg_surface.ack_configure`
	AckConfigure { shell_surface: ObjectId, serial: u32 },
	/// `xdg_wm_base.pong`
	Pong { shell_base: ObjectId, serial: u32 },
	/// Destructor request, or a local proxy drop for objects without one.
	Destroy { object: ObjectId },
}

/// Request name without payload, used for logging and request capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOp {
	GetRegistry,
	Bind,
	CreateSurface,
	GetShellSurface,
	GetToplevel,
	SetTitle,
	SetAppId,
	CreatePool,
	CreateBuffer,
	Attach,
	Damage,
	Commit,
	AckConfigure,
	Pong,
	Destroy,
}

impl Request<'_> {
	/// Payload-free name of this request.
	pub fn op(&self) -> RequestOp {
		match self {
			Self::GetRegistry => RequestOp::GetRegistry,
			Self::Bind { .. } => RequestOp::Bind,
			Self::CreateSurface { .. } => RequestOp::CreateSurface,
			Self::GetShellSurface { .. } => RequestOp::GetShellSurface,
			Self::GetToplevel { .. } => RequestOp::GetToplevel,
			Self::SetTitle { .. } => RequestOp::SetTitle,
			Self::SetAppId { .. } => RequestOp::SetAppId,
			Self::CreatePool { .. } => RequestOp::CreatePool,
			Self::CreateBuffer { .. } => RequestOp::CreateBuffer,
			Self::Attach { .. } => RequestOp::Attach,
			Self::Damage { .. } => RequestOp::Damage,
			Self::Commit { .. } => RequestOp::Commit,
			Self::AckConfigure { .. } => RequestOp::AckConfigure,
			Self::Pong { .. } => RequestOp::Pong,
			Self::Destroy { .. } => RequestOp::Destroy,
		}
	}

	/// Object the request is sent on; `None` for display-level requests.
	pub fn target(&self) -> Option<ObjectId> {
		match *self {
			Self::GetRegistry => None,
			Self::Bind { registry, .. } => Some(registry),
			Self::CreateSurface { compositor } => Some(compositor),
			Self::GetShellSurface { shell_base, .. } => Some(shell_base),
			Self::GetToplevel { shell_surface } => Some(shell_surface),
			Self::SetTitle { toplevel, .. } | Self::SetAppId { toplevel, .. } => Some(toplevel),
			Self::CreatePool { shm, .. } => Some(shm),
			Self::CreateBuffer { pool, .. } => Some(pool),
			Self::Attach { surface, .. } | Self::Damage { surface, .. } | Self::Commit { surface } => Some(surface),
			Self::AckConfigure { shell_surface, .. } => Some(shell_surface),
			Self::Pong { shell_base, .. } => Some(shell_base),
			Self::Destroy { object } => Some(object),
		}
	}

	/// Serial carried by acknowledgement-style requests.
	pub fn serial(&self) -> Option<u32> {
		match *self {
			Self::AckConfigure { serial, .. } | Self::Pong { serial, .. } => Some(serial),
			_ => None,
		}
	}

	/// Kind of object this request creates, if it is a creation request.
	pub fn creates(&self) -> Option<ObjectKind> {
		match self {
			Self::GetRegistry => Some(ObjectKind::Registry),
			Self::Bind { capability, .. } => Some(capability.object_kind()),
			Self::CreateSurface { .. } => Some(ObjectKind::Surface),
			Self::GetShellSurface { .. } => Some(ObjectKind::ShellSurface),
			Self::GetToplevel { .. } => Some(ObjectKind::Toplevel),
			Self::CreatePool { .. } => Some(ObjectKind::Pool),
			Self::CreateBuffer { .. } => Some(ObjectKind::Buffer),
			_ => None,
		}
	}
}
