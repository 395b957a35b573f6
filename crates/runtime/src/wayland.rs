//! Production backend speaking the Wayland wire protocol.
//!
//! Every proxy is created with its [`ObjectId`] as user data, so the
//! `Dispatch` impls below only have to translate each wire event into a
//! [`ClientEvent`] and queue it. Routing to the session's handlers happens
//! after the queue returns, in arrival order.

use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::path::Path;

use shmprobe_protocol::{Capability, ClientEvent, Event, ObjectId, ObjectKind, Request, ShmFormat};
use tracing::{debug, trace, warn};
use wayland_client::protocol::{wl_buffer, wl_compositor, wl_registry, wl_shm, wl_shm_pool, wl_surface};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::backend::DisplayBackend;
use crate::error::{Error, Result};

enum WlObject {
	Registry(wl_registry::WlRegistry),
	Compositor(wl_compositor::WlCompositor),
	Shm(wl_shm::WlShm),
	ShellBase(xdg_wm_base::XdgWmBase),
	Surface(wl_surface::WlSurface),
	ShellSurface(xdg_surface::XdgSurface),
	Toplevel(xdg_toplevel::XdgToplevel),
	Pool(wl_shm_pool::WlShmPool),
	Buffer(wl_buffer::WlBuffer),
}

impl WlObject {
	fn kind(&self) -> ObjectKind {
		match self {
			Self::Registry(_) => ObjectKind::Registry,
			Self::Compositor(_) => ObjectKind::Compositor,
			Self::Shm(_) => ObjectKind::Shm,
			Self::ShellBase(_) => ObjectKind::ShellBase,
			Self::Surface(_) => ObjectKind::Surface,
			Self::ShellSurface(_) => ObjectKind::ShellSurface,
			Self::Toplevel(_) => ObjectKind::Toplevel,
			Self::Pool(_) => ObjectKind::Pool,
			Self::Buffer(_) => ObjectKind::Buffer,
		}
	}

	/// A proxy created on a dead connection has a null id.
	fn is_inert(&self) -> bool {
		match self {
			Self::Registry(p) => p.id().is_null(),
			Self::Compositor(p) => p.id().is_null(),
			Self::Shm(p) => p.id().is_null(),
			Self::ShellBase(p) => p.id().is_null(),
			Self::Surface(p) => p.id().is_null(),
			Self::ShellSurface(p) => p.id().is_null(),
			Self::Toplevel(p) => p.id().is_null(),
			Self::Pool(p) => p.id().is_null(),
			Self::Buffer(p) => p.id().is_null(),
		}
	}

	fn release(self) {
		match self {
			Self::Buffer(p) => p.destroy(),
			Self::Pool(p) => p.destroy(),
			Self::Toplevel(p) => p.destroy(),
			Self::ShellSurface(p) => p.destroy(),
			Self::Surface(p) => p.destroy(),
			Self::ShellBase(p) => p.destroy(),
			// no destructor request in the bound versions
			Self::Registry(_) | Self::Compositor(_) | Self::Shm(_) => {}
		}
	}
}

/// Event sink the wayland-client queue dispatches into.
#[derive(Default)]
struct Inbox {
	events: Vec<ClientEvent>,
}

impl Inbox {
	fn push(&mut self, source: ObjectId, event: Event) {
		trace!(target = "shmprobe.runtime", %source, ?event, "event decoded");
		self.events.push(ClientEvent::new(source, event));
	}
}

/// Connection to a live Wayland compositor.
pub struct WaylandBackend {
	connection: Connection,
	queue: EventQueue<Inbox>,
	handle: QueueHandle<Inbox>,
	inbox: Inbox,
	objects: HashMap<ObjectId, WlObject>,
	next_id: u32,
	connected: bool,
}

macro_rules! lookup {
	($fn_name:ident, $variant:ident, $ty:ty) => {
		fn $fn_name(&self, id: ObjectId) -> Result<&$ty> {
			match self.objects.get(&id) {
				Some(WlObject::$variant(proxy)) => Ok(proxy),
				Some(other) => Err(Error::WrongKind {
					id,
					expected: ObjectKind::$variant,
					actual: other.kind(),
				}),
				None => Err(Error::UnknownObject(id)),
			}
		}
	};
}

impl WaylandBackend {
	/// Connects to the compositor named by `WAYLAND_DISPLAY` / `XDG_RUNTIME_DIR`.
	pub fn connect() -> Result<Self> {
		let connection = Connection::connect_to_env().map_err(|e| Error::Connect(e.to_string()))?;
		Ok(Self::from_connection(connection))
	}

	/// Connects to the compositor listening on an explicit socket path.
	pub fn connect_to(path: &Path) -> Result<Self> {
		let stream = UnixStream::connect(path).map_err(|e| Error::Connect(format!("{}: {e}", path.display())))?;
		let connection = Connection::from_socket(stream).map_err(|e| Error::Connect(e.to_string()))?;
		Ok(Self::from_connection(connection))
	}

	fn from_connection(connection: Connection) -> Self {
		let queue = connection.new_event_queue::<Inbox>();
		let handle = queue.handle();
		Self {
			connection,
			queue,
			handle,
			inbox: Inbox::default(),
			objects: HashMap::new(),
			next_id: 1,
			connected: true,
		}
	}

	fn allocate_id(&mut self) -> ObjectId {
		let id = ObjectId::new(self.next_id);
		self.next_id += 1;
		id
	}

	fn adopt(&mut self, id: ObjectId, object: WlObject) -> Option<ObjectId> {
		if object.is_inert() {
			warn!(target = "shmprobe.runtime", kind = %object.kind(), "server-side object not created");
			return None;
		}
		debug!(target = "shmprobe.runtime", %id, kind = %object.kind(), "object created");
		self.objects.insert(id, object);
		Some(id)
	}

	lookup!(registry, Registry, wl_registry::WlRegistry);
	lookup!(compositor, Compositor, wl_compositor::WlCompositor);
	lookup!(shm, Shm, wl_shm::WlShm);
	lookup!(shell_base, ShellBase, xdg_wm_base::XdgWmBase);
	lookup!(surface, Surface, wl_surface::WlSurface);
	lookup!(shell_surface, ShellSurface, xdg_surface::XdgSurface);
	lookup!(toplevel, Toplevel, xdg_toplevel::XdgToplevel);
	lookup!(pool, Pool, wl_shm_pool::WlShmPool);
	lookup!(buffer, Buffer, wl_buffer::WlBuffer);

	fn take_events(&mut self) -> Vec<ClientEvent> {
		std::mem::take(&mut self.inbox.events)
	}
}

fn wire_format(format: ShmFormat) -> wl_shm::Format {
	match format {
		ShmFormat::Argb8888 => wl_shm::Format::Argb8888,
		ShmFormat::Xrgb8888 => wl_shm::Format::Xrgb8888,
	}
}

impl DisplayBackend for WaylandBackend {
	fn send(&mut self, request: Request<'_>) -> Result<Option<ObjectId>> {
		let qh = self.handle.clone();
		match request {
			Request::GetRegistry => {
				let id = self.allocate_id();
				let registry = self.connection.display().get_registry(&qh, id);
				Ok(self.adopt(id, WlObject::Registry(registry)))
			}
			Request::Bind {
				registry,
				name,
				capability,
				version,
			} => {
				let id = self.allocate_id();
				let registry = self.registry(registry)?;
				let object = match capability {
					Capability::Compositor => WlObject::Compositor(registry.bind(name, version, &qh, id)),
					Capability::Shm => WlObject::Shm(registry.bind(name, version, &qh, id)),
					Capability::ShellBase => WlObject::ShellBase(registry.bind(name, version, &qh, id)),
				};
				Ok(self.adopt(id, object))
			}
			Request::CreateSurface { compositor } => {
				let id = self.allocate_id();
				let surface = self.compositor(compositor)?.create_surface(&qh, id);
				Ok(self.adopt(id, WlObject::Surface(surface)))
			}
			Request::GetShellSurface { shell_base, surface } => {
				let id = self.allocate_id();
				let surface = self.surface(surface)?;
				let shell_surface = self.shell_base(shell_base)?.get_xdg_surface(surface, &qh, id);
				Ok(self.adopt(id, WlObject::ShellSurface(shell_surface)))
			}
			Request::GetToplevel { shell_surface } => {
				let id = self.allocate_id();
				let toplevel = self.shell_surface(shell_surface)?.get_toplevel(&qh, id);
				Ok(self.adopt(id, WlObject::Toplevel(toplevel)))
			}
			Request::SetTitle { toplevel, title } => {
				self.toplevel(toplevel)?.set_title(title.to_owned());
				Ok(None)
			}
			Request::SetAppId { toplevel, app_id } => {
				self.toplevel(toplevel)?.set_app_id(app_id.to_owned());
				Ok(None)
			}
			Request::CreatePool { shm, fd, size } => {
				let id = self.allocate_id();
				let pool = self.shm(shm)?.create_pool(fd, size, &qh, id);
				Ok(self.adopt(id, WlObject::Pool(pool)))
			}
			Request::CreateBuffer {
				pool,
				offset,
				width,
				height,
				stride,
				format,
			} => {
				let id = self.allocate_id();
				let buffer = self.pool(pool)?.create_buffer(offset, width, height, stride, wire_format(format), &qh, id);
				Ok(self.adopt(id, WlObject::Buffer(buffer)))
			}
			Request::Attach { surface, buffer, x, y } => {
				let buffer = self.buffer(buffer)?;
				self.surface(surface)?.attach(Some(buffer), x, y);
				Ok(None)
			}
			Request::Damage {
				surface,
				x,
				y,
				width,
				height,
			} => {
				self.surface(surface)?.damage(x, y, width, height);
				Ok(None)
			}
			Request::Commit { surface } => {
				self.surface(surface)?.commit();
				Ok(None)
			}
			Request::AckConfigure { shell_surface, serial } => {
				self.shell_surface(shell_surface)?.ack_configure(serial);
				Ok(None)
			}
			Request::Pong { shell_base, serial } => {
				self.shell_base(shell_base)?.pong(serial);
				Ok(None)
			}
			Request::Destroy { object } => {
				let proxy = self.objects.remove(&object).ok_or(Error::UnknownObject(object))?;
				debug!(target = "shmprobe.runtime", id = %object, kind = %proxy.kind(), "object released");
				proxy.release();
				Ok(None)
			}
		}
	}

	fn roundtrip(&mut self) -> Result<Vec<ClientEvent>> {
		self.queue
			.roundtrip(&mut self.inbox)
			.map_err(|e| Error::Dispatch(e.to_string()))?;
		Ok(self.take_events())
	}

	fn blocking_dispatch(&mut self) -> Result<Vec<ClientEvent>> {
		self.queue
			.blocking_dispatch(&mut self.inbox)
			.map_err(|e| Error::Dispatch(e.to_string()))?;
		Ok(self.take_events())
	}

	fn disconnect(&mut self) {
		if !self.connected {
			return;
		}
		self.connected = false;
		if let Err(e) = self.connection.flush() {
			warn!(target = "shmprobe.runtime", error = %e, "flush before disconnect failed");
		}
		self.objects.clear();
		debug!(target = "shmprobe.runtime", "disconnected");
	}
}

impl Dispatch<wl_registry::WlRegistry, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &wl_registry::WlRegistry, event: wl_registry::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		match event {
			wl_registry::Event::Global { name, interface, version } => inbox.push(*source, Event::Global { name, interface, version }),
			wl_registry::Event::GlobalRemove { name } => inbox.push(*source, Event::GlobalRemove { name }),
			_ => {}
		}
	}
}

impl Dispatch<wl_compositor::WlCompositor, ObjectId> for Inbox {
	fn event(_: &mut Self, _: &wl_compositor::WlCompositor, _: wl_compositor::Event, _: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {}
}

impl Dispatch<wl_shm::WlShm, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &wl_shm::WlShm, event: wl_shm::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		if let wl_shm::Event::Format { format } = event {
			let format = match format {
				WEnum::Value(format) => u32::from(format),
				WEnum::Unknown(raw) => raw,
			};
			inbox.push(*source, Event::ShmFormat { format });
		}
	}
}

impl Dispatch<wl_shm_pool::WlShmPool, ObjectId> for Inbox {
	fn event(_: &mut Self, _: &wl_shm_pool::WlShmPool, _: wl_shm_pool::Event, _: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {}
}

impl Dispatch<wl_buffer::WlBuffer, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &wl_buffer::WlBuffer, event: wl_buffer::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		if let wl_buffer::Event::Release = event {
			inbox.push(*source, Event::BufferRelease);
		}
	}
}

impl Dispatch<wl_surface::WlSurface, ObjectId> for Inbox {
	fn event(_: &mut Self, _: &wl_surface::WlSurface, event: wl_surface::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		trace!(target = "shmprobe.runtime", %source, ?event, "surface event ignored");
	}
}

impl Dispatch<xdg_wm_base::XdgWmBase, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &xdg_wm_base::XdgWmBase, event: xdg_wm_base::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		if let xdg_wm_base::Event::Ping { serial } = event {
			inbox.push(*source, Event::Ping { serial });
		}
	}
}

impl Dispatch<xdg_surface::XdgSurface, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &xdg_surface::XdgSurface, event: xdg_surface::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		if let xdg_surface::Event::Configure { serial } = event {
			inbox.push(*source, Event::Configure { serial });
		}
	}
}

impl Dispatch<xdg_toplevel::XdgToplevel, ObjectId> for Inbox {
	fn event(inbox: &mut Self, _: &xdg_toplevel::XdgToplevel, event: xdg_toplevel::Event, source: &ObjectId, _: &Connection, _: &QueueHandle<Self>) {
		match event {
			xdg_toplevel::Event::Configure { width, height, .. } => inbox.push(*source, Event::ToplevelConfigure { width, height }),
			xdg_toplevel::Event::Close => inbox.push(*source, Event::Close),
			_ => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_to_missing_socket_is_a_connect_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = WaylandBackend::connect_to(&dir.path().join("wayland-missing")).err().expect("connect should fail");
		assert!(matches!(err, Error::Connect(_)));
		assert!(err.is_transport());
		assert!(err.to_string().contains("wayland-missing"));
	}

	#[test]
	fn wire_formats_match_protocol_codes() {
		assert_eq!(u32::from(wire_format(ShmFormat::Argb8888)), ShmFormat::Argb8888.code());
		assert_eq!(u32::from(wire_format(ShmFormat::Xrgb8888)), ShmFormat::Xrgb8888.code());
	}
}
