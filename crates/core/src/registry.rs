//! Capability discovery.
//!
//! The client asks for the registry, performs one synchronous round-trip and
//! binds the three capabilities it needs as their advertisements are handled.
//! Arrival order is up to the server. Anything still missing once the
//! round-trip returns is fatal.

use std::collections::BTreeMap;

use shmprobe_protocol::{Capability, Event, ObjectId, ObjectKind, Request};
use shmprobe_runtime::DisplayBackend;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::request::create;
use crate::resources::ResourceArena;

/// The bound required capabilities. Only exists when all three are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
	pub compositor: ObjectId,
	pub shm: ObjectId,
	pub shell_base: ObjectId,
}

impl CapabilitySet {
	pub fn get(&self, capability: Capability) -> ObjectId {
		match capability {
			Capability::Compositor => self.compositor,
			Capability::Shm => self.shm,
			Capability::ShellBase => self.shell_base,
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct Bound {
	name: u32,
	id: ObjectId,
}

/// Owner of the registry object and of the capability bindings.
#[derive(Debug)]
pub struct CapabilityRegistry {
	registry: ObjectId,
	bound: BTreeMap<Capability, Bound>,
}

impl CapabilityRegistry {
	pub fn new(registry: ObjectId) -> Self {
		Self {
			registry,
			bound: BTreeMap::new(),
		}
	}

	pub fn id(&self) -> ObjectId {
		self.registry
	}

	/// Handles one registry event, binding required capabilities on sight.
	pub fn handle_event<B: DisplayBackend>(&mut self, backend: &mut B, resources: &mut ResourceArena, event: &Event) -> Result<()> {
		match event {
			Event::Global { name, interface, version } => {
				info!(target = "shmprobe.registry", interface = %interface, name, version, "global advertised");
				let Some(capability) = Capability::from_interface(interface) else {
					return Ok(());
				};
				if let Some(existing) = self.bound.get(&capability) {
					debug!(target = "shmprobe.registry", %capability, name, bound_name = existing.name, "duplicate advertisement ignored");
					return Ok(());
				}
				if *version < capability.version() {
					warn!(
						target = "shmprobe.registry",
						%capability,
						advertised = version,
						required = capability.version(),
						"advertised version too old; not binding"
					);
					return Ok(());
				}
				self.bind(backend, resources, capability, *name)
			}
			Event::GlobalRemove { name } => {
				match self.bound.iter().find(|(_, bound)| bound.name == *name) {
					Some((capability, _)) => warn!(target = "shmprobe.registry", %capability, name, "bound capability withdrawn by server"),
					None => debug!(target = "shmprobe.registry", name, "global removed"),
				}
				Ok(())
			}
			other => {
				debug!(target = "shmprobe.registry", event = ?other, "unexpected registry event");
				Ok(())
			}
		}
	}

	fn bind<B: DisplayBackend>(&mut self, backend: &mut B, resources: &mut ResourceArena, capability: Capability, name: u32) -> Result<()> {
		let kind = capability.object_kind();
		let id = create(
			backend,
			Request::Bind {
				registry: self.registry,
				name,
				capability,
				version: capability.version(),
			},
			kind,
		)?;
		resources.track(id, kind);
		self.bound.insert(capability, Bound { name, id });
		info!(target = "shmprobe.registry", %capability, %id, version = capability.version(), "bound");
		Ok(())
	}

	/// Required capabilities not bound yet, in [`Capability::ALL`] order.
	pub fn missing(&self) -> Vec<Capability> {
		Capability::ALL.into_iter().filter(|cap| !self.bound.contains_key(cap)).collect()
	}

	/// The complete capability set, or the discovery failure naming what is absent.
	pub fn capability_set(&self) -> Result<CapabilitySet> {
		let id = |cap: Capability| self.bound.get(&cap).map(|b| b.id);
		match (id(Capability::Compositor), id(Capability::Shm), id(Capability::ShellBase)) {
			(Some(compositor), Some(shm), Some(shell_base)) => Ok(CapabilitySet { compositor, shm, shell_base }),
			_ => Err(Error::Discovery { missing: self.missing() }),
		}
	}
}

/// Creates the registry, round-trips once and binds the required capabilities.
///
/// Everything bound is tracked in `resources`, so a failed discovery is
/// cleaned up by the session teardown like any other failure.
pub fn discover<B: DisplayBackend>(backend: &mut B, resources: &mut ResourceArena) -> Result<(CapabilityRegistry, CapabilitySet)> {
	let id = create(backend, Request::GetRegistry, ObjectKind::Registry)?;
	resources.track(id, ObjectKind::Registry);
	let mut registry = CapabilityRegistry::new(id);

	let events = backend.roundtrip().map_err(Error::Dispatch)?;
	for event in events {
		if event.source == id {
			registry.handle_event(backend, resources, &event.event)?;
		} else {
			debug!(target = "shmprobe.registry", source = %event.source, event = ?event.event, "event during discovery dropped");
		}
	}

	let set = registry.capability_set()?;
	info!(target = "shmprobe.registry", "all required capabilities bound");
	Ok((registry, set))
}
