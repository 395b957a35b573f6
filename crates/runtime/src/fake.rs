//! In-memory display backend for unit testing the session without a compositor.
//!
//! The fake hands out handles, records every request, counts object lifetimes
//! per kind, advertises globals on the first round-trip and replays scripted
//! event batches, one batch per [`DisplayBackend::blocking_dispatch`].
//!
//! # Example
//!
//! ```ignore
//! let (display, controller) = FakeDisplayBuilder::new().standard_globals().build();
//! controller.queue(ObjectKind::ShellSurface, Event::Configure { serial: 7 });
//! controller.queue(ObjectKind::Toplevel, Event::Close);
//!
//! let outcome = shmprobe::run_session(display, PosixShm, ClientConfig::default())?;
//! assert!(controller.live_objects().is_empty());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use shmprobe_protocol::{Capability, ClientEvent, Event, ObjectId, ObjectKind, Request, RequestOp};

use crate::backend::DisplayBackend;
use crate::error::{Error, Result};

/// A request as captured by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
	pub op: RequestOp,
	pub target: Option<ObjectId>,
	pub serial: Option<u32>,
	/// Handle handed back for creation requests.
	pub created: Option<ObjectId>,
}

/// An event waiting to be delivered.
///
/// Scripted events name the kind of their source; the fake resolves it to the
/// most recently created live object of that kind at delivery time.
#[derive(Debug, Clone)]
enum Scripted {
	From(ObjectKind, Event),
	Raw(ClientEvent),
}

struct Global {
	name: u32,
	interface: String,
	version: u32,
}

#[derive(Default)]
struct FakeState {
	next_id: u32,
	live: BTreeMap<ObjectId, ObjectKind>,
	created: Vec<(ObjectId, ObjectKind)>,
	destroyed: Vec<(ObjectId, ObjectKind)>,
	sent: Vec<SentRequest>,
	globals: Vec<Global>,
	announced: bool,
	script: VecDeque<Vec<Scripted>>,
	fail_create: Vec<ObjectKind>,
	fail_next_dispatch: bool,
	disconnected: bool,
}

impl FakeState {
	fn latest_live(&self, kind: ObjectKind) -> Option<ObjectId> {
		self.live.iter().rev().find(|(_, k)| **k == kind).map(|(id, _)| *id)
	}

	fn resolve(&self, scripted: Scripted) -> Result<ClientEvent> {
		match scripted {
			Scripted::Raw(event) => Ok(event),
			Scripted::From(kind, event) => {
				let source = self
					.latest_live(kind)
					.ok_or_else(|| Error::Dispatch(format!("no live {kind} to deliver {event:?}")))?;
				Ok(ClientEvent::new(source, event))
			}
		}
	}
}

/// Builder for creating fake display instances.
pub struct FakeDisplayBuilder {
	globals: Vec<Global>,
	fail_create: Vec<ObjectKind>,
}

impl FakeDisplayBuilder {
	pub fn new() -> Self {
		Self {
			globals: Vec::new(),
			fail_create: Vec::new(),
		}
	}

	/// Advertises a global; names are assigned in insertion order starting at 1.
	pub fn global(mut self, interface: &str, version: u32) -> Self {
		let name = self.globals.len() as u32 + 1;
		self.globals.push(Global {
			name,
			interface: interface.to_string(),
			version,
		});
		self
	}

	/// Advertises the three required capabilities at their bind versions.
	pub fn standard_globals(self) -> Self {
		Capability::ALL.into_iter().fold(self, |b, cap| b.global(cap.interface(), cap.version()))
	}

	/// Makes every creation request for `kind` return no handle.
	pub fn fail_create(mut self, kind: ObjectKind) -> Self {
		self.fail_create.push(kind);
		self
	}

	/// Build the fake display and return both the backend and a controller.
	pub fn build(self) -> (FakeDisplay, FakeDisplayController) {
		let state = Arc::new(Mutex::new(FakeState {
			next_id: 1,
			globals: self.globals,
			fail_create: self.fail_create,
			..FakeState::default()
		}));
		let display = FakeDisplay { state: Arc::clone(&state) };
		(display, FakeDisplayController { state })
	}
}

impl Default for FakeDisplayBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Controller for scripting events and inspecting what the client did.
#[derive(Clone)]
pub struct FakeDisplayController {
	state: Arc<Mutex<FakeState>>,
}

impl FakeDisplayController {
	/// Queues a single event as its own dispatch batch.
	pub fn queue(&self, source: ObjectKind, event: Event) {
		self.queue_batch(vec![(source, event)]);
	}

	/// Queues several events delivered together by one dispatch.
	pub fn queue_batch(&self, events: Vec<(ObjectKind, Event)>) {
		let batch = events.into_iter().map(|(kind, event)| Scripted::From(kind, event)).collect();
		self.state.lock().script.push_back(batch);
	}

	/// Queues an event with an explicit source handle.
	pub fn queue_raw(&self, event: ClientEvent) {
		self.state.lock().script.push_back(vec![Scripted::Raw(event)]);
	}

	/// Makes the next dispatch fail at the transport level.
	pub fn fail_next_dispatch(&self) {
		self.state.lock().fail_next_dispatch = true;
	}

	/// All requests sent so far.
	pub fn sent(&self) -> Vec<SentRequest> {
		self.state.lock().sent.clone()
	}

	/// Take all sent requests, clearing the buffer.
	pub fn take_sent(&self) -> Vec<SentRequest> {
		std::mem::take(&mut self.state.lock().sent)
	}

	/// Sent requests with the given name, in order.
	pub fn sent_ops(&self, op: RequestOp) -> Vec<SentRequest> {
		self.state.lock().sent.iter().filter(|r| r.op == op).cloned().collect()
	}

	/// Objects created and not yet released.
	pub fn live_objects(&self) -> Vec<(ObjectId, ObjectKind)> {
		self.state.lock().live.iter().map(|(id, kind)| (*id, *kind)).collect()
	}

	/// Every object ever created, in creation order.
	pub fn created(&self) -> Vec<(ObjectId, ObjectKind)> {
		self.state.lock().created.clone()
	}

	/// Every object released, in release order.
	pub fn destroyed(&self) -> Vec<(ObjectId, ObjectKind)> {
		self.state.lock().destroyed.clone()
	}

	/// Most recently created object of `kind` that is still live.
	pub fn live_of(&self, kind: ObjectKind) -> Option<ObjectId> {
		self.state.lock().latest_live(kind)
	}

	pub fn is_disconnected(&self) -> bool {
		self.state.lock().disconnected
	}
}

/// Backend half of the fake; hand this to the session.
pub struct FakeDisplay {
	state: Arc<Mutex<FakeState>>,
}

impl DisplayBackend for FakeDisplay {
	fn send(&mut self, request: Request<'_>) -> Result<Option<ObjectId>> {
		let mut state = self.state.lock();
		if state.disconnected {
			return Err(Error::Dispatch("connection closed".to_string()));
		}
		if let Some(target) = request.target() {
			if !state.live.contains_key(&target) {
				return Err(Error::UnknownObject(target));
			}
		}

		let mut created = None;
		if let Some(kind) = request.creates() {
			if !state.fail_create.contains(&kind) {
				let id = ObjectId::new(state.next_id);
				state.next_id += 1;
				state.live.insert(id, kind);
				state.created.push((id, kind));
				created = Some(id);
			}
		}
		if let Request::Destroy { object } = request {
			if let Some(kind) = state.live.remove(&object) {
				state.destroyed.push((object, kind));
			}
		}

		state.sent.push(SentRequest {
			op: request.op(),
			target: request.target(),
			serial: request.serial(),
			created,
		});
		Ok(created)
	}

	fn roundtrip(&mut self) -> Result<Vec<ClientEvent>> {
		let mut state = self.state.lock();
		if state.disconnected {
			return Err(Error::Dispatch("connection closed".to_string()));
		}
		if state.announced {
			return Ok(Vec::new());
		}
		let Some(registry) = state.latest_live(ObjectKind::Registry) else {
			return Ok(Vec::new());
		};
		state.announced = true;
		Ok(state
			.globals
			.iter()
			.map(|g| {
				ClientEvent::new(
					registry,
					Event::Global {
						name: g.name,
						interface: g.interface.clone(),
						version: g.version,
					},
				)
			})
			.collect())
	}

	fn blocking_dispatch(&mut self) -> Result<Vec<ClientEvent>> {
		let mut state = self.state.lock();
		if state.disconnected {
			return Err(Error::Dispatch("connection closed".to_string()));
		}
		if std::mem::take(&mut state.fail_next_dispatch) {
			return Err(Error::Dispatch("injected transport failure".to_string()));
		}
		let batch = state
			.script
			.pop_front()
			.ok_or_else(|| Error::Dispatch("connection reset by peer".to_string()))?;
		batch.into_iter().map(|scripted| state.resolve(scripted)).collect()
	}

	fn disconnect(&mut self) {
		let mut state = self.state.lock();
		state.disconnected = true;
		// proxies without destructors vanish with the connection
		let remaining: Vec<_> = state.live.iter().map(|(id, kind)| (*id, *kind)).collect();
		for (id, kind) in remaining {
			if !kind.has_destructor() {
				state.live.remove(&id);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fake_display_send_capture() {
		let (mut display, controller) = FakeDisplayBuilder::new().build();

		let registry = display.send(Request::GetRegistry).unwrap().unwrap();
		assert_eq!(registry, ObjectId::new(1));

		let sent = controller.take_sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].op, RequestOp::GetRegistry);
		assert_eq!(sent[0].created, Some(registry));
		assert!(controller.take_sent().is_empty());
	}

	#[test]
	fn test_fake_display_announces_globals_once() {
		let (mut display, _controller) = FakeDisplayBuilder::new().standard_globals().global("wl_seat", 7).build();

		assert!(display.roundtrip().unwrap().is_empty(), "no registry yet");
		let registry = display.send(Request::GetRegistry).unwrap().unwrap();

		let events = display.roundtrip().unwrap();
		assert_eq!(events.len(), 4);
		assert!(events.iter().all(|e| e.source == registry));
		assert_eq!(
			events[3].event,
			Event::Global {
				name: 4,
				interface: "wl_seat".to_string(),
				version: 7
			}
		);
		assert!(display.roundtrip().unwrap().is_empty());
	}

	#[test]
	fn test_fake_display_fail_create_returns_no_handle() {
		let (mut display, controller) = FakeDisplayBuilder::new().fail_create(ObjectKind::Registry).build();

		assert_eq!(display.send(Request::GetRegistry).unwrap(), None);
		assert!(controller.created().is_empty());
		assert_eq!(controller.sent().len(), 1);
	}

	#[test]
	fn test_fake_display_rejects_double_release() {
		let (mut display, controller) = FakeDisplayBuilder::new().build();
		let registry = display.send(Request::GetRegistry).unwrap().unwrap();

		display.send(Request::Destroy { object: registry }).unwrap();
		let err = display.send(Request::Destroy { object: registry }).unwrap_err();

		assert!(matches!(err, Error::UnknownObject(id) if id == registry));
		assert_eq!(controller.destroyed(), vec![(registry, ObjectKind::Registry)]);
		assert!(controller.live_objects().is_empty());
	}

	#[test]
	fn test_fake_display_scripted_batches_resolve_sources() {
		let (mut display, controller) = FakeDisplayBuilder::new().build();
		let registry = display.send(Request::GetRegistry).unwrap().unwrap();

		controller.queue_batch(vec![
			(ObjectKind::Registry, Event::GlobalRemove { name: 1 }),
			(ObjectKind::Registry, Event::GlobalRemove { name: 2 }),
		]);
		controller.queue(ObjectKind::Toplevel, Event::Close);

		let first = display.blocking_dispatch().unwrap();
		assert_eq!(first.len(), 2);
		assert_eq!(first[0], ClientEvent::new(registry, Event::GlobalRemove { name: 1 }));

		let err = display.blocking_dispatch().unwrap_err();
		assert!(err.to_string().contains("xdg_toplevel"));

		let err = display.blocking_dispatch().unwrap_err();
		assert!(err.to_string().contains("reset"));
	}

	#[test]
	fn test_fake_display_injected_dispatch_failure() {
		let (mut display, controller) = FakeDisplayBuilder::new().build();
		display.send(Request::GetRegistry).unwrap();
		controller.queue(ObjectKind::Registry, Event::GlobalRemove { name: 9 });
		controller.fail_next_dispatch();

		assert!(display.blocking_dispatch().unwrap_err().is_transport());
		assert_eq!(display.blocking_dispatch().unwrap().len(), 1);
	}

	#[test]
	fn test_fake_display_disconnect_drops_proxy_only_objects() {
		let (mut display, controller) = FakeDisplayBuilder::new().standard_globals().build();
		let registry = display.send(Request::GetRegistry).unwrap().unwrap();
		let shm = display
			.send(Request::Bind {
				registry,
				name: 2,
				capability: Capability::Shm,
				version: 1,
			})
			.unwrap()
			.unwrap();
		let shell = display
			.send(Request::Bind {
				registry,
				name: 3,
				capability: Capability::ShellBase,
				version: 1,
			})
			.unwrap()
			.unwrap();

		display.disconnect();

		assert!(controller.is_disconnected());
		assert_eq!(controller.live_objects(), vec![(shell, ObjectKind::ShellBase)]);
		assert!(!controller.live_objects().iter().any(|(id, _)| *id == shm));
		assert!(display.blocking_dispatch().is_err());
	}
}
