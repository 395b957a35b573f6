//! Arena of everything the session acquires, released in dependency order.
//!
//! Every protocol object and the mapped memory region are tracked here as
//! they are acquired. Nothing is released ad hoc: [`ResourceArena::rollback`]
//! undoes a failed step in reverse acquisition order and
//! [`ResourceArena::release_all`] tears the session down by release rank.
//! A slot is emptied when released, so no resource can be released twice.

use std::cmp::Reverse;

use shmprobe_protocol::{ObjectId, ObjectKind, Request};
use shmprobe_runtime::DisplayBackend;
use tracing::{debug, warn};

use crate::memory::MappedRegion;

/// Something the session owns and must give back.
#[derive(Debug)]
pub enum Resource {
	Object { id: ObjectId, kind: ObjectKind },
	Mapping(MappedRegion),
}

impl Resource {
	/// Position in teardown order; lower ranks are released first.
	///
	/// The mapping sits after the buffer and pool that reference it, and
	/// the shell objects are released child-first.
	pub fn release_rank(&self) -> u8 {
		match self {
			Self::Object { kind, .. } => match kind {
				ObjectKind::Buffer => 0,
				ObjectKind::Pool => 1,
				ObjectKind::Toplevel => 3,
				ObjectKind::ShellSurface => 4,
				ObjectKind::Surface => 5,
				ObjectKind::ShellBase => 6,
				ObjectKind::Compositor => 7,
				ObjectKind::Shm => 8,
				ObjectKind::Registry => 9,
			},
			Self::Mapping(_) => 2,
		}
	}
}

/// What a release step gave back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleasedResource {
	Object { id: ObjectId, kind: ObjectKind },
	Mapping { len: usize },
}

/// Index of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(usize);

/// Arena length at some point in time, for [`ResourceArena::rollback`].
#[derive(Debug, Clone, Copy)]
pub struct Mark(usize);

/// Outcome of the session teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
	/// Released resources, in release order.
	pub released: Vec<ReleasedResource>,
	/// Releases the backend or the kernel refused.
	pub failures: usize,
}

#[derive(Debug, Default)]
pub struct ResourceArena {
	slots: Vec<Option<Resource>>,
}

impl ResourceArena {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, resource: Resource) -> Slot {
		self.slots.push(Some(resource));
		Slot(self.slots.len() - 1)
	}

	/// Tracks a protocol object.
	pub fn track(&mut self, id: ObjectId, kind: ObjectKind) -> Slot {
		self.insert(Resource::Object { id, kind })
	}

	pub fn mark(&self) -> Mark {
		Mark(self.slots.len())
	}

	/// Kind of a tracked, unreleased object.
	pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
		self.slots.iter().flatten().find_map(|resource| match resource {
			Resource::Object { id: tracked, kind } if *tracked == id => Some(*kind),
			_ => None,
		})
	}

	/// The mapped region in `slot`, while it is still held.
	pub fn mapping(&self, slot: Slot) -> Option<&MappedRegion> {
		match self.slots.get(slot.0)? {
			Some(Resource::Mapping(region)) => Some(region),
			_ => None,
		}
	}

	/// Number of resources still held.
	pub fn live(&self) -> usize {
		self.slots.iter().flatten().count()
	}

	/// Releases everything acquired since `mark`, newest first.
	pub fn rollback<B: DisplayBackend>(&mut self, mark: Mark, backend: &mut B) -> TeardownReport {
		let mut report = TeardownReport::default();
		for index in (mark.0..self.slots.len()).rev() {
			if let Some(resource) = self.slots[index].take() {
				release(resource, backend, &mut report);
			}
		}
		self.slots.truncate(mark.0);
		report
	}

	/// Releases everything still held, by release rank.
	pub fn release_all<B: DisplayBackend>(&mut self, backend: &mut B) -> TeardownReport {
		let mut order: Vec<(u8, Reverse<usize>)> = self
			.slots
			.iter()
			.enumerate()
			.filter_map(|(index, slot)| slot.as_ref().map(|r| (r.release_rank(), Reverse(index))))
			.collect();
		order.sort();

		let mut report = TeardownReport::default();
		for (_, Reverse(index)) in order {
			if let Some(resource) = self.slots[index].take() {
				release(resource, backend, &mut report);
			}
		}
		report
	}
}

fn release<B: DisplayBackend>(resource: Resource, backend: &mut B, report: &mut TeardownReport) {
	match resource {
		Resource::Object { id, kind } => {
			debug!(target = "shmprobe.teardown", %id, %kind, "releasing object");
			if let Err(e) = backend.send(Request::Destroy { object: id }) {
				warn!(target = "shmprobe.teardown", %id, %kind, error = %e, "release failed");
				report.failures += 1;
			}
			report.released.push(ReleasedResource::Object { id, kind });
		}
		Resource::Mapping(region) => {
			let len = region.len();
			debug!(target = "shmprobe.teardown", len, "unmapping shared memory");
			if let Err(e) = region.unmap() {
				warn!(target = "shmprobe.teardown", len, error = %e, "munmap failed");
				report.failures += 1;
			}
			report.released.push(ReleasedResource::Mapping { len });
		}
	}
}
