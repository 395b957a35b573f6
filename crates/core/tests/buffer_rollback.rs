// Rollback tests for shared-memory buffer allocation and session setup
//
// Every reachable failure point must release exactly what was acquired before
// it, newest first, without releasing anything twice.

use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};

use shmprobe::buffer::allocate;
use shmprobe::registry::discover;
use shmprobe::{AllocationStep, BackingStore, ClientConfig, Error, MappedRegion, PosixShm, ResourceArena, run_session};
use shmprobe_protocol::{ObjectKind, RequestOp};
use shmprobe_runtime::fake::{FakeDisplayBuilder, FakeDisplayController};

/// Real shared memory with one step forced to fail.
struct FlakyStore {
	fail_at: Option<AllocationStep>,
	inner: PosixShm,
	created: usize,
	mapped: usize,
}

impl FlakyStore {
	fn failing_at(step: AllocationStep) -> Self {
		Self {
			fail_at: Some(step),
			inner: PosixShm,
			created: 0,
			mapped: 0,
		}
	}

	fn check(&self, step: AllocationStep) -> io::Result<()> {
		if self.fail_at == Some(step) {
			return Err(io::Error::other(format!("injected {step} failure")));
		}
		Ok(())
	}
}

impl BackingStore for FlakyStore {
	fn create(&mut self, size: usize) -> io::Result<OwnedFd> {
		self.check(AllocationStep::Create)?;
		self.created += 1;
		self.inner.create(size)
	}

	fn resize(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<()> {
		self.check(AllocationStep::Resize)?;
		self.inner.resize(fd, size)
	}

	fn map(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<MappedRegion> {
		self.check(AllocationStep::Map)?;
		self.mapped += 1;
		self.inner.map(fd, size)
	}
}

fn assert_released_once(controller: &FakeDisplayController) {
	let destroyed = controller.destroyed();
	let mut ids: Vec<_> = destroyed.iter().map(|(id, _)| *id).collect();
	ids.sort();
	ids.dedup();
	assert_eq!(ids.len(), destroyed.len(), "double release: {destroyed:?}");
}

#[test]
fn test_store_failures_leave_nothing_behind() {
	for step in [AllocationStep::Create, AllocationStep::Resize, AllocationStep::Map] {
		let (mut display, controller) = FakeDisplayBuilder::new().standard_globals().build();
		let mut resources = ResourceArena::new();
		let (_, caps) = discover(&mut display, &mut resources).expect("Failed to discover");
		let live_before = resources.live();
		let mut store = FlakyStore::failing_at(step);

		let err = allocate(&mut display, &mut resources, &mut store, caps.shm, 32, 32).expect_err("allocation must fail");

		match err {
			Error::Allocation { step: failed, .. } => assert_eq!(failed, step),
			other => panic!("unexpected error: {other:?}"),
		}
		assert_eq!(resources.live(), live_before, "{step}: arena unchanged");
		assert!(controller.sent_ops(RequestOp::CreatePool).is_empty());
		assert!(controller.destroyed().is_empty());
	}
}

#[test]
fn test_pool_failure_unmaps_memory() {
	let (mut display, controller) = FakeDisplayBuilder::new().standard_globals().fail_create(ObjectKind::Pool).build();
	let mut resources = ResourceArena::new();
	let (_, caps) = discover(&mut display, &mut resources).expect("Failed to discover");
	let live_before = resources.live();
	let mut store = FlakyStore {
		fail_at: None,
		inner: PosixShm,
		created: 0,
		mapped: 0,
	};

	let err = allocate(&mut display, &mut resources, &mut store, caps.shm, 16, 8).expect_err("pool creation must fail");

	assert!(matches!(err, Error::ProtocolObject(ObjectKind::Pool)), "got {err:?}");
	assert_eq!(store.mapped, 1);
	assert_eq!(resources.live(), live_before);
	assert!(controller.destroyed().is_empty());
}

#[test]
fn test_buffer_failure_destroys_pool() {
	let (mut display, controller) = FakeDisplayBuilder::new().standard_globals().fail_create(ObjectKind::Buffer).build();
	let mut resources = ResourceArena::new();
	let (_, caps) = discover(&mut display, &mut resources).expect("Failed to discover");
	let live_before = resources.live();

	let err = allocate(&mut display, &mut resources, &mut PosixShm, caps.shm, 16, 8).expect_err("buffer creation must fail");

	assert!(matches!(err, Error::ProtocolObject(ObjectKind::Buffer)), "got {err:?}");
	assert_eq!(resources.live(), live_before);
	let kinds: Vec<_> = controller.destroyed().into_iter().map(|(_, kind)| kind).collect();
	assert_eq!(kinds, vec![ObjectKind::Pool]);
	assert_released_once(&controller);
}

#[test]
fn test_setup_failures_release_everything_acquired() {
	let cases = [
		(ObjectKind::Surface, vec![]),
		(ObjectKind::ShellSurface, vec![ObjectKind::Surface]),
		(ObjectKind::Toplevel, vec![ObjectKind::ShellSurface, ObjectKind::Surface]),
		(ObjectKind::Pool, vec![ObjectKind::Toplevel, ObjectKind::ShellSurface, ObjectKind::Surface]),
		(
			ObjectKind::Buffer,
			vec![ObjectKind::Pool, ObjectKind::Toplevel, ObjectKind::ShellSurface, ObjectKind::Surface],
		),
	];
	let bindings = [ObjectKind::ShellBase, ObjectKind::Compositor, ObjectKind::Shm, ObjectKind::Registry];

	for (failing, acquired) in cases {
		let (display, controller) = FakeDisplayBuilder::new().standard_globals().fail_create(failing).build();

		let err = run_session(display, &mut PosixShm, ClientConfig::default().with_size(16, 16)).expect_err("setup must fail");

		assert!(matches!(err, Error::ProtocolObject(kind) if kind == failing), "got {err:?}");
		let kinds: Vec<_> = controller.destroyed().into_iter().map(|(_, kind)| kind).collect();
		let expected: Vec<_> = acquired.iter().chain(bindings.iter()).copied().collect();
		assert_eq!(kinds, expected, "failure at {failing}");
		assert!(controller.live_objects().is_empty(), "failure at {failing}: leaked objects");
		assert_released_once(&controller);
		assert!(controller.sent_ops(RequestOp::Commit).is_empty());
	}
}

#[test]
fn test_store_failure_during_setup_is_reported() {
	let (display, controller) = FakeDisplayBuilder::new().standard_globals().build();
	let mut store = FlakyStore::failing_at(AllocationStep::Map);

	let err = run_session(display, &mut store, ClientConfig::default()).expect_err("setup must fail");

	assert!(err.to_string().contains("mapping"), "{err}");
	assert_eq!(store.created, 1);
	assert_eq!(store.mapped, 0);
	assert!(controller.live_objects().is_empty());
	assert_released_once(&controller);
}

#[test]
fn test_invalid_dimensions_are_rejected_before_allocating() {
	let (mut display, controller) = FakeDisplayBuilder::new().standard_globals().build();
	let mut resources = ResourceArena::new();
	let (_, caps) = discover(&mut display, &mut resources).expect("Failed to discover");
	let mut store = FlakyStore {
		fail_at: None,
		inner: PosixShm,
		created: 0,
		mapped: 0,
	};

	let err = allocate(&mut display, &mut resources, &mut store, caps.shm, 0, 600).expect_err("zero width must fail");

	assert!(matches!(err, Error::InvalidDimensions { width: 0, height: 600 }), "got {err:?}");
	assert_eq!(store.created, 0);
	assert!(controller.sent_ops(RequestOp::CreatePool).is_empty());
}
