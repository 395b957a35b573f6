use std::fmt;

use shmprobe_protocol::{Capability, ObjectKind, RequestOp};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which step of the shared-memory allocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStep {
	/// Creating the named-then-unlinked backing store.
	Create,
	/// Resizing the backing store.
	Resize,
	/// Mapping the backing store into the address space.
	Map,
}

impl fmt::Display for AllocationStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Create => "backing store creation",
			Self::Resize => "backing store resize",
			Self::Map => "mapping",
		})
	}
}

/// Every failure of the test client. All of them are fatal.
#[derive(Debug, Error)]
pub enum Error {
	/// The display server could not be reached.
	#[error("cannot connect to display server: {0}")]
	Connection(#[source] shmprobe_runtime::Error),

	/// Required capabilities were still absent after the discovery round-trip.
	#[error("missing required capabilities: {}", join_capabilities(.missing))]
	Discovery { missing: Vec<Capability> },

	/// Buffer geometry that cannot be represented on the wire.
	#[error("invalid buffer dimensions {width}x{height}")]
	InvalidDimensions { width: u32, height: u32 },

	/// Backing-store creation, resizing or mapping failed.
	#[error("shared memory {step} failed: {source}")]
	Allocation {
		step: AllocationStep,
		#[source]
		source: std::io::Error,
	},

	/// A request to create a dependent object returned no handle.
	#[error("server returned no handle for {0}")]
	ProtocolObject(ObjectKind),

	/// The blocking receive (or the discovery round-trip) failed.
	#[error("display dispatch failed: {0}")]
	Dispatch(#[source] shmprobe_runtime::Error),

	/// A non-creating request was rejected by the backend.
	#[error("{op:?} request failed: {source}")]
	Request {
		op: RequestOp,
		#[source]
		source: shmprobe_runtime::Error,
	},
}

fn join_capabilities(missing: &[Capability]) -> String {
	missing.iter().map(|cap| cap.interface()).collect::<Vec<_>>().join(", ")
}

impl Error {
	pub(crate) fn allocation(step: AllocationStep) -> impl FnOnce(std::io::Error) -> Self {
		move |source| Self::Allocation { step, source }
	}
}
