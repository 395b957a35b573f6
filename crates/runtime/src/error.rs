use shmprobe_protocol::{ObjectId, ObjectKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a display backend.
#[derive(Debug, Error)]
pub enum Error {
	/// The display server endpoint could not be reached.
	#[error("cannot connect to display server: {0}")]
	Connect(String),

	/// The blocking receive (or a round-trip) failed at the transport level.
	#[error("dispatch failed: {0}")]
	Dispatch(String),

	/// A request named a handle this backend does not hold.
	#[error("unknown object {0}")]
	UnknownObject(ObjectId),

	/// A request named a handle of the wrong kind.
	#[error("object {id} is a {actual}, expected {expected}")]
	WrongKind {
		id: ObjectId,
		expected: ObjectKind,
		actual: ObjectKind,
	},
}

impl Error {
	/// Returns `true` for failures of the transport itself.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Connect(_) | Self::Dispatch(_))
	}
}
