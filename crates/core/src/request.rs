//! Thin wrappers turning backend replies into session errors.

use shmprobe_protocol::{ObjectId, ObjectKind, Request};
use shmprobe_runtime::DisplayBackend;

use crate::error::{Error, Result};

/// Sends a creation request and insists on a handle.
pub(crate) fn create<B: DisplayBackend>(backend: &mut B, request: Request<'_>, kind: ObjectKind) -> Result<ObjectId> {
	let op = request.op();
	backend
		.send(request)
		.map_err(|source| Error::Request { op, source })?
		.ok_or(Error::ProtocolObject(kind))
}

/// Sends a request that creates nothing.
pub(crate) fn send<B: DisplayBackend>(backend: &mut B, request: Request<'_>) -> Result<()> {
	let op = request.op();
	backend.send(request).map(|_| ()).map_err(|source| Error::Request { op, source })
}
