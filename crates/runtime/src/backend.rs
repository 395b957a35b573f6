//! The seam between session logic and the display wire.

use shmprobe_protocol::{ClientEvent, ObjectId, Request};

use crate::Result;

/// A connection to a display server, seen as requests out and typed events in.
///
/// Implementations are single-threaded and blocking. Events are returned in
/// the order the transport received them.
pub trait DisplayBackend {
	/// Sends one request.
	///
	/// Creation requests return the handle of the new object, or `Ok(None)`
	/// when the backend could not produce one. Other requests return
	/// `Ok(None)`.
	fn send(&mut self, request: Request<'_>) -> Result<Option<ObjectId>>;

	/// Blocks until the server has processed every request sent so far and
	/// returns the events that arrived in the meantime.
	fn roundtrip(&mut self) -> Result<Vec<ClientEvent>>;

	/// Blocks until at least one event is available and returns every
	/// pending event.
	fn blocking_dispatch(&mut self) -> Result<Vec<ClientEvent>>;

	/// Flushes outstanding requests and drops the connection.
	fn disconnect(&mut self);
}
