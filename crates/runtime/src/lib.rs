//! Display connection backends for the shmprobe test client.
//!
//! [`DisplayBackend`] is the only seam between session logic and the wire.
//! [`WaylandBackend`] talks to a real compositor; [`fake::FakeDisplay`] is an
//! in-memory stand-in that records requests and replays scripted events.

pub mod backend;
pub mod error;
pub mod fake;
pub mod wayland;

pub use backend::DisplayBackend;
pub use error::{Error, Result};
pub use wayland::WaylandBackend;
