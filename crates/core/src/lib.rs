//! Session core of the shmprobe display-server test client.
//!
//! The client negotiates a session with a compositor, hands it one
//! shared-memory buffer and shows it in a toplevel window. Everything that can
//! fail lives here:
//!
//! - [`registry`]: capability discovery behind a synchronous round-trip
//! - [`buffer`] and [`memory`]: the shared-memory buffer and its rollback
//! - [`surface`]: the configure/acknowledge state machine
//! - [`dispatch`]: the blocking loop routing typed events to their owners
//! - [`resources`] and [`session`]: the handle arena and the single teardown
//!
//! The wire itself is behind [`shmprobe_runtime::DisplayBackend`].

pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod memory;
pub mod pattern;
pub mod registry;
pub mod resources;
pub mod session;
pub mod surface;

mod request;

pub use buffer::{BufferLayout, ShmBuffer};
pub use config::ClientConfig;
pub use dispatch::DispatchLoop;
pub use error::{AllocationStep, Error, Result};
pub use memory::{BackingStore, MappedRegion, PosixShm};
pub use registry::{CapabilityRegistry, CapabilitySet};
pub use resources::{ReleasedResource, ResourceArena, TeardownReport};
pub use session::{Session, run_session};
pub use surface::{ConfigureOutcome, SurfaceConfigurator, SurfaceState};
