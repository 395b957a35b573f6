//! Wire nouns for the shmprobe display test client.
//!
//! This crate contains the plain data shared by the session logic and the
//! display backends: object handles, the required capabilities, the requests
//! the client issues and the typed events it receives.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond small lookups and accessors
//! * 1:1 with the protocol: one variant per request or event the client uses
//! * Backend-neutral: the production Wayland backend and the in-memory test
//!   backend both speak these types
//!
//! Session state and lifecycle live in `shmprobe`; wire encoding lives in the
//! backends of `shmprobe-runtime`.

pub mod capability;
pub mod event;
pub mod object;
pub mod request;

pub use capability::*;
pub use event::*;
pub use object::*;
pub use request::*;
