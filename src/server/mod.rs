//! HTTP surface.
//!
//! Only the internal server lives here; generation requests arrive through
//! the library API or the CLI.

mod internal;

pub use internal::{run_internal_server, InternalState};
