//! Interactive shell sessions for kubedebug
//!
//! The terminal side is left to `kubectl exec`; this crate only builds the
//! command line and waits for the process to exit.

mod session;

pub use session::{ExecSession, RunningSession};
