//! Kubernetes side of kubedebug
//!
//! This crate fetches a deployment's pod template, turns it into a debug pod,
//! submits it and waits for it to become ready.

mod client;
mod error;
mod readiness;
mod template;

pub use client::KubeClient;
pub use error::{Error, Result};
pub use readiness::{PodStatusSource, ReadinessPoller};
pub use template::{DebugPod, build_debug_pod};

// Re-export types that are used in our public API
pub use kubedebug_types::{Backoff, EntrypointMode, Readiness, TemplateOptions};
