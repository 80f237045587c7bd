//! Shared types for kubedebug
//!
//! This crate contains the plain data passed between the CLI, the Kubernetes
//! client and the shell session.

use std::time::Duration;

/// Command that keeps a debug container alive without running the workload
pub const IDLE_COMMAND: [&str; 2] = ["sleep", "99999"];

/// Label that Services usually select on
pub const APP_LABEL: &str = "app";

/// Default number of readiness polls
pub const DEFAULT_POLL_RETRIES: u32 = 20;

// ============================================================================
// Template Options
// ============================================================================

/// What the main container runs instead of its real entrypoint
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntrypointMode {
    /// Sleep forever so the user can start things by hand
    #[default]
    Idle,
    /// Keep re-running the original entrypoint whenever it exits
    Restartable,
}

impl EntrypointMode {
    pub fn from_restartable(restartable: bool) -> Self {
        if restartable {
            Self::Restartable
        } else {
            Self::Idle
        }
    }
}

/// Inputs to the pod template mutation pipeline
#[derive(Clone, Debug)]
pub struct TemplateOptions {
    /// Name of the source deployment (also the name of its main container)
    pub deployment: String,
    /// Local username used to qualify the pod name
    pub username: String,
    /// Keep the `app` label so Services route traffic to the debug pod
    pub take_traffic: bool,
    pub entrypoint: EntrypointMode,
    /// Replacement tag for every tagged container image
    pub image_tag: Option<String>,
}

impl TemplateOptions {
    pub fn new(deployment: String, username: String) -> Self {
        Self {
            deployment,
            username,
            take_traffic: false,
            entrypoint: EntrypointMode::Idle,
            image_tag: None,
        }
    }

    /// Name of the debug pod: `<deployment>-<username>`
    pub fn pod_name(&self) -> String {
        debug_pod_name(&self.deployment, &self.username)
    }
}

/// Join a deployment name and a username label into a pod name
pub fn debug_pod_name(deployment: &str, username: &str) -> String {
    format!("{}-{}", deployment, username)
}

/// Turn a local username into something usable inside a pod name.
///
/// Usernames that are already valid DNS-1123 labels pass through unchanged.
/// Anything else is lowercased and every other invalid character becomes `-`.
/// Returns `None` when nothing usable is left.
pub fn username_label(username: &str) -> Option<String> {
    let label: String = username
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect();
    let label = label.trim_matches('-');

    (!label.is_empty()).then(|| label.to_string())
}

// ============================================================================
// Readiness Polling
// ============================================================================

/// Two-tier delay between readiness polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Delay while many retries remain
    pub coarse: Duration,
    /// Delay once the budget runs low
    pub fine: Duration,
    /// Remaining retries at or below which `fine` is used
    pub fine_below: u32,
}

impl Backoff {
    /// No delay at all, for tests and scripted runs
    pub fn none() -> Self {
        Self {
            coarse: Duration::ZERO,
            fine: Duration::ZERO,
            fine_below: 0,
        }
    }

    /// Delay to wait before the next poll given the retries still left
    pub fn delay(&self, remaining: u32) -> Duration {
        if remaining > self.fine_below {
            self.coarse
        } else {
            self.fine
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            coarse: Duration::from_millis(2500),
            fine: Duration::from_millis(1000),
            fine_below: 10,
        }
    }
}

/// Outcome of waiting for a pod to become ready
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Budget ran out without a Ready condition
    Exhausted { attempts: u32 },
}
