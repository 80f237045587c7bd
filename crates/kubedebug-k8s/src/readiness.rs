//! Waiting for the debug pod to report Ready

use k8s_openapi::api::core::v1::PodCondition;
use kubedebug_types::{Backoff, Readiness};

use crate::error::Result;

/// Anything that can report the current conditions of a pod
#[allow(async_fn_in_trait)]
pub trait PodStatusSource {
    /// Current conditions of the pod, `None` while it has none (not scheduled yet)
    async fn pod_conditions(&self, name: &str) -> Result<Option<Vec<PodCondition>>>;
}

/// Check a condition list for `Ready=True`
pub(crate) fn is_ready(conditions: Option<&[PodCondition]>) -> bool {
    conditions
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == "Ready" && c.status == "True")
}

/// Bounded readiness poll with a two-tier delay
#[derive(Clone, Copy, Debug)]
pub struct ReadinessPoller {
    retries: u32,
    backoff: Backoff,
}

impl ReadinessPoller {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Poll `name` until it is Ready or the retry budget runs out.
    ///
    /// Fetches status exactly `retries` times when the pod never becomes
    /// ready. API errors end the poll immediately.
    pub async fn wait<S: PodStatusSource>(&self, source: &S, name: &str) -> Result<Readiness> {
        for attempt in 1..=self.retries {
            let conditions = source.pod_conditions(name).await?;

            if is_ready(conditions.as_deref()) {
                tracing::info!(pod = %name, attempt, "pod is ready");
                return Ok(Readiness::Ready);
            }

            let remaining = self.retries - attempt;
            tracing::debug!(pod = %name, attempt, remaining, "pod not ready yet");

            if remaining > 0 {
                tokio::time::sleep(self.backoff.delay(remaining)).await;
            }
        }

        Ok(Readiness::Exhausted {
            attempts: self.retries,
        })
    }
}
