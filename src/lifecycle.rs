//! What happens to the debug pod once it exists: wait, attach, clean up

use anyhow::{Context, Result};
use kubedebug_k8s::{KubeClient, PodStatusSource, Readiness, ReadinessPoller};
use kubedebug_shell::ExecSession;

/// Removes the debug pod once the session is over
#[allow(async_fn_in_trait)]
pub trait PodCleanup {
    async fn remove_pod(&self, name: &str) -> kubedebug_k8s::Result<()>;
}

impl PodCleanup for KubeClient {
    async fn remove_pod(&self, name: &str) -> kubedebug_k8s::Result<()> {
        self.delete_pod(name).await
    }
}

/// An interactive session that takes over the terminal until it ends
#[allow(async_fn_in_trait)]
pub trait ShellAttach {
    /// Resolves when the session ends, `true` if it exited cleanly
    async fn attach(&self) -> Result<bool>;
}

impl ShellAttach for ExecSession {
    async fn attach(&self) -> Result<bool> {
        Ok(self.run().await?.success())
    }
}

/// Flags that steer the post-create flow
#[derive(Clone, Copy, Debug, Default)]
pub struct Flow {
    pub detach: bool,
    pub retain: bool,
    pub quiet: bool,
}

impl Flow {
    fn say(&self, message: String) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

/// How the run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Detached,
    /// Pod never became ready and was left running
    NotReady { attempts: u32 },
    Retained,
    Deleted,
    /// Session ended but the delete call failed
    DeleteFailed,
}

/// Wait for the pod, attach a shell and clean up afterwards.
///
/// The shell is only attached after a confirmed Ready condition. A pod that
/// never gets there is neither attached to nor deleted.
pub async fn after_create<C, S>(
    cluster: &C,
    shell: &S,
    poller: ReadinessPoller,
    pod_name: &str,
    flow: Flow,
) -> Result<Outcome>
where
    C: PodStatusSource + PodCleanup,
    S: ShellAttach,
{
    if flow.detach {
        return Ok(Outcome::Detached);
    }

    let readiness = poller
        .wait(cluster, pod_name)
        .await
        .context(format!("Failed to check status of pod '{}'", pod_name))?;

    if let Readiness::Exhausted { attempts } = readiness {
        flow.say(format!(
            "{} did not become ready after {} checks, leaving it running.",
            pod_name, attempts
        ));
        return Ok(Outcome::NotReady { attempts });
    }
    flow.say(format!("{} is ready.", pod_name));

    match shell.attach().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(pod = %pod_name, "shell exited with failure"),
        Err(e) => eprintln!("Error: {:#}", e),
    }

    if flow.retain {
        flow.say(format!("{} pod is retained.", pod_name));
        return Ok(Outcome::Retained);
    }

    match cluster.remove_pod(pod_name).await {
        Ok(()) => {
            flow.say(format!("{} pod has been deleted.", pod_name));
            Ok(Outcome::Deleted)
        }
        Err(e) => {
            tracing::error!(pod = %pod_name, error = %e, "failed to delete pod");
            eprintln!("Error: failed to delete pod '{}': {:#}", pod_name, e);
            Ok(Outcome::DeleteFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodCondition;
    use kubedebug_k8s::{Backoff, Error};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Cluster stand-in that counts status reads and deletes
    #[derive(Default)]
    struct FakeCluster {
        ready: bool,
        delete_fails: bool,
        status_reads: AtomicU32,
        deletes: AtomicU32,
    }

    impl FakeCluster {
        fn ready() -> Self {
            Self {
                ready: true,
                ..Default::default()
            }
        }

        fn status_reads(&self) -> u32 {
            self.status_reads.load(Ordering::SeqCst)
        }

        fn deletes(&self) -> u32 {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    impl PodStatusSource for FakeCluster {
        async fn pod_conditions(&self, _name: &str) -> kubedebug_k8s::Result<Option<Vec<PodCondition>>> {
            self.status_reads.fetch_add(1, Ordering::SeqCst);
            let status = if self.ready { "True" } else { "False" };
            Ok(Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: status.to_string(),
                ..Default::default()
            }]))
        }
    }

    impl PodCleanup for FakeCluster {
        async fn remove_pod(&self, name: &str) -> kubedebug_k8s::Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.delete_fails {
                return Err(Error::NotFound {
                    name: name.to_string(),
                    namespace: "default".to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeShell {
        fails_to_start: bool,
        attaches: AtomicU32,
    }

    impl FakeShell {
        fn attaches(&self) -> u32 {
            self.attaches.load(Ordering::SeqCst)
        }
    }

    impl ShellAttach for FakeShell {
        async fn attach(&self) -> Result<bool> {
            self.attaches.fetch_add(1, Ordering::SeqCst);
            if self.fails_to_start {
                anyhow::bail!("Failed to start 'kubectl'");
            }
            Ok(true)
        }
    }

    fn poller(retries: u32) -> ReadinessPoller {
        ReadinessPoller::new(retries).with_backoff(Backoff::none())
    }

    fn quiet() -> Flow {
        Flow {
            quiet: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_never_ready_skips_attach_and_cleanup() {
        let cluster = FakeCluster::default();
        let shell = FakeShell::default();

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", quiet())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::NotReady { attempts: 3 });
        assert_eq!(cluster.status_reads(), 3);
        assert_eq!(shell.attaches(), 0);
        assert_eq!(cluster.deletes(), 0);
    }

    #[tokio::test]
    async fn test_detach_skips_polling() {
        let cluster = FakeCluster::ready();
        let shell = FakeShell::default();
        let flow = Flow {
            detach: true,
            ..quiet()
        };

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", flow)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Detached);
        assert_eq!(cluster.status_reads(), 0);
        assert_eq!(shell.attaches(), 0);
        assert_eq!(cluster.deletes(), 0);
    }

    #[tokio::test]
    async fn test_retain_keeps_pod_after_session() {
        let cluster = FakeCluster::ready();
        let shell = FakeShell::default();
        let flow = Flow {
            retain: true,
            ..quiet()
        };

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", flow)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Retained);
        assert_eq!(shell.attaches(), 1);
        assert_eq!(cluster.deletes(), 0);
    }

    #[tokio::test]
    async fn test_ready_pod_is_attached_then_deleted() {
        let cluster = FakeCluster::ready();
        let shell = FakeShell::default();

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", quiet())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        assert_eq!(cluster.status_reads(), 1);
        assert_eq!(shell.attaches(), 1);
        assert_eq!(cluster.deletes(), 1);
    }

    #[tokio::test]
    async fn test_failed_session_still_cleans_up() {
        let cluster = FakeCluster::ready();
        let shell = FakeShell {
            fails_to_start: true,
            ..Default::default()
        };

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", quiet())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        assert_eq!(cluster.deletes(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported_not_raised() {
        let cluster = FakeCluster {
            ready: true,
            delete_fails: true,
            ..Default::default()
        };
        let shell = FakeShell::default();

        let outcome = after_create(&cluster, &shell, poller(3), "web-alice", quiet())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::DeleteFailed);
        assert_eq!(cluster.deletes(), 1);
    }
}
