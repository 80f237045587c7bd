use std::process::ExitStatus;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};

/// An interactive `kubectl exec` into one container of a pod
#[derive(Clone, Debug)]
pub struct ExecSession {
    kubectl: String,
    context: Option<String>,
    namespace: String,
    pod: String,
    container: Option<String>,
    shell: String,
}

impl ExecSession {
    pub fn new(pod: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            context: None,
            namespace: namespace.into(),
            pod: pod.into(),
            container: None,
            shell: "sh".to_string(),
        }
    }

    /// Path of the kubectl binary
    pub fn kubectl(mut self, kubectl: impl Into<String>) -> Self {
        self.kubectl = kubectl.into();
        self
    }

    pub fn context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Command started inside the container
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Arguments passed to kubectl
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args.extend([
            "exec".to_string(),
            "-it".to_string(),
            "-n".to_string(),
            self.namespace.clone(),
            self.pod.clone(),
        ]);
        if let Some(container) = &self.container {
            args.push("-c".to_string());
            args.push(container.clone());
        }
        args.push("--".to_string());
        args.push(self.shell.clone());
        args
    }

    /// Start kubectl with the caller's stdin, stdout and stderr
    pub fn spawn(&self) -> Result<RunningSession> {
        tracing::debug!(kubectl = %self.kubectl, args = ?self.args(), "starting exec session");

        let child = Command::new(&self.kubectl)
            .args(self.args())
            .spawn()
            .with_context(|| format!("Failed to start '{}'", self.kubectl))?;

        Ok(RunningSession {
            pod: self.pod.clone(),
            child,
        })
    }

    /// Start the session and wait for it to end
    pub async fn run(&self) -> Result<ExitStatus> {
        self.spawn()?.finished().await
    }
}

/// A live exec session owning the terminal
pub struct RunningSession {
    pod: String,
    child: Child,
}

impl RunningSession {
    /// Resolves once the kubectl process exits, for whatever reason
    pub async fn finished(mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for exec session on {}", self.pod))?;

        tracing::debug!(pod = %self.pod, %status, "exec session ended");
        Ok(status)
    }
}
