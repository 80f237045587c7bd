use thiserror::Error;

/// Errors raised while talking to the cluster or shaping the debug pod
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load kubeconfig")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("failed to infer cluster credentials")]
    Credentials(#[from] kube::config::InferConfigError),

    #[error("deployment '{name}' not found in namespace '{namespace}'")]
    NotFound { name: String, namespace: String },

    #[error("deployment '{0}' has no pod template")]
    MissingTemplate(String),

    #[error("pod template of deployment '{name}' could not be decoded")]
    InvalidTemplate {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
