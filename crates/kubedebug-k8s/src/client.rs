//! Kubernetes client for kubedebug

use k8s_openapi::api::core::v1::{Pod, PodCondition, PodTemplateSpec};
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, GroupVersionKind, PostParams, ResourceExt as _,
};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};

use crate::error::{Error, Result};
use crate::readiness::PodStatusSource;
use crate::template;

/// Kubernetes client bound to one namespace
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    namespace: String,
    context: Option<String>,
}

impl KubeClient {
    /// Connect using ambient credentials.
    ///
    /// With a context name the kubeconfig is used directly, otherwise the
    /// config is inferred (kubeconfig current context, then in-cluster). The
    /// namespace falls back to the context's namespace and then `default`.
    pub async fn connect(context: Option<&str>, namespace: Option<&str>) -> Result<Self> {
        let config = match context {
            Some(name) => {
                Config::from_kubeconfig(&KubeConfigOptions {
                    context: Some(name.to_string()),
                    ..Default::default()
                })
                .await?
            }
            None => Config::infer().await?,
        };

        let namespace = namespace
            .map(str::to_string)
            .unwrap_or_else(|| config.default_namespace.clone());
        let client = Client::try_from(config)?;

        tracing::debug!(%namespace, context = ?context, "connected to cluster");

        Ok(Self {
            client,
            namespace,
            context: context.map(str::to_string),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Kubeconfig context explicitly requested, if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Fetch the pod template of a deployment served under `apps/<api_version>`
    pub async fn get_pod_template(&self, name: &str, api_version: &str) -> Result<PodTemplateSpec> {
        let gvk = GroupVersionKind::gvk("apps", api_version, "Deployment");
        let resource = ApiResource::from_gvk(&gvk);
        let deployments: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &resource);

        let deployment = deployments
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
                namespace: self.namespace.clone(),
            })?;

        template::template_from_deployment(name, &deployment.data)
    }

    /// Submit a pod and return the name the cluster gave it
    pub async fn create_pod(&self, pod: &Pod) -> Result<String> {
        let created = self.pods().create(&PostParams::default(), pod).await?;
        let name = created.name_any();

        tracing::info!(pod = %name, namespace = %self.namespace, "pod created");
        Ok(name)
    }

    pub async fn delete_pod(&self, name: &str) -> Result<()> {
        self.pods().delete(name, &DeleteParams::default()).await?;

        tracing::info!(pod = %name, namespace = %self.namespace, "pod deleted");
        Ok(())
    }
}

impl PodStatusSource for KubeClient {
    async fn pod_conditions(&self, name: &str) -> Result<Option<Vec<PodCondition>>> {
        let pod = self.pods().get_status(name).await?;
        Ok(pod.status.and_then(|status| status.conditions))
    }
}
