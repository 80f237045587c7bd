use anyhow::{Context, Result};
use clap::Parser;

use kubedebug_k8s::{EntrypointMode, KubeClient, ReadinessPoller, TemplateOptions, build_debug_pod};
use kubedebug_shell::ExecSession;
use kubedebug_types::{DEFAULT_POLL_RETRIES, username_label};

use crate::lifecycle::{Flow, after_create};

mod lifecycle;

/// Kubedebug - Run an idle copy of a deployment's pod and open a shell in it
#[derive(Parser, Debug)]
#[command(name = "kubedebug")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Deployment to copy
    #[arg(value_name = "DEPLOYMENT")]
    deployment: String,

    /// Namespace (defaults to the context's namespace, then "default")
    #[arg(short, long)]
    namespace: Option<String>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    context: Option<String>,

    /// Replace the tag of every tagged container image
    #[arg(short, long, value_name = "TAG")]
    image: Option<String>,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,

    /// Create the pod and exit without waiting or attaching
    #[arg(short, long)]
    detach: bool,

    /// Keep re-running the original entrypoint instead of sleeping
    #[arg(short, long)]
    restartable: bool,

    /// Keep the app label so Services send traffic to the pod
    #[arg(short, long)]
    take_traffic: bool,

    /// Leave the pod running after the shell exits
    #[arg(long)]
    retain: bool,

    /// apps API version used to read the deployment
    #[arg(long, default_value = "v1")]
    api_version: String,

    /// Command to run inside the container
    #[arg(long, default_value = "sh")]
    shell: String,

    /// Number of readiness checks before giving up
    #[arg(long, default_value_t = DEFAULT_POLL_RETRIES)]
    retries: u32,

    /// kubectl binary used for the interactive session
    #[arg(long, default_value = "kubectl")]
    kubectl: String,
}

impl Args {
    fn template_options(&self, username: String) -> TemplateOptions {
        let mut options = TemplateOptions::new(self.deployment.clone(), username);
        options.take_traffic = self.take_traffic;
        options.entrypoint = EntrypointMode::from_restartable(self.restartable);
        options.image_tag = self.image.clone();
        options
    }

    /// Exec into the main container when there is one, else kubectl's default
    fn exec_session(
        &self,
        pod_name: &str,
        namespace: &str,
        context: Option<&str>,
        main_container: Option<String>,
    ) -> ExecSession {
        let session = ExecSession::new(pod_name, namespace)
            .kubectl(self.kubectl.as_str())
            .context(context.map(str::to_string))
            .shell(self.shell.as_str());

        match main_container {
            Some(container) => session.container(container),
            None => session,
        }
    }

    fn flow(&self) -> Flow {
        Flow {
            detach: self.detach,
            retain: self.retain,
            quiet: self.quiet,
        }
    }
}

/// Local username as it appears in the pod name
fn pod_username(raw: &str) -> Result<String> {
    username_label(raw)
        .with_context(|| format!("Local username '{}' cannot be used in a pod name", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let username = pod_username(&whoami::username())?;

    let kube = KubeClient::connect(args.context.as_deref(), args.namespace.as_deref())
        .await
        .context("Failed to resolve cluster credentials. Is kubectl configured?")?;

    let template = kube
        .get_pod_template(&args.deployment, &args.api_version)
        .await
        .context(format!(
            "Failed to read deployment '{}' in namespace '{}'",
            args.deployment,
            kube.namespace()
        ))?;

    let options = args.template_options(username);
    let debug = build_debug_pod(template, &options);

    let pod_name = kube
        .create_pod(&debug.pod)
        .await
        .context(format!("Failed to create pod '{}'", options.pod_name()))?;
    if !args.quiet {
        println!("{} pod is created.", pod_name);
    }

    let session = args.exec_session(
        &pod_name,
        kube.namespace(),
        kube.context(),
        debug.main_container,
    );
    let poller = ReadinessPoller::new(args.retries);

    let outcome = after_create(&kube, &session, poller, &pod_name, args.flow()).await?;
    tracing::debug!(pod = %pod_name, ?outcome, "done");

    Ok(())
}
