//! Turns a deployment's pod template into a standalone debug pod

use std::sync::LazyLock;

use k8s_openapi::api::core::v1::{Container, Pod, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubedebug_types::{APP_LABEL, EntrypointMode, IDLE_COMMAND, TemplateOptions};
use regex::{NoExpand, Regex};

use crate::error::{Error, Result};

/// Trailing `:<tag>` of an image reference. A `/` after the colon means it was
/// a registry port, which the character class already rules out.
static IMAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("valid tag pattern"));

/// Decode `spec.template` out of a raw deployment body
pub(crate) fn template_from_deployment(name: &str, data: &serde_json::Value) -> Result<PodTemplateSpec> {
    let template = data
        .pointer("/spec/template")
        .ok_or_else(|| Error::MissingTemplate(name.to_string()))?;

    serde_json::from_value(template.clone()).map_err(|source| Error::InvalidTemplate {
        name: name.to_string(),
        source,
    })
}

/// A debug pod ready to submit
#[derive(Clone, Debug)]
pub struct DebugPod {
    pub pod: Pod,
    /// Container whose entrypoint was replaced, if the template has one
    pub main_container: Option<String>,
}

/// Build the debug pod from a deployment's pod template.
///
/// Strips probes and resource limits from every container, swaps the main
/// container's entrypoint, optionally drops the `app` label and retags images.
pub fn build_debug_pod(template: PodTemplateSpec, options: &TemplateOptions) -> DebugPod {
    let mut metadata = template.metadata.unwrap_or_default();
    strip_cluster_fields(&mut metadata);

    if !options.take_traffic {
        if let Some(labels) = metadata.labels.as_mut() {
            labels.remove(APP_LABEL);
        }
    }
    metadata.name = Some(options.pod_name());

    let mut spec = template.spec.unwrap_or_default();
    let mut main_container = None;

    for container in &mut spec.containers {
        container.readiness_probe = None;
        container.liveness_probe = None;
        container.startup_probe = None;
        container.resources = None;

        if container.name == options.deployment {
            main_container = Some(container.name.clone());
            override_entrypoint(container, options.entrypoint);
        }

        if let Some(tag) = &options.image_tag {
            container.image = container.image.as_deref().map(|image| retag_image(image, tag));
        }
    }

    if main_container.is_none() {
        tracing::warn!(
            deployment = %options.deployment,
            "no container named after the deployment, entrypoints left unchanged"
        );
    }

    DebugPod {
        pod: Pod {
            metadata,
            spec: Some(spec),
            status: None,
        },
        main_container,
    }
}

/// Replace the trailing tag of an image reference.
///
/// Untagged images and digest references are returned unchanged.
fn retag_image(image: &str, tag: &str) -> String {
    if image.contains('@') {
        return image.to_string();
    }
    let replacement = format!(":{}", tag);
    IMAGE_TAG.replace(image, NoExpand(&replacement)).into_owned()
}

/// Shell loop that keeps re-running `entrypoint`, reporting each exit on stderr
fn restart_loop(entrypoint: &[String]) -> String {
    let command = entrypoint
        .iter()
        .map(|word| shell_quote(word))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "while true; do {}; echo \"kubedebug: entrypoint exited with status $?, restarting\" >&2; sleep 1; done",
        command
    )
}

fn override_entrypoint(container: &mut Container, mode: EntrypointMode) {
    let idle = || IDLE_COMMAND.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let command = match mode {
        EntrypointMode::Idle => idle(),
        EntrypointMode::Restartable => match container.command.as_ref() {
            Some(command) if !command.is_empty() => {
                let mut entrypoint = command.clone();
                entrypoint.extend(container.args.iter().flatten().cloned());
                vec!["sh".to_string(), "-c".to_string(), restart_loop(&entrypoint)]
            }
            // Image default entrypoint, nothing to re-run
            _ => {
                tracing::warn!(
                    container = %container.name,
                    "container has no explicit command, falling back to idle"
                );
                idle()
            }
        },
    };

    container.command = Some(command);
    container.args = None;
}

fn strip_cluster_fields(metadata: &mut ObjectMeta) {
    metadata.uid = None;
    metadata.resource_version = None;
    metadata.creation_timestamp = None;
    metadata.deletion_timestamp = None;
    metadata.generation = None;
    metadata.managed_fields = None;
    metadata.owner_references = None;
    metadata.generate_name = None;
    metadata.namespace = None;
    metadata.self_link = None;
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));

    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
