/// Handlers for the known cluster-inspection actions
///
/// Every handler returns the plain-text answer. Lookups by name walk the
/// namespaces in the order the API lists them and take the first hit.
use futures::future::join_all;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::ResourceExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::action::{simplify_name, Action, ActionKind, Parameters, ResourceKind};
use crate::error::{AgentError, AgentResult};
use crate::k8s::ClusterInspector;

pub const NOT_UNDERSTOOD: &str = "I did not understand the action required.";

/// Dispatches normalized actions to the cluster
pub struct ActionHandlers {
    cluster: Arc<dyn ClusterInspector>,
    log_tail_lines: i64,
}

impl ActionHandlers {
    pub fn new(cluster: Arc<dyn ClusterInspector>, log_tail_lines: i64) -> Self {
        Self {
            cluster,
            log_tail_lines,
        }
    }

    /// Run the handler for `action`
    pub async fn handle(&self, action: &Action) -> AgentResult<String> {
        let params = &action.parameters;
        match &action.kind {
            ActionKind::CountResources => self.count_resources(params).await,
            ActionKind::GetStatus => self.get_status(params).await,
            ActionKind::ListResources => self.list_resources(params).await,
            ActionKind::GetLogs => self.get_logs(params).await,
            ActionKind::DescribeResource => self.describe_resource(params).await,
            ActionKind::GetResourceDetail => self.get_resource_detail(params).await,
            ActionKind::GetOwnedPods => self.get_owned_pods(params).await,
            ActionKind::Unknown | ActionKind::Unrecognized(_) => Ok(NOT_UNDERSTOOD.to_string()),
        }
    }

    async fn count_resources(&self, params: &Parameters) -> AgentResult<String> {
        let count = match &params.resource_type {
            Some(ResourceKind::Pod) => self.cluster.list_pods(None).await?.len(),
            Some(ResourceKind::Deployment) => self.cluster.list_deployments(None).await?.len(),
            Some(ResourceKind::Node) => self.cluster.list_nodes().await?.len(),
            Some(ResourceKind::Service) => self.cluster.list_services(None).await?.len(),
            _ => {
                return Ok(format!(
                    "Resource type '{}' is not supported for counting.",
                    params.resource_type_str()
                ))
            }
        };
        Ok(count.to_string())
    }

    async fn get_status(&self, params: &Parameters) -> AgentResult<String> {
        let Some(name) = params.resource_name.as_deref() else {
            return Ok("Resource name is required to get its status.".to_string());
        };
        let ns = params.namespace.as_deref();
        let cluster = self.cluster.as_ref();

        match &params.resource_type {
            Some(ResourceKind::Pod) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_pod(&ns, name).await })
                    .await?;
                Ok(match found {
                    Some((pod, namespace)) => {
                        let phase = pod
                            .status
                            .and_then(|s| s.phase)
                            .unwrap_or_else(|| "Unknown".to_string());
                        info!("Pod {}/{} is {}", namespace, name, phase);
                        phase
                    }
                    None => not_found("Pod", name),
                })
            }
            Some(ResourceKind::Deployment) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move {
                        cluster.get_deployment(&ns, name).await
                    })
                    .await?;
                Ok(match found {
                    Some((deployment, _)) => deployment
                        .status
                        .and_then(|s| s.conditions)
                        .and_then(|c| c.last().map(|c| c.type_.clone()))
                        .unwrap_or_else(|| "Unknown".to_string()),
                    None => not_found("Deployment", name),
                })
            }
            Some(ResourceKind::Service) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_service(&ns, name).await })
                    .await?;
                Ok(match found {
                    Some((service, _)) => service
                        .spec
                        .and_then(|s| s.type_)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    None => not_found("Service", name),
                })
            }
            _ => Ok(format!(
                "Resource type '{}' is not supported for status retrieval.",
                params.resource_type_str()
            )),
        }
    }

    async fn list_resources(&self, params: &Parameters) -> AgentResult<String> {
        let ns = params.namespace.as_deref();
        let names: Vec<String> = match &params.resource_type {
            Some(ResourceKind::Pod) => simplified(self.cluster.list_pods(ns).await?),
            Some(ResourceKind::Deployment) => simplified(self.cluster.list_deployments(ns).await?),
            Some(ResourceKind::Service) => simplified(self.cluster.list_services(ns).await?),
            Some(ResourceKind::Namespace) => self.cluster.list_namespaces().await?,
            Some(ResourceKind::Node) => self
                .cluster
                .list_nodes()
                .await?
                .iter()
                .map(|n| n.name_any())
                .collect(),
            _ => {
                return Ok(format!(
                    "Resource type '{}' is not supported for listing.",
                    params.resource_type_str()
                ))
            }
        };
        Ok(names.join(", "))
    }

    async fn get_logs(&self, params: &Parameters) -> AgentResult<String> {
        let Some(name) = params.resource_name.as_deref() else {
            return Ok("Pod name is required to get logs.".to_string());
        };
        let cluster = self.cluster.as_ref();

        let found = self
            .find_in_namespaces(params.namespace.as_deref(), |ns| async move {
                cluster.get_pod(&ns, name).await
            })
            .await?;
        let Some((_, namespace)) = found else {
            return Ok(not_found("Pod", name));
        };

        let logs = self
            .cluster
            .pod_logs(&namespace, name, self.log_tail_lines)
            .await?;
        if logs.trim().is_empty() {
            return Ok(format!("Pod '{}' has no log output.", name));
        }
        Ok(logs.trim_end().to_string())
    }

    async fn describe_resource(&self, params: &Parameters) -> AgentResult<String> {
        let Some(name) = params.resource_name.as_deref() else {
            return Ok("Resource name is required to describe it.".to_string());
        };
        let ns = params.namespace.as_deref();
        let cluster = self.cluster.as_ref();

        match &params.resource_type {
            Some(ResourceKind::Pod) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_pod(&ns, name).await })
                    .await?;
                match found {
                    Some((pod, _)) => Ok(serde_yaml::to_string(&pod)?),
                    None => Ok(not_found("Pod", name)),
                }
            }
            Some(ResourceKind::Deployment) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move {
                        cluster.get_deployment(&ns, name).await
                    })
                    .await?;
                match found {
                    Some((deployment, _)) => Ok(serde_yaml::to_string(&deployment)?),
                    None => Ok(not_found("Deployment", name)),
                }
            }
            Some(ResourceKind::Service) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_service(&ns, name).await })
                    .await?;
                match found {
                    Some((service, _)) => Ok(serde_yaml::to_string(&service)?),
                    None => Ok(not_found("Service", name)),
                }
            }
            _ => Ok(format!(
                "Description not supported for resource type '{}'.",
                params.resource_type_str()
            )),
        }
    }

    async fn get_resource_detail(&self, params: &Parameters) -> AgentResult<String> {
        let (Some(name), Some(detail)) = (params.resource_name.as_deref(), params.detail.as_deref())
        else {
            return Ok(
                "Resource name and detail are required for getting resource details.".to_string(),
            );
        };
        let ns = params.namespace.as_deref();
        let variable = params.variable_name.as_deref();
        let resource_type = params.resource_type_str();
        let cluster = self.cluster.as_ref();

        match &params.resource_type {
            Some(ResourceKind::Pod) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_pod(&ns, name).await })
                    .await?;
                let Some((pod, _)) = found else {
                    return Ok(not_found("Pod", name));
                };
                let Some(container) = first_container(pod.spec.as_ref()) else {
                    return Ok(format!("Pod '{}' has no containers.", name));
                };
                Ok(match detail {
                    "environment_variable" => env_value(container, variable, "pod", name),
                    "mount_path" => format!(
                        "Mount paths for pod '{}': {}",
                        name,
                        mount_paths(container).join(", ")
                    ),
                    "readiness_probe_path" => match container
                        .readiness_probe
                        .as_ref()
                        .and_then(|p| p.http_get.as_ref())
                        .and_then(|h| h.path.as_deref())
                    {
                        Some(path) => format!(
                            "The readiness probe path for pod '{}' is '{}'.",
                            name, path
                        ),
                        None => format!("No readiness probe path found for pod '{}'.", name),
                    },
                    "container_port" => {
                        let ports: Vec<String> = container
                            .ports
                            .iter()
                            .flatten()
                            .map(|p| p.container_port.to_string())
                            .collect();
                        format!("Container ports for pod '{}': {}", name, ports.join(", "))
                    }
                    _ => unsupported_detail(detail, resource_type),
                })
            }
            Some(ResourceKind::Deployment) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move {
                        cluster.get_deployment(&ns, name).await
                    })
                    .await?;
                let Some((deployment, _)) = found else {
                    return Ok(not_found("Deployment", name));
                };
                let template_spec = deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.template.spec.as_ref());
                let Some(container) = first_container(template_spec) else {
                    return Ok(format!("Deployment '{}' has no containers.", name));
                };
                Ok(match detail {
                    "environment_variable" => env_value(container, variable, "deployment", name),
                    "mount_path" => format!(
                        "Mount paths for deployment '{}': {}",
                        name,
                        mount_paths(container).join(", ")
                    ),
                    _ => unsupported_detail(detail, resource_type),
                })
            }
            Some(ResourceKind::Service) => {
                let found = self
                    .find_in_namespaces(ns, |ns| async move { cluster.get_service(&ns, name).await })
                    .await?;
                let Some((service, namespace)) = found else {
                    return Ok(not_found("Service", name));
                };
                Ok(match detail {
                    "port" => {
                        let ports: Vec<String> = service
                            .spec
                            .iter()
                            .flat_map(|s| s.ports.iter().flatten())
                            .map(|p| p.port.to_string())
                            .collect();
                        format!("Ports for service '{}': {}", name, ports.join(", "))
                    }
                    "namespace" => format!(
                        "The service '{}' is deployed in the '{}' namespace.",
                        name, namespace
                    ),
                    _ => unsupported_detail(detail, resource_type),
                })
            }
            Some(ResourceKind::PersistentVolume) => {
                let Some(pv) = self.cluster.get_persistent_volume(name).await? else {
                    return Ok(format!("PersistentVolume '{}' not found.", name));
                };
                Ok(match detail {
                    // PersistentVolumes carry no mount path; report the spec instead
                    "mount_path" => {
                        let spec = serde_json::to_string(&pv.spec)
                            .map_err(|e| AgentError::Serialization(e.to_string()))?;
                        format!("PersistentVolume '{}' details: {}", name, spec)
                    }
                    _ => unsupported_detail(detail, resource_type),
                })
            }
            _ => Ok(format!(
                "Resource type '{}' is not supported for getting resource details.",
                resource_type
            )),
        }
    }

    async fn get_owned_pods(&self, params: &Parameters) -> AgentResult<String> {
        let Some(name) = params.resource_name.as_deref() else {
            return Ok("Deployment name is required to find its pods.".to_string());
        };
        let cluster = self.cluster.as_ref();

        let found = self
            .find_in_namespaces(params.namespace.as_deref(), |ns| async move {
                cluster.get_deployment(&ns, name).await
            })
            .await?;
        let Some((deployment, namespace)) = found else {
            return Ok(not_found("Deployment", name));
        };

        let selector = deployment
            .spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.as_ref())
            .map(|labels| {
                labels
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        if selector.is_empty() {
            return Ok(format!("Deployment '{}' has no label selector.", name));
        }
        debug!("Listing pods in {} with selector {}", namespace, selector);

        let pods = self
            .cluster
            .list_pods_by_selector(&namespace, &selector)
            .await?;
        let mut names: Vec<String> = Vec::new();
        for pod_name in simplified(pods) {
            if !names.contains(&pod_name) {
                names.push(pod_name);
            }
        }

        if names.is_empty() {
            return Ok(format!("No pods found for deployment '{}'.", name));
        }
        Ok(names.join(", "))
    }

    /// Look an object up in `namespace`, or in every namespace when none is
    /// given; the first namespace holding it wins
    async fn find_in_namespaces<T, F, Fut>(
        &self,
        namespace: Option<&str>,
        lookup: F,
    ) -> AgentResult<Option<(T, String)>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AgentResult<Option<T>>>,
    {
        let namespaces = match namespace {
            Some(ns) => vec![ns.to_string()],
            None => self.cluster.list_namespaces().await?,
        };

        let results = join_all(namespaces.iter().cloned().map(&lookup)).await;

        let mut last_error = None;
        let mut any_answered = false;
        for (namespace, result) in namespaces.into_iter().zip(results) {
            match result {
                Ok(Some(object)) => return Ok(Some((object, namespace))),
                Ok(None) => any_answered = true,
                Err(e) => {
                    warn!("Error accessing resource in namespace '{}': {}", namespace, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_answered => Err(e),
            _ => Ok(None),
        }
    }
}

fn simplified<K: ResourceExt>(items: Vec<K>) -> Vec<String> {
    items.iter().map(|item| simplify_name(&item.name_any())).collect()
}

fn not_found(kind: &str, name: &str) -> String {
    format!("{} '{}' not found in any namespace.", kind, name)
}

fn unsupported_detail(detail: &str, resource_type: &str) -> String {
    format!(
        "Detail '{}' is not supported for resource type '{}'.",
        detail, resource_type
    )
}

fn first_container(spec: Option<&PodSpec>) -> Option<&Container> {
    spec.and_then(|s| s.containers.first())
}

fn mount_paths(container: &Container) -> Vec<String> {
    container
        .volume_mounts
        .iter()
        .flatten()
        .map(|m| m.mount_path.clone())
        .collect()
}

fn env_value(container: &Container, variable: Option<&str>, kind: &str, name: &str) -> String {
    let Some(variable) = variable else {
        return "Variable name is required to look up an environment variable.".to_string();
    };
    match container
        .env
        .iter()
        .flatten()
        .find(|e| e.name == variable)
    {
        Some(env) => match &env.value {
            Some(value) => format!(
                "The value of the environment variable '{}' is '{}'.",
                variable, value
            ),
            None => format!(
                "The environment variable '{}' is set from a reference, not a literal value.",
                variable
            ),
        },
        None => format!(
            "Environment variable '{}' not found in {} '{}'.",
            variable, kind, name
        ),
    }
}
