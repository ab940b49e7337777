/// Action records produced by query interpretation, and the vocabulary
/// normalization applied to them
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Details that `get_resource_detail` understands
pub const SUPPORTED_DETAILS: &[&str] = &[
    "environment_variable",
    "mount_path",
    "readiness_probe_path",
    "container_port",
    "port",
    "namespace",
];

/// Canonical cluster-inspection action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    CountResources,
    GetStatus,
    ListResources,
    GetLogs,
    DescribeResource,
    GetResourceDetail,
    GetOwnedPods,
    Unknown,
    /// A name the vocabulary table does not know
    Unrecognized(String),
}

impl ActionKind {
    /// Actions offered to the LLM
    pub const KNOWN: &'static [ActionKind] = &[
        ActionKind::CountResources,
        ActionKind::GetStatus,
        ActionKind::ListResources,
        ActionKind::GetLogs,
        ActionKind::DescribeResource,
        ActionKind::GetResourceDetail,
        ActionKind::GetOwnedPods,
    ];

    /// Normalize an action name, mapping resource-specific variants to their
    /// canonical action
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "count_resources" | "count_pods" | "count_deployments" | "count_nodes"
            | "count_services" => ActionKind::CountResources,
            "get_status" | "get_pod_status" | "get_deployment_status" | "get_service_status" => {
                ActionKind::GetStatus
            }
            "list_resources" | "list_pods" | "list_deployments" | "list_services" => {
                ActionKind::ListResources
            }
            "get_logs" | "get_pod_logs" => ActionKind::GetLogs,
            "describe_resource" | "describe_pod" | "describe_deployment" | "get_pod_details" => {
                ActionKind::DescribeResource
            }
            "get_resource_detail" => ActionKind::GetResourceDetail,
            "get_owned_pods" | "get_deployment_pods" | "list_deployment_pods"
            | "get_pods_for_deployment" => ActionKind::GetOwnedPods,
            "unknown" | "" => ActionKind::Unknown,
            other => ActionKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::CountResources => "count_resources",
            ActionKind::GetStatus => "get_status",
            ActionKind::ListResources => "list_resources",
            ActionKind::GetLogs => "get_logs",
            ActionKind::DescribeResource => "describe_resource",
            ActionKind::GetResourceDetail => "get_resource_detail",
            ActionKind::GetOwnedPods => "get_owned_pods",
            ActionKind::Unknown => "unknown",
            ActionKind::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical Kubernetes resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Deployment,
    Service,
    Node,
    ConfigMap,
    Secret,
    Namespace,
    Endpoint,
    Ingress,
    PersistentVolumeClaim,
    PersistentVolume,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
    Other(String),
}

impl ResourceKind {
    /// Normalize plural, singular and short resource names (case-insensitive)
    pub fn normalize(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        match lowered.as_str() {
            "pods" | "pod" | "po" | "p" => ResourceKind::Pod,
            "deployments" | "deployment" | "deploy" | "dep" | "registry" => {
                ResourceKind::Deployment
            }
            "services" | "service" | "svc" => ResourceKind::Service,
            "nodes" | "node" | "no" => ResourceKind::Node,
            "configmaps" | "configmap" | "cm" => ResourceKind::ConfigMap,
            "secrets" | "secret" | "sec" => ResourceKind::Secret,
            "namespaces" | "namespace" | "ns" => ResourceKind::Namespace,
            "endpoints" | "endpoint" | "ep" => ResourceKind::Endpoint,
            "ingresses" | "ingress" | "ing" => ResourceKind::Ingress,
            "persistentvolumeclaims" | "persistentvolumeclaim" | "pvc" => {
                ResourceKind::PersistentVolumeClaim
            }
            "persistentvolumes" | "persistentvolume" | "pv" | "persistent volume" => {
                ResourceKind::PersistentVolume
            }
            "replicasets" | "replicaset" | "rs" => ResourceKind::ReplicaSet,
            "statefulsets" | "statefulset" | "sts" => ResourceKind::StatefulSet,
            "daemonsets" | "daemonset" | "ds" => ResourceKind::DaemonSet,
            "jobs" | "job" => ResourceKind::Job,
            "cronjobs" | "cronjob" | "cj" => ResourceKind::CronJob,
            "roles" | "role" => ResourceKind::Role,
            "rolebindings" | "rolebinding" | "rb" => ResourceKind::RoleBinding,
            "clusterroles" | "clusterrole" | "cr" => ResourceKind::ClusterRole,
            "clusterrolebindings" | "clusterrolebinding" | "crb" => {
                ResourceKind::ClusterRoleBinding
            }
            _ => ResourceKind::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::Node => "node",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
            ResourceKind::Namespace => "namespace",
            ResourceKind::Endpoint => "endpoint",
            ResourceKind::Ingress => "ingress",
            ResourceKind::PersistentVolumeClaim => "persistentvolumeclaim",
            ResourceKind::PersistentVolume => "persistentvolume",
            ResourceKind::ReplicaSet => "replicaset",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Job => "job",
            ResourceKind::CronJob => "cronjob",
            ResourceKind::Role => "role",
            ResourceKind::RoleBinding => "rolebinding",
            ResourceKind::ClusterRole => "clusterrole",
            ResourceKind::ClusterRoleBinding => "clusterrolebinding",
            ResourceKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters as the LLM returns them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(
        default,
        alias = "specific_detail",
        skip_serializing_if = "Option::is_none"
    )]
    pub variable_name: Option<String>,
}

impl RawParameters {
    pub fn is_empty(&self) -> bool {
        self.resource_type.is_none()
            && self.resource_name.is_none()
            && self.namespace.is_none()
            && self.detail.is_none()
            && self.variable_name.is_none()
    }
}

/// Interpreted query, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub action: String,
    pub parameters: RawParameters,
}

/// Normalized parameters consumed by the handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub resource_type: Option<ResourceKind>,
    pub resource_name: Option<String>,
    pub namespace: Option<String>,
    pub detail: Option<String>,
    pub variable_name: Option<String>,
}

/// Normalized action ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub parameters: Parameters,
}

impl Action {
    /// Normalize the action name, resource type and resource name
    pub fn normalize(raw: &RawAction) -> Self {
        let p = &raw.parameters;
        Self {
            kind: ActionKind::normalize(&raw.action),
            parameters: Parameters {
                resource_type: non_blank(&p.resource_type).map(ResourceKind::normalize),
                resource_name: non_blank(&p.resource_name)
                    .map(normalize_resource_name)
                    .filter(|n| !n.is_empty()),
                namespace: non_blank(&p.namespace).map(|ns| ns.trim().to_lowercase()),
                detail: non_blank(&p.detail).map(|d| d.trim().to_lowercase()),
                variable_name: non_blank(&p.variable_name).map(|v| v.trim().to_string()),
            },
        }
    }
}

impl Parameters {
    /// Resource type as text, for answers that name it
    pub fn resource_type_str(&self) -> &str {
        self.resource_type.as_ref().map(|r| r.as_str()).unwrap_or("")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-]").expect("valid regex"));

/// Normalize a resource name to Kubernetes form: lower-case, no type
/// suffixes, spaces as hyphens, only `[a-z0-9-]`
pub fn normalize_resource_name(name: &str) -> String {
    let name = name
        .to_lowercase()
        .replace(" svc", "")
        .replace(" service", "")
        .replace(" pod", "")
        .replace(" deployment", "")
        .replace(' ', "-");
    INVALID_NAME_CHARS.replace_all(&name, "").trim().to_string()
}

/// ReplicaSet hash plus pod suffix, both drawn from the alphabet Kubernetes
/// uses for generated names (no vowels, no `0 1 3`)
static POD_TEMPLATE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-[bcdfghjklmnpqrstvwxz2456789]{8,10}-[bcdfghjklmnpqrstvwxz2456789]{5}$")
        .expect("valid regex")
});
static GENERATED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-[a-z0-9]{9,}$").expect("valid regex"));

/// Strip generated suffixes from a resource name (`web-7c5ddbdf54-x8kqz`
/// becomes `web`)
///
/// A long trailing segment counts as generated only if it holds a digit,
/// so `my-deployment` keeps its name.
pub fn simplify_name(name: &str) -> String {
    if POD_TEMPLATE_SUFFIX.is_match(name) {
        return POD_TEMPLATE_SUFFIX.replace(name, "").into_owned();
    }
    match GENERATED_SUFFIX.find(name) {
        Some(m) if m.as_str().bytes().any(|b| b.is_ascii_digit()) => name[..m.start()].to_string(),
        _ => name.to_string(),
    }
}
