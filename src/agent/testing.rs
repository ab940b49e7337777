//! Scripted LLM and in-memory cluster used by unit tests
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, Pod, Service};
use kube::ResourceExt;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{AgentError, AgentResult};
use crate::k8s::ClusterInspector;
use crate::llm::LlmCompletion;

/// One recorded completion request
#[derive(Debug, Clone)]
pub struct LlmCall {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// LLM that replays canned replies in order and records every request
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<AgentResult<String>>>,
    calls: Mutex<Vec<LlmCall>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(replies: Vec<AgentResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmCompletion for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> AgentResult<String> {
        self.calls.lock().unwrap().push(LlmCall {
            system: system.to_string(),
            user: user.to_string(),
            max_tokens,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Llm("no scripted reply left".to_string())))
    }
}

/// In-memory cluster with a small fixed set of objects
pub struct FakeCluster {
    pub namespaces: Vec<String>,
    pub pods: Vec<Pod>,
    pub deployments: Vec<Deployment>,
    pub services: Vec<Service>,
    pub nodes: Vec<Node>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub logs: HashMap<String, String>,
    /// Every call fails with a Kubernetes API error
    pub broken: bool,
    /// Lookups by name fail in these namespaces
    pub failing_namespaces: Vec<String>,
}

impl FakeCluster {
    /// Two nodes, an `example-pod`, and `my-deployment` with its pod `my-pod`
    pub fn sample() -> Self {
        Self {
            namespaces: vec![
                "default".to_string(),
                "kube-system".to_string(),
                "shop".to_string(),
            ],
            pods: vec![
                pod(json!({
                    "metadata": {"name": "example-pod", "namespace": "default"},
                    "spec": {"containers": [{
                        "name": "app",
                        "image": "nginx:1.25",
                        "env": [{"name": "DB_HOST", "value": "postgres.default.svc"}],
                        "volumeMounts": [
                            {"name": "data", "mountPath": "/var/lib/data"},
                            {"name": "config", "mountPath": "/etc/app"}
                        ],
                        "readinessProbe": {"httpGet": {"path": "/healthz", "port": 8080}},
                        "ports": [{"containerPort": 8080}, {"containerPort": 9090}]
                    }]},
                    "status": {"phase": "Running"}
                })),
                pod(json!({
                    "metadata": {
                        "name": "my-pod-7c5ddbdf54-x8kqz",
                        "namespace": "default",
                        "labels": {"app": "my-pod", "pod-template-hash": "7c5ddbdf54"}
                    },
                    "spec": {"containers": [{"name": "web", "image": "nginx:1.25"}]},
                    "status": {"phase": "Running"}
                })),
                pod(json!({
                    "metadata": {
                        "name": "coredns-5dd5756b68-7xq2z",
                        "namespace": "kube-system",
                        "labels": {"k8s-app": "kube-dns"}
                    },
                    "spec": {"containers": [{"name": "coredns"}]},
                    "status": {"phase": "Pending"}
                })),
            ],
            deployments: vec![
                deployment(json!({
                    "metadata": {"name": "my-deployment", "namespace": "default"},
                    "spec": {
                        "selector": {"matchLabels": {"app": "my-pod"}},
                        "template": {
                            "metadata": {"labels": {"app": "my-pod"}},
                            "spec": {"containers": [{
                                "name": "web",
                                "env": [{"name": "LOG_LEVEL", "value": "debug"}],
                                "volumeMounts": [{"name": "config", "mountPath": "/config"}]
                            }]}
                        }
                    },
                    "status": {"conditions": [
                        {"type": "Progressing", "status": "True"},
                        {"type": "Available", "status": "True"}
                    ]}
                })),
                deployment(json!({
                    "metadata": {"name": "coredns", "namespace": "kube-system"},
                    "spec": {
                        "selector": {"matchLabels": {"k8s-app": "kube-dns"}},
                        "template": {"spec": {"containers": [{"name": "coredns"}]}}
                    }
                })),
            ],
            services: vec![
                service(json!({
                    "metadata": {"name": "kubernetes", "namespace": "default"},
                    "spec": {"type": "ClusterIP", "ports": [{"port": 443}]}
                })),
                service(json!({
                    "metadata": {"name": "web", "namespace": "shop"},
                    "spec": {"type": "LoadBalancer", "ports": [{"port": 80}, {"port": 443}]}
                })),
            ],
            nodes: vec![
                node(json!({"metadata": {"name": "node-1"}})),
                node(json!({"metadata": {"name": "node-2"}})),
            ],
            persistent_volumes: vec![persistent_volume(json!({
                "metadata": {"name": "data-pv"},
                "spec": {
                    "capacity": {"storage": "10Gi"},
                    "accessModes": ["ReadWriteOnce"],
                    "hostPath": {"path": "/mnt/data"},
                    "storageClassName": "standard"
                }
            }))],
            logs: HashMap::from([(
                "default/example-pod".to_string(),
                "starting server\nlistening on :8080\n".to_string(),
            )]),
            broken: false,
            failing_namespaces: Vec::new(),
        }
    }

    /// A cluster whose API calls all fail
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::sample()
        }
    }

    /// The sample cluster, with name lookups failing in `namespaces`
    pub fn failing_in(namespaces: &[&str]) -> Self {
        Self {
            failing_namespaces: namespaces.iter().map(|ns| ns.to_string()).collect(),
            ..Self::sample()
        }
    }

    fn check(&self) -> AgentResult<()> {
        if self.broken {
            return Err(api_error());
        }
        Ok(())
    }

    fn check_namespace(&self, namespace: &str) -> AgentResult<()> {
        self.check()?;
        if self.failing_namespaces.iter().any(|ns| ns == namespace) {
            return Err(api_error());
        }
        Ok(())
    }
}

fn api_error() -> AgentError {
    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    AgentError::Kube(kube::Error::SerdeError(err))
}

fn in_namespace<K: ResourceExt + Clone>(items: &[K], namespace: Option<&str>) -> Vec<K> {
    items
        .iter()
        .filter(|item| namespace.is_none() || item.namespace().as_deref() == namespace)
        .cloned()
        .collect()
}

fn named<K: ResourceExt + Clone>(items: &[K], namespace: &str, name: &str) -> Option<K> {
    items
        .iter()
        .find(|item| item.namespace().as_deref() == Some(namespace) && item.name_any() == name)
        .cloned()
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .all(|(k, v)| labels.get(k).map(String::as_str) == Some(v))
}

#[async_trait]
impl ClusterInspector for FakeCluster {
    async fn list_namespaces(&self) -> AgentResult<Vec<String>> {
        self.check()?;
        Ok(self.namespaces.clone())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> AgentResult<Vec<Pod>> {
        self.check()?;
        Ok(in_namespace(&self.pods, namespace))
    }

    async fn list_pods_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AgentResult<Vec<Pod>> {
        self.check()?;
        Ok(in_namespace(&self.pods, Some(namespace))
            .into_iter()
            .filter(|p| matches_selector(p.labels(), selector))
            .collect())
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> AgentResult<Vec<Deployment>> {
        self.check()?;
        Ok(in_namespace(&self.deployments, namespace))
    }

    async fn list_services(&self, namespace: Option<&str>) -> AgentResult<Vec<Service>> {
        self.check()?;
        Ok(in_namespace(&self.services, namespace))
    }

    async fn list_nodes(&self) -> AgentResult<Vec<Node>> {
        self.check()?;
        Ok(self.nodes.clone())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> AgentResult<Option<Pod>> {
        self.check_namespace(namespace)?;
        Ok(named(&self.pods, namespace, name))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> AgentResult<Option<Deployment>> {
        self.check_namespace(namespace)?;
        Ok(named(&self.deployments, namespace, name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> AgentResult<Option<Service>> {
        self.check_namespace(namespace)?;
        Ok(named(&self.services, namespace, name))
    }

    async fn get_persistent_volume(&self, name: &str) -> AgentResult<Option<PersistentVolume>> {
        self.check()?;
        Ok(self
            .persistent_volumes
            .iter()
            .find(|pv| pv.name_any() == name)
            .cloned())
    }

    async fn pod_logs(&self, namespace: &str, name: &str, _tail_lines: i64) -> AgentResult<String> {
        self.check()?;
        Ok(self
            .logs
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .unwrap_or_default())
    }
}

fn with_type(mut value: serde_json::Value, api_version: &str, kind: &str) -> serde_json::Value {
    value["apiVersion"] = json!(api_version);
    value["kind"] = json!(kind);
    value
}

pub fn pod(value: serde_json::Value) -> Pod {
    serde_json::from_value(with_type(value, "v1", "Pod")).unwrap()
}

pub fn deployment(value: serde_json::Value) -> Deployment {
    serde_json::from_value(with_type(value, "apps/v1", "Deployment")).unwrap()
}

pub fn service(value: serde_json::Value) -> Service {
    serde_json::from_value(with_type(value, "v1", "Service")).unwrap()
}

pub fn node(value: serde_json::Value) -> Node {
    serde_json::from_value(with_type(value, "v1", "Node")).unwrap()
}

pub fn persistent_volume(value: serde_json::Value) -> PersistentVolume {
    serde_json::from_value(with_type(value, "v1", "PersistentVolume")).unwrap()
}
