/// Read-only cluster inspection
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, PersistentVolume, Pod, Service};
use kube::api::{ListParams, LogParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

use crate::error::AgentResult;

/// Read-only view of the cluster used by the query handlers
///
/// `namespace: None` on list calls means all namespaces.
#[async_trait]
pub trait ClusterInspector: Send + Sync {
    async fn list_namespaces(&self) -> AgentResult<Vec<String>>;

    async fn list_pods(&self, namespace: Option<&str>) -> AgentResult<Vec<Pod>>;

    /// Pods in `namespace` matching a label selector (`app=web,tier=front`)
    async fn list_pods_by_selector(&self, namespace: &str, selector: &str)
        -> AgentResult<Vec<Pod>>;

    async fn list_deployments(&self, namespace: Option<&str>) -> AgentResult<Vec<Deployment>>;

    async fn list_services(&self, namespace: Option<&str>) -> AgentResult<Vec<Service>>;

    async fn list_nodes(&self) -> AgentResult<Vec<Node>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> AgentResult<Option<Pod>>;

    async fn get_deployment(&self, namespace: &str, name: &str)
        -> AgentResult<Option<Deployment>>;

    async fn get_service(&self, namespace: &str, name: &str) -> AgentResult<Option<Service>>;

    async fn get_persistent_volume(&self, name: &str) -> AgentResult<Option<PersistentVolume>>;

    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64) -> AgentResult<String>;
}

/// `ClusterInspector` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeInspector {
    client: Client,
}

impl KubeInspector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list<K>(&self, api: Api<K>, params: &ListParams) -> AgentResult<Vec<K>>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        Ok(api.list(params).await?.items)
    }
}

#[async_trait]
impl ClusterInspector for KubeInspector {
    async fn list_namespaces(&self) -> AgentResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = self.list(api, &ListParams::default()).await?;
        let names: Vec<String> = namespaces
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();
        debug!("Listed {} namespaces", names.len());
        Ok(names)
    }

    async fn list_pods(&self, namespace: Option<&str>) -> AgentResult<Vec<Pod>> {
        self.list(self.scoped(namespace), &ListParams::default()).await
    }

    async fn list_pods_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AgentResult<Vec<Pod>> {
        let params = ListParams::default().labels(selector);
        self.list(self.scoped(Some(namespace)), &params).await
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> AgentResult<Vec<Deployment>> {
        self.list(self.scoped(namespace), &ListParams::default()).await
    }

    async fn list_services(&self, namespace: Option<&str>) -> AgentResult<Vec<Service>> {
        self.list(self.scoped(namespace), &ListParams::default()).await
    }

    async fn list_nodes(&self) -> AgentResult<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        self.list(api, &ListParams::default()).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> AgentResult<Option<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> AgentResult<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> AgentResult<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_persistent_volume(&self, name: &str) -> AgentResult<Option<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64) -> AgentResult<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        Ok(api.logs(name, &params).await?)
    }
}
