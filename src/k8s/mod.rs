/// Kubernetes cluster access (read-only)
pub mod client;
pub mod inspector;

pub use client::KubernetesClient;
pub use inspector::{ClusterInspector, KubeInspector};
