/// Kubernetes cluster access
pub mod client;
pub mod crds;
#[cfg(test)]
pub mod fake;
pub mod pods;
pub mod port_forward;
pub mod resources;

pub use client::{ClusterApi, Kubectl, ListQuery};
pub use pods::PodExt;
pub use port_forward::PortForward;
pub use resources::{Cluster, PodRef};
