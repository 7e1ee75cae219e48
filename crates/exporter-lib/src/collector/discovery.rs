//! VMI discovery and socket resolution
//!
//! Lists the VMIs scheduled on this node and maps each one to the command
//! socket its launcher exposes under the shared virt directory.

use crate::models::{TargetMap, VmiDescriptor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Label carrying the node a VMI is scheduled on
pub const NODE_NAME_LABEL: &str = "kubevirt.io/nodeName";

/// Source of the VMIs running on a node
#[async_trait]
pub trait VmiLister: Send + Sync {
    async fn list_on_node(&self, node_name: &str) -> Result<Vec<VmiDescriptor>>;
}

/// Lists VirtualMachineInstance objects from the Kubernetes API
pub struct KubeVmiLister {
    client: Client,
    resource: ApiResource,
}

impl KubeVmiLister {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("kubevirt.io", "v1", "VirtualMachineInstance");
        Self {
            client,
            resource: ApiResource::from_gvk(&gvk),
        }
    }

    /// Create a lister from in-cluster or kubeconfig configuration
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl VmiLister for KubeVmiLister {
    async fn list_on_node(&self, node_name: &str) -> Result<Vec<VmiDescriptor>> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &self.resource);
        let params = ListParams::default().labels(&format!("{}={}", NODE_NAME_LABEL, node_name));

        let list = api
            .list(&params)
            .await
            .with_context(|| format!("Failed to list VMIs on node {}", node_name))?;

        Ok(list.items.iter().map(vmi_from_object).collect())
    }
}

/// Convert a VirtualMachineInstance object into a descriptor
pub fn vmi_from_object(object: &DynamicObject) -> VmiDescriptor {
    let status = object.data.get("status");
    let status_field = |name: &str| {
        status
            .and_then(|s| s.get(name))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    VmiDescriptor {
        namespace: object.metadata.namespace.clone().unwrap_or_default(),
        name: object.metadata.name.clone().unwrap_or_default(),
        uid: object.metadata.uid.clone().unwrap_or_default(),
        node_name: status_field("nodeName"),
        phase: status_field("phase"),
        labels: object.metadata.labels.clone().unwrap_or_default(),
        annotations: object.metadata.annotations.clone().unwrap_or_default(),
    }
}

/// Fixed set of VMIs, filtered by node
#[derive(Debug, Clone, Default)]
pub struct StaticVmiLister {
    vmis: Vec<VmiDescriptor>,
}

impl StaticVmiLister {
    pub fn new(vmis: Vec<VmiDescriptor>) -> Self {
        Self { vmis }
    }
}

#[async_trait]
impl VmiLister for StaticVmiLister {
    async fn list_on_node(&self, node_name: &str) -> Result<Vec<VmiDescriptor>> {
        Ok(self
            .vmis
            .iter()
            .filter(|vmi| vmi.node_name == node_name)
            .cloned()
            .collect())
    }
}

/// Command socket location of a VMI under the shared virt directory
pub fn socket_path(share_dir: &Path, vmi_uid: &str) -> PathBuf {
    share_dir.join("sockets").join(format!("{}_sock", vmi_uid))
}

/// Build the scrape target map for the given VMIs
///
/// A VMI without a socket on disk has nothing to scrape (not started yet,
/// or already torn down) and is left out.
pub fn resolve_targets(share_dir: &Path, vmis: &[VmiDescriptor]) -> TargetMap {
    let mut targets = TargetMap::with_capacity(vmis.len());

    for vmi in vmis {
        if vmi.uid.is_empty() {
            debug!(namespace = %vmi.namespace, name = %vmi.name, "VMI without uid, skipping");
            continue;
        }

        let path = socket_path(share_dir, &vmi.uid);
        if !path.exists() {
            debug!(
                namespace = %vmi.namespace,
                name = %vmi.name,
                path = %path.display(),
                "No command socket for VMI"
            );
            continue;
        }

        targets.insert(path.to_string_lossy().into_owned(), Arc::new(vmi.clone()));
    }

    info!(vmis = vmis.len(), targets = targets.len(), "Resolved scrape targets");
    targets
}
