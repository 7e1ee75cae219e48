//! Core data models for the exporter

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Virtual machine instance as seen by the node at scrape time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmiDescriptor {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub node_name: String,
    /// Lifecycle phase as reported by the cluster (e.g. "Running")
    pub phase: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// One VMI's scrape endpoint for one collection cycle
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    /// Path of the VMI's command socket
    pub socket: String,
    pub vmi: Arc<VmiDescriptor>,
}

/// Socket path -> VMI, computed fresh for every scrape
pub type TargetMap = HashMap<String, Arc<VmiDescriptor>>;
