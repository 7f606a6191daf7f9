use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single model source entry: either a HuggingFace repo id or a list of plain HTTP URLs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Model {
    #[serde(default, rename = "hfRepoId", skip_serializing_if = "Option::is_none")]
    pub hf_repo_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    /// Glob patterns selecting which files of the resolved source to stage.
    /// Defaults to `["*"]`, matching the original's pydantic default.
    #[serde(default = "default_files")]
    pub files: Vec<String>,

    /// Whether the group should be staged into the Model Store before the workload starts,
    /// as opposed to fetching directly at runtime.
    #[serde(default = "default_true", rename = "useModelStore")]
    pub use_model_store: bool,
}

fn default_files() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSpec {
    /// Container image. Its basename/tag drives runtime-family classification.
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AutoScaleTrigger {
    Cpu {
        #[serde(rename = "type")]
        kind: CpuTriggerTag,
        metadata: BTreeMap<String, String>,
    },
    Custom {
        #[serde(rename = "type")]
        kind: String,
        metadata: BTreeMap<String, String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CpuTriggerTag {
    #[serde(rename = "cpu")]
    Cpu,
}

/// A single, uniform-capacity model group: one Deployment, autoscaled between
/// `min_instances` and `max_instances`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelGroup {
    pub name: String,

    #[serde(rename = "nodeType")]
    pub node_type: String,

    #[serde(rename = "minInstances")]
    pub min_instances: u32,

    #[serde(rename = "maxInstances")]
    pub max_instances: u32,

    #[serde(default)]
    pub gpu: bool,

    #[serde(default, rename = "resourceRequest")]
    pub resource_request: ResourceRequest,

    pub model: Model,

    pub runtime: RuntimeSpec,

    #[serde(default, rename = "autoScaleTriggers")]
    pub auto_scale_triggers: Vec<AutoScaleTrigger>,

    #[serde(default, rename = "isPublic")]
    pub is_public: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpotPool {
    #[serde(rename = "minInstances")]
    pub min_instances: u32,
    #[serde(rename = "maxInstances")]
    pub max_instances: u32,
}

/// A mixed-capacity model group: a small reserved/on-demand baseline deployment that never
/// scales to zero, plus a preemptible/spot deployment that absorbs the rest of demand.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MixedModelGroup {
    pub name: String,

    #[serde(rename = "nodeType")]
    pub node_type: String,

    #[serde(rename = "baseInstances")]
    pub base_instances: u32,

    #[serde(rename = "maxOnDemandInstances")]
    pub max_on_demand_instances: u32,

    pub spot: SpotPool,

    #[serde(default)]
    pub gpu: bool,

    #[serde(default, rename = "resourceRequest")]
    pub resource_request: ResourceRequest,

    pub model: Model,

    pub runtime: RuntimeSpec,

    #[serde(default, rename = "autoScaleTriggers")]
    pub auto_scale_triggers: Vec<AutoScaleTrigger>,

    #[serde(default, rename = "isPublic")]
    pub is_public: bool,
}

/// Either shape a declared group can take. The config document is a flat list of these;
/// which variant applies is detected by the presence of the `spot` field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ModelGroupKind {
    Mixed(MixedModelGroup),
    Uniform(ModelGroup),
}

impl ModelGroupKind {
    pub fn name(&self) -> &str {
        match self {
            ModelGroupKind::Mixed(g) => &g.name,
            ModelGroupKind::Uniform(g) => &g.name,
        }
    }

    pub fn model(&self) -> &Model {
        match self {
            ModelGroupKind::Mixed(g) => &g.model,
            ModelGroupKind::Uniform(g) => &g.model,
        }
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        match self {
            ModelGroupKind::Mixed(g) => &g.runtime,
            ModelGroupKind::Uniform(g) => &g.runtime,
        }
    }

    pub fn gpu(&self) -> bool {
        match self {
            ModelGroupKind::Mixed(g) => g.gpu,
            ModelGroupKind::Uniform(g) => g.gpu,
        }
    }

    pub fn is_public(&self) -> bool {
        match self {
            ModelGroupKind::Mixed(g) => g.is_public,
            ModelGroupKind::Uniform(g) => g.is_public,
        }
    }

    pub fn resource_request(&self) -> ResourceRequest {
        match self {
            ModelGroupKind::Mixed(g) => g.resource_request,
            ModelGroupKind::Uniform(g) => g.resource_request,
        }
    }

    pub fn node_type(&self) -> &str {
        match self {
            ModelGroupKind::Mixed(g) => &g.node_type,
            ModelGroupKind::Uniform(g) => &g.node_type,
        }
    }
}

/// The top-level configuration document. `vector_store`, `job`, `prometheus`, and `tracing`
/// drive out-of-scope collaborators and are captured opaquely so the document still parses
/// when they're present; this crate never interprets them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    pub namespace: String,

    #[serde(rename = "bucketName")]
    pub bucket_name: String,

    #[serde(default, rename = "registryUrl")]
    pub registry_url: Option<String>,

    #[serde(default, rename = "logRetentionDays")]
    pub log_retention_days: Option<u32>,

    #[serde(default, rename = "modelGroups")]
    pub model_groups: Vec<ModelGroupKind>,

    /// Mixed-capacity groups declared under their own top-level array (spec.md §6); kept
    /// separate from `modelGroups` rather than folded into it by the untagged-enum guess, so a
    /// document that follows the documented schema exactly is never silently dropped.
    #[serde(default, rename = "mixedModelGroups")]
    pub mixed_model_groups: Vec<MixedModelGroup>,

    #[serde(default, rename = "vectorStore", skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<serde_json::Value>,
}

impl ClusterConfig {
    /// All declared groups, `modelGroups` and `mixedModelGroups` combined into one sequence.
    pub fn declared_groups(&self) -> impl Iterator<Item = ModelGroupKind> + '_ {
        self.model_groups
            .iter()
            .cloned()
            .chain(self.mixed_model_groups.iter().cloned().map(ModelGroupKind::Mixed))
    }
}
