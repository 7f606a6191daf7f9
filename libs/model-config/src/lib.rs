pub mod error;
pub mod group;
pub mod instance_catalog;
pub mod name;
pub mod validate;

pub use error::{Error, Result};
pub use group::{
    AutoScaleTrigger, ClusterConfig, MixedModelGroup, Model, ModelGroup, ModelGroupKind,
    ResourceRequest, RuntimeSpec, SpotPool,
};
pub use instance_catalog::{InstanceProfile, ResolvedResources, resolve_resources};
pub use name::kubify_name;
