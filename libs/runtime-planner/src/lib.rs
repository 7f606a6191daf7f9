pub mod error;
pub mod family;
pub mod llama_cpp;
pub mod model_location;
pub mod plan;
pub mod vllm;

pub use error::{Error, Result};
pub use family::RuntimeFamily;
pub use model_location::{ModelLocation, command_references_model, resolve_model_location};
pub use plan::{LaunchPlan, plan_for};
