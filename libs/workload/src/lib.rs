pub mod builder;
pub mod labels;
pub mod mixed;

pub use builder::{WorkloadContext, build_deployment, build_hpa_or_scaled_object, build_service, build_service_monitor, build_virtual_service};
pub use labels::build_labels;
pub use mixed::MixedCapacityPolicy;
