use std::collections::BTreeMap;

/// Selector label applied to every object belonging to the model-group subsystem.
pub const APP_LABEL_VALUE: &str = "model-group";

/// Build the `{app: model-group, model: <name>}` label set every object for a group carries.
/// This is the selector the Lifecycle Controller uses to discover the live set, so it must
/// stay in lockstep with whatever the Workload Builder stamps on created objects.
pub fn build_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), APP_LABEL_VALUE.to_string()),
        ("model".to_string(), name.to_string()),
    ])
}

pub fn label_selector() -> String {
    format!("app={APP_LABEL_VALUE}")
}
