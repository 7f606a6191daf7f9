mod common;

use common::mixed_group;

use fleetop_runtime_planner::{ModelLocation, plan_for};
use fleetop_workload::WorkloadContext;
use fleetop_workload::mixed::MixedCapacityPolicy;

/// A mixed-capacity group builds a fail-safe baseline deployment pinned to on-demand
/// capacity and an auto-scale deployment that prefers spot, with the `ScaledObject`'s max
/// replica bound set to the max (not the sum) of the two pools' ceilings.
#[test]
fn mixed_capacity_builds_baseline_and_autoscale_pair() {
    let group = mixed_group("embeddings");
    let ctx = WorkloadContext {
        namespace: "default".to_string(),
        bucket: "models-bucket".to_string(),
    };
    let policy = MixedCapacityPolicy::new(&ctx, &group);

    assert_eq!(policy.scaled_object_max_replicas(), 6);

    let location = ModelLocation::Store {
        path: "embeddings/model.gguf".to_string(),
    };
    let kind = fleetop_model_config::ModelGroupKind::Mixed(group.clone());
    let plan = plan_for(&kind, &location, 8080);

    let baseline = policy.fail_safe_deployment(&plan, 8080);
    assert_eq!(baseline.metadata.name, Some("embeddings-baseline".to_string()));
    assert_eq!(baseline.spec.unwrap().replicas, Some(1));

    let autoscale = policy.auto_scale_deployment(&plan, 8080);
    assert_eq!(autoscale.metadata.name, Some("embeddings".to_string()));
    assert_eq!(autoscale.spec.unwrap().replicas, Some(0));

    let pdb = policy.pod_disruption_budget();
    assert_eq!(pdb.metadata.name, Some("embeddings-pdb".to_string()));
}
