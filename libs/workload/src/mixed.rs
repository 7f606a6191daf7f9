use crate::builder::{WorkloadContext, build_pod_template};
use crate::labels::build_labels;

use fleetop_model_config::MixedModelGroup;
use fleetop_runtime_planner::LaunchPlan;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{NodeSelectorRequirement, NodeSelectorTerm, PreferredSchedulingTerm};
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::api::scheduling::v1::PriorityClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

const FAIL_SAFE_PRIORITY_CLASS: &str = "fail-safe";
const FAIL_SAFE_PRIORITY_VALUE: i32 = 100_000;

/// Builds the reserved-plus-preemptible Deployment pair for a [`MixedModelGroup`].
///
/// Design intent, carried over from the original's module docstring: the baseline deployment
/// is a fail-safe floor that always runs on guaranteed/on-demand capacity and never scales to
/// zero, while the auto-scaling deployment prefers (but does not require) preemptible/spot
/// capacity so it can grow and shrink with demand without risking eviction of the floor. Over
/// time, as spot capacity frees up, the scheduler is expected to prefer placing the auto-scale
/// deployment's pods there rather than on-demand nodes.
pub struct MixedCapacityPolicy<'a> {
    ctx: &'a WorkloadContext,
    group: &'a MixedModelGroup,
}

impl<'a> MixedCapacityPolicy<'a> {
    pub fn new(ctx: &'a WorkloadContext, group: &'a MixedModelGroup) -> Self {
        Self { ctx, group }
    }

    pub fn baseline_deployment_name(&self) -> String {
        format!("{}-baseline", fleetop_model_config::kubify_name(&self.group.name))
    }

    pub fn auto_scale_deployment_name(&self) -> String {
        fleetop_model_config::kubify_name(&self.group.name)
    }

    /// The KEDA `ScaledObject`'s max replica bound must cover both pools: on-demand overflow
    /// (`maxOnDemandInstances`) and the spot pool's own ceiling. The two are never summed,
    /// only maxed, which means a cluster that scales the on-demand overflow AND the spot pool
    /// to their independent ceilings simultaneously can run more replicas than either bound
    /// alone implies. This is reproduced as-is from the original; see the open design question
    /// it's flagged under.
    pub fn scaled_object_max_replicas(&self) -> i32 {
        self.group
            .max_on_demand_instances
            .max(self.group.spot.max_instances) as i32
    }

    pub fn priority_class(&self) -> PriorityClass {
        build_priority_class()
    }

    pub fn pod_disruption_budget(&self) -> PodDisruptionBudget {
        let name = &fleetop_model_config::kubify_name(&self.group.name);
        PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some(format!("{name}-pdb")),
                namespace: Some(self.ctx.namespace.clone()),
                labels: Some(build_labels(name)),
                ..Default::default()
            },
            spec: Some(PodDisruptionBudgetSpec {
                max_unavailable: Some(IntOrString::String("30%".to_string())),
                selector: Some(LabelSelector {
                    match_labels: Some(build_labels(name)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        }
    }

    pub fn fail_safe_deployment(&self, plan: &LaunchPlan, port: u16) -> Deployment {
        let mixed = fleetop_model_config::ModelGroupKind::Mixed(self.group.clone());
        let name = &fleetop_model_config::kubify_name(&self.group.name);
        let mut template = build_pod_template(self.ctx, &mixed, plan, port);
        if let Some(spec) = template.spec.as_mut() {
            spec.priority_class_name = Some(FAIL_SAFE_PRIORITY_CLASS.to_string());
            let affinity = spec.affinity.get_or_insert_with(Default::default);
            let node_affinity = affinity.node_affinity.get_or_insert_with(Default::default);
            if let Some(required) = node_affinity
                .required_during_scheduling_ignored_during_execution
                .as_mut()
            {
                for term in &mut required.node_selector_terms {
                    let exprs = term.match_expressions.get_or_insert_with(Vec::new);
                    exprs.push(on_demand_requirement());
                }
            }
        }

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.baseline_deployment_name()),
                namespace: Some(self.ctx.namespace.clone()),
                labels: Some(build_labels(name)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.group.base_instances as i32),
                selector: LabelSelector {
                    match_labels: Some(build_labels(name)),
                    ..Default::default()
                },
                template,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn auto_scale_deployment(&self, plan: &LaunchPlan, port: u16) -> Deployment {
        let mixed = fleetop_model_config::ModelGroupKind::Mixed(self.group.clone());
        let name = &fleetop_model_config::kubify_name(&self.group.name);
        let mut template = build_pod_template(self.ctx, &mixed, plan, port);
        if let Some(spec) = template.spec.as_mut() {
            let affinity = spec.affinity.get_or_insert_with(Default::default);
            let node_affinity = affinity.node_affinity.get_or_insert_with(Default::default);
            node_affinity
                .preferred_during_scheduling_ignored_during_execution
                .get_or_insert_with(Vec::new)
                .push(PreferredSchedulingTerm {
                    weight: 100,
                    preference: NodeSelectorTerm {
                        match_expressions: Some(vec![spot_requirement()]),
                        ..Default::default()
                    },
                });
        }

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.auto_scale_deployment_name()),
                namespace: Some(self.ctx.namespace.clone()),
                labels: Some(build_labels(name)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.group.spot.min_instances as i32),
                selector: LabelSelector {
                    match_labels: Some(build_labels(name)),
                    ..Default::default()
                },
                template,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn on_demand_requirement() -> NodeSelectorRequirement {
    NodeSelectorRequirement {
        key: "lifecycle".to_string(),
        operator: "In".to_string(),
        values: Some(vec!["on-demand".to_string()]),
    }
}

fn spot_requirement() -> NodeSelectorRequirement {
    NodeSelectorRequirement {
        key: "lifecycle".to_string(),
        operator: "In".to_string(),
        values: Some(vec!["spot".to_string()]),
    }
}

fn build_priority_class() -> PriorityClass {
    PriorityClass {
        metadata: ObjectMeta {
            name: Some(FAIL_SAFE_PRIORITY_CLASS.to_string()),
            ..Default::default()
        },
        value: FAIL_SAFE_PRIORITY_VALUE,
        global_default: Some(false),
        description: Some(
            "Reserved priority class for model-group fail-safe baseline deployments".to_string(),
        ),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetop_model_config::{Model, ResourceRequest, RuntimeSpec, SpotPool};

    fn ctx() -> WorkloadContext {
        WorkloadContext {
            namespace: "default".to_string(),
            bucket: "models-bucket".to_string(),
        }
    }

    fn group() -> MixedModelGroup {
        MixedModelGroup {
            name: "g1".to_string(),
            node_type: "n1".to_string(),
            base_instances: 1,
            max_on_demand_instances: 2,
            spot: SpotPool {
                min_instances: 1,
                max_instances: 5,
            },
            gpu: false,
            resource_request: ResourceRequest::default(),
            model: Model {
                hf_repo_id: Some("org/repo".to_string()),
                urls: None,
                files: vec!["*".to_string()],
                use_model_store: true,
            },
            runtime: RuntimeSpec {
                image: "ghcr.io/ggerganov/llama.cpp:server".to_string(),
                command: vec![],
                env: vec![],
            },
            auto_scale_triggers: vec![],
            is_public: false,
        }
    }

    #[test]
    fn max_replicas_is_the_max_not_the_sum() {
        let g = group();
        let ctx = ctx();
        let policy = MixedCapacityPolicy::new(&ctx, &g);
        assert_eq!(policy.scaled_object_max_replicas(), 5);
    }

    #[test]
    fn baseline_deployment_requires_on_demand() {
        let g = group();
        let ctx = ctx();
        let policy = MixedCapacityPolicy::new(&ctx, &g);
        let plan = LaunchPlan {
            command: vec!["/server".to_string()],
            mount_path: "/data".to_string(),
            readiness_path: "/health".to_string(),
            liveness_path: "/health".to_string(),
        };
        let dep = policy.fail_safe_deployment(&plan, 8080);
        assert_eq!(
            dep.spec.unwrap().template.spec.unwrap().priority_class_name,
            Some(FAIL_SAFE_PRIORITY_CLASS.to_string())
        );
    }

    #[test]
    fn auto_scale_deployment_prefers_spot() {
        let g = group();
        let ctx = ctx();
        let policy = MixedCapacityPolicy::new(&ctx, &g);
        let plan = LaunchPlan {
            command: vec!["/server".to_string()],
            mount_path: "/data".to_string(),
            readiness_path: "/health".to_string(),
            liveness_path: "/health".to_string(),
        };
        let dep = policy.auto_scale_deployment(&plan, 8080);
        let affinity = dep
            .spec
            .unwrap()
            .template
            .spec
            .unwrap()
            .affinity
            .unwrap();
        let preferred = affinity
            .node_affinity
            .unwrap()
            .preferred_during_scheduling_ignored_during_execution
            .unwrap();
        assert_eq!(preferred.len(), 1);
        assert_eq!(preferred[0].weight, 100);
    }
}
