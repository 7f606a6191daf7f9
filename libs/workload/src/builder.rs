use crate::labels::build_labels;

use fleetop_model_config::ModelGroupKind;
use fleetop_runtime_planner::LaunchPlan;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    MetricSpec, MetricTarget, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, HTTPGetAction, NodeAffinity,
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, PodAffinityTerm, PodAntiAffinity,
    PodSpec, PodTemplateSpec, Probe, ResourceRequirements, Service, ServicePort, ServiceSpec,
    Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::DynamicObject;
use kube::api::ObjectMeta as DynObjectMeta;
use kube::api::TypeMeta;
use serde_json::json;

pub const HTTP_APP_PORT: i32 = 80;
pub const ENVOY_PROM_PORT: i32 = 15090;

/// Cluster-level facts the builder needs but cannot derive from a group on its own.
#[derive(Clone, Debug)]
pub struct WorkloadContext {
    pub namespace: String,
    pub bucket: String,
}

fn container_port(plan_port: u16) -> i32 {
    plan_port as i32
}

fn resources(group: &ModelGroupKind) -> ResourceRequirements {
    let resolved = fleetop_model_config::resolve_resources(group.node_type(), group.resource_request());

    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity(format!("{}m", resolved.cpu_millis)));
    requests.insert(
        "memory".to_string(),
        Quantity(format!("{}Mi", resolved.memory_mi)),
    );

    let mut limits = BTreeMap::new();
    if group.gpu() {
        let gpu_count = resolved.gpu_count.max(1);
        limits.insert(
            "nvidia.com/gpu".to_string(),
            Quantity(gpu_count.to_string()),
        );
        requests.insert("nvidia.com/gpu".to_string(), Quantity(gpu_count.to_string()));
    }

    ResourceRequirements {
        requests: Some(requests),
        limits: if limits.is_empty() { None } else { Some(limits) },
        ..Default::default()
    }
}

fn probe(path: &str, initial_delay: i32, period: i32, timeout: i32, failure_threshold: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(HTTP_APP_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    }
}

fn init_container(ctx: &WorkloadContext, group_name: &str) -> Container {
    Container {
        name: "init-model-store".to_string(),
        image: Some("amazon/aws-cli:latest".to_string()),
        command: Some(vec!["aws".to_string()]),
        args: Some(vec![
            "s3".to_string(),
            "cp".to_string(),
            format!("s3://{}/models/{}/", ctx.bucket, group_name),
            "/data/".to_string(),
            "--recursive".to_string(),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: "model-data".to_string(),
            mount_path: "/data".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Build the pod template shared by every Deployment variant for `group`: container ports,
/// resources, probes, model-store init container (when `use_model_store`), node/pod affinity,
/// and tolerations pinning the pod to nodes tainted for this group.
pub fn build_pod_template(
    ctx: &WorkloadContext,
    group: &ModelGroupKind,
    plan: &LaunchPlan,
    port: u16,
) -> PodTemplateSpec {
    let name = &group.runtime_name();
    let labels = build_labels(name);

    let mut container = Container {
        name: "runtime".to_string(),
        image: Some(group.runtime().image.clone()),
        command: Some(plan.command.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("http-app".to_string()),
            container_port: container_port(port),
            ..Default::default()
        }]),
        env: Some(
            group
                .runtime()
                .env
                .iter()
                .map(|e| EnvVar {
                    name: e.name.clone(),
                    value: Some(e.value.clone()),
                    ..Default::default()
                })
                .collect(),
        ),
        resources: Some(resources(group)),
        readiness_probe: Some(probe(&plan.readiness_path, 60, 5, 30, 5)),
        liveness_probe: Some(probe(&plan.liveness_path, 240, 30, 30, 5)),
        volume_mounts: Some(vec![VolumeMount {
            name: "model-data".to_string(),
            mount_path: plan.mount_path.clone(),
            ..Default::default()
        }]),
        ..Default::default()
    };
    // runtime container keeps its model-store mount even when the model is fetched live; an
    // emptyDir costs nothing unused.
    container.volume_mounts.get_or_insert_with(Vec::new);

    let init_containers = if group.model().use_model_store {
        Some(vec![init_container(ctx, name)])
    } else {
        None
    };

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            init_containers,
            volumes: Some(vec![Volume {
                name: "model-data".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }]),
            tolerations: Some(vec![
                Toleration {
                    key: Some("app".to_string()),
                    operator: Some("Equal".to_string()),
                    value: Some("model-group".to_string()),
                    effect: Some("NoSchedule".to_string()),
                    ..Default::default()
                },
                Toleration {
                    key: Some("model".to_string()),
                    operator: Some("Equal".to_string()),
                    value: Some(name.to_string()),
                    effect: Some("NoSchedule".to_string()),
                    ..Default::default()
                },
            ]),
            affinity: Some(default_affinity(name)),
            service_account_name: Some("model-group".to_string()),
            ..Default::default()
        }),
    }
}

fn node_selector_requirement(key: &str, value: &str) -> NodeSelectorRequirement {
    NodeSelectorRequirement {
        key: key.to_string(),
        operator: "In".to_string(),
        values: Some(vec![value.to_string()]),
    }
}

fn default_affinity(name: &str) -> Affinity {
    Affinity {
        node_affinity: Some(NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: vec![NodeSelectorTerm {
                    match_expressions: Some(vec![
                        node_selector_requirement("app", "model-group"),
                        node_selector_requirement("model", name),
                    ]),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        }),
        pod_anti_affinity: Some(PodAntiAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
                label_selector: Some(LabelSelector {
                    match_labels: Some(build_labels(name)),
                    ..Default::default()
                }),
                topology_key: "kubernetes.io/hostname".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn build_deployment(
    ctx: &WorkloadContext,
    group: &ModelGroupKind,
    plan: &LaunchPlan,
    port: u16,
    deployment_name: &str,
    replicas: i32,
) -> Deployment {
    let name = &group.runtime_name();
    let labels = build_labels(name);
    let template = build_pod_template(ctx, group, plan, port);

    Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name.to_string()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn build_service(ctx: &WorkloadContext, group: &ModelGroupKind, port: u16) -> Service {
    let name = &group.runtime_name();
    let labels = build_labels(name);

    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels),
            ports: Some(vec![
                ServicePort {
                    name: Some("http-app".to_string()),
                    port: HTTP_APP_PORT,
                    target_port: Some(IntOrString::Int(container_port(port))),
                    ..Default::default()
                },
                ServicePort {
                    name: Some("http-envoy-prom".to_string()),
                    port: ENVOY_PROM_PORT,
                    target_port: Some(IntOrString::Int(ENVOY_PROM_PORT)),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A plain HPA (CPU utilization, average target 50%) when no custom triggers were declared and
/// no spot sub-envelope exists, or a KEDA `ScaledObject` targeting `deployment_name` otherwise —
/// reproducing the original's dispatch between the two autoscaling mechanisms. A mixed-capacity
/// group always has a spot sub-envelope, so `has_spot_sub_envelope` forces the ScaledObject path
/// for it even when `autoScaleTriggers` is empty.
pub fn build_hpa_or_scaled_object(
    ctx: &WorkloadContext,
    group: &ModelGroupKind,
    deployment_name: &str,
    min_replicas: i32,
    max_replicas: i32,
    has_spot_sub_envelope: bool,
) -> AutoScaler {
    let name = &group.runtime_name();
    if group.auto_scale_triggers().is_empty() && !has_spot_sub_envelope {
        AutoScaler::Hpa(HorizontalPodAutoscaler {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ctx.namespace.clone()),
                labels: Some(build_labels(name)),
                ..Default::default()
            },
            spec: Some(HorizontalPodAutoscalerSpec {
                scale_target_ref: CrossVersionObjectReference {
                    kind: "Deployment".to_string(),
                    name: deployment_name.to_string(),
                    api_version: Some("apps/v1".to_string()),
                },
                min_replicas: Some(min_replicas),
                max_replicas,
                metrics: Some(vec![MetricSpec {
                    type_: "Resource".to_string(),
                    resource: Some(ResourceMetricSource {
                        name: "cpu".to_string(),
                        target: MetricTarget {
                            type_: "Utilization".to_string(),
                            average_utilization: Some(50),
                            ..Default::default()
                        },
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            status: None,
        })
    } else {
        AutoScaler::ScaledObject(build_scaled_object(
            ctx,
            group,
            deployment_name,
            min_replicas,
            max_replicas,
        ))
    }
}

pub enum AutoScaler {
    Hpa(HorizontalPodAutoscaler),
    ScaledObject(DynamicObject),
}

fn build_scaled_object(
    ctx: &WorkloadContext,
    group: &ModelGroupKind,
    deployment_name: &str,
    min_replicas: i32,
    max_replicas: i32,
) -> DynamicObject {
    let name = &group.runtime_name();
    let triggers: Vec<serde_json::Value> = group
        .auto_scale_triggers()
        .iter()
        .map(|t| serde_json::to_value(t).unwrap_or(json!({})))
        .collect();

    DynamicObject {
        types: Some(TypeMeta {
            api_version: "keda.sh/v1alpha1".to_string(),
            kind: "ScaledObject".to_string(),
        }),
        metadata: DynObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(build_labels(name)),
            ..Default::default()
        },
        data: json!({
            "spec": {
                "scaleTargetRef": { "name": deployment_name },
                "pollingInterval": 15,
                "minReplicaCount": min_replicas,
                "maxReplicaCount": max_replicas,
                "triggers": triggers,
            }
        }),
    }
}

/// `ServiceMonitor` for Prometheus scraping: the sidecar's envoy stats endpoint always,
/// plus the runtime's own `/metrics` when the family is known to expose one.
pub fn build_service_monitor(ctx: &WorkloadContext, group: &ModelGroupKind, runtime_has_metrics: bool) -> DynamicObject {
    let name = &group.runtime_name();
    let mut endpoints = vec![json!({
        "port": "http-envoy-prom",
        "path": "/stats/prometheus",
        "interval": "15s",
    })];
    if runtime_has_metrics {
        endpoints.push(json!({
            "port": "http-app",
            "path": "/metrics",
            "interval": "15s",
        }));
    }

    DynamicObject {
        types: Some(TypeMeta {
            api_version: "monitoring.coreos.com/v1".to_string(),
            kind: "ServiceMonitor".to_string(),
        }),
        metadata: DynObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(build_labels(name)),
            ..Default::default()
        },
        data: json!({
            "spec": {
                "selector": { "matchLabels": build_labels(name) },
                "endpoints": endpoints,
            }
        }),
    }
}

/// `VirtualService` routing public traffic to the group's Service, built only when the group
/// declares `isPublic`.
pub fn build_virtual_service(ctx: &WorkloadContext, group: &ModelGroupKind) -> Option<DynamicObject> {
    if !group.is_public() {
        return None;
    }
    let name = &group.runtime_name();
    Some(DynamicObject {
        types: Some(TypeMeta {
            api_version: "networking.istio.io/v1beta1".to_string(),
            kind: "VirtualService".to_string(),
        }),
        metadata: DynObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(build_labels(name)),
            ..Default::default()
        },
        data: json!({
            "spec": {
                "hosts": [format!("{name}.{}", ctx.namespace)],
                "http": [{
                    "route": [{
                        "destination": {
                            "host": name,
                            "port": { "number": HTTP_APP_PORT },
                        }
                    }]
                }]
            }
        }),
    })
}

trait ModelGroupKindExt {
    /// The DNS-1123-normalized name every object for this group is created under
    /// (spec.md §6, testable property 4), never the raw declared `name`.
    fn runtime_name(&self) -> String;
    fn auto_scale_triggers(&self) -> &[fleetop_model_config::AutoScaleTrigger];
}

impl ModelGroupKindExt for ModelGroupKind {
    fn runtime_name(&self) -> String {
        fleetop_model_config::kubify_name(self.name())
    }

    fn auto_scale_triggers(&self) -> &[fleetop_model_config::AutoScaleTrigger] {
        match self {
            ModelGroupKind::Mixed(g) => &g.auto_scale_triggers,
            ModelGroupKind::Uniform(g) => &g.auto_scale_triggers,
        }
    }
}
