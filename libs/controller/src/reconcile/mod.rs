//! Declared-vs-live reconciliation: stage model files, delete orphaned groups, apply the
//! declared object graph for each remaining group.

pub mod report;

pub use report::ReconcileReport;

use crate::apply::{self, CustomKind};
use crate::context::ClusterContext;
use crate::error::{Error, Result};

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Service;
use fleetop_k8s_util::events::{Event, EventType};
use fleetop_model_config::{ClusterConfig, ModelGroupKind};
use fleetop_model_stager::{HttpModelSource, HuggingFaceModelSource, ensure_staged};
use fleetop_model_store::{ModelStore, NullProgressSink};
use fleetop_runtime_planner::{ModelLocation, RuntimeFamily, plan_for, resolve_model_location};
use fleetop_workload::builder::AutoScaler;
use fleetop_workload::labels::label_selector;
use fleetop_workload::mixed::MixedCapacityPolicy;
use fleetop_workload::{
    WorkloadContext, build_deployment, build_hpa_or_scaled_object, build_service,
    build_service_monitor, build_virtual_service,
};
use kube::ResourceExt;
use kube::api::{Api, ListParams};
use tracing::{info, instrument, warn};

/// Container port every runtime listens on; the Service fronts it on [`fleetop_workload::builder::HTTP_APP_PORT`].
const CONTAINER_PORT: u16 = 8080;

/// File-extension hints `resolve_model_location` uses to pick a single store-backed candidate
/// out of a glob when the group didn't narrow its own file patterns.
fn extension_hints(family: RuntimeFamily) -> &'static [&'static str] {
    match family {
        RuntimeFamily::LlamaCpp => &[".gguf", ".ggml"],
        // vllm's weights pattern is "any file under the prefix" — an empty hint list matches
        // everything rather than filtering to a fixed extension set.
        RuntimeFamily::Vllm => &[],
        RuntimeFamily::Unknown => &[],
    }
}

/// Run one full reconciliation pass for `config` against `ctx`'s cluster.
///
/// 1. Stage + apply every declared group (§4.6 steps 1 and 4).
/// 2. Compute the live set from Service selectors and delete every orphan (§4.6 steps 2-3),
///    *before* applying declared groups so a reused name never sees old and new instances
///    coexist under the same selector.
///
/// Groups are processed serially; one group's failure doesn't stop the others from being
/// attempted, matching the aggregate-report propagation policy.
#[instrument(skip(ctx, config), fields(namespace = %ctx.namespace, groups = config.model_groups.len() + config.mixed_model_groups.len()))]
pub async fn reconcile(ctx: &ClusterContext, config: &ClusterConfig) -> ReconcileReport {
    let _measurer = ctx.metrics.reconcile_count_and_measure();
    let mut report = ReconcileReport::default();
    let prometheus_enabled = config.prometheus.is_some();
    let declared_groups: Vec<ModelGroupKind> = config.declared_groups().collect();

    let declared: BTreeSet<String> = declared_groups.iter().map(|g| g.name().to_string()).collect();

    match live_group_names(ctx).await {
        Ok(live) => {
            for orphan in live.difference(&declared) {
                match delete_orphan(ctx, orphan).await {
                    Ok(()) => {
                        info!(group = orphan, "deleted orphaned group");
                        report.orphans_deleted += 1;
                    }
                    Err(e) => {
                        warn!(group = orphan, error = %e, "failed to delete orphaned group");
                        report.failed.push((orphan.clone(), e));
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to compute live group set, skipping orphan cleanup");
            report.failed.push(("<live-set>".to_string(), e));
        }
    }
    ctx.metrics.orphans_deleted_add(report.orphans_deleted as u64);

    for group in &declared_groups {
        let name = group.name().to_string();
        ctx.metrics.spec_replicas_set(&name, min_instances(group) as i64);
        match reconcile_group(ctx, group, prometheus_enabled).await {
            Ok(()) => report.succeeded.push(name),
            Err(e) => {
                ctx.metrics.reconcile_failure_inc();
                publish_failure_event(ctx, &name, &e).await;
                report.failed.push((name, e));
            }
        }
    }

    ctx.metrics.ready_set(if report.is_success() { 1 } else { 0 });
    report
}

fn min_instances(group: &ModelGroupKind) -> u32 {
    match group {
        ModelGroupKind::Uniform(g) => g.min_instances,
        ModelGroupKind::Mixed(g) => g.base_instances,
    }
}

async fn publish_failure_event(ctx: &ClusterContext, group: &str, err: &Error) {
    let reference = k8s_openapi::api::core::v1::ObjectReference {
        kind: Some("ModelGroup".to_string()),
        name: Some(group.to_string()),
        namespace: Some(ctx.namespace.clone()),
        ..Default::default()
    };
    let _ = ctx
        .recorder
        .publish(
            Event {
                type_: EventType::Warning,
                reason: "ReconcileFailed".to_string(),
                note: Some(err.to_string()),
                action: "Reconciling".to_string(),
                secondary: None,
            },
            &reference,
        )
        .await;
}

/// The live set: every distinct `model` label carried by a Service selected by
/// [`label_selector`] in the namespace.
async fn live_group_names(ctx: &ClusterContext) -> Result<BTreeSet<String>> {
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), &ctx.namespace);
    let services = api
        .list(&ListParams::default().labels(&label_selector()))
        .await?;
    Ok(services
        .items
        .into_iter()
        .filter_map(|svc| svc.labels().get("model").cloned())
        .collect())
}

async fn delete_orphan(ctx: &ClusterContext, name: &str) -> Result<()> {
    let dp = apply::orphan_delete_params();
    let selector = format!("{},model={name}", label_selector());

    apply::delete_deployments_by_label(&ctx.client, &ctx.namespace, &selector, &dp).await?;
    apply::delete_best_effort::<Service>(&ctx.client, &ctx.namespace, name, &dp).await?;
    apply::delete_custom_best_effort(&ctx.client, &ctx.namespace, CustomKind::ServiceMonitor, name, &dp)
        .await?;
    apply::delete_custom_best_effort(&ctx.client, &ctx.namespace, CustomKind::ScaledObject, name, &dp)
        .await?;
    Ok(())
}

#[instrument(skip(ctx, group), fields(group = group.name()))]
async fn reconcile_group(
    ctx: &ClusterContext,
    group: &ModelGroupKind,
    prometheus_enabled: bool,
) -> Result<()> {
    let name = group.name();
    // Kubernetes object identity always goes through the DNS-1123 normalization (spec.md §6,
    // testable property 4); the declared `name` itself is only used for model-store paths,
    // which mirror the declaration verbatim.
    let kube_name = fleetop_model_config::kubify_name(name);
    let family = RuntimeFamily::classify(&group.runtime().image);
    let model = group.model();

    let staged_files = if model.use_model_store {
        let manifest = if model.hf_repo_id.is_some() {
            let source = HuggingFaceModelSource::new(model.hf_repo_id.clone().unwrap());
            ensure_staged(name, model, &source, &ctx.store, &NullProgressSink).await?
        } else {
            let source = HttpModelSource::new(model.urls.clone().unwrap_or_default());
            ensure_staged(name, model, &source, &ctx.store, &NullProgressSink).await?
        };
        manifest
            .files
            .into_iter()
            .map(|f| format!("{name}/{}", f.name))
            .collect()
    } else {
        Vec::new()
    };

    let location: ModelLocation =
        resolve_model_location(name, model, &staged_files, extension_hints(family))?;
    let plan = plan_for(group, &location, CONTAINER_PORT);
    let wctx = WorkloadContext {
        namespace: ctx.namespace.clone(),
        bucket: ctx.bucket.clone(),
    };
    let runtime_has_metrics = family != RuntimeFamily::Unknown;

    match group {
        ModelGroupKind::Uniform(g) => {
            let deployment = build_deployment(
                &wctx,
                group,
                &plan,
                CONTAINER_PORT,
                &kube_name,
                g.min_instances as i32,
            );
            apply::apply(&ctx.client, &ctx.namespace, deployment).await?;

            let service = build_service(&wctx, group, CONTAINER_PORT);
            apply::apply(&ctx.client, &ctx.namespace, service).await?;

            apply_autoscaler(
                ctx,
                build_hpa_or_scaled_object(&wctx, group, &kube_name, g.min_instances as i32, g.max_instances as i32, false),
            )
            .await?;
        }
        ModelGroupKind::Mixed(g) => {
            let policy = MixedCapacityPolicy::new(&wctx, g);

            let baseline = policy.fail_safe_deployment(&plan, CONTAINER_PORT);
            apply::apply(&ctx.client, &ctx.namespace, baseline).await?;

            let autoscale = policy.auto_scale_deployment(&plan, CONTAINER_PORT);
            apply::apply(&ctx.client, &ctx.namespace, autoscale).await?;

            let service = build_service(&wctx, group, CONTAINER_PORT);
            apply::apply(&ctx.client, &ctx.namespace, service).await?;

            let pdb = policy.pod_disruption_budget();
            apply::apply(&ctx.client, &ctx.namespace, pdb).await?;

            apply_autoscaler(
                ctx,
                build_hpa_or_scaled_object(
                    &wctx,
                    group,
                    &policy.auto_scale_deployment_name(),
                    g.spot.min_instances as i32,
                    policy.scaled_object_max_replicas(),
                    true,
                ),
            )
            .await?;

            // The fail-safe priority class is cluster-scoped and created once per cluster
            // during bring-up, not per-group here; see DESIGN.md.
        }
    }

    if prometheus_enabled {
        let service_monitor = build_service_monitor(&wctx, group, runtime_has_metrics);
        apply::apply_custom(&ctx.client, &ctx.namespace, service_monitor).await?;
    }

    if let Some(virtual_service) = build_virtual_service(&wctx, group) {
        apply::apply_custom(&ctx.client, &ctx.namespace, virtual_service).await?;
    }

    Ok(())
}

async fn apply_autoscaler(ctx: &ClusterContext, autoscaler: AutoScaler) -> Result<()> {
    match autoscaler {
        AutoScaler::Hpa(hpa) => {
            apply::apply(&ctx.client, &ctx.namespace, hpa).await?;
        }
        AutoScaler::ScaledObject(obj) => {
            apply::apply_custom(&ctx.client, &ctx.namespace, obj).await?;
        }
    }
    Ok(())
}
