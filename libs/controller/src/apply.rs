//! Generic "upsert" for the closed set of resource kinds the Lifecycle Controller manages.
//!
//! Read by `(namespace, name)`, replace if present (carrying the existing `resourceVersion`
//! into the new body), create if absent, propagate any other error. This deliberately does not
//! follow server-side apply; see `DESIGN.md` for why.

use crate::error::{Error, Result};

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, trace};

use fleetop_k8s_util::types::short_type_name;

/// Retry budget for a transport-level `ApiUnavailable` failure: 5 attempts, 1s doubling to 16s,
/// per spec.md §7's "retry with exponential backoff up to a bounded budget". Anything else
/// (`Conflict`, `ConfigInvalid`, ...) is not retried here.
fn api_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(16))
        .with_max_times(5)
}

/// Custom resource kinds addressed by a pre-registered `(group, version, plural)` triple,
/// rather than a string lookup at every call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomKind {
    ScaledObject,
    ServiceMonitor,
    VirtualService,
    Gateway,
    Package,
    Environment,
    Function,
    TriggerAuthentication,
}

impl CustomKind {
    /// Matches the declared `kind`. `None` for anything outside the closed custom-resource set.
    pub fn from_kind(kind: &str) -> Option<Self> {
        Some(match kind {
            "ScaledObject" => Self::ScaledObject,
            "ServiceMonitor" => Self::ServiceMonitor,
            "VirtualService" => Self::VirtualService,
            "Gateway" => Self::Gateway,
            "Package" => Self::Package,
            "Environment" => Self::Environment,
            "Function" => Self::Function,
            "TriggerAuthentication" => Self::TriggerAuthentication,
            _ => return None,
        })
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Self::ScaledObject => "scaledobjects",
            Self::ServiceMonitor => "servicemonitors",
            Self::VirtualService => "virtualservices",
            Self::Gateway => "gateways",
            Self::Package => "packages",
            Self::Environment => "environments",
            Self::Function => "functions",
            Self::TriggerAuthentication => "triggerauthentications",
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ScaledObject => "ScaledObject",
            Self::ServiceMonitor => "ServiceMonitor",
            Self::VirtualService => "VirtualService",
            Self::Gateway => "Gateway",
            Self::Package => "Package",
            Self::Environment => "Environment",
            Self::Function => "Function",
            Self::TriggerAuthentication => "TriggerAuthentication",
        }
    }

    /// The `(group, version)` this kind is registered under. Used by orphan cleanup, which
    /// only has a kind name to go on (no live instance whose `apiVersion` could be read).
    pub fn group_version(&self) -> (&'static str, &'static str) {
        match self {
            Self::ScaledObject => ("keda.sh", "v1alpha1"),
            Self::ServiceMonitor => ("monitoring.coreos.com", "v1"),
            Self::VirtualService => ("networking.istio.io", "v1beta1"),
            Self::Gateway => ("networking.istio.io", "v1beta1"),
            Self::Package => ("openfaas.com", "v1"),
            Self::Environment => ("openfaas.com", "v1"),
            Self::Function => ("openfaas.com", "v1"),
            Self::TriggerAuthentication => ("keda.sh", "v1alpha1"),
        }
    }

    /// Build the `ApiResource` this kind is addressed through, without needing a live instance.
    pub fn api_resource(&self) -> ApiResource {
        let (group, version) = self.group_version();
        let gvk = GroupVersionKind::gvk(group, version, self.kind_name());
        let mut resource = ApiResource::from_gvk(&gvk);
        resource.plural = self.plural().to_string();
        resource
    }
}

/// `apiVersion` must be `<group>/<version>`; core-group (no slash) custom resources don't occur
/// in the closed set this engine knows about.
fn parse_group_version(api_version: &str) -> Result<(String, String)> {
    let mut parts = api_version.splitn(2, '/');
    let group = parts.next().filter(|s| !s.is_empty());
    let version = parts.next().filter(|s| !s.is_empty());
    match (group, version) {
        (Some(g), Some(v)) => Ok((g.to_string(), v.to_string())),
        _ => Err(Error::ConfigInvalid {
            field: "apiVersion".to_string(),
            message: format!("expected <group>/<version>, got {api_version:?}"),
        }),
    }
}

/// Apply a typed, strongly-kinded object (`Deployment`, `Service`,
/// `HorizontalPodAutoscaler`, `ServiceAccount`, `Secret`, `ConfigMap`, `Role`, `RoleBinding`).
#[instrument(skip(client, obj), fields(kind = short_type_name::<K>().unwrap_or("Unknown"), name = %obj.name_any()))]
pub async fn apply<K>(client: &Client, namespace: &str, obj: K) -> Result<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Serialize
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    let name = obj.name_any();
    let api = Api::<K>::namespaced(client.clone(), namespace);

    (|| async {
        match replace_or_create(&api, &name, obj.clone()).await {
            Err(Error::Conflict(_)) => {
                trace!(msg = "conflicting update, re-reading and retrying once");
                replace_or_create(&api, &name, obj.clone()).await
            }
            other => other,
        }
    })
    .retry(api_backoff())
    .when(|e| matches!(e, Error::ApiUnavailable(_)))
    .await
}

/// `get` then `replace`-carrying-`resourceVersion`, or `create` on 404. A 409 on `replace` is
/// reported as [`Error::Conflict`] so the caller can retry once, per the optimistic-concurrency
/// propagation policy.
async fn replace_or_create<K>(api: &Api<K>, name: &str, obj: K) -> Result<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Serialize
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    match api.get(name).await {
        Ok(existing) => {
            let mut obj = obj;
            obj.meta_mut().resource_version = existing.resource_version();
            trace!(msg = "replacing existing object");
            api.replace(name, &PostParams::default(), &obj)
                .await
                .map_err(|e| conflict_or(name, e))
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            info!(msg = "object absent, creating");
            api.create(&PostParams::default(), &obj)
                .await
                .map_err(Error::from)
        }
        Err(e) => Err(e.into()),
    }
}

fn conflict_or(name: &str, e: kube::Error) -> Error {
    match &e {
        kube::Error::Api(ae) if ae.code == 409 => Error::Conflict(name.to_string()),
        _ => e.into(),
    }
}

/// Apply a custom-resource object addressed by `(group, version, plural)`, derived from its own
/// `apiVersion`/`kind`. The existing `resourceVersion` is copied into the replacement body.
#[instrument(skip(client, obj), fields(name = %obj.name_any()))]
pub async fn apply_custom(
    client: &Client,
    namespace: &str,
    obj: DynamicObject,
) -> Result<DynamicObject> {
    let types = obj.types.clone().ok_or_else(|| Error::ConfigInvalid {
        field: "apiVersion/kind".to_string(),
        message: "custom object is missing type metadata".to_string(),
    })?;
    let kind = CustomKind::from_kind(&types.kind).ok_or_else(|| Error::ConfigInvalid {
        field: "kind".to_string(),
        message: format!("{} is not a recognized custom kind", types.kind),
    })?;
    let (group, version) = parse_group_version(&types.api_version)?;
    if (group.as_str(), version.as_str()) != kind.group_version() {
        let (expected_group, expected_version) = kind.group_version();
        return Err(Error::ConfigInvalid {
            field: "apiVersion".to_string(),
            message: format!(
                "{} expects apiVersion {expected_group}/{expected_version}, got {}",
                types.kind, types.api_version
            ),
        });
    }

    let resource = kind.api_resource();
    let name = obj.name_any();
    let api = Api::<DynamicObject>::namespaced_with(client.clone(), namespace, &resource);

    (|| async {
        match replace_or_create_custom(&api, &name, obj.clone()).await {
            Err(Error::Conflict(_)) => {
                trace!(msg = "conflicting update on custom object, re-reading and retrying once");
                replace_or_create_custom(&api, &name, obj.clone()).await
            }
            other => other,
        }
    })
    .retry(api_backoff())
    .when(|e| matches!(e, Error::ApiUnavailable(_)))
    .await
}

async fn replace_or_create_custom(
    api: &Api<DynamicObject>,
    name: &str,
    obj: DynamicObject,
) -> Result<DynamicObject> {
    match api.get(name).await {
        Ok(existing) => {
            let mut obj = obj;
            obj.metadata.resource_version = existing.metadata.resource_version.clone();
            trace!(msg = "replacing existing custom object");
            api.replace(name, &PostParams::default(), &obj)
                .await
                .map_err(|e| conflict_or(name, e))
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            info!(msg = "custom object absent, creating");
            api.create(&PostParams::default(), &obj)
                .await
                .map_err(Error::from)
        }
        Err(e) => Err(e.into()),
    }
}

/// `foreground` propagation, 30s grace, matching the reconcile algorithm's orphan-cleanup step.
pub fn orphan_delete_params() -> kube::api::DeleteParams {
    kube::api::DeleteParams {
        propagation_policy: Some(kube::api::PropagationPolicy::Foreground),
        grace_period_seconds: Some(30),
        ..Default::default()
    }
}

/// Delete a typed, namespaced object by name, swallowing 404 (missing subresources are
/// best-effort-ignored per the reconcile algorithm).
#[instrument(skip(client, dp), fields(kind = short_type_name::<K>().unwrap_or("Unknown"), name))]
pub async fn delete_best_effort<K>(
    client: &Client,
    namespace: &str,
    name: &str,
    dp: &kube::api::DeleteParams,
) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    let api = Api::<K>::namespaced(client.clone(), namespace);
    (|| async {
        match api.delete(name, dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    })
    .retry(api_backoff())
    .when(|e| matches!(e, Error::ApiUnavailable(_)))
    .await
}

/// Delete a custom-resource object by name, swallowing 404.
#[instrument(skip(client, dp), fields(kind = kind.kind_name(), name))]
pub async fn delete_custom_best_effort(
    client: &Client,
    namespace: &str,
    kind: CustomKind,
    name: &str,
    dp: &kube::api::DeleteParams,
) -> Result<()> {
    let api = Api::<DynamicObject>::namespaced_with(client.clone(), namespace, &kind.api_resource());
    (|| async {
        match api.delete(name, dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    })
    .retry(api_backoff())
    .when(|e| matches!(e, Error::ApiUnavailable(_)))
    .await
}

/// Delete every `Deployment` carrying `label_selector` in one call. A group reused across
/// reconciles can own more than one Deployment (the mixed-capacity baseline/auto-scale pair),
/// so orphan cleanup targets them by label rather than by a single guessed name.
#[instrument(skip(client))]
pub async fn delete_deployments_by_label(
    client: &Client,
    namespace: &str,
    label_selector: &str,
    dp: &kube::api::DeleteParams,
) -> Result<()> {
    let api: Api<k8s_openapi::api::apps::v1::Deployment> = Api::namespaced(client.clone(), namespace);
    let lp = kube::api::ListParams::default().labels(label_selector);
    (|| async { api.delete_collection(dp, &lp).await.map_err(Error::from) })
        .retry(api_backoff())
        .when(|e| matches!(e, Error::ApiUnavailable(_)))
        .await?;
    Ok(())
}
