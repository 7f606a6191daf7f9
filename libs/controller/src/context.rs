use crate::metrics::ControllerMetrics;

use std::sync::Arc;

use fleetop_k8s_util::events::Recorder;
use fleetop_model_store::S3ModelStore;
use kube::Client;

/// Cluster-wide facts and shared handles the Lifecycle Controller needs to reconcile a
/// `ClusterConfig` document. Built once per `cmd/reconcile` invocation and passed down by
/// reference; nothing here stores a back-reference to a reconciled object, matching the
/// teacher's `Context<K>` discipline of passing explicit dependencies rather than capturing
/// callbacks.
#[derive(Clone)]
pub struct ClusterContext {
    pub namespace: String,
    pub bucket: String,
    pub client: Client,
    pub store: S3ModelStore,
    pub metrics: Arc<ControllerMetrics>,
    pub recorder: Recorder,
}

impl ClusterContext {
    pub fn new(
        namespace: String,
        bucket: String,
        client: Client,
        store: S3ModelStore,
        metrics: Arc<ControllerMetrics>,
    ) -> Self {
        let recorder = Recorder::new(client.clone(), "fleetop-reconcile".into());
        Self {
            namespace,
            bucket,
            client,
            store,
            metrics,
            recorder,
        }
    }
}
