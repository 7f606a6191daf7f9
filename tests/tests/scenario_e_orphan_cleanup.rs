//! Orphan cleanup driven end-to-end through `reconcile()` against a mocked API server: the
//! live set is `{g1, g2}`, the declared set is `{g1, g3}`, and a `tower_test::mock` pair
//! asserts the exact sequence of requests the controller issues — g2's Deployment/Service/
//! ServiceMonitor/ScaledObject get deleted, while g1 and g3 get their object graphs applied.

mod common;

use common::{hf_live_model, llama_cpp_group};

use std::sync::Arc;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use http::{Request, Response};
use fleetop_controller::{ClusterContext, ControllerMetrics, reconcile};
use fleetop_model_config::ClusterConfig;
use fleetop_model_store::S3ModelStore;
use kube::{Client, client::Body};

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

struct ApiServerVerifier(ApiServerHandle);

fn dummy_s3_client() -> aws_sdk_s3::Client {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .build();
    aws_sdk_s3::Client::from_conf(config)
}

fn test_context() -> (ClusterContext, ApiServerVerifier) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let client = Client::new(mock_service, "default");
    let store = S3ModelStore::new(dummy_s3_client(), "models-bucket");
    let ctx = ClusterContext::new(
        "default".to_string(),
        "models-bucket".to_string(),
        client,
        store,
        Arc::new(ControllerMetrics::new()),
    );
    (ctx, ApiServerVerifier(handle))
}

/// Declares `{g1, g3}`; paired with a live Service set of `{g1, g2}`, g2 is the orphan.
fn declared_config() -> ClusterConfig {
    let g1 = llama_cpp_group("g1", false, hf_live_model("org/g1-model"));
    let g3 = llama_cpp_group("g3", false, hf_live_model("org/g3-model"));
    ClusterConfig {
        namespace: "default".to_string(),
        bucket_name: "models-bucket".to_string(),
        registry_url: None,
        log_retention_days: None,
        model_groups: vec![g1, g3],
        mixed_model_groups: vec![],
        vector_store: None,
        job: None,
        prometheus: None,
        tracing: None,
    }
}

async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario completed");
}

/// Full pass: the live Service set `{g1, g2}` diffed against the declared `{g1, g3}` deletes
/// every g2 object and leaves g1/g3 applied, exercising `reconcile()` itself rather than
/// calling `apply::delete_best_effort` directly with a hardcoded name.
#[tokio::test]
async fn orphaned_group_is_deleted_while_declared_groups_are_applied() {
    let (ctx, fakeserver) = test_context();
    let config = declared_config();

    let mocksrv = fakeserver.run();
    let report = reconcile(&ctx, &config).await;
    timeout_after_1s(mocksrv).await;

    assert!(report.is_success(), "reconcile failed: {:?}", report.failed);
    assert_eq!(report.orphans_deleted, 1);
    assert_eq!(report.succeeded, vec!["g1".to_string(), "g3".to_string()]);
}

impl ApiServerVerifier {
    fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.handle_live_set_list(&["g1", "g2"])
                .await
                .unwrap()
                // orphan cleanup for g2, in the order `delete_orphan` issues them
                .handle_delete("deployments", "")
                .await
                .unwrap()
                .handle_delete("services", "g2")
                .await
                .unwrap()
                .handle_delete("servicemonitors", "g2")
                .await
                .unwrap()
                .handle_delete("scaledobjects", "g2")
                .await
                .unwrap()
                // declared group g1: deployment, service, hpa
                .handle_apply_create("deployments", "g1")
                .await
                .unwrap()
                .handle_apply_create("services", "g1")
                .await
                .unwrap()
                .handle_apply_create("horizontalpodautoscalers", "g1")
                .await
                .unwrap()
                // declared group g3: deployment, service, hpa
                .handle_apply_create("deployments", "g3")
                .await
                .unwrap()
                .handle_apply_create("services", "g3")
                .await
                .unwrap()
                .handle_apply_create("horizontalpodautoscalers", "g3")
                .await
                .expect("scenario completed without errors");
        })
    }

    /// The live-set LIST: returns one Service per `names`, each carrying the `model` label
    /// `live_group_names` reads off to build the live set.
    async fn handle_live_set_list(mut self, names: &[&str]) -> Result<Self, Box<dyn std::error::Error>> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert!(request.uri().to_string().contains("/services"));

        let items: Vec<serde_json::Value> = names
            .iter()
            .map(|n| {
                serde_json::json!({
                    "metadata": {
                        "name": n,
                        "namespace": "default",
                        "labels": {"app": "model-group", "model": n},
                    },
                    "spec": {},
                })
            })
            .collect();
        let body = serde_json::to_vec(&serde_json::json!({
            "metadata": {},
            "items": items,
        }))
        .unwrap();
        send.send_response(Response::builder().status(200).body(Body::from(body)).unwrap());
        Ok(self)
    }

    /// A DELETE — either the collection delete `delete_deployments_by_label` issues (empty
    /// `name`) or the single-object delete `delete_best_effort`/`delete_custom_best_effort`
    /// issue. Either way the orphan pipeline treats the response as best-effort.
    async fn handle_delete(mut self, plural: &str, name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::DELETE);
        let uri = request.uri().to_string();
        assert!(uri.contains(plural), "unexpected uri: {uri}");
        if !name.is_empty() {
            assert!(uri.contains(name), "unexpected uri: {uri}");
        }
        let body = serde_json::to_vec(&serde_json::json!({"metadata": {}, "items": []})).unwrap();
        send.send_response(Response::builder().status(200).body(Body::from(body)).unwrap());
        Ok(self)
    }

    /// `apply::apply`/`apply::apply_custom`: a GET that comes back 404 (object absent),
    /// followed by the POST create every `apply` falls back to on a missing object.
    async fn handle_apply_create(mut self, plural: &str, name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (get_request, get_send) = self.0.next_request().await.expect("service not called");
        assert_eq!(get_request.method(), http::Method::GET);
        let get_uri = get_request.uri().to_string();
        assert!(get_uri.contains(plural) && get_uri.contains(name), "unexpected uri: {get_uri}");
        let not_found = serde_json::to_vec(&serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "reason": "NotFound",
            "code": 404,
        }))
        .unwrap();
        get_send.send_response(
            Response::builder()
                .status(404)
                .body(Body::from(not_found))
                .unwrap(),
        );

        let (post_request, post_send) = self.0.next_request().await.expect("service not called");
        assert_eq!(post_request.method(), http::Method::POST);
        let post_uri = post_request.uri().to_string();
        assert!(post_uri.contains(plural), "unexpected uri: {post_uri}");
        let response = serde_json::to_vec(&serde_json::json!({
            "metadata": {"name": name, "namespace": "default"},
        }))
        .unwrap();
        post_send.send_response(Response::builder().status(201).body(Body::from(response)).unwrap());
        Ok(self)
    }
}
