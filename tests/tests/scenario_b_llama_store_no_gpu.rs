mod common;

use common::{llama_cpp_group, store_backed_model};

use fleetop_runtime_planner::{ModelLocation, plan_for, resolve_model_location};
use fleetop_workload::WorkloadContext;
use fleetop_workload::builder::{build_deployment, build_pod_template};

/// A non-GPU llama.cpp group staged through the model store resolves its single `.gguf`
/// candidate, and the built pod template carries the `init-model-store` init container that
/// pulls the staged files in before the runtime starts.
#[test]
fn llama_cpp_store_backed_no_gpu_plans_and_builds() {
    let model = store_backed_model(&["*"]);
    let group = llama_cpp_group("chat-cpu", false, model.clone());

    let staged = vec![
        "chat-cpu/model.gguf".to_string(),
        "chat-cpu/README.md".to_string(),
    ];
    let location = resolve_model_location("chat-cpu", &model, &staged, &[".gguf", ".ggml"]).unwrap();
    assert_eq!(
        location,
        ModelLocation::Store {
            path: "chat-cpu/model.gguf".to_string(),
        }
    );

    let plan = plan_for(&group, &location, 8080);
    assert!(plan.command.contains(&"/data/model.gguf".to_string()));
    assert!(!plan.command.contains(&"--n-gpu-layers".to_string()));

    let ctx = WorkloadContext {
        namespace: "default".to_string(),
        bucket: "models-bucket".to_string(),
    };
    let template = build_pod_template(&ctx, &group, &plan, 8080);
    assert!(template.spec.unwrap().init_containers.is_some());

    let deployment = build_deployment(&ctx, &group, &plan, 8080, "chat-cpu", 1);
    assert_eq!(deployment.spec.unwrap().replicas, Some(1));
}
