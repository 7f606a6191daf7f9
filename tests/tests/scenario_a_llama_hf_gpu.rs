mod common;

use common::{hf_live_model, llama_cpp_group};

use fleetop_runtime_planner::{ModelLocation, plan_for, resolve_model_location};
use fleetop_workload::WorkloadContext;
use fleetop_workload::builder::build_pod_template;

/// A GPU llama.cpp group fetching its model live from HuggingFace (no model store staging)
/// resolves to a `ModelLocation::HuggingFace`, plans a `--model` launch command against it,
/// and the resulting pod template carries a GPU resource request and no init container.
#[test]
fn llama_cpp_hf_live_gpu_plans_and_builds() {
    let model = hf_live_model("TheBloke/Llama-2-7B-GGUF");
    let group = llama_cpp_group("chat-gpu", true, model.clone());

    let location = resolve_model_location("chat-gpu", &model, &[], &[".gguf"]).unwrap();
    assert_eq!(
        location,
        ModelLocation::HuggingFace {
            repo: "TheBloke/Llama-2-7B-GGUF".to_string(),
            file: "model.gguf".to_string(),
        }
    );

    let plan = plan_for(&group, &location, 8080);
    assert!(plan.command.iter().any(|arg| arg == "--port"));

    let ctx = WorkloadContext {
        namespace: "default".to_string(),
        bucket: "models-bucket".to_string(),
    };
    let template = build_pod_template(&ctx, &group, &plan, 8080);
    let spec = template.spec.unwrap();
    assert!(spec.init_containers.is_none());

    let container = &spec.containers[0];
    let limits = container.resources.clone().unwrap().limits.unwrap();
    assert_eq!(
        limits.get("nvidia.com/gpu").unwrap().0,
        "1".to_string()
    );
}
