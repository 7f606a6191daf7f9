use fleetop_model_config::{
    AutoScaleTrigger, MixedModelGroup, Model, ModelGroup, ModelGroupKind, ResourceRequest,
    RuntimeSpec, SpotPool,
};

pub fn llama_cpp_group(name: &str, gpu: bool, model: Model) -> ModelGroupKind {
    ModelGroupKind::Uniform(ModelGroup {
        name: name.to_string(),
        node_type: "gpu-node".to_string(),
        min_instances: 1,
        max_instances: 4,
        gpu,
        resource_request: ResourceRequest {
            cpu: Some(2000),
            memory: Some(8192),
            gpu: gpu.then_some(1),
        },
        model,
        runtime: RuntimeSpec {
            image: "ghcr.io/ggerganov/llama.cpp:server".to_string(),
            command: vec![],
            env: vec![],
        },
        auto_scale_triggers: Vec::<AutoScaleTrigger>::new(),
        is_public: false,
    })
}

pub fn hf_live_model(repo: &str) -> Model {
    Model {
        hf_repo_id: Some(repo.to_string()),
        urls: None,
        files: vec!["model.gguf".to_string()],
        use_model_store: false,
    }
}

pub fn store_backed_model(patterns: &[&str]) -> Model {
    Model {
        hf_repo_id: None,
        urls: Some(vec!["https://example.com/model.gguf".to_string()]),
        files: patterns.iter().map(|s| s.to_string()).collect(),
        use_model_store: true,
    }
}

pub fn mixed_group(name: &str) -> MixedModelGroup {
    MixedModelGroup {
        name: name.to_string(),
        node_type: "gpu-node".to_string(),
        base_instances: 1,
        max_on_demand_instances: 2,
        spot: SpotPool {
            min_instances: 0,
            max_instances: 6,
        },
        gpu: true,
        resource_request: ResourceRequest {
            cpu: Some(4000),
            memory: Some(16384),
            gpu: Some(1),
        },
        model: store_backed_model(&["*.gguf"]),
        runtime: RuntimeSpec {
            image: "ghcr.io/ggerganov/llama.cpp:server".to_string(),
            command: vec![],
            env: vec![],
        },
        auto_scale_triggers: Vec::<AutoScaleTrigger>::new(),
        is_public: false,
    }
}
