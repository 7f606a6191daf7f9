use crate::model_location::{ModelLocation, command_references_model};

use fleetop_model_config::ModelGroupKind;

/// Build the launch command for a vLLM server container.
pub fn build_command(group: &ModelGroupKind, location: &ModelLocation) -> Vec<String> {
    let user_command = &group.runtime().command;
    if !user_command.is_empty() {
        if command_references_model(user_command) {
            return user_command.clone();
        }
        let mut command = user_command.clone();
        attach_model(&mut command, location);
        return command;
    }

    let mut command = vec![
        "python3".to_string(),
        "-O".to_string(),
        "-u".to_string(),
        "-m".to_string(),
        "vllm.entrypoints.api_server".to_string(),
        "--host".to_string(),
        "0.0.0.0".to_string(),
    ];

    if group.gpu() {
        let resolved = fleetop_model_config::resolve_resources(group.node_type(), group.resource_request());
        if resolved.gpu_count > 1 {
            command.push("--tensor-parallel-size".to_string());
            command.push(resolved.gpu_count.to_string());
        }
    }

    attach_model(&mut command, location);
    command
}

fn attach_model(command: &mut Vec<String>, location: &ModelLocation) {
    let model_ref = match location {
        ModelLocation::Store { path } => {
            let filename = path.rsplit('/').next().unwrap_or(path);
            format!("/data/{filename}")
        }
        ModelLocation::HuggingFace { repo, .. } => repo.clone(),
    };
    command.push("--model".to_string());
    command.push(model_ref);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetop_model_config::{Model, ModelGroup, ResourceRequest, RuntimeSpec};

    fn group(gpu_count: Option<u32>) -> ModelGroupKind {
        ModelGroupKind::Uniform(ModelGroup {
            name: "g1".to_string(),
            node_type: "n1".to_string(),
            min_instances: 1,
            max_instances: 1,
            gpu: gpu_count.is_some(),
            resource_request: ResourceRequest {
                gpu: gpu_count,
                ..Default::default()
            },
            model: Model {
                hf_repo_id: Some("org/repo".to_string()),
                urls: None,
                files: vec!["*".to_string()],
                use_model_store: false,
            },
            runtime: RuntimeSpec {
                image: "vllm/vllm-openai:latest".to_string(),
                command: vec![],
                env: vec![],
            },
            auto_scale_triggers: vec![],
            is_public: false,
        })
    }

    fn group_with_command(command: Vec<String>) -> ModelGroupKind {
        let mut g = group(None);
        if let ModelGroupKind::Uniform(ref mut g) = g {
            g.runtime.command = command;
        }
        g
    }

    #[test]
    fn user_command_without_model_reference_still_gets_model_attached() {
        let g = group_with_command(vec!["python3".to_string(), "-O".to_string()]);
        let loc = ModelLocation::HuggingFace {
            repo: "org/repo".to_string(),
            file: "model.bin".to_string(),
        };
        let cmd = build_command(&g, &loc);
        let pos = cmd.iter().position(|s| s == "--model").unwrap();
        assert_eq!(cmd[pos + 1], "org/repo");
    }

    #[test]
    fn user_command_with_model_flag_is_returned_unchanged() {
        let g = group_with_command(vec![
            "python3".to_string(),
            "-m".to_string(),
            "/custom/model".to_string(),
        ]);
        let loc = ModelLocation::HuggingFace {
            repo: "org/repo".to_string(),
            file: "model.bin".to_string(),
        };
        let cmd = build_command(&g, &loc);
        assert_eq!(
            cmd,
            vec![
                "python3".to_string(),
                "-m".to_string(),
                "/custom/model".to_string(),
            ]
        );
    }

    #[test]
    fn adds_tensor_parallel_for_multi_gpu() {
        let g = group(Some(2));
        let loc = ModelLocation::HuggingFace {
            repo: "org/repo".to_string(),
            file: "model.bin".to_string(),
        };
        let cmd = build_command(&g, &loc);
        assert!(cmd.contains(&"--tensor-parallel-size".to_string()));
    }

    #[test]
    fn omits_tensor_parallel_for_single_gpu() {
        let g = group(Some(1));
        let loc = ModelLocation::HuggingFace {
            repo: "org/repo".to_string(),
            file: "model.bin".to_string(),
        };
        let cmd = build_command(&g, &loc);
        assert!(!cmd.contains(&"--tensor-parallel-size".to_string()));
    }
}
