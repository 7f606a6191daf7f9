use crate::model_location::{ModelLocation, command_references_model};

use fleetop_model_config::ModelGroupKind;

const MOUNT_PATH: &str = "/data";

/// Build the launch command for a llama.cpp server container. Reproduces the original
/// defaults exactly: context 4096, batch/ubatch 512, single parallel slot, continuous
/// batching, embeddings, flash-attention, and metrics all on.
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
        "/server".to_string(),
        "--host".to_string(),
        "0.0.0.0".to_string(),
        "--parallel".to_string(),
        "1".to_string(),
        "--cont-batching".to_string(),
        "--ctx-size".to_string(),
        "4096".to_string(),
        "--batch-size".to_string(),
        "512".to_string(),
        "--ubatch-size".to_string(),
        "512".to_string(),
        "--n-predict".to_string(),
        "-1".to_string(),
        "--embedding".to_string(),
        "--flash-attn".to_string(),
        "--metrics".to_string(),
    ];

    if group.gpu() {
        command.push("--n-gpu-layers".to_string());
        command.push("999".to_string());
    }

    attach_model(&mut command, location);
    command
}

fn attach_model(command: &mut Vec<String>, location: &ModelLocation) {
    match location {
        ModelLocation::Store { path } => {
            let filename = path.rsplit('/').next().unwrap_or(path);
            command.push("--model".to_string());
            command.push(format!("{MOUNT_PATH}/{filename}"));
        }
        ModelLocation::HuggingFace { repo, file } => {
            command.push("--hf-repo".to_string());
            command.push(repo.clone());
            command.push("--hf-file".to_string());
            command.push(file.clone());
            command.push("--model".to_string());
            command.push(file.clone());
        }
    }
}
