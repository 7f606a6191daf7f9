use crate::family::RuntimeFamily;
use crate::model_location::ModelLocation;
use crate::{llama_cpp, vllm};

use fleetop_model_config::ModelGroupKind;

/// The fully-resolved description of how to launch a model group's container: the seam
/// between the Runtime Planner and the Workload Builder.
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchPlan {
    pub command: Vec<String>,
    pub mount_path: String,
    pub readiness_path: String,
    pub liveness_path: String,
}

/// Produce a [`LaunchPlan`] for `group` listening on `port`, given where its model lives.
///
/// A custom `runtime.command` in the group always wins: it is taken as-is except for port
/// injection, matching the original's "respect an operator-supplied command, just make sure
/// it binds the port we expose" contract.
pub fn plan_for(group: &ModelGroupKind, location: &ModelLocation, port: u16) -> LaunchPlan {
    let family = RuntimeFamily::classify(&group.runtime().image);
    let mut command = match family {
        RuntimeFamily::LlamaCpp => llama_cpp::build_command(group, location),
        RuntimeFamily::Vllm => vllm::build_command(group, location),
        RuntimeFamily::Unknown => group.runtime().command.clone(),
    };
    inject_port(&mut command, port);

    LaunchPlan {
        command,
        mount_path: "/data".to_string(),
        readiness_path: "/health".to_string(),
        liveness_path: "/health".to_string(),
    }
}

/// Ensure `--port <port>` (or `-p <port>`) appears in `command`, replacing an existing value
/// rather than appending a second flag.
pub(crate) fn inject_port(command: &mut Vec<String>, port: u16) {
    for i in 0..command.len() {
        if (command[i] == "--port" || command[i] == "-p") && i + 1 < command.len() {
            command[i + 1] = port.to_string();
            return;
        }
    }
    command.push("--port".to_string());
    command.push(port.to_string());
}
