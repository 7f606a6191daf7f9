use crate::error::{Error, Result};

use fleetop_model_config::Model;

/// Where the runtime container should get its model bytes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelLocation {
    /// Already staged into the model store and mounted locally by the init container.
    Store { path: String },
    /// Fetched live by the runtime process itself from a HuggingFace repo.
    HuggingFace { repo: String, file: String },
}

/// True when `command` already references a model location: `--model`/`-m <path>`, both
/// `--hf-repo` and `--hf-file`, or `--model-url`/`-mu <url>`. Per spec.md §4.3 "user knows
/// best" — a command that passes this check is used unchanged; one that doesn't still gets a
/// model location appended.
pub fn command_references_model(command: &[String]) -> bool {
    let has_flag = |flags: &[&str]| command.iter().any(|a| flags.contains(&a.as_str()));
    if has_flag(&["--model", "-m"]) {
        return true;
    }
    if has_flag(&["--hf-repo"]) && has_flag(&["--hf-file"]) {
        return true;
    }
    has_flag(&["--model-url", "-mu"])
}

/// Resolve where a group's model lives, given the files the model store glob reports for it
/// (when `useModelStore` is set) and the configured source otherwise.
///
/// More than one candidate is an error (`AmbiguousArtifact`) rather than an arbitrary pick,
/// reproducing `get_model_file_from_model_store`'s behavior.
pub fn resolve_model_location(
    group: &str,
    model: &Model,
    staged_files: &[String],
    extension_hints: &[&str],
) -> Result<ModelLocation> {
    if model.use_model_store {
        // The weights extension filter always runs first, regardless of `model.files` — a
        // narrower pattern still leaves stray non-weights files (e.g. config.json) staged
        // alongside the real artifact. Only when it matches nothing do we fall back to every
        // staged file, so a group whose weights use an unlisted extension still resolves.
        let filtered: Vec<&String> = staged_files
            .iter()
            .filter(|f| extension_hints.iter().any(|ext| f.ends_with(ext)))
            .collect();
        let candidates: Vec<&String> = if filtered.is_empty() {
            staged_files.iter().collect()
        } else {
            filtered
        };

        return match candidates.len() {
            0 => Err(Error::NoModelResolvable {
                group: group.to_string(),
            }),
            1 => Ok(ModelLocation::Store {
                path: candidates[0].clone(),
            }),
            _ => Err(Error::AmbiguousArtifact {
                group: group.to_string(),
                candidates: candidates.into_iter().cloned().collect(),
            }),
        };
    }

    match &model.hf_repo_id {
        Some(repo) => {
            let file = model
                .files
                .iter()
                .find(|f| *f != "*")
                .cloned()
                .unwrap_or_else(|| "*".to_string());
            Ok(ModelLocation::HuggingFace {
                repo: repo.clone(),
                file,
            })
        }
        None => Err(Error::NoModelResolvable {
            group: group.to_string(),
        }),
    }
}
