use crate::error::{Error, Result};
use crate::group::{ClusterConfig, ModelGroupKind};

use std::collections::HashSet;

/// Validate a fully-parsed configuration document.
///
/// Mirrors `paka.config`'s field- and model-level pydantic validators: cpu/memory shape,
/// min/max ordering, duplicate-name detection, and "exactly one model source" per group.
pub fn validate_cluster_config(config: &ClusterConfig) -> Result<()> {
    if config.namespace.trim().is_empty() {
        return Err(Error::ConfigInvalid {
            field: "namespace".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if config.bucket_name.trim().is_empty() {
        return Err(Error::ConfigInvalid {
            field: "bucketName".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for group in config.declared_groups() {
        if !seen.insert(group.name().to_string()) {
            return Err(Error::ConfigInvalid {
                field: "modelGroups[].name".to_string(),
                message: format!("duplicate model group name {:?}", group.name()),
            });
        }
        validate_group(&group)?;
    }
    Ok(())
}

fn validate_group(group: &ModelGroupKind) -> Result<()> {
    let name = group.name();
    validate_name_format(name)?;
    validate_model_source(name, group.model())?;

    match group {
        ModelGroupKind::Uniform(g) => {
            if g.min_instances == 0 {
                return Err(Error::ConfigInvalid {
                    field: format!("{name}.minInstances"),
                    message: "must be greater than zero".to_string(),
                });
            }
            if g.max_instances < g.min_instances {
                return Err(Error::ConfigInvalid {
                    field: format!("{name}.maxInstances"),
                    message: "must be >= minInstances".to_string(),
                });
            }
        }
        ModelGroupKind::Mixed(g) => {
            if g.spot.max_instances < g.spot.min_instances {
                return Err(Error::ConfigInvalid {
                    field: format!("{name}.spot.maxInstances"),
                    message: "must be >= spot.minInstances".to_string(),
                });
            }
            if g.max_on_demand_instances < g.base_instances {
                return Err(Error::ConfigInvalid {
                    field: format!("{name}.maxOnDemandInstances"),
                    message: "must be >= baseInstances".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// `name` must match `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$` and be at most 63 characters (spec.md §3).
/// Hand-rolled rather than pulled in via a regex crate, same as `parse_cpu_millis` below.
fn validate_name_format(name: &str) -> Result<()> {
    let first_ok = name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let last_ok = name.chars().next_back().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let body_ok = name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !name.is_empty() && name.len() <= 63 && first_ok && last_ok && body_ok {
        return Ok(());
    }
    Err(Error::ConfigInvalid {
        field: "modelGroups[].name".to_string(),
        message: format!(
            "{name:?} must match ^[a-z0-9]([-a-z0-9]*[a-z0-9])?$ and be at most 63 characters"
        ),
    })
}

/// A group's `model` section resolves to exactly one artifact location: a pre-staged model
/// store prefix (`useModelStore` with neither source set), a source the stager populates the
/// store from (`useModelStore` plus `hfRepoId` or `urls`), or a HuggingFace repo the runtime
/// fetches live (`hfRepoId` without `useModelStore`). `urls` without `useModelStore` has
/// nowhere to land — the runtime planner only knows how to pass through a HuggingFace repo for
/// a live fetch — so that combination is rejected here rather than failing later at plan time.
fn validate_model_source(group_name: &str, model: &crate::group::Model) -> Result<()> {
    if model.files.is_empty() {
        return Err(Error::ConfigInvalid {
            field: format!("{group_name}.model.files"),
            message: "must be non-empty".to_string(),
        });
    }

    let has_hf = model.hf_repo_id.as_ref().is_some_and(|s| !s.is_empty());
    let has_urls = model.urls.as_ref().is_some_and(|u| !u.is_empty());

    if let Some(repo_id) = model.hf_repo_id.as_deref().filter(|s| !s.is_empty()) {
        if !is_valid_hf_repo_id(repo_id) {
            return Err(Error::ConfigInvalid {
                field: format!("{group_name}.model.hfRepoId"),
                message: format!("{repo_id:?} must match ^[\\w\\-.]+/[\\w\\-.]+$"),
            });
        }
    }

    if has_hf && has_urls {
        return Err(Error::ConfigInvalid {
            field: format!("{group_name}.model"),
            message: "exactly one of hfRepoId or urls must be set, not both".to_string(),
        });
    }
    if !model.use_model_store && !has_hf {
        return Err(Error::ConfigInvalid {
            field: format!("{group_name}.model"),
            message: "hfRepoId must be set for a live (non-store) fetch".to_string(),
        });
    }
    Ok(())
}

/// `repo_id` must match `^[\w\-.]+/[\w\-.]+$` (spec.md §4.2): exactly one `/` separating two
/// non-empty segments of word characters, dashes, and dots. Hand-rolled, same as
/// `validate_name_format` above.
fn is_valid_hf_repo_id(repo_id: &str) -> bool {
    let is_segment_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.';
    match repo_id.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && owner.chars().all(is_segment_char)
                && name.chars().all(is_segment_char)
        }
        None => false,
    }
}

/// Parse a CPU quantity of the shape `^\d+(m)?$` into millicores.
pub fn parse_cpu_millis(raw: &str) -> Result<u32> {
    let (digits, has_m) = match raw.strip_suffix('m') {
        Some(d) => (d, true),
        None => (raw, false),
    };
    let value: u32 = digits.parse().map_err(|_| Error::ConfigInvalid {
        field: "cpu".to_string(),
        message: format!("invalid cpu quantity {raw:?}"),
    })?;
    Ok(if has_m { value } else { value * 1000 })
}

/// Parse a memory/storage quantity of the shape `^\d+(Mi|Gi)$` into mebibytes.
pub fn parse_memory_mi(raw: &str) -> Result<u64> {
    if let Some(digits) = raw.strip_suffix("Gi") {
        let value: u64 = digits.parse().map_err(|_| Error::ConfigInvalid {
            field: "memory".to_string(),
            message: format!("invalid memory quantity {raw:?}"),
        })?;
        return Ok(value * 1024);
    }
    if let Some(digits) = raw.strip_suffix("Mi") {
        let value: u64 = digits.parse().map_err(|_| Error::ConfigInvalid {
            field: "memory".to_string(),
            message: format!("invalid memory quantity {raw:?}"),
        })?;
        return Ok(value);
    }
    Err(Error::ConfigInvalid {
        field: "memory".to_string(),
        message: format!("invalid memory quantity {raw:?}, expected suffix Mi or Gi"),
    })
}
