use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestFile};
use crate::source::{ModelFile, ModelSource};

use fleetop_model_config::Model;
use fleetop_model_store::{ModelStore, ProgressSink, glob_match};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, instrument};

/// How many files of one group are streamed into the store at once. Small and fixed rather than
/// configurable per call: the stager is invoked once per group per reconcile, so there's no
/// caller yet that needs to tune it, matching spec.md §5's "small pool (1-4)".
const STAGE_CONCURRENCY: usize = 4;

/// Fetch `model`'s files from `source` into `store` under `models/{group}/`, unless the group
/// already has staged files (idempotent per spec: a non-empty `glob("{group}/*")` means the
/// previous run already finished, so this call is a no-op).
///
/// Up to [`STAGE_CONCURRENCY`] files stream in parallel; a single file's failure aborts the
/// whole group's staging (the already-written files are left in place for a later reconcile to
/// find, per the "partially-staged state" contract — no cleanup is attempted here).
///
/// On success, writes `models/{group}/manifest.yml` last, so a reader that finds the manifest
/// can trust every file it lists is actually present (at-most-once staging: a crash mid-way
/// leaves loose files but never a manifest pointing at missing ones).
#[instrument(skip(model, source, store, progress), fields(group))]
pub async fn ensure_staged<Src, St>(
    group: &str,
    model: &Model,
    source: &Src,
    store: &St,
    progress: &dyn ProgressSink,
) -> Result<Manifest>
where
    Src: ModelSource,
    St: ModelStore,
{
    let existing = store.glob(&format!("{group}/*")).await?;
    if !existing.is_empty() {
        info!(group, count = existing.len(), "group already staged, skipping");
        return Ok(Manifest {
            name: group.to_string(),
            files: existing
                .into_iter()
                .filter(|p| !p.ends_with("manifest.yml"))
                .filter_map(|p| {
                    p.strip_prefix(&format!("{group}/"))
                        .map(|name| ManifestFile {
                            name: name.to_string(),
                            sha256: String::new(),
                        })
                })
                .collect(),
            ..Default::default()
        });
    }

    let available = source.list_files().await?;
    let selected = select_files(group, &available, &model.files)?;

    let mut staged: Vec<ManifestFile> = stream::iter(selected.into_iter().map(|file| {
        let group = group.to_string();
        async move {
            let dest = format!("{group}/{}", file.filename);
            let stream = source.open_stream(&file.filename).await?;
            let digest = store
                .save_stream(&dest, stream, file.size, file.sha256.as_deref(), progress)
                .await?;
            info!(group, file = %file.filename, %digest, "staged model file");
            Ok::<_, Error>(ManifestFile {
                name: file.filename.clone(),
                sha256: digest,
            })
        }
    }))
    .buffer_unordered(STAGE_CONCURRENCY)
    .try_collect()
    .await?;
    staged.sort_by(|a, b| a.name.cmp(&b.name));

    let manifest = Manifest {
        name: group.to_string(),
        files: staged,
        ..Default::default()
    };
    store
        .save(
            &format!("{group}/manifest.yml"),
            manifest.to_yaml()?.into_bytes().into(),
        )
        .await?;

    Ok(manifest)
}

fn select_files<'a>(
    group: &str,
    available: &'a [ModelFile],
    patterns: &[String],
) -> Result<Vec<&'a ModelFile>> {
    let selected: Vec<&ModelFile> = available
        .iter()
        .filter(|f| patterns.iter().any(|pat| glob_match(pat, &f.filename)))
        .collect();

    if selected.is_empty() {
        return Err(Error::NoModelResolvable {
            group: group.to_string(),
        });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ModelFile {
        ModelFile {
            filename: name.to_string(),
            size: 1024,
            sha256: None,
        }
    }

    #[test]
    fn selects_matching_files() {
        let available = vec![file("model.gguf"), file("readme.md")];
        let selected = select_files("g1", &available, &["*.gguf".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].filename, "model.gguf");
    }

    #[test]
    fn errors_when_nothing_matches() {
        let available = vec![file("readme.md")];
        let err = select_files("g1", &available, &["*.gguf".to_string()]).unwrap_err();
        assert!(matches!(err, Error::NoModelResolvable { .. }));
    }
}
