use crate::error::{Error, Result};

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::Deserialize;
use tracing::debug;

/// One file a [`ModelSource`] can list and stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelFile {
    pub filename: String,
    pub size: u64,
    /// Known-good digest, when the source publishes one up front (HuggingFace LFS pointers
    /// carry a sha256; plain HTTP URLs never do).
    pub sha256: Option<String>,
}

/// Something the stager can list files from and stream bytes out of. Keeping this as a seam
/// (rather than one function per source) lets a third source be added later without touching
/// the staging orchestration loop.
pub trait ModelSource {
    async fn list_files(&self) -> Result<Vec<ModelFile>>;

    async fn open_stream(
        &self,
        filename: &str,
    ) -> Result<impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin>;
}

#[derive(Clone)]
pub struct HttpModelSource {
    urls: Vec<String>,
    client: reqwest::Client,
}

impl HttpModelSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            client: reqwest::Client::new(),
        }
    }

    fn filename_of(url: &str) -> String {
        url.rsplit('/').next().unwrap_or(url).to_string()
    }
}

impl ModelSource for HttpModelSource {
    async fn list_files(&self) -> Result<Vec<ModelFile>> {
        let mut files = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let resp = self
                .client
                .head(url)
                .send()
                .await
                .map_err(|source| Error::Http {
                    url: url.clone(),
                    source,
                })?;
            let size = resp.content_length().unwrap_or(0);
            files.push(ModelFile {
                filename: Self::filename_of(url),
                size,
                sha256: None,
            });
        }
        Ok(files)
    }

    async fn open_stream(
        &self,
        filename: &str,
    ) -> Result<impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin> {
        let url = self
            .urls
            .iter()
            .find(|u| Self::filename_of(u) == filename)
            .cloned()
            .ok_or_else(|| Error::NoModelResolvable {
                group: filename.to_string(),
            })?;
        debug!(%url, "opening http model stream");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.clone(),
                source,
            })?
            .error_for_status()
            .map_err(|source| Error::Http { url, source })?;
        Ok(resp
            .bytes_stream()
            .map_err(|e| std::io::Error::other(e.to_string())))
    }
}

#[derive(Clone)]
pub struct HuggingFaceModelSource {
    repo_id: String,
    revision: String,
    client: reqwest::Client,
}

impl HuggingFaceModelSource {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: "main".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    fn resolve_url(&self, filename: &str) -> String {
        format!(
            "https://huggingface.co/{}/resolve/{}/{}",
            self.repo_id, self.revision, filename
        )
    }
}

#[derive(Deserialize)]
struct HfModelInfo {
    siblings: Vec<HfSibling>,
}

#[derive(Deserialize)]
struct HfSibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    lfs: Option<HfLfs>,
}

#[derive(Deserialize)]
struct HfLfs {
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl ModelSource for HuggingFaceModelSource {
    async fn list_files(&self) -> Result<Vec<ModelFile>> {
        let url = format!(
            "https://huggingface.co/api/models/{}?blobs=true",
            self.repo_id
        );
        let info: HfModelInfo = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.clone(),
                source,
            })?
            .error_for_status()
            .map_err(|source| Error::Http {
                url: url.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|source| Error::Http { url, source })?;

        Ok(info
            .siblings
            .into_iter()
            .map(|s| {
                let (size, sha256) = match s.lfs {
                    Some(lfs) => (lfs.size.or(s.size).unwrap_or(0), lfs.sha256),
                    None => (s.size.unwrap_or(0), None),
                };
                ModelFile {
                    filename: s.rfilename,
                    size,
                    sha256,
                }
            })
            .collect())
    }

    async fn open_stream(
        &self,
        filename: &str,
    ) -> Result<impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin> {
        let url = self.resolve_url(filename);
        debug!(%url, "opening huggingface model stream");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.clone(),
                source,
            })?
            .error_for_status()
            .map_err(|source| Error::Http { url, source })?;
        Ok(resp
            .bytes_stream()
            .map_err(|e| std::io::Error::other(e.to_string())))
    }
}
