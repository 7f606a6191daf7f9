use crate::error::{Error, Result};
use crate::progress::ProgressSink;

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use backon::{ExponentialBuilder, Retryable};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Retry budget for a transient `StoreUnavailable` failure: 5 attempts, 1s doubling to 16s,
/// per spec.md §7's "retry with exponential backoff up to a bounded budget".
fn store_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(16))
        .with_max_times(5)
}

/// Every object this store manages lives under this prefix, per the object storage layout.
const ROOT_PREFIX: &str = "models/";

/// Size of each multipart chunk.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Maximum number of chunk uploads in flight for a single `save_stream` call.
const CHUNK_CONCURRENCY: usize = 20;

pub trait ModelStore {
    /// Write `data` to `path` (relative to `models/`) in one shot.
    async fn save(&self, path: &str, data: Bytes) -> Result<String>;

    /// Stream `total_size` bytes to `path`, uploading in 8 MiB chunks with up to
    /// [`CHUNK_CONCURRENCY`] uploads in flight. Returns the sha256 digest of the bytes
    /// actually written. If `expected_sha256` is given and doesn't match, the partial upload
    /// is aborted and the (possibly already-completed) object is deleted before returning
    /// [`Error::DigestMismatch`].
    async fn save_stream<S>(
        &self,
        path: &str,
        stream: S,
        total_size: u64,
        expected_sha256: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<String>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin;

    async fn file_exists(&self, path: &str) -> Result<bool>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// List object paths (relative to `models/`) matching a `*`/`?` glob pattern.
    async fn glob(&self, pattern: &str) -> Result<Vec<String>>;
}

#[derive(Clone)]
pub struct S3ModelStore {
    client: Client,
    bucket: String,
}

impl S3ModelStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{ROOT_PREFIX}{}", path.trim_start_matches('/'))
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(%key, error = %e, "failed to abort multipart upload");
        }
    }

    async fn upload_one_part(
        client: Client,
        bucket: String,
        key: String,
        upload_id: String,
        part_number: i32,
        chunk: Bytes,
        permit_slots: Arc<Semaphore>,
    ) -> Result<CompletedPart> {
        let _permit = permit_slots
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        let resp = (|| async {
            client
                .upload_part()
                .bucket(bucket.clone())
                .key(key.clone())
                .upload_id(upload_id.clone())
                .part_number(part_number)
                .body(ByteStream::from(chunk.clone()))
                .send()
                .await
                .map_err(|e| Error::StoreUnavailable(Box::new(e)))
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await?;

        Ok(CompletedPart::builder()
            .e_tag(resp.e_tag().unwrap_or_default())
            .part_number(part_number)
            .build())
    }
}

impl ModelStore for S3ModelStore {
    #[instrument(skip(self, data))]
    async fn save(&self, path: &str, data: Bytes) -> Result<String> {
        let key = self.key(path);
        let digest = format!("{:x}", Sha256::digest(&data));
        (|| async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(data.clone()))
                .send()
                .await
                .map_err(|e| Error::StoreUnavailable(Box::new(e)))
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await?;
        Ok(digest)
    }

    #[instrument(skip(self, stream, progress), fields(path, total_size))]
    async fn save_stream<S>(
        &self,
        path: &str,
        mut stream: S,
        total_size: u64,
        expected_sha256: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<String>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        let key = self.key(path);
        debug!(%key, total_size, "staging model file");

        let create = (|| async {
            self.client
                .create_multipart_upload()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Error::StoreUnavailable(Box::new(e)))
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| {
                Error::StoreUnavailable(Box::from("create_multipart_upload returned no upload id"))
            })?
            .to_string();

        let outcome = self
            .drive_multipart_upload(&key, &upload_id, &mut stream, progress)
            .await;

        let parts = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(&key, &upload_id).await;
                return Err(e);
            }
        };

        let mut hasher_input_order = parts.clone();
        hasher_input_order.sort_by_key(|(n, _, _)| *n);
        let mut hasher = Sha256::new();
        for (_, chunk_digest_input, _) in &hasher_input_order {
            hasher.update(chunk_digest_input);
        }
        let digest = format!("{:x}", hasher.finalize());

        if let Some(expected) = expected_sha256 {
            if digest != expected {
                self.abort(&key, &upload_id).await;
                let _ = self.delete(path).await;
                return Err(Error::DigestMismatch {
                    path: path.to_string(),
                    expected: expected.to_string(),
                    actual: digest,
                });
            }
        }

        let mut completed_parts: Vec<CompletedPart> =
            parts.into_iter().map(|(_, _, part)| part).collect();
        completed_parts.sort_by_key(|p| p.part_number().unwrap_or(0));

        (|| async {
            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(&key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(completed_parts.clone()))
                        .build(),
                )
                .send()
                .await
                .map_err(|e| Error::StoreUnavailable(Box::new(e)))
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await?;

        Ok(digest)
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        (|| async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                        Ok(false)
                    } else {
                        Err(Error::StoreUnavailable(Box::new(e)))
                    }
                }
            }
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        (|| async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Error::StoreUnavailable(Box::new(e)))
        })
        .retry(store_backoff())
        .when(|e| matches!(e, Error::StoreUnavailable(_)))
        .await?;
        Ok(())
    }

    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(ROOT_PREFIX);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = (|| async { req.clone().send().await.map_err(|e| Error::StoreUnavailable(Box::new(e))) })
                .retry(store_backoff())
                .when(|e| matches!(e, Error::StoreUnavailable(_)))
                .await?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                let relative = key.strip_prefix(ROOT_PREFIX).unwrap_or(key);
                if glob_match(pattern, relative) {
                    matches.push(relative.to_string());
                }
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(matches)
    }
}

impl S3ModelStore {
    /// Read `stream` in 8 MiB frames, dispatching each frame as a concurrently-running part
    /// upload bounded by a semaphore, and return every completed part alongside the raw bytes
    /// that made it up (needed to recompute the digest in upload order once everything lands,
    /// since parts can complete out of order).
    async fn drive_multipart_upload<S>(
        &self,
        key: &str,
        upload_id: &str,
        stream: &mut S,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<(i32, Bytes, CompletedPart)>>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        let permits = Arc::new(Semaphore::new(CHUNK_CONCURRENCY));
        let mut join_set: JoinSet<Result<(i32, Bytes, CompletedPart)>> = JoinSet::new();
        let mut buffer = BytesMut::new();
        let mut part_number: i32 = 0;

        let mut spawn_chunk = |join_set: &mut JoinSet<Result<(i32, Bytes, CompletedPart)>>,
                                chunk: Bytes,
                                part_number: i32| {
            progress.add_bytes(chunk.len() as u64);
            let client = self.client.clone();
            let bucket = self.bucket.clone();
            let key = key.to_string();
            let upload_id = upload_id.to_string();
            let permits = permits.clone();
            let chunk_for_digest = chunk.clone();
            join_set.spawn(async move {
                let part = Self::upload_one_part(
                    client,
                    bucket,
                    key,
                    upload_id,
                    part_number,
                    chunk,
                    permits,
                )
                .await?;
                Ok((part_number, chunk_for_digest, part))
            });
        };

        while let Some(next) = stream.next().await {
            let bytes = next.map_err(Error::Io)?;
            buffer.extend_from_slice(&bytes);
            while buffer.len() >= CHUNK_SIZE {
                let chunk = buffer.split_to(CHUNK_SIZE).freeze();
                part_number += 1;
                spawn_chunk(&mut join_set, chunk, part_number);
            }
        }
        if !buffer.is_empty() {
            let chunk = buffer.freeze();
            part_number += 1;
            spawn_chunk(&mut join_set, chunk, part_number);
        }

        let mut parts = Vec::with_capacity(part_number as usize);
        while let Some(joined) = join_set.join_next().await {
            let part = joined.map_err(|e| Error::StoreUnavailable(Box::new(e)))??;
            parts.push(part);
        }
        Ok(parts)
    }
}

/// Minimal `*`/`?` glob matcher; no character classes, no recursive `**`, matching the
/// subset the original tool's `fnmatch`-based globbing actually exercised.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn do_match(pat: &[u8], s: &[u8]) -> bool {
        match (pat.first(), s.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                do_match(&pat[1..], s) || (!s.is_empty() && do_match(pat, &s[1..]))
            }
            (Some(b'?'), Some(_)) => do_match(&pat[1..], &s[1..]),
            (Some(&p), Some(&c)) if p == c => do_match(&pat[1..], &s[1..]),
            _ => false,
        }
    }
    do_match(pattern.as_bytes(), candidate.as_bytes())
}
