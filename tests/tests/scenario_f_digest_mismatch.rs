use bytes::Bytes;
use futures::{Stream, stream};
use fleetop_model_store::{Error, ModelStore, ProgressSink, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory `ModelStore` that keeps everything in a `HashMap`, used to exercise
/// digest verification without a real object store. Mirrors the shape of `S3ModelStore`
/// closely enough that `save_stream`'s digest-mismatch contract is identical.
#[derive(Default)]
struct FakeStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl ModelStore for FakeStore {
    async fn save(&self, path: &str, data: Bytes) -> Result<String> {
        let digest = format!("{:x}", Sha256::digest(&data));
        self.objects.lock().unwrap().insert(path.to_string(), data);
        Ok(digest)
    }

    async fn save_stream<S>(
        &self,
        path: &str,
        mut stream: S,
        _total_size: u64,
        expected_sha256: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<String>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        use futures::StreamExt;

        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::Io)?;
            progress.add_bytes(chunk.len() as u64);
            buf.extend_from_slice(&chunk);
        }
        let actual = format!("{:x}", Sha256::digest(&buf));

        if let Some(expected) = expected_sha256 {
            if expected != actual {
                return Err(Error::DigestMismatch {
                    path: path.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from(buf));
        Ok(actual)
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

struct NoopProgress;
impl ProgressSink for NoopProgress {
    fn add_bytes(&self, _n: u64) {}
}

/// A stream whose actual bytes don't hash to the digest the caller expected is rejected
/// with `DigestMismatch`, and nothing is left behind in the store.
#[tokio::test]
async fn wrong_digest_is_rejected_and_nothing_is_stored() {
    let store = FakeStore::default();
    let data = Bytes::from_static(b"corrupted bytes");
    let stream = stream::once(async { Ok::<_, std::io::Error>(data.clone()) });

    let err = store
        .save_stream(
            "group1/model.gguf",
            stream,
            data.len() as u64,
            Some("0000000000000000000000000000000000000000000000000000000000000000"),
            &NoopProgress,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DigestMismatch { .. }));
    assert!(!store.file_exists("group1/model.gguf").await.unwrap());
}

/// A stream whose digest matches is stored and the digest is returned.
#[tokio::test]
async fn matching_digest_is_stored() {
    let store = FakeStore::default();
    let data = Bytes::from_static(b"a model's worth of bytes");
    let expected = format!("{:x}", Sha256::digest(&data));
    let stream = stream::once(async { Ok::<_, std::io::Error>(data.clone()) });

    let digest = store
        .save_stream(
            "group1/model.gguf",
            stream,
            data.len() as u64,
            Some(&expected),
            &NoopProgress,
        )
        .await
        .unwrap();

    assert_eq!(digest, expected);
    assert!(store.file_exists("group1/model.gguf").await.unwrap());
}
