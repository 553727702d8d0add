use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::{fmt, sync::Arc, time::Duration};
use uuid::Uuid;

/// Thesis documents are stored as PDFs only.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/pdf";

/// How long a presigned upload URL stays usable.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to presign document upload: {0}")]
    Presign(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// DocumentKey
///
/// Object key of a thesis document: `theses/{author_id}/{uuid}-{filename}`.
/// The client filename is flattened into a single segment, so it can never
/// leave the author's prefix or collide with an earlier upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn for_thesis(author_id: i64, filename: &str) -> Self {
        Self(format!(
            "theses/{author_id}/{}-{}",
            Uuid::new_v4().simple(),
            flatten_filename(filename)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// flatten_filename
///
/// Joins the meaningful path segments of a client filename with `_`, dropping
/// empty, `.` and `..` segments. `"../drafts/final.pdf"` becomes `"drafts_final.pdf"`.
pub fn flatten_filename(filename: &str) -> String {
    let flat = filename
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("_");
    if flat.is_empty() {
        "document.pdf".to_string()
    } else {
        flat
    }
}

/// StorageService
///
/// The thesis document store. Browsers upload PDFs straight to the bucket
/// through a presigned URL; the service never handles file bytes.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Signed URL accepting one PUT of a PDF at `key`, valid for `UPLOAD_URL_TTL`.
    async fn presign_document_upload(&self, key: &DocumentKey) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// Works against AWS S3 and MinIO. Path-style addressing is forced because
/// MinIO requires it.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }

    /// Creates the document bucket of the local MinIO setup if it is missing.
    pub async fn provision_bucket(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn presign_document_upload(&self, key: &DocumentKey) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key.as_str())
            .content_type(DOCUMENT_CONTENT_TYPE)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

/// MockStorageService
///
/// Hands out deterministic local URLs. `new_failing` simulates an unreachable bucket.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn presign_document_upload(&self, key: &DocumentKey) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable("mock bucket offline".to_string()));
        }
        Ok(format!("http://localhost:9000/mock-bucket/{key}?signature=fake"))
    }
}

pub type StorageState = Arc<dyn StorageService>;
