use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use uuid::Uuid;

use crate::config::{BlobStoreKind, Config};
use crate::error::{BackendError, ClassroomError, ConfigurationError};
use crate::util::sanitize_file_name;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Uploaded file contents along with the metadata the client sent for it.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl FileUpload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Storage name, unique per upload.
    pub fn blob_name(&self) -> String {
        format!(
            "{}-{}",
            Uuid::new_v4(),
            sanitize_file_name(self.filename.as_deref().unwrap_or_default())
        )
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Storage for binary content referenced from classrooms by public URL.
#[rocket::async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, file: FileUpload) -> Result<String, ClassroomError>;
}

pub fn from_config(c: &Config) -> Result<Arc<dyn BlobStore>, BackendError> {
    match c.blob_store {
        BlobStoreKind::Local => Ok(Arc::new(LocalBlobStore::new(
            c.upload_dir.clone(),
            c.public_base_url.clone(),
        ))),
        BlobStoreKind::Azure => {
            let container_url = c
                .azure_container_url
                .clone()
                .ok_or(ConfigurationError::BlobStore(
                    "azure".to_string(),
                    "azure_container_url",
                ))?;
            let sas_token = c.azure_sas_token.clone().ok_or(ConfigurationError::BlobStore(
                "azure".to_string(),
                "azure_sas_token",
            ))?;
            Ok(Arc::new(AzureBlobStore::new(
                container_url,
                sas_token,
                c.upstream_timeout(),
            )?))
        }
    }
}

/// Keeps uploads on the local disk; they are served back from `/uploads/<name>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: impl ToString) -> Self {
        LocalBlobStore {
            root,
            public_base_url: public_base_url.to_string().trim_end_matches('/').to_string(),
        }
    }
}

#[rocket::async_trait]
impl BlobStore for LocalBlobStore {
    #[tracing::instrument(skip(self, file), fields(size = file.bytes.len()))]
    async fn upload(&self, file: FileUpload) -> Result<String, ClassroomError> {
        let name = file.blob_name();

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&name), &file.bytes).await?;

        tracing::debug!("stored upload as {}", name);
        Ok(format!("{}/uploads/{}", self.public_base_url, name))
    }
}

/// Azure Blob Storage container accessed with a SAS token through the REST API.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    container_url: String,
    sas_token: String,
    client: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(
        container_url: impl ToString,
        sas_token: impl ToString,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(AzureBlobStore {
            container_url: container_url.to_string().trim_end_matches('/').to_string(),
            sas_token: sas_token.to_string().trim_start_matches('?').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    fn headers(file: &FileUpload) -> HeaderMap {
        let content_type = HeaderValue::from_str(file.content_type())
            .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert("x-ms-blob-content-type", content_type.clone());
        headers.insert(
            "x-ms-blob-content-disposition",
            HeaderValue::from_static("inline"),
        );
        headers.insert(CONTENT_TYPE, content_type);
        headers
    }
}

#[rocket::async_trait]
impl BlobStore for AzureBlobStore {
    #[tracing::instrument(skip(self, file), fields(size = file.bytes.len()))]
    async fn upload(&self, file: FileUpload) -> Result<String, ClassroomError> {
        let name = file.blob_name();
        let blob_url = format!("{}/{}", self.container_url, name);
        let headers = Self::headers(&file);

        let response = self
            .client
            .put(format!("{}?{}", blob_url, self.sas_token))
            .headers(headers)
            .body(file.bytes)
            .send()
            .await
            .map_err(|e| ClassroomError::Upstream(format!("blob storage unreachable: {}", e)))?;

        if !response.status().is_success() {
            tracing::warn!("blob storage rejected {}: {}", name, response.status());
            return Err(ClassroomError::Upstream(format!(
                "blob storage answered {}",
                response.status()
            )));
        }

        Ok(blob_url)
    }
}
