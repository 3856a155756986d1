//! Object storage over plain HTTP PUT.
//!
//! Each package is written as a zip archive with one deflated entry per file,
//! the layout a function runtime unpacks.

use std::io::{Cursor, Write};

use async_trait::async_trait;
use stackwright_core::{CloudError, CloudResult, ObjectStorage};
use stackwright_template::PackageFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const OBJECT_STORE_URL_ENV: &str = "STACKWRIGHT_OBJECT_STORE_URL";

pub struct HttpObjectStorage {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpObjectStorage {
    pub fn new(endpoint: &str) -> CloudResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("stackwright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CloudError::api("CreateClient", e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// `None` unless `STACKWRIGHT_OBJECT_STORE_URL` is set.
    pub fn from_env() -> CloudResult<Option<Self>> {
        match std::env::var(OBJECT_STORE_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::new(&url).map(Some),
            _ => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}

pub fn compress(files: &[PackageFile]) -> zip::result::ZipResult<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        writer.start_file(file.name.as_str(), options)?;
        writer.write_all(&file.content)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn zip_and_upload(
        &self,
        bucket: &str,
        key: &str,
        files: &[PackageFile],
    ) -> CloudResult<String> {
        let body = compress(files).map_err(|e| CloudError::api("CompressObject", e.to_string()))?;
        let url = self.object_url(bucket, key);
        debug!(url = %url, bytes = body.len(), "uploading object");

        self.http_client
            .put(&url)
            .header("content-type", "application/zip")
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CloudError::api("PutObject", e.to_string()))?;
        Ok(url)
    }
}
