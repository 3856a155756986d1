//! Uploads the environment's custom resource functions.
//!
//! Their sources exceed what an infrastructure document may inline, so each
//! is packaged, stored under a content-addressed key, and referenced by URL.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use stackwright_template::{env_custom_resources, EmbeddedSource, PackageFile, TemplateSource};
use tracing::debug;

use crate::cloud::{CloudResult, ObjectStorage};
use crate::domain::UploadError;

/// Compresses a package and stores it under `key`, returning its URL.
#[async_trait]
pub trait CompressAndUpload: Send + Sync {
    async fn compress_and_upload(&self, key: &str, files: &[PackageFile]) -> CloudResult<String>;
}

/// Uploads into one bucket of an [`ObjectStorage`].
pub struct BucketUpload<'a> {
    storage: &'a dyn ObjectStorage,
    bucket: &'a str,
}

impl<'a> BucketUpload<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, bucket: &'a str) -> Self {
        Self { storage, bucket }
    }
}

#[async_trait]
impl CompressAndUpload for BucketUpload<'_> {
    async fn compress_and_upload(&self, key: &str, files: &[PackageFile]) -> CloudResult<String> {
        self.storage.zip_and_upload(self.bucket, key, files).await
    }
}

#[derive(Clone)]
pub struct CustomResourceUploader {
    source: Arc<dyn TemplateSource>,
}

impl Default for CustomResourceUploader {
    fn default() -> Self {
        Self::new(Arc::new(EmbeddedSource))
    }
}

impl CustomResourceUploader {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    /// One URL per function, keyed by the function's logical name. Every
    /// package is read before the first upload.
    pub async fn upload_environment_custom_resources(
        &self,
        upload: &dyn CompressAndUpload,
    ) -> Result<BTreeMap<String, String>, UploadError> {
        let resources = env_custom_resources(self.source.as_ref())?;
        let mut urls = BTreeMap::new();
        for resource in resources {
            let key = resource.artifact_key();
            let url = upload
                .compress_and_upload(&key, resource.files())
                .await
                .map_err(|source| UploadError::Store {
                    name: resource.name().to_string(),
                    source,
                })?;
            debug!(function = %resource.name(), key = %key, "custom resource uploaded");
            urls.insert(resource.name().to_string(), url);
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CloudError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        keys: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl CompressAndUpload for Capture {
        async fn compress_and_upload(&self, key: &str, files: &[PackageFile]) -> CloudResult<String> {
            assert_eq!(files.len(), 1);
            if self.fail_on.is_some_and(|f| key.contains(f)) {
                return Err(CloudError::api("PutObject", "denied"));
            }
            self.keys.lock().unwrap().push(key.to_string());
            Ok(format!("https://bucket.local/{}", key))
        }
    }

    #[tokio::test]
    async fn one_url_per_function() {
        let capture = Capture::default();
        let urls = CustomResourceUploader::default()
            .upload_environment_custom_resources(&capture)
            .await
            .unwrap();

        assert_eq!(urls.len(), 3);
        for name in [
            "CertificateValidationFunction",
            "DNSDelegationFunction",
            "CustomDomainFunction",
        ] {
            let url = &urls[name];
            assert!(url.starts_with("https://bucket.local/manual/scripts/custom-resources/"));
            assert!(url.contains(&name.to_lowercase()));
        }
        assert_eq!(capture.keys.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn store_failure_names_function() {
        let capture = Capture {
            fail_on: Some("dnsdelegationfunction"),
            ..Default::default()
        };
        let err = CustomResourceUploader::default()
            .upload_environment_custom_resources(&capture)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Store { ref name, .. } if name == "DNSDelegationFunction"));
    }
}
