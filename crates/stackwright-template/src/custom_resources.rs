//! Helper functions deployed alongside an environment stack.
//!
//! Their sources are too large to inline in the environment document, so each
//! is packaged and uploaded to the application's regional bucket first.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::source::TemplateSource;

const ARTIFACT_KEY_PREFIX: &str = "manual/scripts/custom-resources";
const HANDLER_FILE_NAME: &str = "index.js";

/// Function logical name paired with its script under `custom-resources/`.
const ENV_CUSTOM_RESOURCES: [(&str, &str); 3] = [
    ("CertificateValidationFunction", "dns-cert-validator"),
    ("DNSDelegationFunction", "dns-delegation"),
    ("CustomDomainFunction", "custom-domain"),
];

/// One file inside a custom resource package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// A packaged helper function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomResource {
    name: String,
    files: Vec<PackageFile>,
}

impl CustomResource {
    pub fn new(name: impl Into<String>, files: Vec<PackageFile>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }

    /// Logical name of the function in the environment document.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[PackageFile] {
        &self.files
    }

    /// Content-addressed object key, stable across runs for the same sources.
    pub fn artifact_key(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.name.as_bytes());
            hasher.update(&file.content);
        }
        format!(
            "{}/{}/{}.zip",
            ARTIFACT_KEY_PREFIX,
            self.name.to_lowercase(),
            hex::encode(hasher.finalize())
        )
    }
}

/// The environment stack's custom resources, in a fixed order.
pub fn env_custom_resources(source: &dyn TemplateSource) -> Result<Vec<CustomResource>> {
    ENV_CUSTOM_RESOURCES
        .iter()
        .map(|(name, script)| {
            let content = source.read(&format!("custom-resources/{}.js", script))?;
            Ok(CustomResource::new(
                *name,
                vec![PackageFile {
                    name: HANDLER_FILE_NAME.to_string(),
                    content: content.into_bytes(),
                }],
            ))
        })
        .collect()
}
