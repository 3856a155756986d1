//! Where document sources come from.
//!
//! The shipped documents are compiled into the binary. A directory source
//! lets operators try edited documents without rebuilding, and the memory
//! source backs tests.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, TemplateError};

/// Read access to document sources by relative path, e.g.
/// `workloads/partials/cf/loggroup.yml`.
pub trait TemplateSource: Send + Sync {
    fn read(&self, path: &str) -> Result<String>;
}

macro_rules! embedded {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../templates/", $path)))),*]
    };
}

static EMBEDDED: &[(&str, &str)] = embedded![
    "workloads/services/lb-web/cf.yml",
    "workloads/services/rd-web/cf.yml",
    "workloads/services/backend/cf.yml",
    "workloads/services/worker/cf.yml",
    "workloads/jobs/scheduled-job/cf.yml",
    "workloads/partials/cf/loggroup.yml",
    "workloads/partials/cf/envvars-container.yml",
    "workloads/partials/cf/envvars-common.yml",
    "workloads/partials/cf/secrets.yml",
    "workloads/partials/cf/executionrole.yml",
    "workloads/partials/cf/taskrole.yml",
    "workloads/partials/cf/workload-container.yml",
    "workloads/partials/cf/fargate-taskdef-base-properties.yml",
    "workloads/partials/cf/service-base-properties.yml",
    "workloads/partials/cf/servicediscovery.yml",
    "workloads/partials/cf/addons.yml",
    "workloads/partials/cf/sidecars.yml",
    "workloads/partials/cf/logconfig.yml",
    "workloads/partials/cf/autoscaling.yml",
    "workloads/partials/cf/eventrule.yml",
    "workloads/partials/cf/state-machine.yml",
    "workloads/partials/cf/state-machine-definition.json.yml",
    "workloads/partials/cf/efs-access-point.yml",
    "workloads/partials/cf/env-controller.yml",
    "workloads/partials/cf/mount-points.yml",
    "workloads/partials/cf/volumes.yml",
    "workloads/partials/cf/image-overrides.yml",
    "workloads/partials/cf/instancerole.yml",
    "workloads/partials/cf/accessrole.yml",
    "workloads/partials/cf/publish.yml",
    "workloads/partials/cf/subscribe.yml",
    "workloads/partials/cf/nlb.yml",
    "workloads/partials/cf/vpc-connector.yml",
    "custom-resources/dns-cert-validator.js",
    "custom-resources/dns-delegation.js",
    "custom-resources/custom-domain.js",
];

/// Documents compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSource;

impl TemplateSource for EmbeddedSource {
    fn read(&self, path: &str) -> Result<String> {
        EMBEDDED
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, content)| content.to_string())
            .ok_or_else(|| TemplateError::NotFound {
                path: path.to_string(),
            })
    }
}

/// Documents read from a directory laid out like the embedded tree.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirSource {
    fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TemplateError::NotFound {
                path: path.to_string(),
            },
            _ => TemplateError::Read {
                path: full.display().to_string(),
                source: e,
            },
        })
    }
}

/// In-memory documents keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl TemplateSource for MemorySource {
    fn read(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound {
                path: path.to_string(),
            })
    }
}
