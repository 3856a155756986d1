//! Stackwright-Template: workload document composition
//!
//! ## Layer 1 - Documents
//!
//! Renders infrastructure documents for workloads from a base document and a
//! fixed catalog of named fragments, with a registry of functions for values
//! the documents derive (logical ids, ARNs, JSON sub-structures).
//!
//! ## Key Components
//!
//! - `Composer`: loads, attaches and executes documents
//! - `WorkloadOpts`: the data a workload document renders against
//! - `TemplateSource`: embedded, on-disk and in-memory document sources
//! - `env_custom_resources`: helper functions packaged for upload

pub mod custom_resources;
mod engine;
mod error;
pub mod funcs;
pub mod source;
pub mod workload;

pub use custom_resources::{env_custom_resources, CustomResource, PackageFile};
pub use engine::{Composer, Content, PARTIALS};
pub use error::{Result, TemplateError};
pub use source::{DirSource, EmbeddedSource, MemorySource, TemplateSource};
pub use workload::WorkloadOpts;
