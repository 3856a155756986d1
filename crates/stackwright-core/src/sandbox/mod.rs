//! An in-process cloud account and scripted prompts.
//!
//! The sandbox implements every collaborator contract over in-memory state
//! and journals each call, so the workflow can be exercised end to end
//! without network access. Failure knobs make individual calls fail.
//!
//! # Modules
//!
//! - [`cloud`]  `SandboxCloud`, `SandboxIdentity`, `CloudCall`
//! - [`prompt`] `ScriptedPrompter`, `Answer`

pub mod cloud;
pub mod prompt;

pub use cloud::{CloudCall, SandboxCloud, SandboxIdentity, SandboxVpc};
pub use prompt::{Answer, ScriptedPrompter};
