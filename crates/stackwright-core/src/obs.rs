//! Structured lifecycle events for provisioning.
//!
//! `ProvisionSpan` scopes everything logged during one attempt to its
//! application and environment. The `emit_*` helpers log the lifecycle
//! events at `info!`, or `warn!` for compensations.

use tracing::{info, warn};

/// RAII guard entering a `stackwright.provision` span.
///
/// ```ignore
/// let _span = ProvisionSpan::enter("demo", "test");
/// ```
pub struct ProvisionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ProvisionSpan {
    pub fn enter(app: &str, env: &str) -> Self {
        let span = tracing::info_span!("stackwright.provision", app = %app, env = %env);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_provision_started(app: &str, env: &str, region: &str) {
    info!(event = "provision.started", app = %app, env = %env, region = %region);
}

/// A workflow stage committed.
pub fn emit_provision_stage(stage: &str) {
    info!(event = "provision.stage", stage = %stage);
}

pub fn emit_provision_finished(app: &str, env: &str, duration_ms: u64, success: bool) {
    info!(
        event = "provision.finished",
        app = %app,
        env = %env,
        duration_ms = duration_ms,
        success = success,
    );
}

/// A best-effort cleanup ran against `resource`.
pub fn emit_compensation(resource: &str, outcome: &str) {
    warn!(event = "provision.compensation", resource = %resource, outcome = %outcome);
}

pub fn emit_template_rendered(kind: &str, bytes: usize) {
    info!(event = "template.rendered", kind = %kind, bytes = bytes);
}
