//! Process-wide provisioning counters.
//!
//! Incremented at the call site; [`Metrics::flush`] logs them all as one
//! `info!` event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    environments_provisioned: AtomicU64,
    provision_failures: AtomicU64,
    role_cleanups: AtomicU64,
    documents_rendered: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            environments_provisioned: AtomicU64::new(0),
            provision_failures: AtomicU64::new(0),
            role_cleanups: AtomicU64::new(0),
            documents_rendered: AtomicU64::new(0),
        }
    }

    pub fn inc_provisioned(&self) {
        self.environments_provisioned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "environments_provisioned", "counter incremented");
    }

    pub fn inc_failures(&self) {
        self.provision_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "provision_failures", "counter incremented");
    }

    /// One role deletion attempted during cleanup.
    pub fn inc_role_cleanups(&self) {
        self.role_cleanups.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "role_cleanups", "counter incremented");
    }

    pub fn inc_rendered(&self) {
        self.documents_rendered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "documents_rendered", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            environments_provisioned = self.environments_provisioned(),
            provision_failures = self.provision_failures(),
            role_cleanups = self.role_cleanups(),
            documents_rendered = self.documents_rendered(),
        );
    }

    pub fn environments_provisioned(&self) -> u64 {
        self.environments_provisioned.load(Ordering::Relaxed)
    }

    pub fn provision_failures(&self) -> u64 {
        self.provision_failures.load(Ordering::Relaxed)
    }

    pub fn role_cleanups(&self) -> u64 {
        self.role_cleanups.load(Ordering::Relaxed)
    }

    pub fn documents_rendered(&self) -> u64 {
        self.documents_rendered.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.environments_provisioned.store(0, Ordering::Relaxed);
        self.provision_failures.store(0, Ordering::Relaxed);
        self.role_cleanups.store(0, Ordering::Relaxed);
        self.documents_rendered.store(0, Ordering::Relaxed);
    }
}
