//! User-visible progress for long-running steps.
//!
//! Each step emits one `start` followed by one `stop` carrying the outcome.
//! Collaborators that stream their own status (the stack deployer) use
//! `update` in between.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    InProgress,
    Failed,
    Complete,
    Skipped,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::InProgress => "in progress",
            ProgressStatus::Failed => "failed",
            ProgressStatus::Complete => "complete",
            ProgressStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Progress: Send + Sync {
    fn start(&self, label: &str);
    fn update(&self, label: &str);
    fn stop(&self, status: ProgressStatus, label: &str);
}

/// Writes progress lines to stderr.
#[derive(Debug, Default)]
pub struct TerminalProgress;

impl TerminalProgress {
    fn write(&self, marker: &str, label: &str) {
        let mut err = std::io::stderr().lock();
        // Progress output is best effort; a closed stderr must not fail a step.
        let _ = writeln!(err, "{} {}", marker, label.trim_end());
    }
}

impl Progress for TerminalProgress {
    fn start(&self, label: &str) {
        self.write("-", label);
    }

    fn update(&self, label: &str) {
        self.write(" ", label);
    }

    fn stop(&self, status: ProgressStatus, label: &str) {
        let marker = match status {
            ProgressStatus::Complete => "✔",
            ProgressStatus::Failed => "✘",
            ProgressStatus::Skipped => "~",
            ProgressStatus::InProgress => "-",
        };
        self.write(marker, label);
    }
}

/// One recorded progress call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Start(String),
    Update(String),
    Stop(ProgressStatus, String),
}

/// Keeps every progress call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Progress for RecordingProgress {
    fn start(&self, label: &str) {
        self.push(ProgressEvent::Start(label.to_string()));
    }

    fn update(&self, label: &str) {
        self.push(ProgressEvent::Update(label.to_string()));
    }

    fn stop(&self, status: ProgressStatus, label: &str) {
        self.push(ProgressEvent::Stop(status, label.to_string()));
    }
}
