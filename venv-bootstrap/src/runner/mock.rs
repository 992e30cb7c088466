//! Mock tool runner for testing
//!
//! Records every invocation and answers with scripted exit statuses instead of
//! spawning processes.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{ToolInvocation, ToolKind, ToolRunner, ToolStatus};
use crate::error::Result;
use crate::logfile::ToolLog;

/// A runner that never spawns anything
#[derive(Debug, Default)]
pub struct MockRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    /// Status per step; unscripted steps succeed
    outcomes: HashMap<ToolKind, ToolStatus>,
    /// Create the target directory on a successful creation, like virtualenv would
    creates_environments: bool,
}

impl MockRunner {
    /// Create a runner on which every tool succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status returned for a step
    pub fn with_status(mut self, kind: ToolKind, status: ToolStatus) -> Self {
        self.outcomes.insert(kind, status);
        self
    }

    /// Make successful creations produce the environment directory
    pub fn creating_environments(mut self) -> Self {
        self.creates_environments = true;
        self
    }

    /// All invocations so far, in order
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of invocations of one step
    pub fn call_count(&self, kind: ToolKind) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.kind == kind)
            .count()
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, invocation: &ToolInvocation, log: &ToolLog) -> Result<ToolStatus> {
        self.invocations.lock().unwrap().push(invocation.clone());

        // Keep the log file behaving as it would for a real tool
        drop(log.capture(invocation.log_mode, &invocation.command_line())?);

        let status = self
            .outcomes
            .get(&invocation.kind)
            .copied()
            .unwrap_or(ToolStatus::Exited(0));

        if self.creates_environments && invocation.kind == ToolKind::Create && status.success() {
            if let Some(target) = invocation.args.last() {
                std::fs::create_dir_all(target)?;
            }
        }

        Ok(status)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
