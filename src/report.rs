use serde::Serialize;
use tracing::info;

/// Ordered, human readable log of the steps an operation completed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    steps: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed step and emit it as an `info` event
    pub fn step(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.steps.push(message);
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append the steps of a nested operation
    pub fn extend(&mut self, other: Report) {
        self.steps.extend(other.steps);
    }
}
