use crate::error::Error;

/// Outcome of one full reconciliation pass. The controller never short-circuits on the first
/// group's failure; every declared group gets its own attempt, and failures are collected
/// rather than propagated.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, Error)>,
    pub orphans_deleted: usize,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
