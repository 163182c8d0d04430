//! Deletion report DTO

use serde::Serialize;
use tourdesk_core::models::CompensationReport;

/// JSON body of a session or excursion deletion
#[derive(Debug, Clone, Serialize)]
pub struct DeletionResponse {
    #[serde(flatten)]
    pub report: CompensationReport,
    pub cancelled_count: usize,
    /// Name of the CSV served with `?export=csv`
    pub export_filename: String,
}

impl From<CompensationReport> for DeletionResponse {
    fn from(report: CompensationReport) -> Self {
        Self {
            cancelled_count: report.ledger.len(),
            export_filename: report.scope.export_filename(),
            report,
        }
    }
}
