mod xlsx_exporter;

use crate::domain::QueryResult;
use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

pub use xlsx_exporter::XlsxExporter;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("could not write the workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Renders query results into a downloadable report.
pub trait ReportExporter: Send + Sync {
    fn export(&self, results: &[QueryResult], generated_at: DateTime<Utc>) -> Result<Vec<u8>, ReportError>;
}

/// Returns `report_YYYYMMDD_HHMMSS.xlsx` for the wall-clock time in `timezone`.
pub fn report_file_name(generated_at: DateTime<Utc>, timezone: FixedOffset) -> String {
    format!("report_{}.xlsx", generated_at.with_timezone(&timezone).format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn names_the_report_after_the_local_time() {
        let generated_at = Utc.with_ymd_and_hms(2025, 3, 11, 1, 2, 3).unwrap();
        let brasilia = FixedOffset::west_opt(3 * 3600).unwrap();

        assert_eq!(report_file_name(generated_at, brasilia), "report_20250310_220203.xlsx");
    }
}
