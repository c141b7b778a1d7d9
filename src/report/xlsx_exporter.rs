use crate::domain::{QueryResult, Timezones, VersionMatch, battery_percentage};
use crate::extensions::date_time_ext::{ReportFormat, offset_label};
use crate::report::{ReportError, ReportExporter};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, instrument};

const SHEET_NAME: &str = "Results";
const COLUMN_WIDTHS: [f64; 8] = [18.0, 16.0, 12.0, 26.0, 22.0, 8.0, 12.0, 16.0];

/// Writes results to a single-sheet Excel workbook.
///
/// Row 1 holds the generation time, row 2 the headers and every following row one result. Every cell is written as a
/// string, so identifiers and versions survive spreadsheet applications that would otherwise turn them into numbers.
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    timezones: Timezones,
}

impl XlsxExporter {
    pub fn new(timezones: Timezones) -> Self {
        XlsxExporter { timezones }
    }

    fn headers(&self) -> [String; 8] {
        let label = offset_label(self.timezones.target());
        [
            "IMEI".to_string(),
            "Version".to_string(),
            "Up to date?".to_string(),
            format!("Last seen ({})", label),
            "Online in last 24h?".to_string(),
            "Mode".to_string(),
            "Battery (%)".to_string(),
            "Status".to_string(),
        ]
    }

    fn row(&self, result: &QueryResult) -> [String; 8] {
        let up_to_date = match result.matches_expected {
            VersionMatch::Yes => "Yes",
            VersionMatch::No => "No",
            VersionMatch::Unknown => "-",
        };
        let last_seen = self
            .timezones
            .parse_last_seen(&result.last_seen)
            .map(|datetime| datetime.to_report_format())
            .unwrap_or_else(|| "-".to_string());

        [
            result.imei.clone(),
            result.version.clone(),
            up_to_date.to_string(),
            last_seen,
            if result.online_24h { "Yes" } else { "No" }.to_string(),
            non_empty_or_dash(&result.mode),
            battery_percentage(&result.self_check_param),
            result.status_tag.as_deref().map(non_empty_or_dash).unwrap_or_else(|| "-".to_string()),
        ]
    }
}

impl ReportExporter for XlsxExporter {
    #[instrument(skip_all, fields(results = results.len()))]
    fn export(&self, results: &[QueryResult], generated_at: DateTime<Utc>) -> Result<Vec<u8>, ReportError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        let generated_at = generated_at.with_timezone(&self.timezones.target());
        worksheet.write_string(
            0,
            0,
            format!("Report generated at: {} ({})", generated_at.to_report_format(), offset_label(self.timezones.target())),
        )?;

        for (col, header) in self.headers().iter().enumerate() {
            worksheet.write_string_with_format(1, col as u16, header, &header_format)?;
        }

        for (index, result) in results.iter().enumerate() {
            let row = index as u32 + 2;
            for (col, value) in self.row(result).iter().enumerate() {
                worksheet.write_string(row, col as u16, value)?;
            }
        }

        let buffer = workbook.save_to_buffer()?;
        debug!(bytes = buffer.len(), "📄 Exported report");
        Ok(buffer)
    }
}

fn non_empty_or_dash(value: &str) -> String {
    match value.trim() {
        "" => "-".to_string(),
        value => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ERROR_MARKER, NOT_FOUND_MARKER};
    use calamine::{Data, Reader, Xlsx};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn result(imei: &str, version: &str) -> QueryResult {
        QueryResult {
            imei: imei.to_string(),
            version: version.to_string(),
            last_seen: "2025-03-11 19:02:11".to_string(),
            online_24h: true,
            matches_expected: VersionMatch::Yes,
            mode: "1".to_string(),
            self_check_param: "VERSION:1.0;vBat=3950mV(82%)".to_string(),
            status_tag: None,
        }
    }

    fn read_back(bytes: Vec<u8>) -> Vec<Vec<Data>> {
        let mut workbook = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        range.rows().map(|row| row.to_vec()).collect()
    }

    fn text(row: &[Data]) -> Vec<String> {
        row.iter().map(|cell| cell.to_string()).collect()
    }

    fn export(results: &[QueryResult]) -> Vec<Vec<Data>> {
        let generated_at = Utc.with_ymd_and_hms(2025, 3, 11, 15, 4, 5).unwrap();
        let bytes = XlsxExporter::new(Timezones::default()).export(results, generated_at).unwrap();
        read_back(bytes)
    }

    #[test]
    fn writes_the_title_and_headers() {
        let rows = export(&[]);

        assert_eq!(text(&rows[0])[0], "Report generated at: 11/03/2025 12:04:05 (UTC-03:00)");
        assert_eq!(
            text(&rows[1]),
            vec![
                "IMEI",
                "Version",
                "Up to date?",
                "Last seen (UTC-03:00)",
                "Online in last 24h?",
                "Mode",
                "Battery (%)",
                "Status"
            ]
        );
    }

    #[test]
    fn keeps_identifiers_and_versions_as_text() {
        let rows = export(&[result("860000000000001", "1.0"), result("860000000000002", "2")]);

        assert_eq!(rows[2][0], Data::String("860000000000001".to_string()));
        assert_eq!(rows[2][1], Data::String("1.0".to_string()));
        assert_eq!(rows[3][0], Data::String("860000000000002".to_string()));
        assert_eq!(rows[3][1], Data::String("2".to_string()));
    }

    #[test]
    fn writes_a_result_row() {
        let mut tagged = result("860000000000001", "1.0");
        tagged.status_tag = Some("Installed".to_string());

        let rows = export(&[tagged]);

        assert_eq!(
            text(&rows[2]),
            vec!["860000000000001", "1.0", "Yes", "11/03/2025 08:02:11", "Yes", "1", "82%", "Installed"]
        );
    }

    #[test]
    fn writes_marker_rows_with_placeholders() {
        let rows = export(&[
            QueryResult::marker("860000000000001", ERROR_MARKER, "1.0"),
            QueryResult::marker("860000000000002", NOT_FOUND_MARKER, ""),
        ]);

        assert_eq!(text(&rows[2]), vec!["860000000000001", "ERROR", "No", "-", "No", "-", "-", "-"]);
        assert_eq!(text(&rows[3]), vec!["860000000000002", "NOT FOUND", "-", "-", "No", "-", "-", "-"]);
    }
}
