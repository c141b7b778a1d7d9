use chrono::{DateTime, FixedOffset, TimeZone};
use std::fmt::Display;

/// Formats timestamps the way they appear in reports and e-mails.
pub trait ReportFormat {
    /// `DD/MM/YYYY HH:MM:SS` in the timestamp's own timezone.
    fn to_report_format(&self) -> String;
}

impl<Tz: TimeZone> ReportFormat for DateTime<Tz>
where
    Tz::Offset: Display,
{
    fn to_report_format(&self) -> String {
        self.format("%d/%m/%Y %H:%M:%S").to_string()
    }
}

/// Returns the offset as a label like `UTC-03:00`.
pub fn offset_label(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("UTC{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}
