mod battery;
mod device_status;
mod query_result;
mod recency;
mod time_of_day;
mod timezones;
mod validation;
mod version;

pub use battery::battery_percentage;
pub use device_status::DeviceStatusRecord;
pub use query_result::{ERROR_MARKER, NOT_FOUND_MARKER, QueryOutcome, QueryResult, VersionMatch};
pub use recency::is_recently_online;
pub use time_of_day::{ParseTimeOfDayError, TimeOfDay};
pub use timezones::Timezones;
pub use validation::ValidationError;
pub use version::extract_version;
