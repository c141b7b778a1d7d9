use crate::domain::ParseTimeOfDayError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("at least one IMEI is required")]
    MissingIdentifiers,
    #[error("an expected firmware version is required")]
    MissingExpectedVersion,
    #[error("the monitoring interval must be at least one minute")]
    InvalidInterval,
    #[error("invalid fixed time: {0}")]
    InvalidFixedTime(#[from] ParseTimeOfDayError),
    #[error("at least one recipient is required")]
    MissingRecipients,
    #[error("{0} is required")]
    MissingField(&'static str),
}
