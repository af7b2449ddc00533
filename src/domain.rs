use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::source::FetchOutcome;

pub const DEFAULT_ENDPOINT: &str = "https://random-data-api.com/api/users/random_user";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TOTAL_RECORDS: usize = 2000;

pub const HELP_TEXT: &str = "\
q         quit
↑ ↓ k j   move row
← → h l   move header
PgUp PgDn scroll the page
g G       first / last row
s         sort by the selected header (again to flip)
1 2 3 4   toggle id / first_name / last_name / email
/         edit filter (Enter keep, Esc clear)
Enter     view all fields of the row
Esc       close dialog
n ]       next page
r         retry a failed fetch
c C       copy cell / row
?         this help";

#[derive(Debug)]
pub enum RUVError {
    IoError(Error),
    NetworkFailure(String),
    MalformedResponse(String),
    InvalidConfig(String),
}

impl fmt::Display for RUVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RUVError::IoError(e) => write!(f, "io error: {e}"),
            RUVError::NetworkFailure(msg) => write!(f, "network failure: {msg}"),
            RUVError::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            RUVError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for RUVError {}

impl From<Error> for RUVError {
    fn from(err: Error) -> Self {
        RUVError::IoError(err)
    }
}

impl From<reqwest::Error> for RUVError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RUVError::MalformedResponse(err.to_string())
        } else {
            RUVError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RUVError {
    fn from(err: serde_json::Error) -> Self {
        RUVError::MalformedResponse(err.to_string())
    }
}

#[derive(Debug, Clone, Setters)]
pub struct RUVConfig {
    pub endpoint: String,
    pub batch_size: usize,
    pub total_records: usize,
    pub timeout_secs: u64,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for RUVConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            total_records: DEFAULT_TOTAL_RECORDS,
            timeout_secs: 10,
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

impl RUVConfig {
    pub fn validate(self) -> Result<Self, RUVError> {
        if self.batch_size == 0 {
            return Err(RUVError::InvalidConfig("batch size must be positive".into()));
        }
        if self.total_records < self.batch_size {
            return Err(RUVError::InvalidConfig(format!(
                "total records ({}) must hold at least one batch ({})",
                self.total_records, self.batch_size
            )));
        }
        if reqwest::Url::parse(&self.endpoint).is_err() {
            return Err(RUVError::InvalidConfig(format!(
                "endpoint is not a url: {}",
                self.endpoint
            )));
        }
        Ok(self)
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Sort,
    ToggleColumn(usize),
    Filter,
    Enter,
    Exit,
    NextPage,
    Retry,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
    Fetched(FetchOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = RUVConfig::default().validate().unwrap();
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.total_records, 2000);
    }

    #[test]
    fn rejects_zero_batch_and_bad_endpoint() {
        assert!(matches!(
            RUVConfig::default().batch_size(0).validate(),
            Err(RUVError::InvalidConfig(_))
        ));
        assert!(matches!(
            RUVConfig::default().endpoint("not a url".to_string()).validate(),
            Err(RUVError::InvalidConfig(_))
        ));
        assert!(matches!(
            RUVConfig::default().total_records(10).validate(),
            Err(RUVError::InvalidConfig(_))
        ));
    }

    #[test]
    fn json_errors_are_malformed_responses() {
        let err: RUVError = serde_json::from_str::<Vec<u32>>("{").unwrap_err().into();
        assert!(matches!(err, RUVError::MalformedResponse(_)));
    }
}
