use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Data-quality classification attached to a test or a whole file.
///
/// Codes are grouped by hundreds: 1xx a single malformed sub-test,
/// 2xx a failure reported by the harness or iperf itself,
/// 3xx connectivity failures that stop segmentation, 4xx post-hoc
/// consistency failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    OutputError,
    TotalPacketLoss,
    TestTimeout,
    PingTimeout,
    NoAckReceived,
    WriteFailure,
    NetworkUnreachable,
    BadExitValue,
    WrongConnection,
    NoTestsFound,
    ConnectivityFailed,
    MissingTests,
}

impl ErrorKind {
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::OutputError => 101,
            ErrorKind::TotalPacketLoss => 102,
            ErrorKind::TestTimeout => 201,
            ErrorKind::PingTimeout => 202,
            ErrorKind::NoAckReceived => 203,
            ErrorKind::WriteFailure => 204,
            ErrorKind::NetworkUnreachable => 205,
            ErrorKind::BadExitValue => 206,
            ErrorKind::WrongConnection => 207,
            ErrorKind::NoTestsFound => 310,
            ErrorKind::ConnectivityFailed => 311,
            ErrorKind::MissingTests => 404,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        ALL_KINDS.iter().copied().find(|k| k.code() == code)
    }

    /// Human readable error type, as printed in debug reports.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::OutputError | ErrorKind::NoTestsFound => "Output Error",
            ErrorKind::TotalPacketLoss => "Total Packet Loss",
            ErrorKind::TestTimeout => "Test Timeout",
            ErrorKind::PingTimeout => "Ping Timeout",
            ErrorKind::NoAckReceived => "No ACK Received",
            ErrorKind::WriteFailure => "Write Failure",
            ErrorKind::NetworkUnreachable => "Network Unreachable",
            ErrorKind::BadExitValue => "Bad Exit Value",
            ErrorKind::WrongConnection => "Wrong Connection Made",
            ErrorKind::ConnectivityFailed => "Connectivity Test Failed",
            ErrorKind::MissingTests => "Unknown Error",
        }
    }

    /// Short category tag used in report cells.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::OutputError
            | ErrorKind::NoTestsFound
            | ErrorKind::BadExitValue
            | ErrorKind::WrongConnection => "bad_output",
            ErrorKind::TestTimeout => "timeout",
            ErrorKind::TotalPacketLoss | ErrorKind::PingTimeout | ErrorKind::NoAckReceived => {
                "connect_error1"
            }
            ErrorKind::WriteFailure | ErrorKind::NetworkUnreachable => "connect_error2",
            ErrorKind::ConnectivityFailed => "no effective service",
            ErrorKind::MissingTests => "unknown_error",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::OutputError => "The test output could not be parsed",
            ErrorKind::TotalPacketLoss => "Every packet sent during the test was lost",
            ErrorKind::TestTimeout => "The test did not finish in the allotted time",
            ErrorKind::PingTimeout => "The server did not answer the connectivity ping",
            ErrorKind::NoAckReceived => "The server never acknowledged the final datagram",
            ErrorKind::WriteFailure => "Writing to the connection failed",
            ErrorKind::NetworkUnreachable => "The network was unreachable",
            ErrorKind::BadExitValue => "The test process exited with a bad value",
            ErrorKind::WrongConnection => "The test connected to an unexpected server",
            ErrorKind::NoTestsFound => "No tests were found in the file",
            ErrorKind::ConnectivityFailed => "The device could not connect to the test servers",
            ErrorKind::MissingTests => "The expected number of tests was not found",
        }
    }
}

const ALL_KINDS: [ErrorKind; 12] = [
    ErrorKind::OutputError,
    ErrorKind::TotalPacketLoss,
    ErrorKind::TestTimeout,
    ErrorKind::PingTimeout,
    ErrorKind::NoAckReceived,
    ErrorKind::WriteFailure,
    ErrorKind::NetworkUnreachable,
    ErrorKind::BadExitValue,
    ErrorKind::WrongConnection,
    ErrorKind::NoTestsFound,
    ErrorKind::ConnectivityFailed,
    ErrorKind::MissingTests,
];

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// An error flagged on a test or file, with the message explaining it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TestError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_lookup() {
        for kind in ALL_KINDS {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(999), None);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<u16> = ALL_KINDS.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ALL_KINDS.len());
    }

    #[test]
    fn test_tags_match_report_categories() {
        assert_eq!(ErrorKind::ConnectivityFailed.tag(), "no effective service");
        assert_eq!(ErrorKind::TestTimeout.tag(), "timeout");
        assert_eq!(ErrorKind::NoAckReceived.tag(), "connect_error1");
        assert_eq!(ErrorKind::NetworkUnreachable.tag(), "connect_error2");
        assert_eq!(ErrorKind::OutputError.tag(), "bad_output");
        assert_eq!(ErrorKind::MissingTests.tag(), "unknown_error");
    }

    #[test]
    fn test_error_default_message() {
        let err = TestError::new(ErrorKind::MissingTests);
        assert_eq!(err.kind.code(), 404);
        assert!(!err.message.is_empty());
        assert!(err.to_string().starts_with("Unknown Error (404)"));
    }
}
