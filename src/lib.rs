//! Parser for field-test network diagnostic logs.
//!
//! A log file holds the raw output of iperf TCP/UDP runs, pings and
//! traceroutes captured on a field device. [`FileParser`] turns one file
//! into a [`FileRecord`] with typed tests, per-test error flags and the
//! derived voice and video quality figures; [`report`] flattens a record
//! into a report row.
//!
//! ```no_run
//! use fieldtest_parser::{FileParser, ParserConfig};
//!
//! let parser = FileParser::new(ParserConfig::default());
//! if let Some(record) = parser.parse_path("logs/99000348242368_0609.txt")? {
//!     println!("{}", record);
//! }
//! # Ok::<(), fieldtest_parser::ParserError>(())
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod query;
mod record;
pub mod report;
pub mod testers;
pub mod time;
pub mod types;

pub use config::{Endpoints, ParserConfig, RouteLocation};
pub use error::{ErrorKind, ParserError, Result, TestError};
pub use metrics::{derive_metrics, Derived, DerivedMetrics, DirectionMetrics};
pub use parser::{parse_log_file, FileParser};
pub use query::TestFilters;
pub use record::{sort_by_timestamp, EXPECTED_FIELD_TESTS};
pub use report::{extractor_for, FieldTestRow, RowExtractor, TracerouteRow};
pub use testers::TesterTable;
pub use types::{Endpoint, FileKind, FileRecord, TestKey, TestKind, TestResult};
