use crate::config::ParserConfig;
use crate::error::{ErrorKind, Result, TestError};
use crate::metrics::derive_metrics;
use crate::parser::device::extract_device_info;
use crate::parser::segment::{split_on_blank_line_groups, LogText, Segmentation};
use crate::parser::{ping, tcp, traceroute, udp};
use crate::record::sort_by_timestamp;
use crate::testers::TesterTable;
use crate::time::parse_header_timestamp;
use crate::types::{DeviceInfo, FileKind, FileRecord, TestResult};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Header phrase of a field-test log.
pub const FIELD_TEST_SIGNATURE: &str = "CPUC Tester";
/// Header phrase of a standalone traceroute log.
pub const TRACEROUTE_SIGNATURE: &str = "CPUC Traceroute";

static RE_PING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bping").unwrap());

/// Kind of sub-test a chunk holds, sniffed from its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKind {
    Tcp,
    Udp,
    UdpBundle,
    Ping,
}

fn classify_chunk(chunk: &str) -> Option<ChunkKind> {
    let lower = chunk.to_lowercase();
    if lower.contains("udp") {
        if udp::is_one_second_bundle(chunk) {
            Some(ChunkKind::UdpBundle)
        } else {
            Some(ChunkKind::Udp)
        }
    } else if lower.contains("tcp") {
        Some(ChunkKind::Tcp)
    } else if RE_PING.is_match(chunk) {
        Some(ChunkKind::Ping)
    } else {
        None
    }
}

/// Kind of log file, from the phrases in its first paragraph.
pub fn detect_file_kind(text: &str) -> Option<FileKind> {
    let groups = split_on_blank_line_groups(text);
    let first = groups.first()?;
    if first.contains(FIELD_TEST_SIGNATURE) {
        Some(FileKind::FieldTest)
    } else if first.contains(TRACEROUTE_SIGNATURE) {
        Some(FileKind::Traceroute)
    } else {
        None
    }
}

/// Parses log files into [`FileRecord`]s. Cheap to clone; the config and
/// tester table are shared read-only between clones and batch workers.
#[derive(Debug, Clone)]
pub struct FileParser {
    config: Arc<ParserConfig>,
    testers: Arc<TesterTable>,
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl FileParser {
    /// Parser using the built-in tester table.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config: Arc::new(config),
            testers: TesterTable::shared(),
        }
    }

    /// Parser honouring `config.tester_table` when it is set.
    pub fn from_config(config: ParserConfig) -> Result<Self> {
        let testers = match &config.tester_table {
            Some(path) => {
                let testers = TesterTable::load(path)?;
                log::info!("loaded {} testers from {}", testers.len(), path.display());
                Some(testers)
            }
            None => None,
        };
        let parser = Self::new(config);
        Ok(match testers {
            Some(testers) => parser.with_testers(testers),
            None => parser,
        })
    }

    pub fn with_testers(mut self, testers: TesterTable) -> Self {
        self.testers = Arc::new(testers);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Read and parse one file. `Ok(None)` when the file is not a
    /// recognised log; `Err` only when it cannot be read.
    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> Result<Option<FileRecord>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.parse_text(&path.to_string_lossy(), &text))
    }

    /// Parse a log held in memory. `file_path` is recorded on the result
    /// and its file name feeds the device-type heuristic.
    pub fn parse_text(&self, file_path: &str, text: &str) -> Option<FileRecord> {
        let log = LogText::new(text);
        let Some(kind) = detect_file_kind(log.as_str()) else {
            log::debug!("{}: not a field test or traceroute log", file_path);
            return None;
        };

        let filename = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());

        let mut record = FileRecord::new(kind, file_path, &filename);
        record.set_timestamp(parse_header_timestamp(log.as_str()));

        let signature = match kind {
            FileKind::FieldTest => FIELD_TEST_SIGNATURE,
            FileKind::Traceroute => TRACEROUTE_SIGNATURE,
        };
        record.device = extract_device_info(log.as_str(), &filename, signature, &self.config, &self.testers)
            .unwrap_or_else(|e| {
                log::warn!("{}: header extraction failed: {}", filename, e);
                DeviceInfo::default()
            });

        match kind {
            FileKind::FieldTest => self.collect_field_tests(&log, &mut record),
            FileKind::Traceroute => self.collect_traceroutes(&log, &mut record),
        }

        record.check_test_count();
        record.derived = derive_metrics(&record);
        Some(record)
    }

    fn collect_field_tests(&self, log: &LogText, record: &mut FileRecord) {
        let chunks = match log.test_chunks() {
            Segmentation::Chunks(chunks) => chunks,
            Segmentation::Failed(kind) => {
                record.flag(TestError::new(*kind));
                return;
            }
        };

        let endpoints = &self.config.endpoints;
        for chunk in chunks {
            match classify_chunk(chunk) {
                Some(ChunkKind::Tcp) => record.push_test(TestResult::Tcp(tcp::parse_tcp_test(chunk, endpoints))),
                Some(ChunkKind::Udp) => record.push_test(TestResult::Udp(udp::parse_udp_test(chunk, endpoints))),
                Some(ChunkKind::UdpBundle) => {
                    for test in udp::parse_udp_bundle(chunk, endpoints) {
                        record.push_test(TestResult::Udp(test));
                    }
                }
                Some(ChunkKind::Ping) => record.push_test(TestResult::Ping(ping::parse_ping_test(chunk, endpoints))),
                None => {
                    log::debug!(
                        "{}: skipping unrecognised chunk {:?}",
                        record.filename,
                        chunk.lines().next().unwrap_or_default()
                    );
                }
            }
        }
    }

    fn collect_traceroutes(&self, log: &LogText, record: &mut FileRecord) {
        let traces: Vec<String> = split_on_blank_line_groups(log.as_str())
            .into_iter()
            .filter(|group| group.contains("traceroute to"))
            .collect();

        if traces.is_empty() {
            record.flag(TestError::with_message(
                ErrorKind::NetworkUnreachable,
                "No route traces found in the file",
            ));
            return;
        }

        for (i, trace) in traces.iter().enumerate() {
            let test = traceroute::parse_traceroute_test(trace, i as u32 + 1, &self.config);
            record.push_test(TestResult::Traceroute(test));
        }
    }

    /// Parse many files in parallel. Outcomes keep the input order.
    pub fn parse_batch(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<Option<FileRecord>>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.parse_path(path)))
            .collect()
    }

    /// Parse many files and return the recognised ones sorted by timestamp.
    /// Unreadable and unrecognised files are logged and dropped.
    pub fn parse_batch_sorted(&self, paths: &[PathBuf]) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self
            .parse_batch(paths)
            .into_iter()
            .filter_map(|(path, outcome)| match outcome {
                Ok(Some(record)) => Some(record),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("{}: {}", path.display(), e);
                    None
                }
            })
            .collect();
        sort_by_timestamp(&mut records);
        records
    }
}

/// Parse one file with the default configuration.
pub fn parse_log_file<P: AsRef<Path>>(path: P) -> Result<Option<FileRecord>> {
    FileParser::default().parse_path(path)
}
