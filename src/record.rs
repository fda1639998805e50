use crate::error::{ErrorKind, Result, TestError};
use crate::metrics::DerivedMetrics;
use crate::time::{format_date, format_time};
use crate::types::{
    DeviceInfo, Direction, FileKind, FileRecord, PingTest, TcpTest, TestResult, TracerouteTest,
    UdpTest, NA,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Ping, TCP and UDP runs a complete field test contains.
pub const EXPECTED_FIELD_TESTS: usize = 14;

impl FileRecord {
    pub fn new(kind: FileKind, file_path: &str, filename: &str) -> Self {
        Self {
            kind,
            file_path: file_path.to_string(),
            filename: filename.to_string(),
            timestamp: None,
            date: NA.to_string(),
            time: NA.to_string(),
            device: DeviceInfo::default(),
            tests: Vec::new(),
            by_number: BTreeMap::new(),
            error: None,
            derived: DerivedMetrics::default(),
        }
    }

    pub fn set_timestamp(&mut self, timestamp: Option<chrono::NaiveDateTime>) {
        self.timestamp = timestamp;
        match timestamp {
            Some(ts) => {
                self.date = format_date(&ts);
                self.time = format_time(&ts);
            }
            None => {
                log::debug!("{}: no readable timestamp", self.filename);
                self.date = NA.to_string();
                self.time = NA.to_string();
            }
        }
    }

    /// Append a test and index it by its key; a repeated key points at
    /// the newest test.
    pub fn push_test(&mut self, test: TestResult) {
        if let Some(err) = &test.header().error {
            log::debug!("{}: test {} flagged {}", self.filename, test.key(), err);
        }
        self.by_number.insert(test.key(), self.tests.len());
        self.tests.push(test);
    }

    /// Flag a file-level error unless one is already set.
    pub fn flag(&mut self, error: TestError) {
        if self.error.is_none() {
            log::info!("{}: {}", self.filename, error);
            self.error = Some(error);
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// A field test must hold exactly [`EXPECTED_FIELD_TESTS`] tests unless
    /// it already failed for another reason.
    pub fn check_test_count(&mut self) {
        if self.kind != FileKind::FieldTest || self.error.is_some() {
            return;
        }
        let found = self.test_count();
        let message = match found.cmp(&EXPECTED_FIELD_TESTS) {
            Ordering::Equal => return,
            Ordering::Less => format!(
                "The {} necessary tests were not all performed. There are {} tests missing.",
                EXPECTED_FIELD_TESTS,
                EXPECTED_FIELD_TESTS - found
            ),
            Ordering::Greater => format!(
                "Expected {} tests but found {}. There are {} extra tests.",
                EXPECTED_FIELD_TESTS,
                found,
                found - EXPECTED_FIELD_TESTS
            ),
        };
        self.flag(TestError::with_message(ErrorKind::MissingTests, message));
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Order by embedded timestamp; a missing timestamp sorts first.
    pub fn cmp_by_timestamp(&self, other: &FileRecord) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

/// Sort records by timestamp, keeping input order for ties.
pub fn sort_by_timestamp(records: &mut [FileRecord]) {
    records.sort_by(FileRecord::cmp_by_timestamp);
}

fn write_error(f: &mut fmt::Formatter<'_>, error: &Option<TestError>) -> fmt::Result {
    match error {
        Some(err) => writeln!(f, "  ERROR: {} - {}", err.kind, err.message),
        None => Ok(()),
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.device;
        writeln!(f, "Filename: {}", self.filename)?;
        writeln!(f, "Date: {}  Time: {}", self.date, self.time)?;
        writeln!(f, "Device: {} ({}), tester {}", d.device_id, d.device_type, d.tester)?;
        writeln!(f, "App version: {}", d.app_version)?;
        writeln!(f, "OS: {} {} {}", d.os_name, d.os_architecture, d.os_version)?;
        writeln!(f, "Java: {} {}", d.java_version, d.java_vendor)?;
        writeln!(f, "Server: {}  Host: {}", d.server, d.host)?;
        writeln!(
            f,
            "Network: provider {}, operator {}, carrier {}, connection {}",
            d.network_provider, d.network_operator, d.network_carrier, d.connection_type
        )?;
        writeln!(f, "Location: {} at {}, {}", d.location_id, d.latitude, d.longitude)?;

        match &self.error {
            Some(err) => writeln!(f, "File error: {} - {}", err.kind, err.message)?,
            None => writeln!(f, "File error: none")?,
        }

        if self.tests.is_empty() {
            return writeln!(f, "No viable network speed tests");
        }

        for test in self.tests_by_number().values() {
            writeln!(f)?;
            write!(f, "{}", test)?;
        }
        Ok(())
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Ping(t) => write!(f, "{}", t),
            TestResult::Traceroute(t) => write!(f, "{}", t),
            TestResult::Tcp(t) => write!(f, "{}", t),
            TestResult::Udp(t) => write!(f, "{}", t),
        }
    }
}

impl fmt::Display for PingTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(f, "Test {} {} {} -> {}", h.key(), h.kind, h.endpoint, h.receiver_ip)?;
        write_error(f, &h.error)?;
        let rtts: Vec<String> = self.packets.iter().map(|p| p.rtt_ms.to_string()).collect();
        writeln!(f, "  RTTs: {}", rtts.join(", "))?;
        let s = &self.stats;
        writeln!(
            f,
            "  Sent {} Received {} Lost {} ({}% loss)",
            s.packets_sent, s.packets_received, s.packets_lost, s.loss_percent
        )?;
        writeln!(f, "  RTT min/avg/max: {}/{}/{}", s.rtt_min, s.rtt_avg, s.rtt_max)
    }
}

impl fmt::Display for TracerouteTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "Test {} {} -> {} ({}), {} of {} hops",
            h.key(),
            h.kind,
            self.destination,
            self.location,
            self.hop_count,
            self.max_hops
        )?;
        write_error(f, &h.error)?;
        for hop in self.hops.iter().take(self.hop_count) {
            writeln!(f, "  {:>2} {} {} {}", hop.number, hop.name, hop.ip, hop.latency_display())?;
        }
        Ok(())
    }
}

fn write_threads(f: &mut fmt::Formatter<'_>, label: Direction, threads: &[crate::types::Thread]) -> fmt::Result {
    for thread in threads {
        let fm = &thread.final_measurement;
        writeln!(
            f,
            "  {} thread {}: {} intervals, final {}-{} sec {} {}",
            label,
            thread.thread_number,
            thread.measurements.len(),
            fm.time_start,
            fm.time_end,
            fm.speed,
            fm.speed_units
        )?;
    }
    Ok(())
}

impl fmt::Display for TcpTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(f, "Test {} {} {} -> {}:{}", h.key(), h.kind, h.endpoint, h.receiver_ip, self.port)?;
        write_error(f, &h.error)?;
        write_threads(f, Direction::Up, &self.up_threads)?;
        write_threads(f, Direction::Down, &self.down_threads)
    }
}

impl fmt::Display for UdpTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "Test {} {} {} -> {}:{} (datagram {}, bandwidth {})",
            h.key(),
            h.kind,
            h.endpoint,
            h.receiver_ip,
            self.port,
            self.datagram_size,
            self.target_bandwidth
        )?;
        write_error(f, &h.error)?;
        for thread in &self.threads {
            write_threads(f, Direction::Up, std::slice::from_ref(&thread.thread))?;
            let r = &thread.server_report;
            writeln!(
                f,
                "  server report: jitter {} ms, lost {}/{} ({}%), sent {}",
                r.jitter_ms, r.datagrams_lost, r.datagrams_total, r.loss_percent, thread.datagrams_sent
            )?;
        }
        Ok(())
    }
}
