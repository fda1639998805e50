use crate::error::{ErrorKind, TestError};
use crate::metrics::DerivedMetrics;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel for any textual value that was not recorded.
pub const NA: &str = "NA";

/// Sentinel for an RTT or latency that could not be measured.
pub const MISSING_MS: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestKind {
    Ping,
    Traceroute,
    Tcp,
    Udp,
}

impl TestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Ping => "PING",
            TestKind::Traceroute => "TCRT",
            TestKind::Tcp => "TCP",
            TestKind::Udp => "UDP",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The named test server a sub-test connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Endpoint {
    East,
    West,
    #[default]
    Unknown,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::East => "East",
            Endpoint::West => "West",
            Endpoint::Unknown => NA,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        })
    }
}

/// Position of a test in its file. `sub` is zero except for the bundled
/// one second UDP tests, which share `test` and count `sub` from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestKey {
    pub test: u32,
    pub sub: u32,
}

impl TestKey {
    pub fn new(test: u32) -> Self {
        Self { test, sub: 0 }
    }

    pub fn with_sub(test: u32, sub: u32) -> Self {
        Self { test, sub }
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub == 0 {
            write!(f, "{}", self.test)
        } else {
            write!(f, "{}.{}", self.test, self.sub)
        }
    }
}

/// Attributes every test variant carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHeader {
    pub kind: TestKind,
    pub endpoint: Endpoint,
    pub test_number: u32,
    pub sub_test_number: u32,
    pub receiver_ip: String,
    pub error: Option<TestError>,
}

impl TestHeader {
    pub fn new(kind: TestKind) -> Self {
        Self {
            kind,
            endpoint: Endpoint::Unknown,
            test_number: 0,
            sub_test_number: 0,
            receiver_ip: NA.to_string(),
            error: None,
        }
    }

    pub fn key(&self) -> TestKey {
        TestKey::with_sub(self.test_number, self.sub_test_number)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Flags an error unless one is already recorded; the first error wins.
    pub fn flag(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// One iperf report line: an interval and the data moved during it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub time_start: f64,
    pub time_end: f64,
    pub size: f64,
    pub size_units: String,
    pub speed: f64,
    pub speed_units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerReport {
    pub measurement: Measurement,
    pub jitter_ms: f64,
    pub datagrams_lost: u64,
    pub datagrams_total: u64,
    pub loss_percent: f64,
}

/// Both ends of an iperf connection, from its `local ... connected with` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub local_ip: String,
    pub local_port: u16,
    pub server_ip: String,
    pub server_port: u16,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            local_ip: NA.to_string(),
            local_port: 0,
            server_ip: NA.to_string(),
            server_port: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub thread_number: u32,
    pub direction: Direction,
    pub connection: Connection,
    pub measurements: Vec<Measurement>,
    pub final_measurement: Measurement,
}

impl Thread {
    pub fn speeds(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.speed).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UdpThread {
    pub thread: Thread,
    pub datagrams_sent: u64,
    pub server_report: ServerReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingPacket {
    /// Round trip time in milliseconds, [`MISSING_MS`] when the packet was lost.
    pub rtt_ms: f64,
    pub ttl: u32,
}

impl PingPacket {
    pub fn lost() -> Self {
        Self {
            rtt_ms: MISSING_MS,
            ttl: 0,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.rtt_ms < 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingStats {
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packets_lost: u32,
    pub loss_percent: u32,
    pub rtt_min: f64,
    pub rtt_avg: f64,
    pub rtt_max: f64,
}

impl PingStats {
    /// Canned statistics used when a ping test could not be parsed.
    pub fn placeholder() -> Self {
        Self {
            packets_sent: 10,
            packets_received: 0,
            packets_lost: 10,
            loss_percent: 100,
            rtt_min: MISSING_MS,
            rtt_avg: MISSING_MS,
            rtt_max: MISSING_MS,
        }
    }
}

/// The two ping output shapes the harnesses produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PingDialect {
    /// `--- host ping statistics ---` followed by comma and slash joined lines
    Unix,
    /// `Ping statistics for host:` followed by `key = value` lines
    Windows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingTest {
    pub header: TestHeader,
    pub dialect: PingDialect,
    pub packets: Vec<PingPacket>,
    pub stats: PingStats,
}

impl PingTest {
    pub fn rtts(&self) -> Vec<f64> {
        self.packets.iter().map(|p| p.rtt_ms).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    pub number: u32,
    pub name: String,
    pub ip: String,
    pub latency_ms: Option<f64>,
}

impl Hop {
    pub fn placeholder(number: u32) -> Self {
        Self {
            number,
            name: NA.to_string(),
            ip: NA.to_string(),
            latency_ms: None,
        }
    }

    pub fn latency_display(&self) -> String {
        self.latency_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| NA.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteTest {
    pub header: TestHeader,
    pub destination: String,
    /// Named location of the destination, `NA` when it is not a known server.
    pub location: String,
    pub max_hops: u32,
    /// Hops actually reported, before padding.
    pub hop_count: usize,
    /// Always `max_hops` long; entries past `hop_count` are placeholders.
    pub hops: Vec<Hop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpTest {
    pub header: TestHeader,
    pub command_line: String,
    pub port: u16,
    pub duration_secs: u32,
    pub up_threads: Vec<Thread>,
    pub down_threads: Vec<Thread>,
}

impl TcpTest {
    pub fn threads(&self, direction: Direction) -> &[Thread] {
        match direction {
            Direction::Up => &self.up_threads,
            Direction::Down => &self.down_threads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UdpTest {
    pub header: TestHeader,
    pub command_line: String,
    pub port: u16,
    pub duration_secs: u32,
    pub datagram_size: String,
    pub target_bandwidth: String,
    pub threads: Vec<UdpThread>,
}

impl UdpTest {
    pub fn server_report(&self) -> Option<&ServerReport> {
        self.threads.first().map(|t| &t.server_report)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestResult {
    Ping(PingTest),
    Traceroute(TracerouteTest),
    Tcp(TcpTest),
    Udp(UdpTest),
}

impl TestResult {
    pub fn header(&self) -> &TestHeader {
        match self {
            TestResult::Ping(t) => &t.header,
            TestResult::Traceroute(t) => &t.header,
            TestResult::Tcp(t) => &t.header,
            TestResult::Udp(t) => &t.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut TestHeader {
        match self {
            TestResult::Ping(t) => &mut t.header,
            TestResult::Traceroute(t) => &mut t.header,
            TestResult::Tcp(t) => &mut t.header,
            TestResult::Udp(t) => &mut t.header,
        }
    }

    pub fn kind(&self) -> TestKind {
        self.header().kind
    }

    pub fn key(&self) -> TestKey {
        self.header().key()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.header().endpoint
    }

    pub fn has_error(&self) -> bool {
        self.header().has_error()
    }

    /// Test length in seconds for iperf tests.
    pub fn duration_secs(&self) -> Option<u32> {
        match self {
            TestResult::Tcp(t) => Some(t.duration_secs),
            TestResult::Udp(t) => Some(t.duration_secs),
            _ => None,
        }
    }

    pub fn as_ping(&self) -> Option<&PingTest> {
        match self {
            TestResult::Ping(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_traceroute(&self) -> Option<&TracerouteTest> {
        match self {
            TestResult::Traceroute(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tcp(&self) -> Option<&TcpTest> {
        match self {
            TestResult::Tcp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_udp(&self) -> Option<&UdpTest> {
        match self {
            TestResult::Udp(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    FieldTest,
    Traceroute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceType {
    #[default]
    Phone,
    Tablet,
    #[serde(rename = "iPhone")]
    IPhone,
    Netbook,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceType::Phone => "Phone",
            DeviceType::Tablet => "Tablet",
            DeviceType::IPhone => "iPhone",
            DeviceType::Netbook => "Netbook",
        })
    }
}

/// Header metadata of a log file. Absent values hold [`NA`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: DeviceType,
    pub tester: String,
    pub app_version: String,
    pub os_name: String,
    pub os_architecture: String,
    pub os_version: String,
    pub java_version: String,
    pub java_vendor: String,
    pub server: String,
    pub host: String,
    pub network_provider: String,
    pub network_operator: String,
    pub network_carrier: String,
    pub connection_type: String,
    pub location_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub coord_pairs: Vec<(f64, f64)>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        let na = || NA.to_string();
        Self {
            device_id: na(),
            device_type: DeviceType::default(),
            tester: na(),
            app_version: na(),
            os_name: na(),
            os_architecture: na(),
            os_version: na(),
            java_version: na(),
            java_vendor: na(),
            server: na(),
            host: na(),
            network_provider: na(),
            network_operator: na(),
            network_carrier: na(),
            connection_type: na(),
            location_id: na(),
            latitude: 0.0,
            longitude: 0.0,
            coord_pairs: Vec::new(),
        }
    }
}

/// A fully parsed log file. Check `error` before trusting aggregates, and
/// each test's own error flag before trusting its numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub kind: FileKind,
    pub file_path: String,
    pub filename: String,
    pub timestamp: Option<NaiveDateTime>,
    pub date: String,
    pub time: String,
    pub device: DeviceInfo,
    pub tests: Vec<TestResult>,
    #[serde(skip)]
    pub(crate) by_number: BTreeMap<TestKey, usize>,
    pub error: Option<TestError>,
    pub derived: DerivedMetrics,
}
