//! Flat report rows built from parsed files.
//!
//! A row is a list of cells in header order. Cells for a test that failed
//! carry its error tag; cells for a test that is absent carry the file's
//! error tag, or `NA` when the file itself is fine.

use crate::metrics::throughput::{final_speed_sum, tcp_period, tcp_rating, SpeedSummary};
use crate::metrics::{Derived, DirectionMetrics};
use crate::parser::traceroute::DEFAULT_MAX_HOPS;
use crate::query::TestFilters;
use crate::types::{
    Direction, Endpoint, FileKind, FileRecord, TcpTest, TestKind, TestResult, TracerouteTest, NA,
};
use std::fmt::Display;

const ENDPOINTS: [Endpoint; 2] = [Endpoint::West, Endpoint::East];
const DIRECTIONS: [Direction; 2] = [Direction::Up, Direction::Down];

/// Column spelling of a direction, `Up` or `Down`.
fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "Up",
        Direction::Down => "Down",
    }
}
const ONE_SECOND_SUBS: [u32; 3] = [1, 2, 3];

/// Turns a parsed file into one report row.
pub trait RowExtractor: Send + Sync {
    fn headers(&self) -> Vec<String>;
    fn extract(&self, record: &FileRecord) -> Vec<String>;
}

/// The row layout for a file kind.
pub fn extractor_for(kind: FileKind) -> Box<dyn RowExtractor> {
    match kind {
        FileKind::FieldTest => Box::new(FieldTestRow),
        FileKind::Traceroute => Box::<TracerouteRow>::default(),
    }
}

// ============================================================================
// Shared cells
// ============================================================================

const DEVICE_HEADERS: [&str; 17] = [
    "Filename",
    "Date",
    "Time",
    "DeviceID",
    "DeviceType",
    "Tester",
    "AppVersion",
    "OSName",
    "OSArchitecture",
    "OSVersion",
    "NetworkProvider",
    "NetworkCarrier",
    "ConnectionType",
    "LocationID",
    "Latitude",
    "Longitude",
    "FileError",
];

fn device_cells(record: &FileRecord) -> Vec<String> {
    let d = &record.device;
    vec![
        record.filename.clone(),
        record.date.clone(),
        record.time.clone(),
        d.device_id.clone(),
        d.device_type.to_string(),
        d.tester.clone(),
        d.app_version.clone(),
        d.os_name.clone(),
        d.os_architecture.clone(),
        d.os_version.clone(),
        d.network_provider.clone(),
        d.network_carrier.clone(),
        d.connection_type.clone(),
        d.location_id.clone(),
        d.latitude.to_string(),
        d.longitude.to_string(),
        absent(record),
    ]
}

/// Cell value for a test the file does not hold.
fn absent(record: &FileRecord) -> String {
    record
        .error
        .as_ref()
        .map_or_else(|| NA.to_string(), |e| e.kind.tag().to_string())
}

/// `n` cells for one test: its values, or its error tag repeated.
fn test_cells<T>(
    record: &FileRecord,
    test: Option<&T>,
    n: usize,
    error_tag: impl Fn(&T) -> Option<&'static str>,
    values: impl Fn(&T) -> Vec<String>,
) -> Vec<String> {
    match test {
        None => vec![absent(record); n],
        Some(t) => match error_tag(t) {
            Some(tag) => vec![tag.to_string(); n],
            None => values(t),
        },
    }
}

fn derived_cell<T>(value: &Derived<T>, show: impl Fn(&T) -> String) -> String {
    match value {
        Derived::Value(v) => show(v),
        Derived::TestError(kind) => kind.tag().to_string(),
        Derived::NotAvailable => NA.to_string(),
    }
}

fn fixed<T: Into<f64>>(v: T) -> String {
    format!("{:.2}", v.into())
}

fn opt_cell<T: Display>(v: Option<T>) -> String {
    v.map_or_else(|| NA.to_string(), |v| v.to_string())
}

// ============================================================================
// Field tests
// ============================================================================

/// Row of a field-test file: device header, ping, UDP, TCP and the
/// derived voice and video quality, West before East.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTestRow;

impl FieldTestRow {
    fn ping_cells(record: &FileRecord, endpoint: Endpoint) -> Vec<String> {
        test_cells(
            record,
            record.ping_test_for(endpoint),
            4,
            |p| p.header.error_kind().map(|k| k.tag()),
            |p| {
                vec![
                    p.stats.rtt_min.to_string(),
                    p.stats.rtt_max.to_string(),
                    p.stats.rtt_avg.to_string(),
                    p.stats.loss_percent.to_string(),
                ]
            },
        )
    }

    fn udp_cells(record: &FileRecord, filters: &TestFilters) -> Vec<String> {
        let test = record
            .find_tests(TestKind::Udp, filters)
            .into_iter()
            .find_map(TestResult::as_udp);
        test_cells(
            record,
            test,
            3,
            |u| u.header.error_kind().map(|k| k.tag()),
            |u| match u.server_report() {
                Some(report) => vec![
                    report.jitter_ms.to_string(),
                    report.loss_percent.to_string(),
                    u.duration_secs.to_string(),
                ],
                None => vec![NA.to_string(); 3],
            },
        )
    }

    fn tcp_tests(record: &FileRecord, endpoint: Endpoint) -> [Option<&TcpTest>; 2] {
        let tests = record.tcp_tests_for(endpoint);
        [tests.first().copied(), tests.get(1).copied()]
    }

    fn tcp_sum_cells(record: &FileRecord, test: Option<&TcpTest>) -> Vec<String> {
        test_cells(
            record,
            test,
            2,
            |t| t.header.error_kind().map(|k| k.tag()),
            |t| {
                DIRECTIONS
                    .iter()
                    .map(|&dir| final_speed_sum(t.threads(dir)).to_string())
                    .collect()
            },
        )
    }

    fn tcp_stat_cells(record: &FileRecord, test: Option<&TcpTest>, direction: Direction) -> Vec<String> {
        test_cells(
            record,
            test,
            5,
            |t| t.header.error_kind().map(|k| k.tag()),
            |t| {
                let summary = SpeedSummary::from_threads(t.threads(direction));
                vec![
                    opt_cell(summary.map(|s| fixed(s.mean))),
                    opt_cell(summary.map(|s| fixed(s.median))),
                    opt_cell(summary.map(|s| fixed(s.std_dev))),
                    opt_cell(tcp_rating(t, direction).map(fixed)),
                    opt_cell(tcp_period(t, direction).map(fixed)),
                ]
            },
        )
    }

    fn quality_cells(metrics: &DirectionMetrics) -> Vec<String> {
        vec![
            derived_cell(&metrics.r_value, |v| fixed(*v)),
            derived_cell(&metrics.mos, |v| fixed(*v)),
            derived_cell(&metrics.video.down, |p| p.quality.to_string()),
            derived_cell(&metrics.video.up, |p| p.quality.to_string()),
            derived_cell(&metrics.video.conference, |q| q.to_string()),
        ]
    }
}

impl RowExtractor for FieldTestRow {
    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = DEVICE_HEADERS.iter().map(|h| h.to_string()).collect();

        for ep in ENDPOINTS {
            for field in ["RTTMin", "RTTMax", "RTTAvg", "Loss"] {
                headers.push(format!("{}_PING_{}", ep, field));
            }
        }
        for ep in ENDPOINTS {
            for sub in ONE_SECOND_SUBS {
                for field in ["Jitter", "Loss", "Interval"] {
                    headers.push(format!("{}_UDP1_{}_{}", ep, sub, field));
                }
            }
        }
        for ep in ENDPOINTS {
            for field in ["Jitter", "Loss", "Interval"] {
                headers.push(format!("{}_UDP5_{}", ep, field));
            }
        }
        for ep in ENDPOINTS {
            for n in 1..=2 {
                for dir in DIRECTIONS {
                    headers.push(format!("{}_TCP{}_{}", ep, n, direction_label(dir)));
                }
            }
        }
        for ep in ENDPOINTS {
            for n in 1..=2 {
                for dir in DIRECTIONS {
                    for field in ["Mean", "Median", "StdDev", "Rating", "Period"] {
                        headers.push(format!("{}_TCP{}_{}_{}", ep, n, direction_label(dir), field));
                    }
                }
            }
        }
        for ep in ENDPOINTS {
            for field in ["RValue", "MOS", "VideoDown", "VideoUp", "VideoConference"] {
                headers.push(format!("{}_{}", ep, field));
            }
        }

        headers
    }

    fn extract(&self, record: &FileRecord) -> Vec<String> {
        let mut row = device_cells(record);

        for ep in ENDPOINTS {
            row.extend(Self::ping_cells(record, ep));
        }
        for ep in ENDPOINTS {
            for sub in ONE_SECOND_SUBS {
                let filters = TestFilters {
                    sub_test_number: Some(sub),
                    ..TestFilters::endpoint(ep).with_interval(1)
                };
                row.extend(Self::udp_cells(record, &filters));
            }
        }
        for ep in ENDPOINTS {
            row.extend(Self::udp_cells(record, &TestFilters::endpoint(ep).with_interval(5)));
        }
        for ep in ENDPOINTS {
            for test in Self::tcp_tests(record, ep) {
                row.extend(Self::tcp_sum_cells(record, test));
            }
        }
        for ep in ENDPOINTS {
            for test in Self::tcp_tests(record, ep) {
                for dir in DIRECTIONS {
                    row.extend(Self::tcp_stat_cells(record, test, dir));
                }
            }
        }
        for ep in ENDPOINTS {
            if let Some(metrics) = record.derived.get(ep) {
                row.extend(Self::quality_cells(metrics));
            }
        }

        row
    }
}

// ============================================================================
// Traceroutes
// ============================================================================

/// Row of a traceroute file: device header, then a fixed number of traces
/// each padded to `max_hops` hops.
#[derive(Debug, Clone, Copy)]
pub struct TracerouteRow {
    pub traces: usize,
    pub max_hops: u32,
}

impl Default for TracerouteRow {
    fn default() -> Self {
        Self {
            traces: 3,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

impl TracerouteRow {
    fn cells_per_trace(&self) -> usize {
        3 + 3 * self.max_hops as usize
    }

    fn trace_cells(&self, record: &FileRecord, trace: Option<&TracerouteTest>) -> Vec<String> {
        test_cells(
            record,
            trace,
            self.cells_per_trace(),
            |t| t.header.error_kind().map(|k| k.tag()),
            |t| {
                let mut cells = vec![t.destination.clone(), t.location.clone(), t.hop_count.to_string()];
                for n in 0..self.max_hops as usize {
                    match t.hops.get(n) {
                        Some(hop) => {
                            cells.push(hop.name.clone());
                            cells.push(hop.ip.clone());
                            cells.push(hop.latency_display());
                        }
                        None => cells.extend([NA.to_string(), NA.to_string(), NA.to_string()]),
                    }
                }
                cells
            },
        )
    }
}

impl RowExtractor for TracerouteRow {
    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = DEVICE_HEADERS.iter().map(|h| h.to_string()).collect();
        for t in 1..=self.traces {
            headers.push(format!("TCRT{}_Destination", t));
            headers.push(format!("TCRT{}_Location", t));
            headers.push(format!("TCRT{}_HopCount", t));
            for hop in 1..=self.max_hops {
                headers.push(format!("TCRT{}_Hop{}_Name", t, hop));
                headers.push(format!("TCRT{}_Hop{}_IP", t, hop));
                headers.push(format!("TCRT{}_Hop{}_Latency", t, hop));
            }
        }
        headers
    }

    fn extract(&self, record: &FileRecord) -> Vec<String> {
        let traces: Vec<&TracerouteTest> = record
            .tests(TestKind::Traceroute)
            .into_iter()
            .filter_map(TestResult::as_traceroute)
            .collect();

        let mut row = device_cells(record);
        for i in 0..self.traces {
            row.extend(self.trace_cells(record, traces.get(i).copied()));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TestError};
    use crate::metrics::derive_metrics;
    use crate::types::{Hop, PingDialect, PingStats, PingTest, TestHeader};

    fn ping(endpoint: Endpoint, number: u32, error: Option<ErrorKind>) -> TestResult {
        let mut header = TestHeader::new(TestKind::Ping);
        header.endpoint = endpoint;
        header.test_number = number;
        if let Some(kind) = error {
            header.flag(TestError::new(kind));
        }
        TestResult::Ping(PingTest {
            header,
            dialect: PingDialect::Unix,
            packets: Vec::new(),
            stats: PingStats {
                packets_sent: 10,
                packets_received: 10,
                packets_lost: 0,
                loss_percent: 0,
                rtt_min: 40.0,
                rtt_avg: 50.0,
                rtt_max: 60.0,
            },
        })
    }

    #[test]
    fn test_field_row_matches_headers() {
        let mut record = FileRecord::new(FileKind::FieldTest, "/x/a.txt", "a.txt");
        record.push_test(ping(Endpoint::West, 3, None));
        record.push_test(ping(Endpoint::East, 4, Some(ErrorKind::TotalPacketLoss)));
        record.derived = derive_metrics(&record);

        let row = FieldTestRow;
        let headers = row.headers();
        let cells = row.extract(&record);
        assert_eq!(headers.len(), cells.len());

        let cell = |name: &str| cells[headers.iter().position(|h| h == name).unwrap()].clone();
        assert_eq!(cell("Filename"), "a.txt");
        assert_eq!(cell("West_PING_RTTAvg"), "50");
        assert_eq!(cell("East_PING_RTTAvg"), "connect_error1");
        assert_eq!(cell("West_UDP5_Jitter"), NA);
        assert_eq!(cell("East_TCP2_Down"), NA);
    }

    #[test]
    fn test_tcp_headers_use_title_case_directions() {
        let headers = FieldTestRow.headers();
        for name in ["West_TCP1_Up", "East_TCP2_Down", "West_TCP2_Down_Median", "East_TCP1_Up_Period"] {
            assert!(headers.iter().any(|h| h == name), "missing {}", name);
        }
        assert!(!headers.iter().any(|h| h.contains("_UP") || h.contains("_DOWN")));
    }

    #[test]
    fn test_file_error_fills_absent_tests() {
        let mut record = FileRecord::new(FileKind::FieldTest, "/x/b.txt", "b.txt");
        record.flag(TestError::new(ErrorKind::ConnectivityFailed));
        record.derived = derive_metrics(&record);

        let row = FieldTestRow;
        let cells = row.extract(&record);
        let tag = ErrorKind::ConnectivityFailed.tag();
        assert_eq!(cells[16], tag);
        assert!(cells[DEVICE_HEADERS.len()..].iter().all(|c| c == tag));
    }

    #[test]
    fn test_traceroute_row() {
        let mut record = FileRecord::new(FileKind::Traceroute, "/x/t.txt", "t.txt");
        let mut hops: Vec<Hop> = (1..=4).map(Hop::placeholder).collect();
        hops[0] = Hop {
            number: 1,
            name: "gw".to_string(),
            ip: "10.0.0.1".to_string(),
            latency_ms: Some(3.5),
        };
        let mut header = TestHeader::new(TestKind::Traceroute);
        header.test_number = 1;
        record.push_test(TestResult::Traceroute(TracerouteTest {
            header,
            destination: "198.51.100.20".to_string(),
            location: "California".to_string(),
            max_hops: 4,
            hop_count: 1,
            hops,
        }));

        let row = TracerouteRow { traces: 2, max_hops: 4 };
        let headers = row.headers();
        let cells = row.extract(&record);
        assert_eq!(headers.len(), cells.len());

        let cell = |name: &str| cells[headers.iter().position(|h| h == name).unwrap()].clone();
        assert_eq!(cell("TCRT1_Location"), "California");
        assert_eq!(cell("TCRT1_Hop1_Latency"), "3.5");
        assert_eq!(cell("TCRT1_Hop2_IP"), NA);
        assert_eq!(cell("TCRT2_Destination"), NA);
    }

    #[test]
    fn test_extractor_for_kind() {
        assert_eq!(extractor_for(FileKind::FieldTest).headers().len(), FieldTestRow.headers().len());
        assert_eq!(
            extractor_for(FileKind::Traceroute).headers().len(),
            TracerouteRow::default().headers().len()
        );
    }
}
