use crate::config::Endpoints;
use crate::error::{ErrorKind, TestError};
use crate::parser::iperf::{self, IperfCommand, DEFAULT_DURATION_SECS, DEFAULT_PORT};
use crate::parser::segment::split_keeping_marker;
use crate::types::{Direction, TestHeader, TestKind, UdpTest, UdpThread, NA};
use once_cell::sync::Lazy;
use regex::Regex;

/// Marker opening each run inside a one second UDP bundle.
pub const ONE_SECOND_MARKER: &str = "Starting UDP 1";

static SUB_TEST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Test #\s*(?P<num>\d+)").unwrap());

/// Whether a UDP chunk holds several bundled one second runs.
pub fn is_one_second_bundle(chunk: &str) -> bool {
    chunk.contains("1 second Test") || chunk.contains(ONE_SECOND_MARKER)
}

/// Parse one UDP iperf sub-test chunk.
pub fn parse_udp_test(chunk: &str, endpoints: &Endpoints) -> UdpTest {
    let mut header = TestHeader::new(TestKind::Udp);
    header.test_number = iperf::test_number(chunk);

    let command = IperfCommand::find(chunk);
    iperf::locate_receiver(&mut header, command.as_ref(), chunk, endpoints);

    let mut test = UdpTest {
        header,
        command_line: command.as_ref().map_or_else(|| NA.to_string(), |c| c.raw.clone()),
        port: command.as_ref().map_or(DEFAULT_PORT, |c| c.port),
        duration_secs: command.as_ref().map_or(DEFAULT_DURATION_SECS, |c| c.duration_secs),
        datagram_size: command.as_ref().map_or_else(|| NA.to_string(), |c| c.datagram_size.clone()),
        target_bandwidth: command
            .as_ref()
            .map_or_else(|| NA.to_string(), |c| c.target_bandwidth.clone()),
        threads: Vec::new(),
    };

    if command.is_none() {
        test.header.flag(TestError::with_message(
            ErrorKind::OutputError,
            "Iperf Command Line not Found",
        ));
        return test;
    }

    if let Some(err) = iperf::detect_harness_error(chunk) {
        log::debug!("udp test {} reported {}", test.header.key(), err.kind);
        test.header.flag(err);
    }

    let mut threads = Vec::new();
    for lines in iperf::group_threads(chunk) {
        let thread = match iperf::build_thread(&lines, Direction::Up) {
            Ok(thread) => thread,
            Err(message) => {
                test.header.flag(TestError::with_message(ErrorKind::OutputError, message));
                return test;
            }
        };
        let Some(server_report) = lines.server_report else {
            test.header.flag(TestError::with_message(
                ErrorKind::OutputError,
                "Server Report not found",
            ));
            return test;
        };
        threads.push(UdpThread {
            datagrams_sent: lines.datagrams_sent.unwrap_or(server_report.datagrams_total),
            thread,
            server_report,
        });
    }

    if threads.is_empty() {
        test.header.flag(TestError::with_message(
            ErrorKind::OutputError,
            "No thread measurements found",
        ));
    }
    test.threads = threads;
    test
}

/// Split a one second bundle into its runs, each prefixed with the
/// bundle's `Starting Test` line so the outer number is kept. Runs
/// without an iperf command line are dropped.
pub fn split_one_second_bundle(chunk: &str) -> Vec<(u32, String)> {
    let starting_line = chunk.lines().next().unwrap_or_default();

    split_keeping_marker(chunk, ONE_SECOND_MARKER)
        .into_iter()
        .filter(|run| run.contains("Iperf command line"))
        .enumerate()
        .map(|(i, run)| {
            let sub = SUB_TEST_RE
                .captures(&run)
                .and_then(|c| c["num"].parse().ok())
                .unwrap_or(i as u32 + 1);
            (sub, format!("{}\n{}", starting_line, run))
        })
        .collect()
}

/// Parse every run of a one second bundle; each result is keyed by the
/// bundle's test number and its own sub-test number.
pub fn parse_udp_bundle(chunk: &str, endpoints: &Endpoints) -> Vec<UdpTest> {
    let outer = iperf::test_number(chunk);
    split_one_second_bundle(chunk)
        .into_iter()
        .map(|(sub, run)| {
            let mut test = parse_udp_test(&run, endpoints);
            test.header.test_number = outer;
            test.header.sub_test_number = sub;
            test
        })
        .collect()
}
