use crate::config::Endpoints;
use crate::error::{ErrorKind, TestError};
use crate::parser::iperf::{self, IperfCommand, DEFAULT_DURATION_SECS, DEFAULT_PORT};
use crate::types::{Connection, Direction, TcpTest, TestHeader, TestKind, NA};

/// Parse one TCP iperf sub-test chunk.
pub fn parse_tcp_test(chunk: &str, endpoints: &Endpoints) -> TcpTest {
    let mut header = TestHeader::new(TestKind::Tcp);
    header.test_number = iperf::test_number(chunk);

    let command = IperfCommand::find(chunk);
    iperf::locate_receiver(&mut header, command.as_ref(), chunk, endpoints);

    let mut test = TcpTest {
        header,
        command_line: command.as_ref().map_or_else(|| NA.to_string(), |c| c.raw.clone()),
        port: command.as_ref().map_or(DEFAULT_PORT, |c| c.port),
        duration_secs: command.as_ref().map_or(DEFAULT_DURATION_SECS, |c| c.duration_secs),
        up_threads: Vec::new(),
        down_threads: Vec::new(),
    };

    if command.is_none() {
        test.header.flag(TestError::with_message(
            ErrorKind::OutputError,
            "Iperf Command Line not Found",
        ));
        return test;
    }

    if let Some(err) = iperf::detect_harness_error(chunk) {
        log::debug!("tcp test {} reported {}", test.header.test_number, err.kind);
        test.header.flag(err);
        return test;
    }

    for lines in iperf::group_threads(chunk) {
        let direction = direction_of(&lines.connection, test.port);
        match iperf::build_thread(&lines, direction) {
            Ok(thread) => match direction {
                Direction::Up => test.up_threads.push(thread),
                Direction::Down => test.down_threads.push(thread),
            },
            Err(message) => {
                test.header.flag(TestError::with_message(ErrorKind::OutputError, message));
                test.up_threads.clear();
                test.down_threads.clear();
                return test;
            }
        }
    }

    if test.up_threads.is_empty() && test.down_threads.is_empty() {
        test.header.flag(TestError::with_message(
            ErrorKind::OutputError,
            "No thread measurements found",
        ));
    }

    test
}

/// Connections made to the server's iperf port carry uploads; connections
/// the server opened back to the device carry downloads.
fn direction_of(connection: &Connection, port: u16) -> Direction {
    if connection.server_port == port {
        Direction::Up
    } else if connection.local_port == port {
        Direction::Down
    } else {
        Direction::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Endpoint;

    const TCP_CHUNK: &str = "Starting Test 1: TCP West
Iperf command line:/data/iperf -c 198.51.100.20 -e -w 64k -P 2 -i 1 -t 2 -f k -r -p 5001
------------------------------------------------------------
Client connecting to 198.51.100.20, TCP port 5001
[  3] local 10.0.0.2 port 40000 connected with 198.51.100.20 port 5001
[  4] local 10.0.0.2 port 40001 connected with 198.51.100.20 port 5001
[  3]  0.0- 1.0 sec   256 KBytes  2100 Kbits/sec
[  4]  0.0- 1.0 sec   256 KBytes  2000 Kbits/sec
[SUM]  0.0- 1.0 sec   512 KBytes  4100 Kbits/sec
[  3]  1.0- 2.0 sec   256 KBytes  2200 Kbits/sec
[  4]  1.0- 2.0 sec   256 KBytes  1900 Kbits/sec
[  3]  0.0- 2.0 sec   512 KBytes  2150 Kbits/sec
[  4]  0.0- 2.0 sec   512 KBytes  1950 Kbits/sec
[  5] local 10.0.0.2 port 5001 connected with 198.51.100.20 port 41000
[  5]  0.0- 1.0 sec   384 KBytes  3100 Kbits/sec
[  5]  1.0- 2.0 sec   384 KBytes  3000 Kbits/sec
[  5]  0.0- 2.0 sec   768 KBytes  3050 Kbits/sec
";

    #[test]
    fn test_parse_tcp_threads_by_direction() {
        let test = parse_tcp_test(TCP_CHUNK, &Endpoints::default());
        assert!(!test.header.has_error(), "{:?}", test.header.error);
        assert_eq!(test.header.test_number, 1);
        assert_eq!(test.header.endpoint, Endpoint::West);
        assert_eq!(test.duration_secs, 2);
        assert_eq!(test.up_threads.len(), 2);
        assert_eq!(test.down_threads.len(), 1);

        let up = &test.up_threads[0];
        assert_eq!(up.thread_number, 3);
        assert_eq!(up.measurements.len(), 2);
        assert_eq!(up.final_measurement.speed, 2150.0);
        assert_eq!(test.down_threads[0].speeds(), vec![3100.0, 3000.0]);
    }

    #[test]
    fn test_missing_command_line() {
        let test = parse_tcp_test("Starting Test 2: TCP East\nnothing\n", &Endpoints::default());
        assert_eq!(test.header.error_kind(), Some(ErrorKind::OutputError));
        assert_eq!(test.header.error.as_ref().unwrap().message, "Iperf Command Line not Found");
        assert!(test.up_threads.is_empty());
    }

    #[test]
    fn test_harness_error_stops_parsing() {
        let chunk = "Starting Test 2: TCP East\nIperf command line:iperf -c 203.0.113.10 -t 10\nwrite failed: Broken pipe\n";
        let test = parse_tcp_test(chunk, &Endpoints::default());
        assert_eq!(test.header.error_kind(), Some(ErrorKind::WriteFailure));
        assert_eq!(test.header.endpoint, Endpoint::East);
    }

    #[test]
    fn test_no_threads() {
        let chunk = "Starting Test 2: TCP East\nIperf command line:iperf -c 203.0.113.10 -t 10\n";
        let test = parse_tcp_test(chunk, &Endpoints::default());
        assert_eq!(test.header.error_kind(), Some(ErrorKind::OutputError));
    }
}
