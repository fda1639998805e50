use crate::config::Endpoints;
use crate::error::{ErrorKind, TestError};
use crate::types::{Connection, Direction, Measurement, ServerReport, TestHeader, Thread, NA};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// iperf interval report, with the optional UDP server-report tail
/// (`jitter ms  lost/total (pct%)`).
pub static REPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\[\s*(?P<id>\d+|SUM)\]\s+(?P<start>\d+(?:\.\d+)?)\s*-\s*(?P<end>\d+(?:\.\d+)?)\s+sec\s+(?P<size>\d+(?:\.\d+)?)\s+(?P<size_units>[KMG]?Bytes)\s+(?P<speed>\d+(?:\.\d+)?)\s+(?P<speed_units>[KMG]?bits/sec)(?:\s+(?P<jitter>\d+(?:\.\d+)?)\s+ms\s+(?P<lost>\d+)\s*/\s*(?P<total>\d+)\s+\((?P<loss>[-+.\deE]+)%\))?"
    ).unwrap()
});

/// `[  3] local 10.0.0.2 port 40000 connected with 1.2.3.4 port 5001`
pub static CONNECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\[\s*(?P<id>\d+)\]\s+local\s+(?P<lip>\S+)\s+port\s+(?P<lport>\d+)\s+connected\s+with\s+(?P<sip>\S+)\s+port\s+(?P<sport>\d+)"
    ).unwrap()
});

static SENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[\s*(?P<id>\d+)\]\s+Sent\s+(?P<n>\d+)\s+datagrams").unwrap()
});

static SERVER_REPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[\s*(?P<id>\d+)\]\s+Server Report").unwrap()
});

static TEST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Starting Test\s+(?P<num>\d+)").unwrap()
});

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").unwrap()
});

/// Phrases the harness or iperf print when a run fails, lowercased.
const HARNESS_ERRORS: [(&str, ErrorKind); 10] = [
    ("test timeout", ErrorKind::TestTimeout),
    ("ping timeout", ErrorKind::PingTimeout),
    ("did not receive ack", ErrorKind::NoAckReceived),
    ("no ack received", ErrorKind::NoAckReceived),
    ("write failed", ErrorKind::WriteFailure),
    ("write failure", ErrorKind::WriteFailure),
    ("network is unreachable", ErrorKind::NetworkUnreachable),
    ("network unreachable", ErrorKind::NetworkUnreachable),
    ("bad exit value", ErrorKind::BadExitValue),
    ("wrong connection", ErrorKind::WrongConnection),
];

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DURATION_SECS: u32 = 10;

/// Number after `Starting Test`, 0 when absent.
pub fn test_number(chunk: &str) -> u32 {
    TEST_NUMBER_RE
        .captures(chunk)
        .and_then(|c| c["num"].parse().ok())
        .unwrap_or(0)
}

/// First dotted-quad address in `text`.
pub fn first_ipv4(text: &str) -> Option<&str> {
    IPV4_RE.find(text).map(|m| m.as_str())
}

/// The error a failed run reported, if any phrase is present.
pub fn detect_harness_error(chunk: &str) -> Option<TestError> {
    let lower = chunk.to_lowercase();
    HARNESS_ERRORS.iter().find_map(|(phrase, kind)| {
        lower.contains(phrase).then(|| {
            let line = chunk
                .lines()
                .find(|l| l.to_lowercase().contains(phrase))
                .unwrap_or(*phrase)
                .trim();
            TestError::with_message(*kind, line)
        })
    })
}

/// Flags and values of the `Iperf command line:` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct IperfCommand {
    pub raw: String,
    pub target: Option<String>,
    pub port: u16,
    pub duration_secs: u32,
    pub datagram_size: String,
    pub target_bandwidth: String,
}

impl IperfCommand {
    /// Locate and parse the command line within a chunk.
    pub fn find(chunk: &str) -> Option<Self> {
        let line = chunk.lines().find(|l| l.contains("Iperf command line"))?;
        let raw = line
            .split_once("Iperf command line")
            .map(|(_, rest)| rest.trim_start_matches(':').trim())
            .unwrap_or_default();
        if raw.is_empty() {
            return None;
        }
        Some(Self::parse(raw))
    }

    pub fn parse(raw: &str) -> Self {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let flag = |name: &str| -> Option<String> {
            let pos = tokens.iter().position(|t| *t == name)?;
            tokens.get(pos + 1).map(|v| v.to_string())
        };

        Self {
            raw: raw.to_string(),
            target: flag("-c"),
            port: flag("-p").and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT),
            duration_secs: flag("-t")
                .and_then(|t| t.parse::<f64>().ok())
                .map(|t| t.round() as u32)
                .unwrap_or(DEFAULT_DURATION_SECS),
            datagram_size: flag("-l").unwrap_or_else(|| NA.to_string()),
            target_bandwidth: flag("-b").unwrap_or_else(|| NA.to_string()),
        }
    }
}

/// Fill `receiver_ip` and `endpoint` from the command target, falling back
/// to the first address in the chunk.
pub fn locate_receiver(header: &mut TestHeader, command: Option<&IperfCommand>, chunk: &str, endpoints: &Endpoints) {
    let ip = command
        .and_then(|c| c.target.clone())
        .or_else(|| first_ipv4(chunk).map(str::to_string));
    if let Some(ip) = ip {
        header.endpoint = endpoints.classify(&ip);
        header.receiver_ip = ip;
    }
}

fn parse_measurement(caps: &regex::Captures<'_>) -> Measurement {
    let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse().ok()).unwrap_or(0.0);
    Measurement {
        time_start: num("start"),
        time_end: num("end"),
        size: num("size"),
        size_units: caps["size_units"].to_string(),
        speed: num("speed"),
        speed_units: caps["speed_units"].to_string(),
    }
}

/// Parse one interval report line. `[SUM]` lines yield `None`.
pub fn parse_report_line(line: &str) -> Option<(u32, Measurement)> {
    let caps = REPORT_RE.captures(line)?;
    let id = caps["id"].parse().ok()?;
    Some((id, parse_measurement(&caps)))
}

/// Parse a line carrying the UDP server-report tail.
pub fn parse_server_report_line(line: &str) -> Option<(u32, ServerReport)> {
    let caps = REPORT_RE.captures(line)?;
    let id = caps["id"].parse().ok()?;
    caps.name("jitter")?;
    let int = |name: &str| caps.name(name).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    Some((
        id,
        ServerReport {
            measurement: parse_measurement(&caps),
            jitter_ms: caps["jitter"].parse().unwrap_or(0.0),
            datagrams_lost: int("lost"),
            datagrams_total: int("total"),
            loss_percent: caps["loss"].parse().unwrap_or(0.0),
        },
    ))
}

pub fn parse_connection_line(line: &str) -> Option<(u32, Connection)> {
    let caps = CONNECT_RE.captures(line)?;
    Some((
        caps["id"].parse().ok()?,
        Connection {
            local_ip: caps["lip"].to_string(),
            local_port: caps["lport"].parse().unwrap_or(0),
            server_ip: caps["sip"].to_string(),
            server_port: caps["sport"].parse().unwrap_or(0),
        },
    ))
}

/// Lines of one iperf thread, collected before validation.
#[derive(Debug, Default)]
pub(crate) struct ThreadLines {
    pub id: u32,
    pub connection: Connection,
    pub reports: Vec<Measurement>,
    pub datagrams_sent: Option<u64>,
    pub server_report: Option<ServerReport>,
}

/// Group report lines by thread id. A new connection line for an id opens
/// a fresh thread, since iperf reuses ids between the two halves of a
/// bidirectional run.
pub(crate) fn group_threads(chunk: &str) -> Vec<ThreadLines> {
    let mut threads: Vec<ThreadLines> = Vec::new();
    let mut open: HashMap<u32, usize> = HashMap::new();
    let mut awaiting_report: HashSet<u32> = HashSet::new();

    let slot = |id: u32, threads: &mut Vec<ThreadLines>, open: &mut HashMap<u32, usize>| -> usize {
        *open.entry(id).or_insert_with(|| {
            threads.push(ThreadLines {
                id,
                ..Default::default()
            });
            threads.len() - 1
        })
    };

    for line in chunk.lines() {
        if let Some((id, connection)) = parse_connection_line(line) {
            threads.push(ThreadLines {
                id,
                connection,
                ..Default::default()
            });
            open.insert(id, threads.len() - 1);
            continue;
        }

        if let Some(caps) = SERVER_REPORT_RE.captures(line) {
            if let Ok(id) = caps["id"].parse() {
                awaiting_report.insert(id);
            }
            continue;
        }

        if let Some(caps) = SENT_RE.captures(line) {
            if let Ok(id) = caps["id"].parse() {
                let idx = slot(id, &mut threads, &mut open);
                threads[idx].datagrams_sent = caps["n"].parse().ok();
            }
            continue;
        }

        let Some((id, measurement)) = parse_report_line(line) else {
            continue;
        };

        if awaiting_report.remove(&id) {
            if let Some((_, report)) = parse_server_report_line(line) {
                let idx = slot(id, &mut threads, &mut open);
                threads[idx].server_report.get_or_insert(report);
                continue;
            }
        }

        let idx = slot(id, &mut threads, &mut open);
        threads[idx].reports.push(measurement);
    }

    threads
}

/// Split a thread's reports into interval measurements and the final
/// whole-run summary, which iperf prints last.
pub(crate) fn build_thread(lines: &ThreadLines, direction: Direction) -> Result<Thread, String> {
    let Some((final_measurement, rest)) = lines.reports.split_last() else {
        return Err(format!("Thread {} has no measurements", lines.id));
    };

    let mut measurements = rest.to_vec();
    measurements.sort_by(|a, b| a.time_start.total_cmp(&b.time_start));

    let last_end = measurements.iter().map(|m| m.time_end).fold(0.0, f64::max);
    if final_measurement.time_end < last_end {
        return Err(format!(
            "Thread {} final measurement ends at {} before interval end {}",
            lines.id, final_measurement.time_end, last_end
        ));
    }

    Ok(Thread {
        thread_number: lines.id,
        direction,
        connection: lines.connection.clone(),
        measurements,
        final_measurement: final_measurement.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_line() {
        let (id, m) = parse_report_line("[  3]  0.0- 1.0 sec   256 KBytes  2.10 Mbits/sec").unwrap();
        assert_eq!(id, 3);
        assert_eq!(m.time_start, 0.0);
        assert_eq!(m.time_end, 1.0);
        assert_eq!(m.size, 256.0);
        assert_eq!(m.size_units, "KBytes");
        assert_eq!(m.speed, 2.10);
        assert_eq!(m.speed_units, "Mbits/sec");
    }

    #[test]
    fn test_sum_lines_ignored() {
        assert!(parse_report_line("[SUM]  0.0-10.0 sec  5.00 MBytes  4.19 Mbits/sec").is_none());
    }

    #[test]
    fn test_parse_server_report_line() {
        let line = "[  3]  0.0- 5.0 sec  62.5 KBytes  102 Kbits/sec  12.345 ms    2/   45 (4.4%)";
        let (id, report) = parse_server_report_line(line).unwrap();
        assert_eq!(id, 3);
        assert_eq!(report.jitter_ms, 12.345);
        assert_eq!(report.datagrams_lost, 2);
        assert_eq!(report.datagrams_total, 45);
        assert_eq!(report.loss_percent, 4.4);
        assert!(parse_server_report_line("[  3]  0.0- 1.0 sec   256 KBytes  2.10 Mbits/sec").is_none());
    }

    #[test]
    fn test_parse_connection_line() {
        let (id, conn) =
            parse_connection_line("[  4] local 10.0.0.2 port 40012 connected with 198.51.100.20 port 5001").unwrap();
        assert_eq!(id, 4);
        assert_eq!(conn.local_port, 40012);
        assert_eq!(conn.server_ip, "198.51.100.20");
        assert_eq!(conn.server_port, 5001);
    }

    #[test]
    fn test_command_flags() {
        let cmd = IperfCommand::find(
            "Starting Test 7\nIperf command line:/data/iperf -c 198.51.100.20 -u -l 220 -b 88k -i 1 -t 5 -p 5002\n",
        )
        .unwrap();
        assert_eq!(cmd.target.as_deref(), Some("198.51.100.20"));
        assert_eq!(cmd.port, 5002);
        assert_eq!(cmd.duration_secs, 5);
        assert_eq!(cmd.datagram_size, "220");
        assert_eq!(cmd.target_bandwidth, "88k");
    }

    #[test]
    fn test_command_defaults() {
        let cmd = IperfCommand::parse("iperf -c 203.0.113.10 -w 64k");
        assert_eq!(cmd.port, DEFAULT_PORT);
        assert_eq!(cmd.duration_secs, DEFAULT_DURATION_SECS);
        assert_eq!(cmd.datagram_size, NA);
        assert_eq!(cmd.target_bandwidth, NA);
        assert!(IperfCommand::find("Starting Test 1\nno command here\n").is_none());
    }

    #[test]
    fn test_harness_error_detection() {
        let err = detect_harness_error("Starting Test 5\nWARNING: did not receive ack of last datagram after 10 tries.\n")
            .unwrap();
        assert_eq!(err.kind, ErrorKind::NoAckReceived);
        assert!(err.message.contains("did not receive ack"));
        assert!(detect_harness_error("Starting Test 5\nall good\n").is_none());
    }

    #[test]
    fn test_group_threads_reopens_reused_ids() {
        let chunk = "\
[  3] local 10.0.0.2 port 40000 connected with 198.51.100.20 port 5001
[  3]  0.0- 1.0 sec   256 KBytes  2.10 Mbits/sec
[  3]  0.0- 1.0 sec   256 KBytes  2.10 Mbits/sec
[  3] local 10.0.0.2 port 5001 connected with 198.51.100.20 port 41000
[  3]  0.0- 1.0 sec   128 KBytes  1.05 Mbits/sec
";
        let threads = group_threads(chunk);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].reports.len(), 2);
        assert_eq!(threads[1].connection.local_port, 5001);
    }

    #[test]
    fn test_build_thread_rejects_short_final() {
        let lines = ThreadLines {
            id: 3,
            reports: vec![
                parse_report_line("[  3]  0.0- 1.0 sec   256 KBytes  2.10 Mbits/sec").unwrap().1,
                parse_report_line("[  3]  1.0- 2.0 sec   256 KBytes  2.10 Mbits/sec").unwrap().1,
                parse_report_line("[  3]  0.0- 1.5 sec   512 KBytes  2.10 Mbits/sec").unwrap().1,
            ],
            ..Default::default()
        };
        assert!(build_thread(&lines, Direction::Up).is_err());
        assert!(build_thread(&ThreadLines::default(), Direction::Up).is_err());
    }
}
