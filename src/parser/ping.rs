use crate::config::Endpoints;
use crate::error::{ErrorKind, TestError};
use crate::parser::iperf::{first_ipv4, test_number};
use crate::types::{PingDialect, PingPacket, PingStats, PingTest, TestHeader, TestKind, MISSING_MS};
use once_cell::sync::Lazy;
use regex::Regex;

/// Per-packet failures; any of these marks the packet as lost.
const PACKET_ERRORS: [&str; 8] = [
    "request timed out",
    "request timeout",
    "general failure",
    "no resources",
    "host unreachable",
    "net unreachable",
    "dest unreachable",
    "time to live exceeded",
];

static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Parse one ping sub-test chunk. Never fails; problems are flagged on the
/// test header with canned statistics in place.
pub fn parse_ping_test(chunk: &str, endpoints: &Endpoints) -> PingTest {
    let mut header = TestHeader::new(TestKind::Ping);
    header.test_number = test_number(chunk);
    if let Some(ip) = first_ipv4(chunk) {
        header.endpoint = endpoints.classify(ip);
        header.receiver_ip = ip.to_string();
    }

    let dialect = if chunk.contains("Ping statistics for") {
        PingDialect::Windows
    } else {
        PingDialect::Unix
    };

    if chunk.contains("\n\n\n") && !chunk.contains("statistics") {
        header.flag(TestError::with_message(
            ErrorKind::OutputError,
            "Ping output was broken up by blank lines and has no statistics",
        ));
        return PingTest {
            header,
            dialect,
            packets: Vec::new(),
            stats: PingStats::placeholder(),
        };
    }

    let (packet_lines, stat_lines) = route_lines(chunk);
    let packets: Vec<PingPacket> = packet_lines.iter().filter_map(|l| parse_packet_line(l)).collect();

    let stats = match dialect {
        PingDialect::Unix => parse_unix_stats(&stat_lines),
        PingDialect::Windows => parse_windows_stats(&stat_lines),
    };

    let stats = match stats {
        Some(mut stats) => {
            if !packets.is_empty() && packets.len() as u32 != stats.packets_sent {
                log::debug!(
                    "ping test {}: {} packet lines, {} reported sent",
                    header.test_number,
                    packets.len(),
                    stats.packets_sent
                );
                stats.packets_sent = packets.len() as u32;
            }
            if stats.loss_percent >= 100 {
                header.flag(TestError::new(ErrorKind::TotalPacketLoss));
            }
            stats
        }
        None => {
            log::debug!("ping test {} has no readable statistics", header.test_number);
            header.flag(TestError::with_message(
                ErrorKind::OutputError,
                "Ping statistics could not be parsed",
            ));
            PingStats::placeholder()
        }
    };

    PingTest {
        header,
        dialect,
        packets,
        stats,
    }
}

/// Split a chunk into packet lines and statistics lines. Statistics start
/// at the first `statistics` line and stop at two consecutive blank lines
/// or a `Latitude` line.
fn route_lines(chunk: &str) -> (Vec<&str>, Vec<&str>) {
    let mut packets = Vec::new();
    let mut stats = Vec::new();
    let mut in_stats = false;
    let mut stats_done = false;
    let mut blank_run = 0;

    for line in chunk.lines() {
        let lower = line.to_lowercase();

        if in_stats {
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run >= 2 {
                    in_stats = false;
                    stats_done = true;
                }
                continue;
            }
            blank_run = 0;
            if lower.contains("latitude") {
                in_stats = false;
                stats_done = true;
                continue;
            }
            stats.push(line);
            continue;
        }

        if !stats_done && lower.contains("statistics") {
            in_stats = true;
            stats.push(line);
            continue;
        }

        if lower.contains("ttl") || is_packet_error(&lower) {
            packets.push(line);
        }
    }

    (packets, stats)
}

fn is_packet_error(lower: &str) -> bool {
    PACKET_ERRORS.iter().any(|e| lower.contains(e))
}

/// `64 bytes from 1.2.3.4: icmp_seq=1 ttl=52 time=23.4 ms` or
/// `Reply from 1.2.3.4: bytes=32 time=23ms TTL=52`.
pub fn parse_packet_line(line: &str) -> Option<PingPacket> {
    let lower = line.to_lowercase();
    if is_packet_error(&lower) {
        return Some(PingPacket::lost());
    }

    let rtt = ["time=", "time<"]
        .iter()
        .find_map(|marker| lower.split_once(marker))
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|token| token.trim_end_matches("ms").parse::<f64>().ok())?;

    let ttl = lower
        .split_once("ttl=")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|token| token.parse().ok())
        .unwrap_or(0);

    Some(PingPacket { rtt_ms: rtt, ttl })
}

fn first_number<T: std::str::FromStr>(text: &str) -> Option<T> {
    FIRST_NUMBER_RE.find(text)?.as_str().parse().ok()
}

/// Loss percentage derived from counts when the output omits it.
fn loss_from_counts(sent: u32, lost: u32) -> u32 {
    if sent == 0 {
        100
    } else {
        (f64::from(lost) / f64::from(sent) * 100.0).round() as u32
    }
}

fn rtt_or_missing(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().trim_end_matches("ms").trim().parse().ok())
        .unwrap_or(MISSING_MS)
}

/// `10 packets transmitted, 9 received, 10% packet loss, time 9012ms`
/// `rtt min/avg/max/mdev = 20.1/23.4/30.2/2.1 ms`
fn parse_unix_stats(lines: &[&str]) -> Option<PingStats> {
    let counts = lines.iter().find(|l| l.contains("transmitted"))?;
    let segments: Vec<&str> = counts.split(',').collect();

    let sent: u32 = first_number(segments.first()?)?;
    let received: u32 = segments
        .iter()
        .find(|s| s.contains("received"))
        .and_then(|s| first_number(s))
        .unwrap_or(0);
    let lost = sent.saturating_sub(received);

    let loss_percent = segments
        .iter()
        .find(|s| s.contains('%'))
        .and_then(|s| first_number::<f64>(s))
        .map(|p| p.round() as u32)
        .unwrap_or_else(|| loss_from_counts(sent, lost));

    let rtts: Vec<&str> = lines
        .iter()
        .find(|l| l.contains("min/avg/max"))
        .and_then(|l| l.split_once('='))
        .map(|(_, values)| values.split('/').collect())
        .unwrap_or_default();

    Some(PingStats {
        packets_sent: sent,
        packets_received: received,
        packets_lost: lost,
        loss_percent,
        rtt_min: rtt_or_missing(rtts.first().copied()),
        rtt_avg: rtt_or_missing(rtts.get(1).copied()),
        rtt_max: rtt_or_missing(rtts.get(2).map(|v| v.split_whitespace().next().unwrap_or_default())),
    })
}

/// Value of each `Key = value` pair on a comma separated line.
fn key_values(line: &str) -> Vec<(String, &str)> {
    line.split(',')
        .filter_map(|seg| seg.split_once('='))
        .map(|(k, v)| {
            let key = k.split_whitespace().last().unwrap_or_default().to_lowercase();
            (key, v.trim())
        })
        .collect()
}

/// `Packets: Sent = 4, Received = 4, Lost = 0 (0% loss),`
/// `Minimum = 20ms, Maximum = 31ms, Average = 24ms`
fn parse_windows_stats(lines: &[&str]) -> Option<PingStats> {
    let counts = key_values(lines.iter().find(|l| l.contains("Sent ="))?);
    let count = |name: &str| -> Option<u32> {
        counts
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| first_number(v))
    };

    let sent = count("sent")?;
    let received = count("received").unwrap_or(0);
    let lost = count("lost").unwrap_or_else(|| sent.saturating_sub(received));

    let loss_percent = counts
        .iter()
        .find(|(k, _)| k == "lost")
        .and_then(|(_, v)| v.split_once('(').map(|(_, pct)| pct))
        .filter(|pct| pct.contains('%'))
        .and_then(|pct| first_number::<f64>(pct))
        .map(|p| p.round() as u32)
        .unwrap_or_else(|| loss_from_counts(sent, lost));

    let rtts = lines
        .iter()
        .find(|l| l.contains("Minimum ="))
        .map(|l| key_values(l))
        .unwrap_or_default();
    let rtt = |name: &str| rtt_or_missing(rtts.iter().find(|(k, _)| k == name).map(|(_, v)| *v));

    Some(PingStats {
        packets_sent: sent,
        packets_received: received,
        packets_lost: lost,
        loss_percent,
        rtt_min: rtt("minimum"),
        rtt_avg: rtt("average"),
        rtt_max: rtt("maximum"),
    })
}
