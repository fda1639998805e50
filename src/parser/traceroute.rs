use crate::config::ParserConfig;
use crate::error::{ErrorKind, TestError};
use crate::parser::segment::split_on_blank_line_groups;
use crate::types::{Hop, TestHeader, TestKind, TracerouteTest, NA};

pub const DEFAULT_MAX_HOPS: u32 = 40;
/// Largest hop limit a trace can carry; the IP TTL is one byte.
pub const MAX_TTL: u32 = 255;

/// Parse one traceroute section. `number` is the section's position in
/// its file, counting from 1.
pub fn parse_traceroute_test(chunk: &str, number: u32, config: &ParserConfig) -> TracerouteTest {
    let mut header = TestHeader::new(TestKind::Traceroute);
    header.test_number = number;

    let trace = split_on_blank_line_groups(chunk)
        .into_iter()
        .find(|group| group.contains("traceroute to"));

    let Some(trace) = trace else {
        header.flag(TestError::with_message(ErrorKind::OutputError, "No route trace found"));
        return TracerouteTest {
            header,
            destination: NA.to_string(),
            location: NA.to_string(),
            max_hops: DEFAULT_MAX_HOPS,
            hop_count: 0,
            hops: (1..=DEFAULT_MAX_HOPS).map(Hop::placeholder).collect(),
        };
    };

    let mut lines = trace.lines().skip_while(|l| !l.contains("traceroute to"));
    let (destination, mut max_hops) = lines
        .next()
        .map(parse_first_line)
        .unwrap_or_else(|| (NA.to_string(), DEFAULT_MAX_HOPS));
    if max_hops > MAX_TTL {
        log::debug!("trace {} claims {} hops max", number, max_hops);
        header.flag(TestError::with_message(
            ErrorKind::OutputError,
            format!("Hop limit {} is above {}", max_hops, MAX_TTL),
        ));
        max_hops = DEFAULT_MAX_HOPS;
    }

    let mut hops: Vec<Hop> = lines
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| parse_hop_line(line, i as u32 + 1))
        .collect();
    let hop_count = hops.len();

    for n in hop_count as u32..max_hops {
        hops.push(Hop::placeholder(n + 1));
    }

    header.endpoint = config.endpoints.classify(&destination);
    header.receiver_ip = destination.clone();
    let location = config
        .route_location(&destination)
        .unwrap_or(NA)
        .to_string();

    TracerouteTest {
        header,
        destination,
        location,
        max_hops,
        hop_count,
        hops,
    }
}

/// `traceroute to 184.72.222.65 (184.72.222.65), 40 hops max, 38 byte packets`
fn parse_first_line(line: &str) -> (String, u32) {
    let mut tokens = line.split_whitespace().skip_while(|t| !t.contains('.'));
    let destination = tokens
        .next()
        .map(|t| t.trim_end_matches(',').to_string())
        .unwrap_or_else(|| NA.to_string());
    let max_hops = tokens
        .find_map(|t| t.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_HOPS);
    (destination, max_hops)
}

/// ` 3  core1.example.net (10.1.2.3)  12.345 ms` with `*` for anything
/// that did not answer.
pub fn parse_hop_line(line: &str, ordinal: u32) -> Hop {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let or_na = |v: &str| if v.is_empty() || v == "*" { NA.to_string() } else { v.to_string() };

    let number = tokens
        .first()
        .and_then(|t| t.parse().ok())
        .unwrap_or(ordinal);
    let name = or_na(tokens.get(1).copied().unwrap_or_default());
    let ip = tokens
        .get(2)
        .map(|t| t.trim_start_matches('(').trim_end_matches(')'))
        .unwrap_or_default();
    let latency_ms = tokens.get(3).and_then(|t| t.parse().ok());

    Hop {
        number,
        name,
        ip: or_na(ip),
        latency_ms,
    }
}
