use crate::config::ParserConfig;
use crate::error::Result;
use crate::parser::fields::{extract_labeled_value, extract_multi_labeled_values, value_after};
use crate::testers::{iphone_tester, TesterTable};
use crate::types::{DeviceInfo, DeviceType, NA};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

static RE_LATITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Latitude:\s*(?P<v>\S*)").unwrap()
});

static RE_LONGITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Longitude:\s*(?P<v>\S*)").unwrap()
});

/// `label: value` pairs, applied in order; a later label overwrites an
/// earlier one only when it is present in the file.
const PAIRS: [(&str, Field); 10] = [
    ("Server: ", Field::Server),
    ("Host: ", Field::Host),
    ("NetworkProvider: ", Field::NetworkProvider),
    ("Network Provider: ", Field::NetworkProvider),
    ("NetworkOperator: ", Field::NetworkOperator),
    ("Device ID: ", Field::DeviceId),
    ("Host name: ", Field::DeviceId),
    ("ConnectionType: ", Field::ConnectionType),
    ("Location ID: ", Field::LocationId),
    ("Location: ", Field::LocationId),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    Server,
    Host,
    NetworkProvider,
    NetworkOperator,
    DeviceId,
    ConnectionType,
    LocationId,
}

impl Field {
    fn slot(self, device: &mut DeviceInfo) -> &mut String {
        match self {
            Field::Server => &mut device.server,
            Field::Host => &mut device.host,
            Field::NetworkProvider => &mut device.network_provider,
            Field::NetworkOperator => &mut device.network_operator,
            Field::DeviceId => &mut device.device_id,
            Field::ConnectionType => &mut device.connection_type,
            Field::LocationId => &mut device.location_id,
        }
    }
}

fn na_if_empty(value: &str) -> String {
    if value.trim().is_empty() {
        NA.to_string()
    } else {
        value.trim().to_string()
    }
}

/// Extract device metadata from a log file's text. `signature` is the
/// phrase identifying the file kind (`CPUC Tester`, `CPUC Traceroute`).
pub fn extract_device_info(
    content: &str,
    filename: &str,
    signature: &str,
    config: &ParserConfig,
    testers: &TesterTable,
) -> Result<DeviceInfo> {
    let mut device = DeviceInfo::default();
    let mut reader = Cursor::new(content.as_bytes());

    let os = extract_multi_labeled_values(
        &mut reader,
        &["Name =", "Architecture =", ", Version ="],
        &["os_name", "os_architecture", "os_version"],
    )?;
    let java = extract_multi_labeled_values(
        &mut reader,
        &[": Version =", "Vendor ="],
        &["java_version", "java_vendor"],
    )?;
    for (field, value) in os.into_iter().chain(java) {
        let Some(value) = value else { continue };
        let slot = match field.as_str() {
            "os_name" => &mut device.os_name,
            "os_architecture" => &mut device.os_architecture,
            "os_version" => &mut device.os_version,
            "java_version" => &mut device.java_version,
            _ => &mut device.java_vendor,
        };
        *slot = na_if_empty(&value);
    }

    for (label, field) in PAIRS {
        if let Some(value) = extract_labeled_value(&mut reader, label)? {
            *field.slot(&mut device) = na_if_empty(&value);
        }
    }

    let signature_line = content.lines().find(|l| l.contains(signature)).unwrap_or_default();
    device.app_version = na_if_empty(value_after(signature_line, signature));

    device.network_carrier = network_carrier(&device.network_provider, &device.network_operator, config);
    device.device_type = device_type(content, filename, signature_line);
    device.tester = tester_for(&device, testers);

    device.coord_pairs = coordinate_pairs(content);
    let (latitude, longitude) = best_coordinates(&device.coord_pairs);
    device.latitude = latitude;
    device.longitude = longitude;

    Ok(device)
}

/// Canonical carrier from the provider and operator fields. Confirmed
/// names win; two known aliases are mapped; anything else is `NA`.
pub fn network_carrier(provider: &str, operator: &str, config: &ParserConfig) -> String {
    if config.is_confirmed_carrier(provider) {
        provider.to_string()
    } else if config.is_confirmed_carrier(operator) {
        operator.to_string()
    } else if provider == "sprint" {
        "Sprint".to_string()
    } else if operator == "Verizon Wireless" {
        "Verizon".to_string()
    } else {
        NA.to_string()
    }
}

/// Mobile apps print `Testing started at`; netbook harness logs do not,
/// and their filenames carry `WBBD`.
fn device_type(content: &str, filename: &str, signature_line: &str) -> DeviceType {
    let is_mobile = content.contains("Testing started at") && !filename.contains("WBBD");
    if !is_mobile {
        return DeviceType::Netbook;
    }
    if signature_line.to_lowercase().contains("tablet") {
        DeviceType::Tablet
    } else if content.lines().any(|l| l.contains("iPhone")) {
        DeviceType::IPhone
    } else {
        DeviceType::Phone
    }
}

fn tester_for(device: &DeviceInfo, testers: &TesterTable) -> String {
    if device.device_id == NA {
        return NA.to_string();
    }
    let tester = if device.device_type == DeviceType::IPhone {
        iphone_tester(&device.device_id)
    } else {
        testers.lookup(&device.device_id).map(str::to_string)
    };
    tester.unwrap_or_else(|| NA.to_string())
}

fn parse_coordinate(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Every `Latitude:` line paired with the `Longitude:` line directly
/// after it; a missing or unreadable value is 0.
pub fn coordinate_pairs(content: &str) -> Vec<(f64, f64)> {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let lat = RE_LATITUDE.captures(line)?;
            let lon = lines
                .get(i + 1)
                .and_then(|next| RE_LONGITUDE.captures(next))
                .map_or(0.0, |c| parse_coordinate(&c["v"]));
            Some((parse_coordinate(&lat["v"]), lon))
        })
        .collect()
}

/// The last pair with both coordinates non-zero, `(0, 0)` when none.
pub fn best_coordinates(pairs: &[(f64, f64)]) -> (f64, f64) {
    pairs
        .iter()
        .rev()
        .find(|(lat, lon)| *lat != 0.0 && *lon != 0.0)
        .copied()
        .unwrap_or((0.0, 0.0))
}
