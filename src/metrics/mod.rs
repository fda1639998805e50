//! Values computed from parsed tests after a file is complete.

pub mod throughput;
pub mod video;
pub mod voice;

use crate::error::ErrorKind;
use crate::types::{Endpoint, FileRecord, NA};
use serde::Serialize;
use std::fmt;

pub use video::{StreamProfile, VideoMetrics, VideoQuality};
pub use voice::VoiceInputs;

/// A derived value, or why it could not be derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum Derived<T> {
    Value(T),
    /// An input test was flagged with this error.
    TestError(ErrorKind),
    /// An input test was absent or unusable.
    NotAvailable,
}

impl<T> Default for Derived<T> {
    fn default() -> Self {
        Derived::NotAvailable
    }
}

impl<T> Derived<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Derived::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Derived<U> {
        match self {
            Derived::Value(v) => Derived::Value(f(v)),
            Derived::TestError(kind) => Derived::TestError(kind),
            Derived::NotAvailable => Derived::NotAvailable,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Derived::Value(_))
    }
}

impl<T: fmt::Display> fmt::Display for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derived::Value(v) => write!(f, "{}", v),
            Derived::TestError(kind) => f.write_str(kind.label()),
            Derived::NotAvailable => f.write_str(NA),
        }
    }
}

/// Voice and video quality toward one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DirectionMetrics {
    pub r_value: Derived<f64>,
    pub mos: Derived<f64>,
    pub video: VideoMetrics,
}

impl DirectionMetrics {
    fn failed(kind: ErrorKind) -> Self {
        Self {
            r_value: Derived::TestError(kind),
            mos: Derived::TestError(kind),
            video: VideoMetrics::failed(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub west: DirectionMetrics,
    pub east: DirectionMetrics,
}

impl DerivedMetrics {
    pub fn get(&self, endpoint: Endpoint) -> Option<&DirectionMetrics> {
        match endpoint {
            Endpoint::East => Some(&self.east),
            Endpoint::West => Some(&self.west),
            Endpoint::Unknown => None,
        }
    }
}

/// Compute every derived metric of a parsed file.
pub fn derive_metrics(record: &FileRecord) -> DerivedMetrics {
    if let Some(kind) = record.error.as_ref().map(|e| e.kind) {
        if matches!(kind, ErrorKind::ConnectivityFailed | ErrorKind::NoTestsFound) {
            return DerivedMetrics {
                west: DirectionMetrics::failed(kind),
                east: DirectionMetrics::failed(kind),
            };
        }
    }

    DerivedMetrics {
        west: direction_metrics(record, Endpoint::West),
        east: direction_metrics(record, Endpoint::East),
    }
}

fn direction_metrics(record: &FileRecord, endpoint: Endpoint) -> DirectionMetrics {
    let r_value = voice_inputs(record, endpoint).map(|inputs| voice::r_value(&inputs));
    let mos = r_value.clone().map(voice::mos);
    let video = VideoMetrics::compute(&record.tcp_tests_for(endpoint), &mos);

    if !r_value.is_value() {
        log::warn!("{}: no voice quality toward {} ({})", record.filename, endpoint, r_value);
    }

    DirectionMetrics { r_value, mos, video }
}

/// Ping RTT and loss plus the mean UDP jitter toward `endpoint`.
pub fn voice_inputs(record: &FileRecord, endpoint: Endpoint) -> Derived<VoiceInputs> {
    let Some(ping) = record.ping_test_for(endpoint) else {
        return Derived::NotAvailable;
    };
    if let Some(kind) = ping.header.error_kind() {
        return Derived::TestError(kind);
    }
    if ping.stats.rtt_avg < 0.0 {
        return Derived::NotAvailable;
    }

    let udp = record.udp_tests_for(endpoint);
    let jitters: Vec<f64> = udp
        .iter()
        .filter(|t| !t.header.has_error())
        .filter_map(|t| t.server_report().map(|r| r.jitter_ms))
        .collect();
    let Some(jitter) = throughput::mean(&jitters) else {
        return udp
            .iter()
            .find_map(|t| t.header.error_kind())
            .map_or(Derived::NotAvailable, Derived::TestError);
    };

    Derived::Value(VoiceInputs {
        rtt_avg_ms: ping.stats.rtt_avg,
        jitter_ms: jitter,
        loss_percent: f64::from(ping.stats.loss_percent),
    })
}
