use crate::error::ErrorKind;
use crate::metrics::throughput::thread_sum_values;
use crate::metrics::Derived;
use crate::types::{Direction, TcpTest};
use serde::Serialize;
use std::fmt;

/// Speed at or above which a sample can carry HD video.
pub const HD_THRESHOLD: f64 = 2500.0;
/// Speed at or above which a sample can carry SD video.
pub const SD_THRESHOLD: f64 = 700.0;
/// Percentage of samples that must reach a bucket for the stream to
/// qualify for it.
pub const QUALIFYING_PERCENT: usize = 95;
/// Intervals taken from the start of each TCP test.
pub const SAMPLE_INTERVALS: usize = 10;

/// Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum VideoQuality {
    LD,
    SD,
    HD,
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoQuality::LD => "LD",
            VideoQuality::SD => "SD",
            VideoQuality::HD => "HD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProfile {
    pub ld_count: usize,
    pub sd_count: usize,
    pub hd_count: usize,
    pub quality: VideoQuality,
}

impl fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (LD {}, SD {}, HD {})",
            self.quality, self.ld_count, self.sd_count, self.hd_count
        )
    }
}

/// Bucket a set of speed samples. `None` for an empty set.
pub fn classify(samples: &[f64]) -> Option<StreamProfile> {
    if samples.is_empty() {
        return None;
    }
    let hd = samples.iter().filter(|s| **s >= HD_THRESHOLD).count();
    let sd = samples
        .iter()
        .filter(|s| **s >= SD_THRESHOLD && **s < HD_THRESHOLD)
        .count();
    let ld = samples.len() - hd - sd;

    let qualifies = |count: usize| count * 100 >= samples.len() * QUALIFYING_PERCENT;
    let quality = if qualifies(hd) {
        VideoQuality::HD
    } else if qualifies(hd + sd) {
        VideoQuality::SD
    } else {
        VideoQuality::LD
    };

    Some(StreamProfile {
        ld_count: ld,
        sd_count: sd,
        hd_count: hd,
        quality,
    })
}

/// Profile of one direction over the given TCP tests, taking the first
/// [`SAMPLE_INTERVALS`] summed intervals of each test in order.
pub fn stream_profile(tests: &[&TcpTest], direction: Direction) -> Derived<StreamProfile> {
    if let Some(kind) = tests.iter().find_map(|t| t.header.error_kind()) {
        return Derived::TestError(kind);
    }

    let samples: Vec<f64> = tests
        .iter()
        .flat_map(|t| thread_sum_values(t.threads(direction), Some(SAMPLE_INTERVALS)))
        .collect();

    classify(&samples).map_or(Derived::NotAvailable, Derived::Value)
}

/// A call below MOS 4 cannot hold a conference at any resolution;
/// otherwise the weaker of the two directions decides.
pub fn conference_quality(
    mos: &Derived<f64>,
    up: &Derived<StreamProfile>,
    down: &Derived<StreamProfile>,
) -> Derived<VideoQuality> {
    match mos {
        Derived::Value(m) if *m < 4.0 => return Derived::Value(VideoQuality::LD),
        Derived::Value(_) => {}
        Derived::TestError(kind) => return Derived::TestError(*kind),
        Derived::NotAvailable => return Derived::NotAvailable,
    }

    match (up, down) {
        (Derived::Value(u), Derived::Value(d)) => Derived::Value(u.quality.min(d.quality)),
        (Derived::TestError(kind), _) | (_, Derived::TestError(kind)) => Derived::TestError(*kind),
        _ => Derived::NotAvailable,
    }
}

/// Download, upload and conference classification for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetrics {
    pub down: Derived<StreamProfile>,
    pub up: Derived<StreamProfile>,
    pub conference: Derived<VideoQuality>,
}

impl VideoMetrics {
    pub fn compute(tests: &[&TcpTest], mos: &Derived<f64>) -> Self {
        let down = stream_profile(tests, Direction::Down);
        let up = stream_profile(tests, Direction::Up);
        let conference = conference_quality(mos, &up, &down);
        Self { down, up, conference }
    }

    /// Every field set to the same error, for files that never ran.
    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            down: Derived::TestError(kind),
            up: Derived::TestError(kind),
            conference: Derived::TestError(kind),
        }
    }
}
