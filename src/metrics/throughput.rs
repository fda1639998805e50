use crate::types::{Direction, TcpTest, Thread};

/// Interval speeds summed across threads, aligned by interval position.
/// `limit` keeps only the first intervals.
pub fn thread_sum_values(threads: &[Thread], limit: Option<usize>) -> Vec<f64> {
    let longest = threads.iter().map(|t| t.measurements.len()).max().unwrap_or(0);
    let len = limit.map_or(longest, |l| l.min(longest));

    (0..len)
        .map(|i| {
            threads
                .iter()
                .filter_map(|t| t.measurements.get(i))
                .map(|m| m.speed)
                .sum()
        })
        .collect()
}

/// Sum of the threads' whole-run speeds.
pub fn final_speed_sum(threads: &[Thread]) -> f64 {
    threads.iter().map(|t| t.final_measurement.speed).sum()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation.
pub fn pstdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Summary of the per-interval summed speeds of one direction of a test.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedSummary {
    pub final_sum: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub minus_one_sigma: f64,
    pub minus_two_sigma: f64,
}

impl SpeedSummary {
    pub fn from_threads(threads: &[Thread]) -> Option<Self> {
        let sums = thread_sum_values(threads, None);
        let mean = mean(&sums)?;
        let std_dev = pstdev(&sums)?;
        Some(Self {
            final_sum: final_speed_sum(threads),
            mean,
            median: median(&sums)?,
            std_dev,
            minus_one_sigma: mean - std_dev,
            minus_two_sigma: mean - 2.0 * std_dev,
        })
    }
}

/// Mean end time of the final measurements in one direction, in seconds.
pub fn tcp_period(test: &TcpTest, direction: Direction) -> Option<f64> {
    let ends: Vec<f64> = test
        .threads(direction)
        .iter()
        .map(|t| t.final_measurement.time_end)
        .collect();
    mean(&ends)
}

/// Fraction of intervals in one direction that moved any data.
pub fn tcp_rating(test: &TcpTest, direction: Direction) -> Option<f64> {
    let sums = thread_sum_values(test.threads(direction), None);
    if sums.is_empty() {
        return None;
    }
    let moving = sums.iter().filter(|s| **s > 0.0).count();
    Some(moving as f64 / sums.len() as f64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Connection, Measurement};

    pub(crate) fn measurement(start: f64, end: f64, speed: f64) -> Measurement {
        Measurement {
            time_start: start,
            time_end: end,
            size: 0.0,
            size_units: "KBytes".to_string(),
            speed,
            speed_units: "Kbits/sec".to_string(),
        }
    }

    pub(crate) fn thread(id: u32, direction: Direction, speeds: &[f64]) -> Thread {
        let measurements: Vec<Measurement> = speeds
            .iter()
            .enumerate()
            .map(|(i, s)| measurement(i as f64, i as f64 + 1.0, *s))
            .collect();
        let end = speeds.len() as f64;
        let avg = mean(speeds).unwrap_or(0.0);
        Thread {
            thread_number: id,
            direction,
            connection: Connection::default(),
            measurements,
            final_measurement: measurement(0.0, end, avg),
        }
    }

    #[test]
    fn test_thread_sum_values_aligns_intervals() {
        let threads = vec![
            thread(3, Direction::Up, &[100.0, 200.0, 300.0]),
            thread(4, Direction::Up, &[10.0, 20.0]),
        ];
        assert_eq!(thread_sum_values(&threads, None), vec![110.0, 220.0, 300.0]);
        assert_eq!(thread_sum_values(&threads, Some(2)), vec![110.0, 220.0]);
        assert!(thread_sum_values(&[], None).is_empty());
    }

    #[test]
    fn test_statistics() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(pstdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_speed_summary() {
        let threads = vec![thread(3, Direction::Down, &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])];
        let summary = SpeedSummary::from_threads(&threads).unwrap();
        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.std_dev, 2.0);
        assert_eq!(summary.minus_one_sigma, 3.0);
        assert_eq!(summary.minus_two_sigma, 1.0);
        assert_eq!(summary.final_sum, 5.0);
        assert!(SpeedSummary::from_threads(&[]).is_none());
    }

    #[test]
    fn test_period_and_rating() {
        let test = TcpTest {
            header: crate::types::TestHeader::new(crate::types::TestKind::Tcp),
            command_line: String::new(),
            port: 5001,
            duration_secs: 4,
            up_threads: vec![thread(3, Direction::Up, &[1.0, 0.0, 2.0, 0.0])],
            down_threads: Vec::new(),
        };
        assert_eq!(tcp_period(&test, Direction::Up), Some(4.0));
        assert_eq!(tcp_rating(&test, Direction::Up), Some(0.5));
        assert_eq!(tcp_rating(&test, Direction::Down), None);
    }
}
