use serde::Serialize;

/// Quantities the E-model needs for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInputs {
    pub rtt_avg_ms: f64,
    pub jitter_ms: f64,
    pub loss_percent: f64,
}

/// Simplified E-model transmission rating, clamped to `[0, 100]`.
pub fn r_value(inputs: &VoiceInputs) -> f64 {
    let effective_latency = inputs.rtt_avg_ms + 2.0 * inputs.jitter_ms + 10.0;
    let mut r = if effective_latency < 160.0 {
        93.2 - effective_latency / 40.0
    } else {
        93.2 - (effective_latency - 120.0) / 10.0
    };
    r -= 2.5 * inputs.loss_percent;
    r.clamp(0.0, 100.0)
}

/// Mean opinion score for an R-value, from 1 (bad) to 4.5 (best).
pub fn mos(r: f64) -> f64 {
    1.0 + 0.035 * r + 7.0e-6 * r * (r - 60.0) * (100.0 - r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_low_latency_branch() {
        let r = r_value(&VoiceInputs {
            rtt_avg_ms: 50.0,
            jitter_ms: 5.0,
            loss_percent: 0.0,
        });
        // eff = 50 + 10 + 10 = 70
        assert!(close(r, 93.2 - 70.0 / 40.0));
    }

    #[test]
    fn test_high_latency_branch_and_loss() {
        let r = r_value(&VoiceInputs {
            rtt_avg_ms: 200.0,
            jitter_ms: 10.0,
            loss_percent: 2.0,
        });
        // eff = 230
        assert!(close(r, 93.2 - 11.0 - 5.0));
    }

    #[test]
    fn test_clamped_at_zero() {
        let r = r_value(&VoiceInputs {
            rtt_avg_ms: 30.0,
            jitter_ms: 1.0,
            loss_percent: 100.0,
        });
        assert_eq!(r, 0.0);
        assert!(close(mos(r), 1.0));
    }

    #[test]
    fn test_mos_scale() {
        assert!(close(mos(100.0), 1.0 + 3.5));
        assert!(mos(93.2) > 4.3);
        assert!(mos(60.0) < mos(80.0));
    }
}
