//! Health score: five weighted components, each clamped to 0-100.

use canon_core::types::HealthComponents;

pub const CONSISTENCY_WEIGHT: f64 = 0.30;
pub const COVERAGE_WEIGHT: f64 = 0.30;
pub const DENSITY_WEIGHT: f64 = 0.20;
pub const TREND_WEIGHT: f64 = 0.10;
pub const THROUGHPUT_WEIGHT: f64 = 0.10;

/// Trend score with fewer than two debt points.
pub const NEUTRAL_TREND: f64 = 50.0;

/// Weighted sum of the components. Always within [0, 100].
pub fn health_score(c: &HealthComponents) -> f64 {
    let score = CONSISTENCY_WEIGHT * bounded(c.consistency)
        + COVERAGE_WEIGHT * bounded(c.coverage)
        + DENSITY_WEIGHT * bounded(c.violation_density)
        + TREND_WEIGHT * bounded(c.debt_trend)
        + THROUGHPUT_WEIGHT * bounded(c.throughput);
    bounded(score)
}

/// Clamp to [0, 100]; non-finite values score 0.
pub fn bounded(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// `compliant / total` as a percentage. An empty codebase is fully consistent.
pub fn consistency(compliant_units: usize, total_units: usize) -> f64 {
    if total_units == 0 {
        return 100.0;
    }
    bounded(compliant_units as f64 / total_units as f64 * 100.0)
}

/// Inverse severity-weighted violation density: 100 with no violations,
/// 50 at one weighted violation per unit.
pub fn density_score(weighted_violations: f64, total_units: usize) -> f64 {
    let density = weighted_violations / total_units.max(1) as f64;
    bounded(100.0 / (1.0 + density))
}

/// Least-squares slope of `points` against their index.
pub fn slope(points: &[f64]) -> Option<f64> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = points.iter().sum::<f64>() / n_f;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in points.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    Some(num / den)
}

/// Decreasing debt scores above 50, increasing below. `saturation` is the
/// per-snapshot slope (in hours) at which the score approaches 0 or 100.
pub fn trend_score(debt_series: &[f64], saturation: f64) -> f64 {
    match slope(debt_series) {
        Some(s) if s.is_finite() && saturation > 0.0 => {
            bounded(NEUTRAL_TREND * (1.0 - (s / saturation).tanh()))
        }
        _ => NEUTRAL_TREND,
    }
}

pub fn throughput_score(applied: u32, target: u32) -> f64 {
    if target == 0 {
        return 0.0;
    }
    bounded((applied as f64 / target as f64).min(1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total = CONSISTENCY_WEIGHT + COVERAGE_WEIGHT + DENSITY_WEIGHT + TREND_WEIGHT + THROUGHPUT_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_components() {
        let c = HealthComponents {
            consistency: 100.0,
            coverage: 100.0,
            violation_density: 100.0,
            debt_trend: 100.0,
            throughput: 100.0,
        };
        assert!((health_score(&c) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_direction() {
        assert_eq!(trend_score(&[], 5.0), NEUTRAL_TREND);
        assert_eq!(trend_score(&[10.0], 5.0), NEUTRAL_TREND);
        assert!(trend_score(&[10.0, 8.0, 6.0], 5.0) > NEUTRAL_TREND);
        assert!(trend_score(&[6.0, 8.0, 10.0], 5.0) < NEUTRAL_TREND);
        assert!((trend_score(&[4.0, 4.0, 4.0], 5.0) - NEUTRAL_TREND).abs() < 1e-9);
    }

    #[test]
    fn test_slope_of_line() {
        assert!((slope(&[1.0, 3.0, 5.0, 7.0]).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_density_and_throughput() {
        assert_eq!(density_score(0.0, 10), 100.0);
        assert!((density_score(10.0, 10) - 50.0).abs() < 1e-9);
        assert_eq!(throughput_score(10, 5), 100.0);
        assert_eq!(throughput_score(1, 4), 25.0);
        assert_eq!(throughput_score(3, 0), 0.0);
    }

    #[test]
    fn test_non_finite_inputs_are_bounded() {
        let c = HealthComponents {
            consistency: f64::NAN,
            coverage: f64::INFINITY,
            violation_density: -5.0,
            debt_trend: 50.0,
            throughput: 1e9,
        };
        let h = health_score(&c);
        assert!((0.0..=100.0).contains(&h));
    }
}
