//! Linear score scaling shared by the developer-productivity features.

/// Lowest score.
pub const MIN_SCORE: u8 = 0;

/// Highest score.
pub const MAX_SCORE: u8 = 100;

/// Scale a raw value to a 0-100 score.
///
/// The limits are percentages of `max_value`: values at or below
/// `lower_limit_pct` score 0, values at or above `upper_limit_pct` score
/// 100, and values in between scale linearly. A non-positive `max_value`
/// or an empty band scores 0.
pub fn linear_score(value: f64, max_value: f64, lower_limit_pct: f64, upper_limit_pct: f64) -> u8 {
    if !value.is_finite() || !(max_value > 0.0) {
        return MIN_SCORE;
    }
    let lower = max_value * lower_limit_pct / 100.0;
    let upper = max_value * upper_limit_pct / 100.0;
    if !(upper > lower) {
        return MIN_SCORE;
    }
    if value <= lower {
        return MIN_SCORE;
    }
    if value >= upper {
        return MAX_SCORE;
    }
    let score = (value - lower) / (upper - lower) * f64::from(MAX_SCORE);
    score.round().clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_linearly_between_limits() {
        assert_eq!(linear_score(50.0, 100.0, 0.0, 100.0), 50);
        assert_eq!(linear_score(30.0, 100.0, 20.0, 40.0), 50);
    }

    #[test]
    fn clamps_outside_limits() {
        assert_eq!(linear_score(5.0, 100.0, 10.0, 90.0), MIN_SCORE);
        assert_eq!(linear_score(95.0, 100.0, 10.0, 90.0), MAX_SCORE);
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        assert_eq!(linear_score(5.0, 0.0, 0.0, 100.0), MIN_SCORE);
        assert_eq!(linear_score(5.0, 10.0, 50.0, 50.0), MIN_SCORE);
        assert_eq!(linear_score(f64::NAN, 10.0, 0.0, 100.0), MIN_SCORE);
    }
}
