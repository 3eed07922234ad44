use super::types::ClimateSample;

/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - 273.15
}

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + 273.15
}

/// Relative humidity (%) from air and dewpoint temperature (°C), clamped to
/// [0, 100].
pub fn dewpoint_to_humidity(temp_c: f64, dewpoint_c: f64) -> f64 {
    let rh = 100.0 * (112.0 - 0.1 * temp_c + dewpoint_c) / (112.0 + 0.9 * temp_c);
    rh.clamp(0.0, 100.0)
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Recency weight: 0.1 for `first`, rising linearly to 1.0 for `last`.
///
/// A single-year range weighs that year at 1.0.
pub fn year_weight(year: i32, first: i32, last: i32) -> f64 {
    if last <= first {
        return 1.0;
    }
    0.1 + 0.9 * f64::from(year - first) / f64::from(last - first)
}

/// Weighted sums of Kelvin temperatures and dewpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedSums {
    pub temp: f64,
    pub dew: f64,
    pub weight: f64,
    pub years: usize,
}

impl WeightedSums {
    pub fn add(&mut self, sample: ClimateSample, weight: f64) {
        self.temp += sample.temperature_k * weight;
        self.dew += sample.dewpoint_k * weight;
        self.weight += weight;
        self.years += 1;
    }

    /// Weighted means in Kelvin, or `None` when nothing was accumulated.
    pub fn means(&self) -> Option<ClimateSample> {
        if self.weight <= 0.0 {
            return None;
        }
        Some(ClimateSample {
            temperature_k: self.temp / self.weight,
            dewpoint_k: self.dew / self.weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_weight_endpoints() {
        assert_relative_eq!(year_weight(2000, 2000, 2024), 0.1);
        assert_relative_eq!(year_weight(2024, 2000, 2024), 1.0);
        assert_relative_eq!(year_weight(2012, 2000, 2024), 0.55);
    }

    #[test]
    fn test_humidity_clamped() {
        assert_eq!(dewpoint_to_humidity(20.0, 60.0), 100.0);
        assert_eq!(dewpoint_to_humidity(20.0, -200.0), 0.0);
        assert_relative_eq!(dewpoint_to_humidity(22.0, -24.13), 65.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(21.999999999), 22.0);
        assert_eq!(round2(-3.14159), -3.14);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_empty_sums_have_no_means() {
        assert_eq!(WeightedSums::default().means(), None);
    }

    #[test]
    fn test_sums_weight_each_sample() {
        let mut sums = WeightedSums::default();
        sums.add(ClimateSample { temperature_k: 290.0, dewpoint_k: 280.0 }, 0.1);
        sums.add(ClimateSample { temperature_k: 300.0, dewpoint_k: 285.0 }, 1.0);

        assert_eq!(sums.years, 2);
        let means = sums.means().unwrap();
        assert_relative_eq!(means.temperature_k, (29.0 + 300.0) / 1.1, epsilon = 1e-9);
        assert_relative_eq!(means.dewpoint_k, (28.0 + 285.0) / 1.1, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_weight_strictly_increasing(year in 2000i32..2024) {
            prop_assert!(year_weight(year + 1, 2000, 2024) > year_weight(year, 2000, 2024));
        }

        #[test]
        fn prop_humidity_in_range(t in -60.0f64..60.0, d in -80.0f64..60.0) {
            let h = dewpoint_to_humidity(t, d);
            prop_assert!((0.0..=100.0).contains(&h));
        }
    }
}
