// Easing curves: normalized progress [0, 1] -> eased progress [0, 1]

/// Quadratic ease-in-out
pub fn ease_in_out_quad(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Progress curve applied to every trajectory sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    QuadInOut,
    Linear,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::QuadInOut => ease_in_out_quad(t),
            Easing::Linear => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_endpoints_and_midpoint() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
        assert!((ease_in_out_quad(0.5) - 0.5).abs() < 1e-6);
        assert!((ease_in_out_quad(0.25) - 0.125).abs() < 1e-6);
        assert!((ease_in_out_quad(0.75) - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_curves_are_monotonic() {
        for easing in [Easing::QuadInOut, Easing::Linear] {
            let mut last = easing.apply(0.0);
            for i in 1..=1000 {
                let next = easing.apply(i as f32 / 1000.0);
                assert!(next >= last, "{:?} decreased at {}", easing, i);
                last = next;
            }
        }
    }

    #[test]
    fn test_progress_outside_unit_range_is_clamped() {
        assert_eq!(Easing::default().apply(-0.5), 0.0);
        assert_eq!(Easing::default().apply(1.5), 1.0);
    }
}
