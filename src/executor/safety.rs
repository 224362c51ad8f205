// Coordinate safety band.

/// Rejects pointer targets inside the forbidden edge band.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateValidator {
    margin: f64,
}

impl CoordinateValidator {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    /// Accepts iff both axes lie within `[margin, 1 - margin]`. The reason
    /// names the first violated axis and edge.
    pub fn validate(&self, x: f64, y: f64) -> (bool, String) {
        let violation = self
            .check_axis("x", x, "left", "right")
            .or_else(|| self.check_axis("y", y, "top", "bottom"));
        match violation {
            Some(reason) => (false, reason),
            None => (true, String::new()),
        }
    }

    fn check_axis(&self, axis: &str, v: f64, low_edge: &str, high_edge: &str) -> Option<String> {
        if v.is_nan() {
            return Some(format!("{axis} is not a number"));
        }
        if v < self.margin {
            return Some(format!("{axis} too close to {low_edge} edge ({v:.3} < {:.3})", self.margin));
        }
        if v > 1.0 - self.margin {
            return Some(format!(
                "{axis} too close to {high_edge} edge ({v:.3} > {:.3})",
                1.0 - self.margin
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_is_ok() {
        let (ok, reason) = CoordinateValidator::new(0.05).validate(0.5, 0.5);
        assert!(ok);
        assert!(reason.is_empty());
    }

    #[test]
    fn names_the_violated_edge() {
        let v = CoordinateValidator::new(0.05);
        let cases = [
            ((0.01, 0.5), "x too close to left edge"),
            ((0.99, 0.5), "x too close to right edge"),
            ((0.5, 0.02), "y too close to top edge"),
            ((0.5, 0.97), "y too close to bottom edge"),
        ];
        for ((x, y), expected) in cases {
            let (ok, reason) = v.validate(x, y);
            assert!(!ok, "({x},{y}) should be rejected");
            assert!(reason.starts_with(expected), "{reason}");
        }
    }

    #[test]
    fn band_boundaries_are_accepted() {
        let v = CoordinateValidator::new(0.05);
        assert!(v.validate(0.05, 0.95).0);
        assert!(!v.validate(0.0499, 0.5).0);
        assert!(!v.validate(0.5, 0.9501).0);
    }

    #[test]
    fn grid_of_points_matches_band() {
        let v = CoordinateValidator::new(0.1);
        for i in 0..=20 {
            for j in 0..=20 {
                let (x, y) = (i as f64 / 20.0, j as f64 / 20.0);
                let inside = (0.1..=0.9).contains(&x) && (0.1..=0.9).contains(&y);
                let on_boundary = [x, y]
                    .iter()
                    .any(|v| (v - 0.1).abs() < 1e-9 || (v - 0.9).abs() < 1e-9);
                if on_boundary {
                    continue;
                }
                assert_eq!(v.validate(x, y).0, inside, "({x},{y})");
            }
        }
    }

    #[test]
    fn nan_is_rejected() {
        assert!(!CoordinateValidator::new(0.05).validate(f64::NAN, 0.5).0);
    }
}
