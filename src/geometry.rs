use imageproc::point::Point;
use nalgebra::{Matrix2, SymmetricEigen};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub start: Point<f32>,
    pub end: Point<f32>,
}

impl Segment {
    pub fn new(start: Point<f32>, end: Point<f32>) -> Self {
        Self { start, end }
    }

    /// Angle of the segment in degrees, measured in image coordinates (y grows
    /// downwards), so a segment descending to the right has a positive angle.
    pub fn angle_degrees(&self) -> f32 {
        (self.end.y - self.start.y)
            .atan2(self.end.x - self.start.x)
            .to_degrees()
    }
}

/// Folds an axis direction given in degrees into `(-90, 90]`. An axis has no
/// orientation, so `a` and `a ± 180` describe the same line.
pub fn normalize_axis_degrees(angle: f64) -> f64 {
    let mut angle = angle % 180.0;
    if angle <= -90.0 {
        angle += 180.0;
    }
    if angle > 90.0 {
        angle -= 180.0;
    }
    angle
}

/// Computes the angle in degrees of the dominant axis of a point cloud, i.e.
/// the direction of the eigenvector of its covariance matrix with the largest
/// eigenvalue. Returns `None` for fewer than two points or a degenerate cloud.
pub fn principal_axis_degrees(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let count = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let cx = sum_x / count;
    let cy = sum_y / count;

    let (cxx, cyy, cxy) = points.iter().fold((0.0, 0.0, 0.0), |(xx, yy, xy), (x, y)| {
        let dx = x - cx;
        let dy = y - cy;
        (xx + dx * dx, yy + dy * dy, xy + dx * dy)
    });
    let cov = Matrix2::new(cxx / count, cxy / count, cxy / count, cyy / count);
    let eig = SymmetricEigen::new(cov);
    let (vmax, lambda_max) = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
        (eig.eigenvectors.column(0), eig.eigenvalues[0])
    } else {
        (eig.eigenvectors.column(1), eig.eigenvalues[1])
    };
    if !lambda_max.is_finite() || lambda_max <= 0.0 {
        return None;
    }

    Some(normalize_axis_degrees(vmax[1].atan2(vmax[0]).to_degrees()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_angle() {
        let flat = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(flat.angle_degrees(), 0.0);

        let descending = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert!((descending.angle_degrees() - 45.0).abs() < 1e-4);
    }

    #[test]
    fn axis_normalization() {
        assert_eq!(normalize_axis_degrees(180.0), 0.0);
        assert_eq!(normalize_axis_degrees(-180.0), 0.0);
        assert_eq!(normalize_axis_degrees(90.0), 90.0);
        assert_eq!(normalize_axis_degrees(-90.0), 90.0);
        assert!((normalize_axis_degrees(178.0) - -2.0).abs() < 1e-9);
        assert!((normalize_axis_degrees(-177.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn principal_axis_of_horizontal_band() {
        let points = (0..200)
            .flat_map(|x| (0..20).map(move |y| (x as f64, y as f64)))
            .collect::<Vec<_>>();
        let angle = principal_axis_degrees(&points).unwrap();
        assert!(angle.abs() < 1e-6, "angle was {}", angle);
    }

    #[test]
    fn principal_axis_of_tilted_line() {
        let points = (0..100)
            .map(|i| (i as f64, i as f64 * 0.1))
            .collect::<Vec<_>>();
        let angle = principal_axis_degrees(&points).unwrap();
        assert!((angle - 0.1f64.atan().to_degrees()).abs() < 1e-6);
    }

    #[test]
    fn principal_axis_needs_points() {
        assert_eq!(principal_axis_degrees(&[]), None);
        assert_eq!(principal_axis_degrees(&[(1.0, 1.0)]), None);
        assert_eq!(principal_axis_degrees(&[(1.0, 1.0), (1.0, 1.0)]), None);
    }
}
