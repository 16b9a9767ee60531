use geo::{Distance, Haversine, Point};

/// Great circle distance in meters.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Geographic mean of `(lat, lon)` points.
///
/// Points are averaged as unit vectors, so a group straddling the
/// antimeridian ends up next to it rather than on the other side of the globe.
pub fn centroid(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for (lat, lon) in points {
        let (lat, lon) = (lat.to_radians(), lon.to_radians());
        x += lat.cos() * lon.cos();
        y += lat.cos() * lon.sin();
        z += lat.sin();
    }
    let n = points.len() as f64;
    let (x, y, z) = (x / n, y / n, z / n);
    let lon = y.atan2(x);
    let lat = z.atan2((x * x + y * y).sqrt());
    Some((lat.to_degrees(), lon.to_degrees()))
}

/// Distance from the center to the farthest corner of the bounding box.
pub fn circle_radius(
    lat: f64,
    lon: f64,
    max_lat: f64,
    max_lon: f64,
    min_lat: f64,
    min_lon: f64,
) -> f64 {
    [
        (min_lat, min_lon),
        (min_lat, max_lon),
        (max_lat, min_lon),
        (max_lat, max_lon),
    ]
    .into_iter()
    .map(|(corner_lat, corner_lon)| distance(lat, lon, corner_lat, corner_lon))
    .fold(0.0, f64::max)
}

#[cfg(test)]
mod test {
    fn assert_close(expected: f64, actual: f64, tolerance: f64) {
        assert!(
            (expected - actual).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn distance() {
        assert_eq!(0.0, super::distance(51.5, -0.1, 51.5, -0.1));
        // one degree of latitude
        assert_close(111_195.0, super::distance(0.0, 0.0, 1.0, 0.0), 10.0);
    }

    #[test]
    fn centroid_empty() {
        assert_eq!(None, super::centroid(&[]));
    }

    #[test]
    fn centroid_single() {
        let (lat, lon) = super::centroid(&[(12.5, -45.25)]).unwrap();
        assert_close(12.5, lat, 1e-9);
        assert_close(-45.25, lon, 1e-9);
    }

    #[test]
    fn centroid_midpoint() {
        let (lat, lon) = super::centroid(&[(10.0, 20.0), (10.0, 22.0)]).unwrap();
        assert_close(21.0, lon, 1e-9);
        // great circle midpoint bulges towards the pole
        assert!(lat > 10.0 && lat < 10.01);
    }

    #[test]
    fn centroid_antimeridian() {
        let (lat, lon) = super::centroid(&[(0.0, 179.0), (0.0, -179.0)]).unwrap();
        assert_close(0.0, lat, 1e-9);
        assert_close(180.0, lon.abs(), 1e-9);
    }

    #[test]
    fn circle_radius() {
        let radius = super::circle_radius(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(0.0, radius);
        let radius = super::circle_radius(0.5, 0.5, 1.0, 1.0, 0.0, 0.0);
        let farthest = [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]
            .iter()
            .map(|(lat, lon)| super::distance(0.5, 0.5, *lat, *lon))
            .fold(0.0, f64::max);
        assert_close(farthest, radius, 1e-6);
        // corners closer to the equator are farther away
        assert!(radius > super::distance(0.5, 0.5, 1.0, 1.0));
        assert!(radius > 78_000.0 && radius < 79_000.0);
    }
}
