use serde::{Deserialize, Serialize};

/// A 2D point with integer coordinates.
///
/// The sweep treats larger `y` as "lower" (the bottom of the plane), so the
/// scan advances from large `y` to small `y`. Equality is exact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }
}

/// An ordered sequence of points; a closed ring or an open polyline
/// depending on the `closed` flag it was added with.
pub type Path = Vec<Point>;

/// A collection of paths. Order between disjoint paths is irrelevant, but
/// each path's own point order defines its winding.
pub type Paths = Vec<Path>;

/// Coordinates up to this magnitude can be handled with 64-bit products.
pub(crate) const LO_RANGE: i64 = 0x3FFF_FFFF;
/// Absolute limit on coordinate magnitude.
pub(crate) const HI_RANGE: i64 = 0x3FFF_FFFF_FFFF_FFFF;

/// Where a point sits relative to a closed path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointInPolygon {
    Outside,
    Inside,
    /// On an edge or vertex of the path.
    OnBoundary,
}

/// Signed area of a path by the shoelace formula. Positive area means the
/// path is wound in the orientation `orientation` reports as `true`.
pub fn area(path: &[Point]) -> f64 {
    let cnt = path.len();
    if cnt < 3 {
        return 0.0;
    }
    let mut a = 0.0;
    let mut j = cnt - 1;
    for i in 0..cnt {
        a += (path[j].x + path[i].x) as f64 * (path[j].y - path[i].y) as f64;
        j = i;
    }
    -a * 0.5
}

/// Whether the path is wound with non-negative area.
pub fn orientation(path: &[Point]) -> bool {
    area(path) >= 0.0
}

/// Ray-crossing point-in-polygon test with an exact on-boundary
/// short-circuit, after Hormann & Agathos.
pub fn point_in_polygon(pt: Point, path: &[Point]) -> PointInPolygon {
    let cnt = path.len();
    if cnt < 3 {
        return PointInPolygon::Outside;
    }
    let mut inside = false;
    let mut ip = path[0];
    for i in 1..=cnt {
        let ip_next = if i == cnt { path[0] } else { path[i] };
        if ip_next.y == pt.y
            && (ip_next.x == pt.x || (ip.y == pt.y && ((ip_next.x > pt.x) == (ip.x < pt.x))))
        {
            return PointInPolygon::OnBoundary;
        }
        if (ip.y < pt.y) != (ip_next.y < pt.y) {
            if ip.x >= pt.x {
                if ip_next.x > pt.x {
                    inside = !inside;
                } else {
                    let d = (ip.x - pt.x) as f64 * (ip_next.y - pt.y) as f64
                        - (ip_next.x - pt.x) as f64 * (ip.y - pt.y) as f64;
                    if d == 0.0 {
                        return PointInPolygon::OnBoundary;
                    }
                    if (d > 0.0) == (ip_next.y > ip.y) {
                        inside = !inside;
                    }
                }
            } else if ip_next.x > pt.x {
                let d = (ip.x - pt.x) as f64 * (ip_next.y - pt.y) as f64
                    - (ip_next.x - pt.x) as f64 * (ip.y - pt.y) as f64;
                if d == 0.0 {
                    return PointInPolygon::OnBoundary;
                }
                if (d > 0.0) == (ip_next.y > ip.y) {
                    inside = !inside;
                }
            }
        }
        ip = ip_next;
    }
    if inside {
        PointInPolygon::Inside
    } else {
        PointInPolygon::Outside
    }
}

/// Exact equality of the slopes of two delta vectors. In full-range mode
/// the cross product is taken at 128 bits so it cannot overflow.
pub(crate) fn delta_slopes_equal(d1: Point, d2: Point, use_full_range: bool) -> bool {
    if use_full_range {
        d1.y as i128 * d2.x as i128 == d1.x as i128 * d2.y as i128
    } else {
        d1.y * d2.x == d1.x * d2.y
    }
}

/// Collinearity of three points.
pub(crate) fn slopes_equal3(pt1: Point, pt2: Point, pt3: Point, use_full_range: bool) -> bool {
    delta_slopes_equal(
        Point::new(pt1.x - pt2.x, pt1.y - pt2.y),
        Point::new(pt2.x - pt3.x, pt2.y - pt3.y),
        use_full_range,
    )
}

/// Strict betweenness of `pt2` on the segment `pt1..pt3` (exclusive of the
/// endpoints; collinearity is assumed by the caller).
pub(crate) fn pt2_is_between_pt1_and_pt3(pt1: Point, pt2: Point, pt3: Point) -> bool {
    if pt1 == pt3 || pt1 == pt2 || pt3 == pt2 {
        false
    } else if pt1.x != pt3.x {
        (pt2.x > pt1.x) == (pt2.x < pt3.x)
    } else {
        (pt2.y > pt1.y) == (pt2.y < pt3.y)
    }
}

/// Reverses the point order of every path in place.
pub fn reverse_paths(paths: &mut Paths) {
    for path in paths.iter_mut() {
        path.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: i64) -> Path {
        vec![
            Point::new(0, 0),
            Point::new(size, 0),
            Point::new(size, size),
            Point::new(0, size),
        ]
    }

    #[test]
    fn shoelace_area() {
        assert_eq!(area(&square(10)), 100.0);
        let mut sq = square(10);
        sq.reverse();
        assert_eq!(area(&sq), -100.0);
        assert_eq!(area(&sq[..2]), 0.0);
    }

    #[test]
    fn orientation_follows_area_sign() {
        let mut sq = square(4);
        assert!(orientation(&sq));
        sq.reverse();
        assert!(!orientation(&sq));
    }

    #[test]
    fn point_in_polygon_tri_state() {
        let sq = square(10);
        assert_eq!(point_in_polygon(Point::new(5, 5), &sq), PointInPolygon::Inside);
        assert_eq!(point_in_polygon(Point::new(15, 5), &sq), PointInPolygon::Outside);
        // every vertex and every edge midpoint lies on the boundary
        for i in 0..sq.len() {
            let a = sq[i];
            let b = sq[(i + 1) % sq.len()];
            assert_eq!(point_in_polygon(a, &sq), PointInPolygon::OnBoundary);
            let mid = Point::new((a.x + b.x) / 2, (a.y + b.y) / 2);
            assert_eq!(point_in_polygon(mid, &sq), PointInPolygon::OnBoundary);
        }
    }

    #[test]
    fn betweenness_is_strict() {
        let a = Point::new(0, 0);
        let b = Point::new(5, 0);
        let c = Point::new(10, 0);
        assert!(pt2_is_between_pt1_and_pt3(a, b, c));
        assert!(!pt2_is_between_pt1_and_pt3(a, a, c));
        assert!(!pt2_is_between_pt1_and_pt3(a, c, b));
    }

    #[test]
    fn full_range_slopes() {
        let big = LO_RANGE * 16;
        assert!(slopes_equal3(
            Point::new(0, 0),
            Point::new(big, big),
            Point::new(2 * big, 2 * big),
            true
        ));
        assert!(!slopes_equal3(
            Point::new(0, 0),
            Point::new(big, big),
            Point::new(2 * big, 2 * big + 1),
            true
        ));
    }
}
