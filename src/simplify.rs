use crate::error::Result;
use crate::geom::{orientation, Path, Paths, Point};
use crate::sweep::Clipper;
use crate::{ClipOp, FillRule, Options, PolyType};

/// Default vertex-proximity threshold for [`clean_polygon`]: roughly √2,
/// so vertices within one unit on both axes collapse.
pub const DEFAULT_CLEAN_DISTANCE: f64 = 1.415;

/// Converts a self-intersecting polygon into simple polygons by
/// self-union with strictly-simple output enforced.
pub fn simplify_polygon(poly: &Path, fill_rule: FillRule) -> Result<Paths> {
    let mut c = Clipper::new(Options {
        strictly_simple: true,
        ..Options::default()
    });
    c.add_path(poly, PolyType::Subject, true)?;
    c.execute(ClipOp::Union, fill_rule, fill_rule)
}

/// [`simplify_polygon`] over a collection, in one union.
pub fn simplify_polygons(polys: &Paths, fill_rule: FillRule) -> Result<Paths> {
    let mut c = Clipper::new(Options {
        strictly_simple: true,
        ..Options::default()
    });
    c.add_paths(polys, PolyType::Subject, true)?;
    c.execute(ClipOp::Union, fill_rule, fill_rule)
}

fn distance_from_line_sqrd(pt: Point, ln1: Point, ln2: Point) -> f64 {
    // A*x + B*y + C = 0 through ln1 and ln2; the perpendicular distance of
    // pt is (A*pt.x + B*pt.y + C) / sqrt(A^2 + B^2)
    let a = (ln1.y - ln2.y) as f64;
    let b = (ln2.x - ln1.x) as f64;
    let mut c = a * ln1.x as f64 + b * ln1.y as f64;
    c = a * pt.x as f64 + b * pt.y as f64 - c;
    c * c / (a * a + b * b)
}

fn slopes_near_collinear(pt1: Point, pt2: Point, pt3: Point, dist_sqrd: f64) -> bool {
    // More accurate when the point geometrically between the other two is
    // the one tested for distance; with spikes, pt1 or pt3 is the one
    // between.
    if (pt1.x - pt2.x).abs() > (pt1.y - pt2.y).abs() {
        if (pt1.x > pt2.x) == (pt1.x < pt3.x) {
            distance_from_line_sqrd(pt1, pt2, pt3) < dist_sqrd
        } else if (pt2.x > pt1.x) == (pt2.x < pt3.x) {
            distance_from_line_sqrd(pt2, pt1, pt3) < dist_sqrd
        } else {
            distance_from_line_sqrd(pt3, pt1, pt2) < dist_sqrd
        }
    } else if (pt1.y > pt2.y) == (pt1.y < pt3.y) {
        distance_from_line_sqrd(pt1, pt2, pt3) < dist_sqrd
    } else if (pt2.y > pt1.y) == (pt2.y < pt3.y) {
        distance_from_line_sqrd(pt2, pt1, pt3) < dist_sqrd
    } else {
        distance_from_line_sqrd(pt3, pt1, pt2) < dist_sqrd
    }
}

fn points_are_close(pt1: Point, pt2: Point, dist_sqrd: f64) -> bool {
    let dx = (pt1.x - pt2.x) as f64;
    let dy = (pt1.y - pt2.y) as f64;
    dx * dx + dy * dy <= dist_sqrd
}

struct CleanNode {
    pt: Point,
    next: usize,
    prev: usize,
    keep: bool,
}

fn exclude(nodes: &mut [CleanNode], op: usize) -> usize {
    let result = nodes[op].prev;
    let next = nodes[op].next;
    nodes[result].next = next;
    nodes[next].prev = result;
    nodes[result].keep = false;
    result
}

/// Drops vertices closer than `distance` to a neighbour, semi-adjacent
/// vertex pairs that close on each other, and near-collinear middle
/// vertices. Removal restarts the scan from the affected neighbour, so
/// the result is stable under re-cleaning.
pub fn clean_polygon(path: &Path, distance: f64) -> Path {
    let mut cnt = path.len();
    if cnt == 0 {
        return Path::new();
    }

    let mut nodes: Vec<CleanNode> = (0..cnt)
        .map(|i| CleanNode {
            pt: path[i],
            next: (i + 1) % cnt,
            prev: (i + cnt - 1) % cnt,
            keep: false,
        })
        .collect();

    let dist_sqrd = distance * distance;
    let mut op = 0usize;
    while !nodes[op].keep && nodes[op].next != nodes[op].prev {
        let prev = nodes[op].prev;
        let next = nodes[op].next;
        if points_are_close(nodes[op].pt, nodes[prev].pt, dist_sqrd) {
            op = exclude(&mut nodes, op);
            cnt -= 1;
        } else if points_are_close(nodes[prev].pt, nodes[next].pt, dist_sqrd) {
            exclude(&mut nodes, next);
            op = exclude(&mut nodes, op);
            cnt -= 2;
        } else if slopes_near_collinear(nodes[prev].pt, nodes[op].pt, nodes[next].pt, dist_sqrd) {
            op = exclude(&mut nodes, op);
            cnt -= 1;
        } else {
            nodes[op].keep = true;
            op = nodes[op].next;
        }
    }

    if cnt < 3 {
        cnt = 0;
    }
    let mut result = Path::with_capacity(cnt);
    for _ in 0..cnt {
        result.push(nodes[op].pt);
        op = nodes[op].next;
    }
    result
}

/// [`clean_polygon`] over a collection.
pub fn clean_polygons(polys: &Paths, distance: f64) -> Paths {
    polys.iter().map(|p| clean_polygon(p, distance)).collect()
}

fn translate_path(path: &Path, delta: Point) -> Path {
    path.iter()
        .map(|pt| Point::new(pt.x + delta.x, pt.y + delta.y))
        .collect()
}

/// Quad strips between successive translated copies of the pattern along
/// the path; self-unioned by the callers.
fn minkowski(pattern: &Path, path: &Path, is_sum: bool, is_closed: bool) -> Paths {
    let delta = usize::from(is_closed);
    let poly_cnt = pattern.len();
    let path_cnt = path.len();
    let mut translated = Paths::with_capacity(path_cnt);
    if is_sum {
        for p in path {
            translated.push(
                pattern
                    .iter()
                    .map(|ip| Point::new(p.x + ip.x, p.y + ip.y))
                    .collect(),
            );
        }
    } else {
        for p in path {
            translated.push(
                pattern
                    .iter()
                    .map(|ip| Point::new(p.x - ip.x, p.y - ip.y))
                    .collect(),
            );
        }
    }

    let mut quads = Paths::new();
    if path_cnt == 0 || poly_cnt == 0 {
        return quads;
    }
    for i in 0..path_cnt - 1 + delta {
        for j in 0..poly_cnt {
            let mut quad = vec![
                translated[i % path_cnt][j % poly_cnt],
                translated[(i + 1) % path_cnt][j % poly_cnt],
                translated[(i + 1) % path_cnt][(j + 1) % poly_cnt],
                translated[i % path_cnt][(j + 1) % poly_cnt],
            ];
            if !orientation(&quad) {
                quad.reverse();
            }
            quads.push(quad);
        }
    }
    quads
}

/// Minkowski sum of a pattern polygon swept along a path.
pub fn minkowski_sum(pattern: &Path, path: &Path, path_is_closed: bool) -> Result<Paths> {
    let quads = minkowski(pattern, path, true, path_is_closed);
    let mut c = Clipper::default();
    c.add_paths(&quads, PolyType::Subject, true)?;
    c.execute(ClipOp::Union, FillRule::NonZero, FillRule::NonZero)
}

/// Minkowski sum of a pattern against each path in a collection, unioned.
pub fn minkowski_sum_paths(pattern: &Path, paths: &Paths, path_is_closed: bool) -> Result<Paths> {
    let mut c = Clipper::default();
    for path in paths {
        let quads = minkowski(pattern, path, true, path_is_closed);
        c.add_paths(&quads, PolyType::Subject, true)?;
        if path_is_closed {
            let translated = translate_path(path, pattern[0]);
            c.add_path(&translated, PolyType::Clip, true)?;
        }
    }
    c.execute(ClipOp::Union, FillRule::NonZero, FillRule::NonZero)
}

/// Minkowski difference of two polygons.
pub fn minkowski_diff(poly1: &Path, poly2: &Path) -> Result<Paths> {
    let quads = minkowski(poly1, poly2, false, true);
    let mut c = Clipper::default();
    c.add_paths(&quads, PolyType::Subject, true)?;
    c.execute(ClipOp::Union, FillRule::NonZero, FillRule::NonZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::area;

    fn pts(v: &[(i64, i64)]) -> Path {
        v.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn clean_drops_near_duplicate_vertices() {
        let path = pts(&[(0, 0), (1, 0), (100, 0), (100, 100), (0, 100)]);
        let cleaned = clean_polygon(&path, DEFAULT_CLEAN_DISTANCE);
        assert_eq!(cleaned.len(), 4);
    }

    #[test]
    fn clean_is_idempotent() {
        let path = pts(&[(0, 0), (1, 0), (100, 1), (100, 100), (50, 99), (0, 100)]);
        let once = clean_polygon(&path, DEFAULT_CLEAN_DISTANCE);
        let twice = clean_polygon(&once, DEFAULT_CLEAN_DISTANCE);
        assert_eq!(once, twice);
    }

    #[test]
    fn clean_degenerate_input() {
        assert!(clean_polygon(&Path::new(), DEFAULT_CLEAN_DISTANCE).is_empty());
        assert!(clean_polygon(&pts(&[(0, 0), (5, 5)]), DEFAULT_CLEAN_DISTANCE).is_empty());
    }

    #[test]
    fn simplify_splits_a_figure_eight() {
        // a bow tie crossing itself at (50, 50)
        let bow_tie = pts(&[(0, 0), (100, 100), (100, 0), (0, 100)]);
        let simple = simplify_polygon(&bow_tie, FillRule::EvenOdd).unwrap();
        assert_eq!(simple.len(), 2);
        let total: f64 = simple.iter().map(|p| area(p).abs()).sum();
        assert_eq!(total, 5000.0);
    }

    #[test]
    fn minkowski_sum_of_square_and_square() {
        // sweeping a 2x2 square around a 10x10 square ring yields a band:
        // a 12x12 outer ring with an 8x8 hole
        let pattern = pts(&[(-1, -1), (1, -1), (1, 1), (-1, 1)]);
        let path = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        let result = minkowski_sum(&pattern, &path, true).unwrap();
        assert_eq!(result.len(), 2);
        let signed: f64 = result.iter().map(|p| area(p)).sum();
        assert_eq!(signed, 144.0 - 64.0);
    }
}
