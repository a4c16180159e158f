#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod edge;
mod error;
mod geom;
mod output;
mod polytree;
mod simplify;
mod sweep;

pub use error::{Error, Result};
pub use geom::{
    area, orientation, point_in_polygon, reverse_paths, Path, Paths, Point, PointInPolygon,
};
pub use polytree::{
    closed_paths_from_polytree, open_paths_from_polytree, polytree_to_paths, NodeIdx, PolyNode,
    PolyTree, PolyTreeIter,
};
pub use simplify::{
    clean_polygon, clean_polygons, minkowski_diff, minkowski_sum, minkowski_sum_paths,
    simplify_polygon, simplify_polygons, DEFAULT_CLEAN_DISTANCE,
};
pub use sweep::Clipper;

/// A fill rule tells us how winding counts decide whether a point is
/// "inside" a polygon.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FillRule {
    /// Inside when the winding number is odd.
    EvenOdd,
    /// Inside when the winding number is non-zero.
    NonZero,
    /// Inside when the winding number is positive.
    Positive,
    /// Inside when the winding number is negative.
    Negative,
}

/// Boolean set operations between the subject and clip polygons.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClipOp {
    /// The region covered by both subject and clip.
    Intersection,
    /// The region covered by either subject or clip.
    Union,
    /// The region covered by the subject but not the clip.
    Difference,
    /// The region covered by exactly one of subject and clip.
    Xor,
}

/// Which of the two input sets a path belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PolyType {
    /// The set being clipped. Subject paths may be open.
    Subject,
    /// The set clipped against. Clip paths must be closed.
    Clip,
}

/// Engine configuration, fixed at construction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// Emit outer rings clockwise instead of counter-clockwise (and holes
    /// the other way around).
    pub reverse_solution: bool,
    /// Enforce strictly simple output: no ring touches itself.
    pub strictly_simple: bool,
    /// Keep collinear vertices of closed input paths instead of merging
    /// them; only true spikes are removed.
    pub preserve_collinear: bool,
}

/// Computes one boolean operation between two sets of closed paths, both
/// filled under `fill_rule`.
pub fn boolean_op(
    subject: &[Path],
    clip: &[Path],
    op: ClipOp,
    fill_rule: FillRule,
) -> Result<Paths> {
    let mut clipper = Clipper::default();
    clipper.add_paths(subject, PolyType::Subject, true)?;
    clipper.add_paths(clip, PolyType::Clip, true)?;
    clipper.execute(op, fill_rule, fill_rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_squares() {
        let a = vec![vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ]];
        let b = vec![vec![
            Point::new(5, 5),
            Point::new(15, 5),
            Point::new(15, 15),
            Point::new(5, 15),
        ]];
        let inter = boolean_op(&a, &b, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
        assert_eq!(inter.len(), 1);
        assert_eq!(area(&inter[0]).abs(), 25.0);
    }
}
