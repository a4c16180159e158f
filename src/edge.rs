use log::debug;

use crate::error::{Error, Result};
use crate::geom::{
    pt2_is_between_pt1_and_pt3, slopes_equal3, Point, HI_RANGE, LO_RANGE,
};
use crate::output::OutRecIdx;
use crate::sweep::Clipper;
use crate::PolyType;

/// An index into the edge arena.
///
/// Edges are assigned identities so that one edge can participate in several
/// lists at once (its polygon ring, the local-minima chain, the AEL and the
/// SEL) through separate link fields, without shared mutable references.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EdgeIdx(pub(crate) usize);

impl std::fmt::Debug for EdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e_{}", self.0)
    }
}

/// Sentinel slope for horizontal edges.
pub(crate) const HORIZONTAL: f64 = -3.4e38;

/// Which side of its local-minima bound an edge is on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Side {
    Left,
    Right,
}

/// An edge's relationship to the output rings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum OutTag {
    /// Not currently contributing to any ring.
    Unassigned,
    /// Marks a terminal edge of an open path; never contributes.
    Skip,
    /// Contributing to the ring with this index.
    Rec(OutRecIdx),
}

impl OutTag {
    pub(crate) fn rec(self) -> Option<OutRecIdx> {
        match self {
            OutTag::Rec(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn is_assigned(self) -> bool {
        matches!(self, OutTag::Rec(_))
    }
}

/// A directed segment between two original-path vertices, with the sweep
/// bookkeeping hung off it.
#[derive(Clone, Debug)]
pub(crate) struct Edge {
    pub(crate) bot: Point,
    pub(crate) curr: Point,
    pub(crate) top: Point,
    pub(crate) delta: Point,
    pub(crate) dx: f64,
    pub(crate) poly_type: PolyType,
    pub(crate) side: Side,
    /// +1 or -1 by winding direction; 0 for open-path edges.
    pub(crate) wind_delta: i32,
    pub(crate) wind_cnt: i32,
    /// Winding count of the opposite polygon type.
    pub(crate) wind_cnt2: i32,
    pub(crate) out: OutTag,
    // ring links within the original polygon
    pub(crate) next: EdgeIdx,
    pub(crate) prev: EdgeIdx,
    // the chain of edges rising from a local minimum
    pub(crate) next_in_lml: Option<EdgeIdx>,
    // active edge list
    pub(crate) next_in_ael: Option<EdgeIdx>,
    pub(crate) prev_in_ael: Option<EdgeIdx>,
    // sorted edge list (scratch; also the horizontal queue)
    pub(crate) next_in_sel: Option<EdgeIdx>,
    pub(crate) prev_in_sel: Option<EdgeIdx>,
}

impl Edge {
    fn new(curr: Point, next: EdgeIdx, prev: EdgeIdx) -> Self {
        Edge {
            bot: Point::default(),
            curr,
            top: Point::default(),
            delta: Point::default(),
            dx: 0.0,
            poly_type: PolyType::Subject,
            side: Side::Left,
            wind_delta: 0,
            wind_cnt: 0,
            wind_cnt2: 0,
            out: OutTag::Unassigned,
            next,
            prev,
            next_in_lml: None,
            next_in_ael: None,
            prev_in_ael: None,
            next_in_sel: None,
            prev_in_sel: None,
        }
    }

    pub(crate) fn is_horizontal(&self) -> bool {
        self.delta.y == 0
    }
}

/// A `y` level where one or two bounds start ascending. The global list is
/// kept sorted bottom-first (descending `y`), newest first among equal `y`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LocalMinima {
    pub(crate) y: i64,
    pub(crate) left_bound: Option<EdgeIdx>,
    pub(crate) right_bound: Option<EdgeIdx>,
}

fn check_range(pt: Point, use_full_range: &mut bool) -> Result<()> {
    if pt.x > HI_RANGE || pt.y > HI_RANGE || -pt.x > HI_RANGE || -pt.y > HI_RANGE {
        return Err(Error::CoordinateRange);
    }
    if pt.x > LO_RANGE || pt.y > LO_RANGE || -pt.x > LO_RANGE || -pt.y > LO_RANGE {
        *use_full_range = true;
    }
    Ok(())
}

impl Clipper {
    pub(crate) fn edge(&self, i: EdgeIdx) -> &Edge {
        &self.edges[i.0]
    }

    pub(crate) fn edge_mut(&mut self, i: EdgeIdx) -> &mut Edge {
        &mut self.edges[i.0]
    }

    /// Adds a path to the edge table. Returns `Ok(false)` when the path
    /// contributes no usable geometry (fewer than three distinct vertices
    /// for a closed path, fewer than two for an open one, or a totally
    /// flat closed path).
    pub fn add_path(&mut self, path: &[Point], poly_type: PolyType, closed: bool) -> Result<bool> {
        if !closed && poly_type == PolyType::Clip {
            return Err(Error::OpenClipPath);
        }

        let mut high_i = path.len() as i64 - 1;
        if closed {
            while high_i > 0 && path[high_i as usize] == path[0] {
                high_i -= 1;
            }
        }
        while high_i > 0 && path[high_i as usize] == path[high_i as usize - 1] {
            high_i -= 1;
        }
        if (closed && high_i < 2) || (!closed && high_i < 1) {
            return Ok(false);
        }
        let high_i = high_i as usize;

        // The arithmetic mode is decided up front from the whole path, and
        // the escalation is permanent for the engine's lifetime.
        for pt in &path[..=high_i] {
            check_range(*pt, &mut self.use_full_range)?;
        }

        // Build the doubly linked edge ring.
        let base = self.edges.len();
        let n = high_i + 1;
        for (i, pt) in path[..=high_i].iter().enumerate() {
            self.edges.push(Edge::new(
                *pt,
                EdgeIdx(base + (i + 1) % n),
                EdgeIdx(base + (i + n - 1) % n),
            ));
        }
        let mut e_start = EdgeIdx(base);

        // Remove duplicate vertices and, when closed, collinear edges.
        let mut e = e_start;
        let mut loop_stop = e_start;
        loop {
            // nb: allows matching start and end points when not closed
            let e_next = self.edge(e).next;
            if self.edge(e).curr == self.edge(e_next).curr && (closed || e_next != e_start) {
                if e == e_next {
                    break;
                }
                if e == e_start {
                    e_start = e_next;
                }
                e = self.remove_edge(e);
                loop_stop = e;
                continue;
            }
            let e_prev = self.edge(e).prev;
            if e_prev == self.edge(e).next {
                break; // only two vertices
            } else if closed
                && slopes_equal3(
                    self.edge(e_prev).curr,
                    self.edge(e).curr,
                    self.edge(self.edge(e).next).curr,
                    self.use_full_range,
                )
                && (!self.options.preserve_collinear
                    || !pt2_is_between_pt1_and_pt3(
                        self.edge(e_prev).curr,
                        self.edge(e).curr,
                        self.edge(self.edge(e).next).curr,
                    ))
            {
                // With preserve_collinear set, only true spikes (the middle
                // point not strictly between its neighbors) are removed.
                if e == e_start {
                    e_start = self.edge(e).next;
                }
                let after = self.remove_edge(e);
                e = self.edge(after).prev;
                loop_stop = e;
                continue;
            }
            e = self.edge(e).next;
            if e == loop_stop || (!closed && self.edge(e).next == e_start) {
                break;
            }
        }

        if (!closed && e == self.edge(e).next) || (closed && self.edge(e).prev == self.edge(e).next)
        {
            return Ok(false);
        }

        if !closed {
            self.has_open_paths = true;
            let skip = self.edge(e_start).prev;
            self.edge_mut(skip).out = OutTag::Skip;
        }

        // Second stage of edge initialization.
        let mut e = e_start;
        let mut is_flat = true;
        loop {
            self.init_edge2(e, poly_type);
            e = self.edge(e).next;
            if is_flat && self.edge(e).curr.y != self.edge(e_start).curr.y {
                is_flat = false;
            }
            if e == e_start {
                break;
            }
        }

        // Totally flat paths need special treatment to avoid endless loops.
        if is_flat {
            if closed {
                return Ok(false);
            }
            let prev = self.edge(e).prev;
            self.edge_mut(prev).out = OutTag::Skip;
            if self.edge(prev).bot.x < self.edge(prev).top.x {
                self.reverse_horizontal(prev);
            }
            let lm = LocalMinima {
                y: self.edge(e).bot.y,
                left_bound: None,
                right_bound: Some(e),
            };
            self.edge_mut(e).side = Side::Right;
            self.edge_mut(e).wind_delta = 0;
            loop {
                let e_next = self.edge(e).next;
                if self.edge(e_next).out == OutTag::Skip {
                    break;
                }
                self.edge_mut(e).next_in_lml = Some(e_next);
                let e_prev = self.edge(e).prev;
                if self.edge(e).bot.x != self.edge(e_prev).top.x {
                    self.reverse_horizontal(e);
                }
                e = e_next;
            }
            self.insert_local_minima(lm);
            return Ok(true);
        }

        // Finally, split the ring into bounds anchored at local minima.
        let mut e_min: Option<EdgeIdx> = None;

        // Open paths with matching start and end points would make
        // find_next_loc_min spin on the degenerate terminal edge.
        let e_prev = self.edge(e).prev;
        if self.edge(e_prev).bot == self.edge(e_prev).top {
            e = self.edge(e).next;
        }

        loop {
            e = self.find_next_loc_min(e);
            if Some(e) == e_min {
                break;
            }
            if e_min.is_none() {
                e_min = Some(e);
            }

            // e and e.prev now share a local minimum (left-aligned when
            // horizontal); their slopes decide which starts which bound.
            let e_prev = self.edge(e).prev;
            let (left, right, left_bound_is_forward) = if self.edge(e).dx < self.edge(e_prev).dx {
                (e_prev, e, false)
            } else {
                (e, e_prev, true)
            };
            self.edge_mut(left).side = Side::Left;
            self.edge_mut(right).side = Side::Right;

            let left_delta = if !closed {
                0
            } else if self.edge(left).next == right {
                -1
            } else {
                1
            };
            self.edge_mut(left).wind_delta = left_delta;
            self.edge_mut(right).wind_delta = -left_delta;

            let mut lm = LocalMinima {
                y: self.edge(e).bot.y,
                left_bound: Some(left),
                right_bound: Some(right),
            };

            e = self.process_bound(left, left_bound_is_forward);
            if self.edge(e).out == OutTag::Skip {
                e = self.process_bound(e, left_bound_is_forward);
            }
            let mut e2 = self.process_bound(right, !left_bound_is_forward);
            if self.edge(e2).out == OutTag::Skip {
                e2 = self.process_bound(e2, !left_bound_is_forward);
            }

            if self.edge(left).out == OutTag::Skip {
                lm.left_bound = None;
            } else if self.edge(right).out == OutTag::Skip {
                lm.right_bound = None;
            }
            self.insert_local_minima(lm);
            if !left_bound_is_forward {
                e = e2;
            }
        }
        debug!(
            "added {} path: {} edges, {} local minima so far",
            if closed { "closed" } else { "open" },
            n,
            self.minima.len()
        );
        Ok(true)
    }

    /// Adds each path of `paths`; true if any of them contributed geometry.
    pub fn add_paths(
        &mut self,
        paths: &[crate::geom::Path],
        poly_type: PolyType,
        closed: bool,
    ) -> Result<bool> {
        let mut result = false;
        for path in paths {
            if self.add_path(path, poly_type, closed)? {
                result = true;
            }
        }
        Ok(result)
    }

    /// Discards the accumulated edge table.
    pub fn clear(&mut self) {
        self.edges.clear();
        self.minima.clear();
        self.current_lm = 0;
        self.use_full_range = false;
        self.has_open_paths = false;
    }

    fn remove_edge(&mut self, e: EdgeIdx) -> EdgeIdx {
        let prev = self.edge(e).prev;
        let next = self.edge(e).next;
        self.edge_mut(prev).next = next;
        self.edge_mut(next).prev = prev;
        next
    }

    fn init_edge2(&mut self, e: EdgeIdx, poly_type: PolyType) {
        let curr = self.edge(e).curr;
        let next_curr = self.edge(self.edge(e).next).curr;
        let edge = self.edge_mut(e);
        if curr.y >= next_curr.y {
            edge.bot = curr;
            edge.top = next_curr;
        } else {
            edge.top = curr;
            edge.bot = next_curr;
        }
        edge.poly_type = poly_type;
        self.set_dx(e);
    }

    fn set_dx(&mut self, e: EdgeIdx) {
        let edge = self.edge_mut(e);
        edge.delta = Point::new(edge.top.x - edge.bot.x, edge.top.y - edge.bot.y);
        if edge.delta.y == 0 {
            edge.dx = HORIZONTAL;
        } else {
            edge.dx = edge.delta.x as f64 / edge.delta.y as f64;
        }
    }

    /// Swaps a horizontal edge's top and bottom x so it follows the natural
    /// progression of its bound and its bot x aligns with the adjoining
    /// lower edge.
    fn reverse_horizontal(&mut self, e: EdgeIdx) {
        let edge = self.edge_mut(e);
        std::mem::swap(&mut edge.top.x, &mut edge.bot.x);
    }

    fn find_next_loc_min(&self, mut e: EdgeIdx) -> EdgeIdx {
        loop {
            loop {
                let edge = self.edge(e);
                if edge.bot == self.edge(edge.prev).bot && edge.curr != edge.top {
                    break;
                }
                e = edge.next;
            }
            let prev = self.edge(e).prev;
            if self.edge(e).dx != HORIZONTAL && self.edge(prev).dx != HORIZONTAL {
                break;
            }
            while self.edge(self.edge(e).prev).dx == HORIZONTAL {
                e = self.edge(e).prev;
            }
            let e2 = e;
            while self.edge(e).dx == HORIZONTAL {
                e = self.edge(e).next;
            }
            if self.edge(e).top.y == self.edge(self.edge(e).prev).bot.y {
                continue; // just an intermediate horizontal
            }
            if self.edge(self.edge(e2).prev).bot.x < self.edge(e).bot.x {
                e = e2;
            }
            break;
        }
        e
    }

    /// Walks one bound from its local minimum to its top, wiring up the
    /// `next_in_lml` chain, and returns the edge just beyond the bound.
    ///
    /// Open paths can interpose skip edges mid-bound; the remainder of the
    /// bound past a skip edge becomes a fresh single-bound local minimum.
    /// The original formulation recurses there; this one loops, deferring
    /// the minima insertions so they land in the same order.
    fn process_bound(&mut self, e_in: EdgeIdx, forward: bool) -> EdgeIdx {
        let mut pending: Vec<LocalMinima> = Vec::new();
        let mut result = e_in;

        let result = loop {
            if self.edge(result).out == OutTag::Skip {
                // Check whether there are edges beyond the skip edge in this
                // bound; if so the remainder becomes its own local minimum.
                let mut e = result;
                if forward {
                    while self.edge(e).top.y == self.edge(self.edge(e).next).bot.y {
                        e = self.edge(e).next;
                    }
                    while e != result && self.edge(e).dx == HORIZONTAL {
                        e = self.edge(e).prev;
                    }
                } else {
                    while self.edge(e).top.y == self.edge(self.edge(e).prev).bot.y {
                        e = self.edge(e).prev;
                    }
                    while e != result && self.edge(e).dx == HORIZONTAL {
                        e = self.edge(e).next;
                    }
                }
                if e == result {
                    break if forward {
                        self.edge(e).next
                    } else {
                        self.edge(e).prev
                    };
                }
                // More edges in the bound beyond the skip edge.
                let e = if forward {
                    self.edge(result).next
                } else {
                    self.edge(result).prev
                };
                pending.push(LocalMinima {
                    y: self.edge(e).bot.y,
                    left_bound: None,
                    right_bound: Some(e),
                });
                self.edge_mut(e).wind_delta = 0;
                result = e;
                continue;
            }

            let mut e = result;
            if self.edge(e).dx == HORIZONTAL {
                // This may not be a true local minimum (e may follow a skip
                // edge), and consecutive horizontals may start heading left
                // before going right.
                let start = if forward {
                    self.edge(e).prev
                } else {
                    self.edge(e).next
                };
                if self.edge(start).out != OutTag::Skip {
                    if self.edge(start).dx == HORIZONTAL {
                        // an adjoining horizontal skip edge
                        if self.edge(start).bot.x != self.edge(e).bot.x
                            && self.edge(start).top.x != self.edge(e).bot.x
                        {
                            self.reverse_horizontal(e);
                        }
                    } else if self.edge(start).bot.x != self.edge(e).bot.x {
                        self.reverse_horizontal(e);
                    }
                }
            }

            let e_start = e;
            if forward {
                loop {
                    let next = self.edge(result).next;
                    if self.edge(result).top.y != self.edge(next).bot.y
                        || self.edge(next).out == OutTag::Skip
                    {
                        break;
                    }
                    result = next;
                }
                if self.edge(result).dx == HORIZONTAL
                    && self.edge(self.edge(result).next).out != OutTag::Skip
                {
                    // At the top of a bound, horizontals belong to the bound
                    // only when the preceding edge attaches to their left
                    // vertex.
                    let mut horz = result;
                    while self.edge(self.edge(horz).prev).dx == HORIZONTAL {
                        horz = self.edge(horz).prev;
                    }
                    let horz_prev = self.edge(horz).prev;
                    let next_top_x = self.edge(self.edge(result).next).top.x;
                    if self.edge(horz_prev).top.x > next_top_x {
                        result = horz_prev;
                    }
                }
                while e != result {
                    let next = self.edge(e).next;
                    self.edge_mut(e).next_in_lml = Some(next);
                    if self.edge(e).dx == HORIZONTAL
                        && e != e_start
                        && self.edge(e).bot.x != self.edge(self.edge(e).prev).top.x
                    {
                        self.reverse_horizontal(e);
                    }
                    e = next;
                }
                if self.edge(e).dx == HORIZONTAL
                    && e != e_start
                    && self.edge(e).bot.x != self.edge(self.edge(e).prev).top.x
                {
                    self.reverse_horizontal(e);
                }
                break self.edge(result).next; // just beyond the bound
            } else {
                loop {
                    let prev = self.edge(result).prev;
                    if self.edge(result).top.y != self.edge(prev).bot.y
                        || self.edge(prev).out == OutTag::Skip
                    {
                        break;
                    }
                    result = prev;
                }
                if self.edge(result).dx == HORIZONTAL
                    && self.edge(self.edge(result).prev).out != OutTag::Skip
                {
                    let mut horz = result;
                    while self.edge(self.edge(horz).next).dx == HORIZONTAL {
                        horz = self.edge(horz).next;
                    }
                    let horz_next = self.edge(horz).next;
                    let prev_top_x = self.edge(self.edge(result).prev).top.x;
                    if self.edge(horz_next).top.x >= prev_top_x {
                        result = horz_next;
                    }
                }
                while e != result {
                    let prev = self.edge(e).prev;
                    self.edge_mut(e).next_in_lml = Some(prev);
                    if self.edge(e).dx == HORIZONTAL
                        && e != e_start
                        && self.edge(e).bot.x != self.edge(self.edge(e).next).top.x
                    {
                        self.reverse_horizontal(e);
                    }
                    e = prev;
                }
                if self.edge(e).dx == HORIZONTAL
                    && e != e_start
                    && self.edge(e).bot.x != self.edge(self.edge(e).next).top.x
                {
                    self.reverse_horizontal(e);
                }
                break self.edge(result).prev; // just beyond the bound
            }
        };

        // The deferred minima go in deepest-first, matching the order the
        // recursive formulation inserts them.
        for lm in pending.into_iter().rev() {
            self.insert_local_minima(lm);
        }
        result
    }

    pub(crate) fn insert_local_minima(&mut self, lm: LocalMinima) {
        let pos = self
            .minima
            .iter()
            .position(|m| lm.y >= m.y)
            .unwrap_or(self.minima.len());
        self.minima.insert(pos, lm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clipper, PolyType};

    fn pts(v: &[(i64, i64)]) -> Vec<Point> {
        v.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn open_clip_path_is_rejected() {
        let mut c = Clipper::default();
        let path = pts(&[(0, 0), (10, 0), (10, 10)]);
        assert_eq!(
            c.add_path(&path, PolyType::Clip, false),
            Err(Error::OpenClipPath)
        );
    }

    #[test]
    fn out_of_range_coordinate_is_rejected() {
        let mut c = Clipper::default();
        let path = pts(&[(0, 0), (HI_RANGE + 1, 0), (10, 10)]);
        assert_eq!(
            c.add_path(&path, PolyType::Subject, true),
            Err(Error::CoordinateRange)
        );
    }

    #[test]
    fn large_coordinates_escalate_range_mode() {
        let mut c = Clipper::default();
        let path = pts(&[(0, 0), (LO_RANGE + 1, 0), (LO_RANGE + 1, 50), (0, 50)]);
        assert!(c.add_path(&path, PolyType::Subject, true).unwrap());
        assert!(c.use_full_range);
    }

    #[test]
    fn degenerate_paths_contribute_nothing() {
        let mut c = Clipper::default();
        // fewer than three distinct vertices
        assert!(!c.add_path(&pts(&[(0, 0), (5, 5)]), PolyType::Subject, true).unwrap());
        // duplicates collapse below the minimum
        assert!(!c
            .add_path(&pts(&[(0, 0), (0, 0), (5, 5), (5, 5)]), PolyType::Subject, true)
            .unwrap());
        // a flat closed path is degenerate
        assert!(!c
            .add_path(&pts(&[(0, 0), (5, 0), (9, 0)]), PolyType::Subject, true)
            .unwrap());
        assert!(c.minima.is_empty());
    }

    #[test]
    fn flat_open_path_becomes_pseudo_minimum() {
        let mut c = Clipper::default();
        assert!(c
            .add_path(&pts(&[(0, 0), (5, 0), (9, 0)]), PolyType::Subject, false)
            .unwrap());
        assert_eq!(c.minima.len(), 1);
        assert!(c.minima[0].left_bound.is_none());
        assert!(c.has_open_paths);
    }

    #[test]
    fn collinear_vertices_are_merged() {
        let mut c = Clipper::default();
        let path = pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (0, 10)]);
        assert!(c.add_path(&path, PolyType::Subject, true).unwrap());
        // (5, 0) collapses into the bottom edge: one ring of four live edges
        let lm = c.minima[0];
        let mut count = 1;
        let start = lm.left_bound.unwrap();
        let mut e = c.edge(start).next;
        while e != start {
            count += 1;
            e = c.edge(e).next;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn preserve_collinear_keeps_vertices() {
        let mut c = Clipper::new(crate::Options {
            preserve_collinear: true,
            ..Default::default()
        });
        let path = pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (0, 10)]);
        assert!(c.add_path(&path, PolyType::Subject, true).unwrap());
        let lm = c.minima[0];
        let mut count = 1;
        let start = lm.left_bound.unwrap();
        let mut e = c.edge(start).next;
        while e != start {
            count += 1;
            e = c.edge(e).next;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn minima_are_bottom_first_newest_head_on_ties() {
        let mut c = Clipper::default();
        // two triangles with bottoms at y=10 and y=20
        c.add_path(&pts(&[(0, 0), (10, 0), (5, 10)]), PolyType::Subject, true)
            .unwrap();
        c.add_path(&pts(&[(20, 0), (30, 0), (25, 20)]), PolyType::Subject, true)
            .unwrap();
        let ys: Vec<i64> = c.minima.iter().map(|m| m.y).collect();
        assert_eq!(ys, vec![20, 10]);
    }
}
