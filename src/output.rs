use log::debug;

use crate::edge::{EdgeIdx, OutTag, Side, HORIZONTAL};
use crate::geom::{pt2_is_between_pt1_and_pt3, slopes_equal3, Path, Paths, Point};
use crate::polytree::{PolyNode, PolyTree};
use crate::sweep::{Clipper, Direction};

/// An index into the output-point arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OutPtIdx(pub(crate) usize);

impl std::fmt::Debug for OutPtIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p_{}", self.0)
    }
}

/// An index into the output-record arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OutRecIdx(pub(crate) usize);

impl std::fmt::Debug for OutRecIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r_{}", self.0)
    }
}

/// A point in a circular doubly linked output ring.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OutPt {
    pub(crate) pt: Point,
    pub(crate) next: OutPtIdx,
    pub(crate) prev: OutPtIdx,
    /// The record this point was emitted into; chased through `owner`
    /// when records merge.
    pub(crate) rec: OutRecIdx,
}

/// An accumulating output ring plus its nesting metadata.
///
/// Records never move; when two fragments merge, the absorbed record's
/// `owner` is repointed at the survivor and lookups chase owners
/// (union-find with path compression).
#[derive(Clone, Copy, Debug)]
pub(crate) struct OutRec {
    pub(crate) owner: OutRecIdx,
    pub(crate) is_hole: bool,
    pub(crate) is_open: bool,
    /// The record whose ring topologically contains this one; only used
    /// for nesting lookups, never ownership.
    pub(crate) first_left: Option<OutRecIdx>,
    /// Ring entry point: the left-most vertex; its `prev` is the right-most.
    pub(crate) pts: Option<OutPtIdx>,
    pub(crate) bottom_pt: Option<OutPtIdx>,
    pub(crate) node: Option<usize>,
}

/// A deferred instruction to splice two ring fragments that share a
/// boundary segment.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Join {
    pub(crate) out_pt1: OutPtIdx,
    pub(crate) out_pt2: OutPtIdx,
    pub(crate) off_pt: Point,
}

/// Half a join: a point on a horizontal edge that may pair up with a later
/// output point overlapping the same span.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GhostJoin {
    pub(crate) out_pt: OutPtIdx,
    pub(crate) off_pt: Point,
}

fn get_dx(pt1: Point, pt2: Point) -> f64 {
    if pt1.y == pt2.y {
        HORIZONTAL
    } else {
        (pt2.x - pt1.x) as f64 / (pt2.y - pt1.y) as f64
    }
}

fn get_overlap(a1: i64, a2: i64, b1: i64, b2: i64) -> Option<(i64, i64)> {
    let (left, right) = if a1 < a2 {
        if b1 < b2 {
            (a1.max(b1), a2.min(b2))
        } else {
            (a1.max(b2), a2.min(b1))
        }
    } else if b1 < b2 {
        (a2.max(b1), a1.min(b2))
    } else {
        (a2.max(b2), a1.min(b1))
    };
    (left < right).then_some((left, right))
}

impl Clipper {
    pub(crate) fn op(&self, i: OutPtIdx) -> &OutPt {
        &self.out_pts[i.0]
    }

    pub(crate) fn op_mut(&mut self, i: OutPtIdx) -> &mut OutPt {
        &mut self.out_pts[i.0]
    }

    pub(crate) fn add_join(&mut self, op1: OutPtIdx, op2: OutPtIdx, off_pt: Point) {
        self.joins.push(Join {
            out_pt1: op1,
            out_pt2: op2,
            off_pt,
        });
    }

    pub(crate) fn add_ghost_join(&mut self, op: OutPtIdx, off_pt: Point) {
        self.ghost_joins.push(GhostJoin { out_pt: op, off_pt });
    }

    fn create_out_rec(&mut self) -> OutRecIdx {
        let idx = OutRecIdx(self.out_recs.len());
        self.out_recs.push(OutRec {
            owner: idx,
            is_hole: false,
            is_open: false,
            first_left: None,
            pts: None,
            bottom_pt: None,
            node: None,
        });
        idx
    }

    /// Resolves a record index to its current (possibly since-merged)
    /// record, compressing the chased path.
    pub(crate) fn get_out_rec(&mut self, idx: OutRecIdx) -> OutRecIdx {
        let mut root = idx;
        while self.out_recs[root.0].owner != root {
            root = self.out_recs[root.0].owner;
        }
        let mut cur = idx;
        while cur != root {
            let next = self.out_recs[cur.0].owner;
            self.out_recs[cur.0].owner = root;
            cur = next;
        }
        root
    }

    /// Starts a new ring for `e` or appends `pt` to the ring it is already
    /// contributing to, on the front or back depending on the edge's side.
    pub(crate) fn add_out_pt(&mut self, e: EdgeIdx, pt: Point) -> OutPtIdx {
        let to_front = self.edge(e).side == Side::Left;
        match self.edge(e).out.rec() {
            None => {
                let rec = self.create_out_rec();
                self.out_recs[rec.0].is_open = self.edge(e).wind_delta == 0;
                let new_op = OutPtIdx(self.out_pts.len());
                self.out_pts.push(OutPt {
                    pt,
                    next: new_op,
                    prev: new_op,
                    rec,
                });
                self.out_recs[rec.0].pts = Some(new_op);
                if !self.out_recs[rec.0].is_open {
                    self.set_hole_state(e, rec);
                }
                self.edge_mut(e).out = OutTag::Rec(rec);
                new_op
            }
            Some(rec) => {
                let front = self.out_recs[rec.0].pts.expect("assigned ring has points");
                let back = self.op(front).prev;
                if to_front && pt == self.op(front).pt {
                    return front;
                }
                if !to_front && pt == self.op(back).pt {
                    return back;
                }
                let new_op = OutPtIdx(self.out_pts.len());
                self.out_pts.push(OutPt {
                    pt,
                    next: front,
                    prev: back,
                    rec,
                });
                self.op_mut(back).next = new_op;
                self.op_mut(front).prev = new_op;
                if to_front {
                    self.out_recs[rec.0].pts = Some(new_op);
                }
                new_op
            }
        }
    }

    /// Hole state of a fresh ring: parity of contributing edges to its
    /// left in the AEL, which also supplies the `first_left` container.
    fn set_hole_state(&mut self, e: EdgeIdx, rec: OutRecIdx) {
        let mut is_hole = false;
        let mut e2 = self.edge(e).prev_in_ael;
        while let Some(i) = e2 {
            if self.edge(i).out.is_assigned() && self.edge(i).wind_delta != 0 {
                is_hole = !is_hole;
                if self.out_recs[rec.0].first_left.is_none() {
                    self.out_recs[rec.0].first_left = self.edge(i).out.rec();
                }
            }
            e2 = self.edge(i).prev_in_ael;
        }
        if is_hole {
            self.out_recs[rec.0].is_hole = true;
        }
    }

    /// Tie-break between two candidate bottom points at the same
    /// coordinates: the one whose adjoining edges diverge more slowly wins.
    fn first_is_bottom_pt(&self, btm_pt1: OutPtIdx, btm_pt2: OutPtIdx) -> bool {
        let mut p = self.op(btm_pt1).prev;
        while self.op(p).pt == self.op(btm_pt1).pt && p != btm_pt1 {
            p = self.op(p).prev;
        }
        let dx1p = get_dx(self.op(btm_pt1).pt, self.op(p).pt).abs();
        let mut p = self.op(btm_pt1).next;
        while self.op(p).pt == self.op(btm_pt1).pt && p != btm_pt1 {
            p = self.op(p).next;
        }
        let dx1n = get_dx(self.op(btm_pt1).pt, self.op(p).pt).abs();

        let mut p = self.op(btm_pt2).prev;
        while self.op(p).pt == self.op(btm_pt2).pt && p != btm_pt2 {
            p = self.op(p).prev;
        }
        let dx2p = get_dx(self.op(btm_pt2).pt, self.op(p).pt).abs();
        let mut p = self.op(btm_pt2).next;
        while self.op(p).pt == self.op(btm_pt2).pt && p != btm_pt2 {
            p = self.op(p).next;
        }
        let dx2n = get_dx(self.op(btm_pt2).pt, self.op(p).pt).abs();

        (dx1p >= dx2p && dx1p >= dx2n) || (dx1n >= dx2p && dx1n >= dx2n)
    }

    fn get_bottom_pt(&self, mut pp: OutPtIdx) -> OutPtIdx {
        let mut dups: Option<OutPtIdx> = None;
        let mut p = self.op(pp).next;
        while p != pp {
            if self.op(p).pt.y > self.op(pp).pt.y {
                pp = p;
                dups = None;
            } else if self.op(p).pt.y == self.op(pp).pt.y && self.op(p).pt.x <= self.op(pp).pt.x {
                if self.op(p).pt.x < self.op(pp).pt.x {
                    dups = None;
                    pp = p;
                } else if self.op(p).next != pp && self.op(p).prev != pp {
                    dups = Some(p);
                }
            }
            p = self.op(p).next;
        }
        if let Some(mut d) = dups {
            // at least two vertices share the bottom point
            while d != p {
                if !self.first_is_bottom_pt(p, d) {
                    pp = d;
                }
                d = self.op(d).next;
                while self.op(d).pt != self.op(pp).pt {
                    d = self.op(d).next;
                }
            }
        }
        pp
    }

    /// Which of two fragments carries the correct hole state: the one
    /// whose bottom point is lower (with tie-breaks).
    fn get_lowermost_rec(&mut self, out_rec1: OutRecIdx, out_rec2: OutRecIdx) -> OutRecIdx {
        if self.out_recs[out_rec1.0].bottom_pt.is_none() {
            let pts = self.out_recs[out_rec1.0].pts.expect("fragment has points");
            self.out_recs[out_rec1.0].bottom_pt = Some(self.get_bottom_pt(pts));
        }
        if self.out_recs[out_rec2.0].bottom_pt.is_none() {
            let pts = self.out_recs[out_rec2.0].pts.expect("fragment has points");
            self.out_recs[out_rec2.0].bottom_pt = Some(self.get_bottom_pt(pts));
        }
        let b_pt1 = self.out_recs[out_rec1.0].bottom_pt.expect("just cached");
        let b_pt2 = self.out_recs[out_rec2.0].bottom_pt.expect("just cached");
        let pt1 = self.op(b_pt1).pt;
        let pt2 = self.op(b_pt2).pt;
        if pt1.y > pt2.y {
            out_rec1
        } else if pt1.y < pt2.y {
            out_rec2
        } else if pt1.x < pt2.x {
            out_rec1
        } else if pt1.x > pt2.x {
            out_rec2
        } else if self.op(b_pt1).next == b_pt1 {
            out_rec2
        } else if self.op(b_pt2).next == b_pt2 {
            out_rec1
        } else if self.first_is_bottom_pt(b_pt1, b_pt2) {
            out_rec1
        } else {
            out_rec2
        }
    }

    /// Whether `out_rec2` is an ancestor of `out_rec1` along the
    /// `first_left` containment chain.
    fn param1_right_of_param2(&self, out_rec1: OutRecIdx, out_rec2: OutRecIdx) -> bool {
        let mut r = out_rec1;
        while let Some(fl) = self.out_recs[r.0].first_left {
            if fl == out_rec2 {
                return true;
            }
            r = fl;
        }
        false
    }

    /// Merges the ring `e2` contributes to into the ring `e1` contributes
    /// to, splicing by each edge's side, and retires the absorbed record.
    pub(crate) fn append_polygon(&mut self, e1: EdgeIdx, e2: EdgeIdx) {
        let out_rec1 = self.edge(e1).out.rec().expect("merge of contributing edges");
        let out_rec2 = self.edge(e2).out.rec().expect("merge of contributing edges");

        let hole_state_rec = if self.param1_right_of_param2(out_rec1, out_rec2) {
            out_rec2
        } else if self.param1_right_of_param2(out_rec2, out_rec1) {
            out_rec1
        } else {
            self.get_lowermost_rec(out_rec1, out_rec2)
        };

        let p1_lft = self.out_recs[out_rec1.0].pts.expect("merge of live rings");
        let p1_rt = self.op(p1_lft).prev;
        let p2_lft = self.out_recs[out_rec2.0].pts.expect("merge of live rings");
        let p2_rt = self.op(p2_lft).prev;

        // join e2's ring onto e1's
        let side = if self.edge(e1).side == Side::Left {
            if self.edge(e2).side == Side::Left {
                // z y x a b c
                self.reverse_poly_pt_links(p2_lft);
                self.op_mut(p2_lft).next = p1_lft;
                self.op_mut(p1_lft).prev = p2_lft;
                self.op_mut(p1_rt).next = p2_rt;
                self.op_mut(p2_rt).prev = p1_rt;
                self.out_recs[out_rec1.0].pts = Some(p2_rt);
            } else {
                // x y z a b c
                self.op_mut(p2_rt).next = p1_lft;
                self.op_mut(p1_lft).prev = p2_rt;
                self.op_mut(p2_lft).prev = p1_rt;
                self.op_mut(p1_rt).next = p2_lft;
                self.out_recs[out_rec1.0].pts = Some(p2_lft);
            }
            Side::Left
        } else {
            if self.edge(e2).side == Side::Right {
                // a b c z y x
                self.reverse_poly_pt_links(p2_lft);
                self.op_mut(p1_rt).next = p2_rt;
                self.op_mut(p2_rt).prev = p1_rt;
                self.op_mut(p2_lft).next = p1_lft;
                self.op_mut(p1_lft).prev = p2_lft;
            } else {
                // a b c x y z
                self.op_mut(p1_rt).next = p2_lft;
                self.op_mut(p2_lft).prev = p1_rt;
                self.op_mut(p1_lft).prev = p2_rt;
                self.op_mut(p2_rt).next = p1_lft;
            }
            Side::Right
        };

        self.out_recs[out_rec1.0].bottom_pt = None;
        if hole_state_rec == out_rec2 {
            if self.out_recs[out_rec2.0].first_left != Some(out_rec1) {
                self.out_recs[out_rec1.0].first_left = self.out_recs[out_rec2.0].first_left;
            }
            self.out_recs[out_rec1.0].is_hole = self.out_recs[out_rec2.0].is_hole;
        }
        self.out_recs[out_rec2.0].pts = None;
        self.out_recs[out_rec2.0].bottom_pt = None;
        self.out_recs[out_rec2.0].first_left = Some(out_rec1);

        let ok_tag = self.edge(e1).out;
        let obsolete_tag = self.edge(e2).out;

        // nb: safe because we only get here via add_local_max_poly
        self.edge_mut(e1).out = OutTag::Unassigned;
        self.edge_mut(e2).out = OutTag::Unassigned;

        let mut e = self.active_edges;
        while let Some(i) = e {
            if self.edge(i).out == obsolete_tag {
                self.edge_mut(i).out = ok_tag;
                self.edge_mut(i).side = side;
                break;
            }
            e = self.edge(i).next_in_ael;
        }

        self.out_recs[out_rec2.0].owner = out_rec1;
    }

    pub(crate) fn reverse_poly_pt_links(&mut self, pp: OutPtIdx) {
        let mut pp1 = pp;
        loop {
            let pp2 = self.op(pp1).next;
            let prev = self.op(pp1).prev;
            self.op_mut(pp1).next = prev;
            self.op_mut(pp1).prev = pp2;
            pp1 = pp2;
            if pp1 == pp {
                break;
            }
        }
    }

    /// Two edges meeting at the bottom of a bound start one ring between
    /// them; the left/right roles fall out of their slopes.
    pub(crate) fn add_local_min_poly(&mut self, e1: EdgeIdx, e2: EdgeIdx, pt: Point) -> OutPtIdx {
        let (result, e, prev_e);
        if self.edge(e2).is_horizontal() || self.edge(e1).dx > self.edge(e2).dx {
            result = self.add_out_pt(e1, pt);
            self.edge_mut(e2).out = self.edge(e1).out;
            self.edge_mut(e1).side = Side::Left;
            self.edge_mut(e2).side = Side::Right;
            e = e1;
            prev_e = if self.edge(e).prev_in_ael == Some(e2) {
                self.edge(e2).prev_in_ael
            } else {
                self.edge(e).prev_in_ael
            };
        } else {
            result = self.add_out_pt(e2, pt);
            self.edge_mut(e1).out = self.edge(e2).out;
            self.edge_mut(e1).side = Side::Right;
            self.edge_mut(e2).side = Side::Left;
            e = e2;
            prev_e = if self.edge(e).prev_in_ael == Some(e1) {
                self.edge(e1).prev_in_ael
            } else {
                self.edge(e).prev_in_ael
            };
        }

        if let Some(pe) = prev_e {
            if self.edge(pe).out.is_assigned()
                && self.top_x(pe, pt.y) == self.top_x(e, pt.y)
                && self.slopes_equal_edges(e, pe)
                && self.edge(e).wind_delta != 0
                && self.edge(pe).wind_delta != 0
            {
                let out_pt = self.add_out_pt(pe, pt);
                let top = self.edge(e).top;
                self.add_join(result, out_pt, top);
            }
        }
        result
    }

    /// Two edges meeting at the top of a bound either close their shared
    /// ring or merge two rings into one.
    pub(crate) fn add_local_max_poly(&mut self, e1: EdgeIdx, e2: EdgeIdx, pt: Point) {
        self.add_out_pt(e1, pt);
        if self.edge(e2).wind_delta == 0 {
            self.add_out_pt(e2, pt);
        }
        if self.edge(e1).out == self.edge(e2).out {
            self.edge_mut(e1).out = OutTag::Unassigned;
            self.edge_mut(e2).out = OutTag::Unassigned;
        } else {
            let r1 = self.edge(e1).out.rec().expect("contributing maxima");
            let r2 = self.edge(e2).out.rec().expect("contributing maxima");
            if r1.0 < r2.0 {
                self.append_polygon(e1, e2);
            } else {
                self.append_polygon(e2, e1);
            }
        }
    }

    pub(crate) fn out_rec_area(&self, rec: OutRecIdx) -> f64 {
        let Some(start) = self.out_recs[rec.0].pts else {
            return 0.0;
        };
        let mut a = 0.0;
        let mut op = start;
        loop {
            let prev = self.op(op).prev;
            a += (self.op(prev).pt.x + self.op(op).pt.x) as f64
                * (self.op(prev).pt.y - self.op(op).pt.y) as f64;
            op = self.op(op).next;
            if op == start {
                break;
            }
        }
        a * 0.5
    }

    /// Removes duplicate points and collinear middle vertices from a
    /// finished ring, using the same collinearity rule as ingestion.
    pub(crate) fn fixup_out_polygon(&mut self, rec: OutRecIdx) {
        let mut last_ok: Option<OutPtIdx> = None;
        self.out_recs[rec.0].bottom_pt = None;
        let mut pp = self.out_recs[rec.0].pts.expect("fixup of live ring");
        loop {
            if self.op(pp).prev == pp || self.op(pp).prev == self.op(pp).next {
                self.out_recs[rec.0].pts = None;
                return;
            }
            let prev = self.op(pp).prev;
            let next = self.op(pp).next;
            if self.op(pp).pt == self.op(next).pt
                || self.op(pp).pt == self.op(prev).pt
                || (slopes_equal3(
                    self.op(prev).pt,
                    self.op(pp).pt,
                    self.op(next).pt,
                    self.use_full_range,
                ) && (!self.options.preserve_collinear
                    || !pt2_is_between_pt1_and_pt3(
                        self.op(prev).pt,
                        self.op(pp).pt,
                        self.op(next).pt,
                    )))
            {
                last_ok = None;
                self.op_mut(prev).next = next;
                self.op_mut(next).prev = prev;
                pp = prev;
            } else if Some(pp) == last_ok {
                break;
            } else {
                if last_ok.is_none() {
                    last_ok = Some(pp);
                }
                pp = next;
            }
        }
        self.out_recs[rec.0].pts = Some(pp);
    }

    fn dup_out_pt(&mut self, out_pt: OutPtIdx, insert_after: bool) -> OutPtIdx {
        let result = OutPtIdx(self.out_pts.len());
        let src = *self.op(out_pt);
        if insert_after {
            self.out_pts.push(OutPt {
                pt: src.pt,
                rec: src.rec,
                next: src.next,
                prev: out_pt,
            });
            let next = src.next;
            self.op_mut(next).prev = result;
            self.op_mut(out_pt).next = result;
        } else {
            self.out_pts.push(OutPt {
                pt: src.pt,
                rec: src.rec,
                prev: src.prev,
                next: out_pt,
            });
            let prev = src.prev;
            self.op_mut(prev).next = result;
            self.op_mut(out_pt).prev = result;
        }
        result
    }

    fn join_horz(
        &mut self,
        mut op1: OutPtIdx,
        mut op1b: OutPtIdx,
        mut op2: OutPtIdx,
        mut op2b: OutPtIdx,
        pt: Point,
        discard_left: bool,
    ) -> bool {
        let dir1 = if self.op(op1).pt.x > self.op(op1b).pt.x {
            Direction::RightToLeft
        } else {
            Direction::LeftToRight
        };
        let dir2 = if self.op(op2).pt.x > self.op(op2b).pt.x {
            Direction::RightToLeft
        } else {
            Direction::LeftToRight
        };
        if dir1 == dir2 {
            return false;
        }

        // When discarding left, op1b must end up left of op1 (and op2b of
        // op2), so get to or past pt before duplicating; and vice versa.
        if dir1 == Direction::LeftToRight {
            loop {
                let next = self.op(op1).next;
                if self.op(next).pt.x <= pt.x
                    && self.op(next).pt.x >= self.op(op1).pt.x
                    && self.op(next).pt.y == pt.y
                {
                    op1 = next;
                } else {
                    break;
                }
            }
            if discard_left && self.op(op1).pt.x != pt.x {
                op1 = self.op(op1).next;
            }
            op1b = self.dup_out_pt(op1, !discard_left);
            if self.op(op1b).pt != pt {
                op1 = op1b;
                self.op_mut(op1).pt = pt;
                op1b = self.dup_out_pt(op1, !discard_left);
            }
        } else {
            loop {
                let next = self.op(op1).next;
                if self.op(next).pt.x >= pt.x
                    && self.op(next).pt.x <= self.op(op1).pt.x
                    && self.op(next).pt.y == pt.y
                {
                    op1 = next;
                } else {
                    break;
                }
            }
            if !discard_left && self.op(op1).pt.x != pt.x {
                op1 = self.op(op1).next;
            }
            op1b = self.dup_out_pt(op1, discard_left);
            if self.op(op1b).pt != pt {
                op1 = op1b;
                self.op_mut(op1).pt = pt;
                op1b = self.dup_out_pt(op1, discard_left);
            }
        }

        if dir2 == Direction::LeftToRight {
            loop {
                let next = self.op(op2).next;
                if self.op(next).pt.x <= pt.x
                    && self.op(next).pt.x >= self.op(op2).pt.x
                    && self.op(next).pt.y == pt.y
                {
                    op2 = next;
                } else {
                    break;
                }
            }
            if discard_left && self.op(op2).pt.x != pt.x {
                op2 = self.op(op2).next;
            }
            op2b = self.dup_out_pt(op2, !discard_left);
            if self.op(op2b).pt != pt {
                op2 = op2b;
                self.op_mut(op2).pt = pt;
                op2b = self.dup_out_pt(op2, !discard_left);
            }
        } else {
            loop {
                let next = self.op(op2).next;
                if self.op(next).pt.x >= pt.x
                    && self.op(next).pt.x <= self.op(op2).pt.x
                    && self.op(next).pt.y == pt.y
                {
                    op2 = next;
                } else {
                    break;
                }
            }
            if !discard_left && self.op(op2).pt.x != pt.x {
                op2 = self.op(op2).next;
            }
            op2b = self.dup_out_pt(op2, discard_left);
            if self.op(op2b).pt != pt {
                op2 = op2b;
                self.op_mut(op2).pt = pt;
                op2b = self.dup_out_pt(op2, discard_left);
            }
        }

        if (dir1 == Direction::LeftToRight) == discard_left {
            self.op_mut(op1).prev = op2;
            self.op_mut(op2).next = op1;
            self.op_mut(op1b).next = op2b;
            self.op_mut(op2b).prev = op1b;
        } else {
            self.op_mut(op1).next = op2;
            self.op_mut(op2).prev = op1;
            self.op_mut(op1b).prev = op2b;
            self.op_mut(op2b).next = op1b;
        }
        true
    }

    /// Attempts the geometric splice for one recorded join. Three kinds:
    /// joins along collinear horizontal edges, joins at the shared bottom
    /// of non-horizontal edges, and strictly-simple joins where the rings
    /// touch at a single point.
    fn join_points(&mut self, j: &mut Join, out_rec1: OutRecIdx, out_rec2: OutRecIdx) -> bool {
        let mut op1 = j.out_pt1;
        let mut op2 = j.out_pt2;

        let is_horizontal = self.op(j.out_pt1).pt.y == j.off_pt.y;

        if is_horizontal && j.off_pt == self.op(j.out_pt1).pt && j.off_pt == self.op(j.out_pt2).pt {
            // strictly simple join
            if out_rec1 != out_rec2 {
                return false;
            }
            let mut op1b = self.op(j.out_pt1).next;
            while op1b != op1 && self.op(op1b).pt == j.off_pt {
                op1b = self.op(op1b).next;
            }
            let reverse1 = self.op(op1b).pt.y > j.off_pt.y;
            let mut op2b = self.op(j.out_pt2).next;
            while op2b != op2 && self.op(op2b).pt == j.off_pt {
                op2b = self.op(op2b).next;
            }
            let reverse2 = self.op(op2b).pt.y > j.off_pt.y;
            if reverse1 == reverse2 {
                return false;
            }
            if reverse1 {
                let op1b = self.dup_out_pt(op1, false);
                let op2b = self.dup_out_pt(op2, true);
                self.op_mut(op1).prev = op2;
                self.op_mut(op2).next = op1;
                self.op_mut(op1b).next = op2b;
                self.op_mut(op2b).prev = op1b;
                j.out_pt1 = op1;
                j.out_pt2 = op1b;
                true
            } else {
                let op1b = self.dup_out_pt(op1, true);
                let op2b = self.dup_out_pt(op2, false);
                self.op_mut(op1).next = op2;
                self.op_mut(op2).prev = op1;
                self.op_mut(op1b).prev = op2b;
                self.op_mut(op2b).next = op1b;
                j.out_pt1 = op1;
                j.out_pt2 = op1b;
                true
            }
        } else if is_horizontal {
            // The join points may be anywhere along the two horizontal
            // edges; find the extremities first.
            let mut op1b = op1;
            while self.op(self.op(op1).prev).pt.y == self.op(op1).pt.y
                && self.op(op1).prev != op1b
                && self.op(op1).prev != op2
            {
                op1 = self.op(op1).prev;
            }
            while self.op(self.op(op1b).next).pt.y == self.op(op1b).pt.y
                && self.op(op1b).next != op1
                && self.op(op1b).next != op2
            {
                op1b = self.op(op1b).next;
            }
            if self.op(op1b).next == op1 || self.op(op1b).next == op2 {
                return false; // a flat 'polygon'
            }

            let mut op2b = op2;
            while self.op(self.op(op2).prev).pt.y == self.op(op2).pt.y
                && self.op(op2).prev != op2b
                && self.op(op2).prev != op1b
            {
                op2 = self.op(op2).prev;
            }
            while self.op(self.op(op2b).next).pt.y == self.op(op2b).pt.y
                && self.op(op2b).next != op2
                && self.op(op2b).next != op1
            {
                op2b = self.op(op2b).next;
            }
            if self.op(op2b).next == op2 || self.op(op2b).next == op1 {
                return false; // a flat 'polygon'
            }

            let Some((left, right)) = get_overlap(
                self.op(op1).pt.x,
                self.op(op1b).pt.x,
                self.op(op2).pt.x,
                self.op(op2b).pt.x,
            ) else {
                return false;
            };

            // Joining overlapping edges creates a spike that will need
            // cleaning up, but op1 and op2 must not get caught on the
            // discarded side as either may still be needed for other joins.
            let (pt, discard_left_side);
            if self.op(op1).pt.x >= left && self.op(op1).pt.x <= right {
                pt = self.op(op1).pt;
                discard_left_side = self.op(op1).pt.x > self.op(op1b).pt.x;
            } else if self.op(op2).pt.x >= left && self.op(op2).pt.x <= right {
                pt = self.op(op2).pt;
                discard_left_side = self.op(op2).pt.x > self.op(op2b).pt.x;
            } else if self.op(op1b).pt.x >= left && self.op(op1b).pt.x <= right {
                pt = self.op(op1b).pt;
                discard_left_side = self.op(op1b).pt.x > self.op(op1).pt.x;
            } else {
                pt = self.op(op2b).pt;
                discard_left_side = self.op(op2b).pt.x > self.op(op2).pt.x;
            }
            j.out_pt1 = op1;
            j.out_pt2 = op2;
            self.join_horz(op1, op1b, op2, op2b, pt, discard_left_side)
        } else {
            // nb: for non-horizontal joins both points sit at the same y,
            // above the off point

            // make sure the fragments are correctly oriented
            let mut op1b = self.op(op1).next;
            while self.op(op1b).pt == self.op(op1).pt && op1b != op1 {
                op1b = self.op(op1b).next;
            }
            let reverse1 = self.op(op1b).pt.y > self.op(op1).pt.y
                || !slopes_equal3(
                    self.op(op1).pt,
                    self.op(op1b).pt,
                    j.off_pt,
                    self.use_full_range,
                );
            if reverse1 {
                op1b = self.op(op1).prev;
                while self.op(op1b).pt == self.op(op1).pt && op1b != op1 {
                    op1b = self.op(op1b).prev;
                }
                if self.op(op1b).pt.y > self.op(op1).pt.y
                    || !slopes_equal3(
                        self.op(op1).pt,
                        self.op(op1b).pt,
                        j.off_pt,
                        self.use_full_range,
                    )
                {
                    return false;
                }
            }
            let mut op2b = self.op(op2).next;
            while self.op(op2b).pt == self.op(op2).pt && op2b != op2 {
                op2b = self.op(op2b).next;
            }
            let reverse2 = self.op(op2b).pt.y > self.op(op2).pt.y
                || !slopes_equal3(
                    self.op(op2).pt,
                    self.op(op2b).pt,
                    j.off_pt,
                    self.use_full_range,
                );
            if reverse2 {
                op2b = self.op(op2).prev;
                while self.op(op2b).pt == self.op(op2).pt && op2b != op2 {
                    op2b = self.op(op2b).prev;
                }
                if self.op(op2b).pt.y > self.op(op2).pt.y
                    || !slopes_equal3(
                        self.op(op2).pt,
                        self.op(op2b).pt,
                        j.off_pt,
                        self.use_full_range,
                    )
                {
                    return false;
                }
            }

            if op1b == op1
                || op2b == op2
                || op1b == op2b
                || (out_rec1 == out_rec2 && reverse1 == reverse2)
            {
                return false;
            }

            if reverse1 {
                let op1b = self.dup_out_pt(op1, false);
                let op2b = self.dup_out_pt(op2, true);
                self.op_mut(op1).prev = op2;
                self.op_mut(op2).next = op1;
                self.op_mut(op1b).next = op2b;
                self.op_mut(op2b).prev = op1b;
                j.out_pt1 = op1;
                j.out_pt2 = op1b;
                true
            } else {
                let op1b = self.dup_out_pt(op1, true);
                let op2b = self.dup_out_pt(op2, false);
                self.op_mut(op1).next = op2;
                self.op_mut(op2).prev = op1;
                self.op_mut(op1b).prev = op2b;
                self.op_mut(op2b).next = op1b;
                j.out_pt1 = op1;
                j.out_pt2 = op1b;
                true
            }
        }
    }

    /// Ray-crossing test of `pt` against an output ring; `1` inside, `0`
    /// outside, `-1` on the boundary.
    fn point_in_polygon_ring(&self, pt: Point, op_start: OutPtIdx) -> i32 {
        let mut result = 0;
        let mut op = op_start;
        let (ptx, pty) = (pt.x, pt.y);
        let mut poly0x = self.op(op).pt.x;
        let mut poly0y = self.op(op).pt.y;
        loop {
            op = self.op(op).next;
            let poly1x = self.op(op).pt.x;
            let poly1y = self.op(op).pt.y;

            if poly1y == pty
                && (poly1x == ptx || (poly0y == pty && ((poly1x > ptx) == (poly0x < ptx))))
            {
                return -1;
            }
            if (poly0y < pty) != (poly1y < pty) {
                if poly0x >= ptx {
                    if poly1x > ptx {
                        result = 1 - result;
                    } else {
                        let d = (poly0x - ptx) as f64 * (poly1y - pty) as f64
                            - (poly1x - ptx) as f64 * (poly0y - pty) as f64;
                        if d == 0.0 {
                            return -1;
                        }
                        if (d > 0.0) == (poly1y > poly0y) {
                            result = 1 - result;
                        }
                    }
                } else if poly1x > ptx {
                    let d = (poly0x - ptx) as f64 * (poly1y - pty) as f64
                        - (poly1x - ptx) as f64 * (poly0y - pty) as f64;
                    if d == 0.0 {
                        return -1;
                    }
                    if (d > 0.0) == (poly1y > poly0y) {
                        result = 1 - result;
                    }
                }
            }
            poly0x = poly1x;
            poly0y = poly1y;
            if op == op_start {
                break;
            }
        }
        result
    }

    /// Whether the ring at `out_pt1` lies inside the ring at `out_pt2`:
    /// the first point strictly in or out decides; all-boundary means
    /// contained.
    fn poly2_contains_poly1(&self, out_pt1: OutPtIdx, out_pt2: OutPtIdx) -> bool {
        let mut op = out_pt1;
        loop {
            let res = self.point_in_polygon_ring(self.op(op).pt, out_pt2);
            if res >= 0 {
                return res > 0;
            }
            op = self.op(op).next;
            if op == out_pt1 {
                break;
            }
        }
        true
    }

    fn parse_first_left(&self, mut first_left: Option<OutRecIdx>) -> Option<OutRecIdx> {
        while let Some(fl) = first_left {
            if self.out_recs[fl.0].pts.is_some() {
                break;
            }
            first_left = self.out_recs[fl.0].first_left;
        }
        first_left
    }

    /// After a split, rings that pointed at the old record as container may
    /// now belong inside the new fragment; the containment test decides.
    fn fixup_first_lefts1(&mut self, old_rec: OutRecIdx, new_rec: OutRecIdx) {
        for i in 0..self.out_recs.len() {
            let (pts, first_left) = (self.out_recs[i].pts, self.out_recs[i].first_left);
            let Some(pts) = pts else { continue };
            if first_left.is_none() {
                continue;
            }
            if self.parse_first_left(first_left) == Some(old_rec) {
                let new_pts = self.out_recs[new_rec.0].pts.expect("fragment has points");
                if self.poly2_contains_poly1(pts, new_pts) {
                    self.out_recs[i].first_left = Some(new_rec);
                }
            }
        }
    }

    fn fixup_first_lefts2(&mut self, old_rec: OutRecIdx, new_rec: OutRecIdx) {
        for i in 0..self.out_recs.len() {
            if self.out_recs[i].first_left == Some(old_rec) {
                self.out_recs[i].first_left = Some(new_rec);
            }
        }
    }

    /// Post-sweep pass stitching together the ring fragments recorded as
    /// joins: each successful splice either merges two records or splits
    /// one in two, and every sibling's `first_left` is repointed at
    /// whichever record actually contains it.
    pub(crate) fn join_common_edges(&mut self) {
        let joins = std::mem::take(&mut self.joins);
        debug!("resolving {} joins", joins.len());
        for join in &joins {
            let mut j = *join;
            let out_rec1 = self.get_out_rec(self.op(j.out_pt1).rec);
            let out_rec2 = self.get_out_rec(self.op(j.out_pt2).rec);

            if self.out_recs[out_rec1.0].pts.is_none() || self.out_recs[out_rec2.0].pts.is_none() {
                continue;
            }

            // the fragment with the correct hole state, before splicing
            let hole_state_rec = if out_rec1 == out_rec2 {
                out_rec1
            } else if self.param1_right_of_param2(out_rec1, out_rec2) {
                out_rec2
            } else if self.param1_right_of_param2(out_rec2, out_rec1) {
                out_rec1
            } else {
                self.get_lowermost_rec(out_rec1, out_rec2)
            };

            if !self.join_points(&mut j, out_rec1, out_rec2) {
                continue;
            }

            if out_rec1 == out_rec2 {
                // the splice created a new ring by splitting one in two
                self.out_recs[out_rec1.0].pts = Some(j.out_pt1);
                self.out_recs[out_rec1.0].bottom_pt = None;
                let out_rec2 = self.create_out_rec();
                self.out_recs[out_rec2.0].pts = Some(j.out_pt2);
                self.update_out_pt_idxs(out_rec2);

                // rings contained by the old record may now belong inside
                // the new fragment
                for i in 0..self.out_recs.len() - 1 {
                    let (pts, first_left, is_hole) = (
                        self.out_recs[i].pts,
                        self.out_recs[i].first_left,
                        self.out_recs[i].is_hole,
                    );
                    let Some(pts) = pts else { continue };
                    if self.parse_first_left(first_left) != Some(out_rec1)
                        || is_hole == self.out_recs[out_rec1.0].is_hole
                    {
                        continue;
                    }
                    if self.poly2_contains_poly1(pts, j.out_pt2) {
                        self.out_recs[i].first_left = Some(out_rec2);
                    }
                }

                let pts1 = self.out_recs[out_rec1.0].pts.expect("just spliced");
                let pts2 = self.out_recs[out_rec2.0].pts.expect("just spliced");
                if self.poly2_contains_poly1(pts2, pts1) {
                    // the new fragment is contained by the old
                    self.out_recs[out_rec2.0].is_hole = !self.out_recs[out_rec1.0].is_hole;
                    self.out_recs[out_rec2.0].first_left = Some(out_rec1);
                    self.fixup_first_lefts2(out_rec2, out_rec1);
                    if (self.out_recs[out_rec2.0].is_hole ^ self.options.reverse_solution)
                        == (self.out_rec_area(out_rec2) > 0.0)
                    {
                        self.reverse_poly_pt_links(pts2);
                    }
                } else if self.poly2_contains_poly1(pts1, pts2) {
                    // the old record is contained by the new fragment
                    self.out_recs[out_rec2.0].is_hole = self.out_recs[out_rec1.0].is_hole;
                    self.out_recs[out_rec1.0].is_hole = !self.out_recs[out_rec2.0].is_hole;
                    self.out_recs[out_rec2.0].first_left = self.out_recs[out_rec1.0].first_left;
                    self.out_recs[out_rec1.0].first_left = Some(out_rec2);
                    self.fixup_first_lefts2(out_rec1, out_rec2);
                    if (self.out_recs[out_rec1.0].is_hole ^ self.options.reverse_solution)
                        == (self.out_rec_area(out_rec1) > 0.0)
                    {
                        self.reverse_poly_pt_links(pts1);
                    }
                } else {
                    // the two fragments are completely separate
                    self.out_recs[out_rec2.0].is_hole = self.out_recs[out_rec1.0].is_hole;
                    self.out_recs[out_rec2.0].first_left = self.out_recs[out_rec1.0].first_left;
                    self.fixup_first_lefts1(out_rec1, out_rec2);
                }
            } else {
                // the splice joined two rings into one
                self.out_recs[out_rec2.0].pts = None;
                self.out_recs[out_rec2.0].bottom_pt = None;
                self.out_recs[out_rec2.0].owner = out_rec1;

                self.out_recs[out_rec1.0].is_hole = self.out_recs[hole_state_rec.0].is_hole;
                if hole_state_rec == out_rec2 {
                    self.out_recs[out_rec1.0].first_left = self.out_recs[out_rec2.0].first_left;
                }
                self.out_recs[out_rec2.0].first_left = Some(out_rec1);

                self.fixup_first_lefts2(out_rec2, out_rec1);
            }
        }
    }

    fn update_out_pt_idxs(&mut self, rec: OutRecIdx) {
        let start = self.out_recs[rec.0].pts.expect("ring has points");
        let mut op = start;
        loop {
            self.op_mut(op).rec = rec;
            op = self.op(op).prev;
            if op == start {
                break;
            }
        }
    }

    /// Final repair for strictly-simple output: any ring that revisits a
    /// point is split there, and the new fragment's hole state and parent
    /// are decided by containment.
    pub(crate) fn do_simple_polygons(&mut self) {
        let mut i = 0;
        while i < self.out_recs.len() {
            let rec = OutRecIdx(i);
            i += 1;
            let Some(mut op) = self.out_recs[rec.0].pts else {
                continue;
            };
            if self.out_recs[rec.0].is_open {
                continue;
            }
            loop {
                // for each point in the ring until a duplicate is found
                let mut op2 = self.op(op).next;
                while op2 != self.out_recs[rec.0].pts.expect("ring stays live") {
                    if self.op(op).pt == self.op(op2).pt
                        && self.op(op2).next != op
                        && self.op(op2).prev != op
                    {
                        // split the ring in two
                        let op3 = self.op(op).prev;
                        let op4 = self.op(op2).prev;
                        self.op_mut(op).prev = op4;
                        self.op_mut(op4).next = op;
                        self.op_mut(op2).prev = op3;
                        self.op_mut(op3).next = op2;

                        self.out_recs[rec.0].pts = Some(op);
                        let rec2 = self.create_out_rec();
                        self.out_recs[rec2.0].pts = Some(op2);
                        self.update_out_pt_idxs(rec2);
                        if self.poly2_contains_poly1(op2, op) {
                            // the new fragment is inside the old ring
                            self.out_recs[rec2.0].is_hole = !self.out_recs[rec.0].is_hole;
                            self.out_recs[rec2.0].first_left = Some(rec);
                            self.fixup_first_lefts2(rec2, rec);
                        } else if self.poly2_contains_poly1(op, op2) {
                            // the old ring is inside the new fragment
                            self.out_recs[rec2.0].is_hole = self.out_recs[rec.0].is_hole;
                            self.out_recs[rec.0].is_hole = !self.out_recs[rec2.0].is_hole;
                            self.out_recs[rec2.0].first_left = self.out_recs[rec.0].first_left;
                            self.out_recs[rec.0].first_left = Some(rec2);
                            self.fixup_first_lefts2(rec, rec2);
                        } else {
                            // the two rings are separate
                            self.out_recs[rec2.0].is_hole = self.out_recs[rec.0].is_hole;
                            self.out_recs[rec2.0].first_left = self.out_recs[rec.0].first_left;
                            self.fixup_first_lefts1(rec, rec2);
                        }
                        op2 = op; // ready for the next iteration
                    }
                    op2 = self.op(op2).next;
                }
                op = self.op(op).next;
                if op == self.out_recs[rec.0].pts.expect("ring stays live") {
                    break;
                }
            }
        }
    }

    fn point_count(&self, pts: OutPtIdx) -> usize {
        let mut result = 0;
        let mut p = pts;
        loop {
            result += 1;
            p = self.op(p).next;
            if p == pts {
                break;
            }
        }
        result
    }

    pub(crate) fn build_result(&self) -> Paths {
        let mut result = Paths::with_capacity(self.out_recs.len());
        for rec in &self.out_recs {
            let Some(pts) = rec.pts else { continue };
            let mut p = self.op(pts).prev;
            let cnt = self.point_count(p);
            if cnt < 2 {
                continue;
            }
            let mut path = Path::with_capacity(cnt);
            for _ in 0..cnt {
                path.push(self.op(p).pt);
                p = self.op(p).prev;
            }
            result.push(path);
        }
        result
    }

    /// Walks a stale `first_left` to the nearest ancestor that is a live
    /// ring of the opposite hole state.
    fn fix_hole_linkage(&mut self, rec: OutRecIdx) {
        // skip outermost polygons and records already pointing at the
        // correct container
        let Some(fl) = self.out_recs[rec.0].first_left else {
            return;
        };
        if self.out_recs[rec.0].is_hole != self.out_recs[fl.0].is_hole
            && self.out_recs[fl.0].pts.is_some()
        {
            return;
        }
        let mut orfl = Some(fl);
        while let Some(f) = orfl {
            if self.out_recs[f.0].is_hole != self.out_recs[rec.0].is_hole
                && self.out_recs[f.0].pts.is_some()
            {
                break;
            }
            orfl = self.out_recs[f.0].first_left;
        }
        self.out_recs[rec.0].first_left = orfl;
    }

    pub(crate) fn build_result_tree(&mut self) -> PolyTree {
        let mut tree = PolyTree::default();

        // materialize one node per surviving ring
        for i in 0..self.out_recs.len() {
            let rec = OutRecIdx(i);
            let Some(pts) = self.out_recs[i].pts else {
                continue;
            };
            let cnt = self.point_count(pts);
            let is_open = self.out_recs[i].is_open;
            if (is_open && cnt < 2) || (!is_open && cnt < 3) {
                continue;
            }
            self.fix_hole_linkage(rec);
            let mut contour = Path::with_capacity(cnt);
            let mut op = self.op(pts).prev;
            for _ in 0..cnt {
                contour.push(self.op(op).pt);
                op = self.op(op).prev;
            }
            let node = tree.push_node(PolyNode::new(contour, is_open));
            self.out_recs[i].node = Some(node);
        }

        // then wire up the nesting
        for i in 0..self.out_recs.len() {
            let Some(node) = self.out_recs[i].node else {
                continue;
            };
            if self.out_recs[i].is_open {
                tree.add_top_level_child(node);
            } else if let Some(parent_node) = self.out_recs[i]
                .first_left
                .and_then(|fl| self.out_recs[fl.0].node)
            {
                tree.add_child(parent_node, node);
            } else {
                tree.add_top_level_child(node);
            }
        }
        tree
    }
}
