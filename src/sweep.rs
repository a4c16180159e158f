use std::collections::BinaryHeap;

use log::{debug, trace};

use crate::edge::{Edge, EdgeIdx, LocalMinima, OutTag, Side};
use crate::error::{Error, Result};
use crate::geom::{delta_slopes_equal, Paths, Point};
use crate::output::{GhostJoin, Join, OutPt, OutPtIdx, OutRec};
use crate::polytree::PolyTree;
use crate::{ClipOp, FillRule, Options, PolyType};

/// Which way a horizontal edge is walked.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Direction {
    LeftToRight,
    RightToLeft,
}

/// A pair of edges that cross within the current scanbeam, with their
/// intersection point. Transient; consumed within the scanbeam.
#[derive(Clone, Copy, Debug)]
struct IntersectNode {
    edge1: EdgeIdx,
    edge2: EdgeIdx,
    pt: Point,
}

/// The polygon clipping engine.
///
/// Paths accumulate in the edge table via [`Clipper::add_path`] until
/// [`Clipper::clear`]; each [`Clipper::execute`] runs one sweep over them
/// and leaves the table ready for another run. All sweep state is rebuilt
/// per call, so a failed execute leaves no residue.
pub struct Clipper {
    pub(crate) edges: Vec<Edge>,
    pub(crate) minima: Vec<LocalMinima>,
    pub(crate) current_lm: usize,
    pub(crate) use_full_range: bool,
    pub(crate) has_open_paths: bool,
    pub(crate) options: Options,

    // sweep state, rebuilt by every execute
    scanbeam: BinaryHeap<i64>,
    pub(crate) active_edges: Option<EdgeIdx>,
    pub(crate) sorted_edges: Option<EdgeIdx>,
    intersect_list: Vec<IntersectNode>,
    pub(crate) out_pts: Vec<OutPt>,
    pub(crate) out_recs: Vec<OutRec>,
    pub(crate) joins: Vec<Join>,
    pub(crate) ghost_joins: Vec<GhostJoin>,
    pub(crate) clip_type: ClipOp,
    pub(crate) subj_fill: FillRule,
    pub(crate) clip_fill: FillRule,
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

pub(crate) fn round(v: f64) -> i64 {
    if v < 0.0 {
        (v - 0.5) as i64
    } else {
        (v + 0.5) as i64
    }
}

fn horz_segments_overlap(mut seg1a: i64, mut seg1b: i64, mut seg2a: i64, mut seg2b: i64) -> bool {
    if seg1a > seg1b {
        std::mem::swap(&mut seg1a, &mut seg1b);
    }
    if seg2a > seg2b {
        std::mem::swap(&mut seg2a, &mut seg2b);
    }
    seg1a < seg2b && seg2a < seg1b
}

impl Clipper {
    pub fn new(options: Options) -> Self {
        Clipper {
            edges: Vec::new(),
            minima: Vec::new(),
            current_lm: 0,
            use_full_range: false,
            has_open_paths: false,
            options,
            scanbeam: BinaryHeap::new(),
            active_edges: None,
            sorted_edges: None,
            intersect_list: Vec::new(),
            out_pts: Vec::new(),
            out_recs: Vec::new(),
            joins: Vec::new(),
            ghost_joins: Vec::new(),
            clip_type: ClipOp::Intersection,
            subj_fill: FillRule::EvenOdd,
            clip_fill: FillRule::EvenOdd,
        }
    }

    /// Runs the clip and returns the result as a flat path list.
    ///
    /// Fails with [`Error::TreeRequired`] when open paths were added; open
    /// contours can only be represented by [`Clipper::execute_tree`].
    pub fn execute(
        &mut self,
        clip_type: ClipOp,
        subj_fill: FillRule,
        clip_fill: FillRule,
    ) -> Result<Paths> {
        if self.has_open_paths {
            return Err(Error::TreeRequired);
        }
        self.clip_type = clip_type;
        self.subj_fill = subj_fill;
        self.clip_fill = clip_fill;
        let res = self.execute_internal();
        self.joins.clear();
        self.ghost_joins.clear();
        let out = match res {
            Ok(true) => Ok(self.build_result()),
            Ok(false) => Ok(Paths::new()),
            Err(e) => Err(e),
        };
        self.dispose_output();
        out
    }

    /// Runs the clip and returns the result as a polygon tree, expressing
    /// hole/island nesting explicitly. Open contours appear as open nodes.
    pub fn execute_tree(
        &mut self,
        clip_type: ClipOp,
        subj_fill: FillRule,
        clip_fill: FillRule,
    ) -> Result<PolyTree> {
        self.clip_type = clip_type;
        self.subj_fill = subj_fill;
        self.clip_fill = clip_fill;
        let res = self.execute_internal();
        self.joins.clear();
        self.ghost_joins.clear();
        let out = match res {
            Ok(true) => Ok(self.build_result_tree()),
            Ok(false) => Ok(PolyTree::default()),
            Err(e) => Err(e),
        };
        self.dispose_output();
        out
    }

    fn dispose_output(&mut self) {
        self.out_pts.clear();
        self.out_recs.clear();
        self.intersect_list.clear();
        self.active_edges = None;
        self.sorted_edges = None;
        self.scanbeam.clear();
    }

    fn execute_internal(&mut self) -> Result<bool> {
        self.reset();
        if self.minima.is_empty() {
            return Ok(false);
        }

        let mut bot_y = match self.pop_scanbeam() {
            Some(y) => y,
            None => return Ok(false),
        };
        loop {
            trace!("scanbeam bottom at y={bot_y}");
            self.insert_local_minima_into_ael(bot_y);
            self.ghost_joins.clear();
            self.process_horizontals(false)?;
            let top_y = match self.pop_scanbeam() {
                Some(y) => y,
                None => break,
            };
            self.process_intersections(top_y)?;
            self.process_edges_at_top_of_scanbeam(top_y)?;
            bot_y = top_y;
            if self.scanbeam.is_empty() && self.current_lm >= self.minima.len() {
                break;
            }
        }

        // Fix orientations.
        for idx in 0..self.out_recs.len() {
            let rec = &self.out_recs[idx];
            let pts = match rec.pts {
                Some(p) if !rec.is_open => p,
                _ => continue,
            };
            if (rec.is_hole ^ self.options.reverse_solution)
                == (self.out_rec_area(crate::output::OutRecIdx(idx)) > 0.0)
            {
                self.reverse_poly_pt_links(pts);
            }
        }

        self.join_common_edges();

        for idx in 0..self.out_recs.len() {
            let rec = &self.out_recs[idx];
            if rec.pts.is_some() && !rec.is_open {
                self.fixup_out_polygon(crate::output::OutRecIdx(idx));
            }
        }

        if self.options.strictly_simple {
            self.do_simple_polygons();
        }
        debug!("sweep complete: {} output records", self.out_recs.len());
        Ok(true)
    }

    pub(crate) fn reset(&mut self) {
        self.current_lm = 0;
        self.scanbeam.clear();
        self.active_edges = None;
        self.sorted_edges = None;
        for i in 0..self.minima.len() {
            let lm = self.minima[i];
            self.scanbeam.push(lm.y);
            if let Some(e) = lm.left_bound {
                let bot = self.edge(e).bot;
                let edge = self.edge_mut(e);
                edge.curr = bot;
                edge.side = Side::Left;
                edge.out = OutTag::Unassigned;
            }
            if let Some(e) = lm.right_bound {
                let bot = self.edge(e).bot;
                let edge = self.edge_mut(e);
                edge.curr = bot;
                edge.side = Side::Right;
                edge.out = OutTag::Unassigned;
            }
        }
    }

    fn insert_scanbeam(&mut self, y: i64) {
        self.scanbeam.push(y);
    }

    /// Lowest available scanbeam, largest `y` first; duplicates collapse.
    fn pop_scanbeam(&mut self) -> Option<i64> {
        let y = self.scanbeam.pop()?;
        while self.scanbeam.peek() == Some(&y) {
            self.scanbeam.pop();
        }
        Some(y)
    }

    pub(crate) fn slopes_equal_edges(&self, e1: EdgeIdx, e2: EdgeIdx) -> bool {
        delta_slopes_equal(self.edge(e1).delta, self.edge(e2).delta, self.use_full_range)
    }

    pub(crate) fn top_x(&self, e: EdgeIdx, current_y: i64) -> i64 {
        let edge = self.edge(e);
        if current_y == edge.top.y {
            return edge.top.x;
        }
        edge.bot.x + round(edge.dx * (current_y - edge.bot.y) as f64)
    }

    fn insert_local_minima_into_ael(&mut self, bot_y: i64) {
        while self.current_lm < self.minima.len() && self.minima[self.current_lm].y == bot_y {
            let lm = self.minima[self.current_lm];
            self.current_lm += 1;
            let (lb, rb) = (lm.left_bound, lm.right_bound);

            let mut op1: Option<OutPtIdx> = None;
            match (lb, rb) {
                (None, Some(rb)) => {
                    self.insert_edge_into_ael(rb, None);
                    self.set_winding_count(rb);
                    if self.is_contributing(rb) {
                        let bot = self.edge(rb).bot;
                        op1 = Some(self.add_out_pt(rb, bot));
                    }
                }
                (Some(lb), None) => {
                    self.insert_edge_into_ael(lb, None);
                    self.set_winding_count(lb);
                    if self.is_contributing(lb) {
                        let bot = self.edge(lb).bot;
                        op1 = Some(self.add_out_pt(lb, bot));
                    }
                    let top_y = self.edge(lb).top.y;
                    self.insert_scanbeam(top_y);
                }
                (Some(lb), Some(rb)) => {
                    self.insert_edge_into_ael(lb, None);
                    self.insert_edge_into_ael(rb, Some(lb));
                    self.set_winding_count(lb);
                    self.edge_mut(rb).wind_cnt = self.edge(lb).wind_cnt;
                    self.edge_mut(rb).wind_cnt2 = self.edge(lb).wind_cnt2;
                    if self.is_contributing(lb) {
                        let bot = self.edge(lb).bot;
                        op1 = Some(self.add_local_min_poly(lb, rb, bot));
                    }
                    let top_y = self.edge(lb).top.y;
                    self.insert_scanbeam(top_y);
                }
                (None, None) => continue,
            }

            if let Some(rb) = rb {
                if self.edge(rb).is_horizontal() {
                    self.add_edge_to_sel(rb);
                } else {
                    let top_y = self.edge(rb).top.y;
                    self.insert_scanbeam(top_y);
                }
            }

            let (lb, rb) = match (lb, rb) {
                (Some(lb), Some(rb)) => (lb, rb),
                _ => continue,
            };

            // Output polygons sharing an edge with a horizontal right bound
            // will need joining later.
            if let Some(op1) = op1 {
                if self.edge(rb).is_horizontal()
                    && !self.ghost_joins.is_empty()
                    && self.edge(rb).wind_delta != 0
                {
                    for j in 0..self.ghost_joins.len() {
                        let gj = self.ghost_joins[j];
                        let gj_x = self.out_pts[gj.out_pt.0].pt.x;
                        if horz_segments_overlap(
                            gj_x,
                            gj.off_pt.x,
                            self.edge(rb).bot.x,
                            self.edge(rb).top.x,
                        ) {
                            self.add_join(gj.out_pt, op1, gj.off_pt);
                        }
                    }
                }
            }

            if let Some(op1v) = op1 {
                if let Some(prev) = self.edge(lb).prev_in_ael {
                    if self.edge(lb).out.is_assigned()
                        && self.edge(prev).curr.x == self.edge(lb).bot.x
                        && self.edge(prev).out.is_assigned()
                        && self.slopes_equal_edges(prev, lb)
                        && self.edge(lb).wind_delta != 0
                        && self.edge(prev).wind_delta != 0
                    {
                        let bot = self.edge(lb).bot;
                        let op2 = self.add_out_pt(prev, bot);
                        let top = self.edge(lb).top;
                        self.add_join(op1v, op2, top);
                    }
                }
            }

            if self.edge(lb).next_in_ael != Some(rb) {
                if let (Some(op1v), Some(prev)) = (op1, self.edge(rb).prev_in_ael) {
                    if self.edge(rb).out.is_assigned()
                        && self.edge(prev).out.is_assigned()
                        && self.slopes_equal_edges(prev, rb)
                        && self.edge(rb).wind_delta != 0
                        && self.edge(prev).wind_delta != 0
                    {
                        let bot = self.edge(rb).bot;
                        let op2 = self.add_out_pt(prev, bot);
                        let top = self.edge(rb).top;
                        self.add_join(op1v, op2, top);
                    }
                }

                // nb: intersect_edges assumes its first edge is to the right
                // of its second above the intersection.
                let mut e = self.edge(lb).next_in_ael;
                while let Some(ei) = e {
                    if ei == rb {
                        break;
                    }
                    let pt = self.edge(lb).curr;
                    self.intersect_edges(rb, ei, pt);
                    e = self.edge(ei).next_in_ael;
                }
            }
        }
    }

    fn insert_edge_into_ael(&mut self, edge: EdgeIdx, start_edge: Option<EdgeIdx>) {
        match self.active_edges {
            None => {
                self.edge_mut(edge).prev_in_ael = None;
                self.edge_mut(edge).next_in_ael = None;
                self.active_edges = Some(edge);
            }
            Some(head) if start_edge.is_none() && self.e2_inserts_before_e1(head, edge) => {
                self.edge_mut(edge).prev_in_ael = None;
                self.edge_mut(edge).next_in_ael = Some(head);
                self.edge_mut(head).prev_in_ael = Some(edge);
                self.active_edges = Some(edge);
            }
            Some(head) => {
                let mut start = start_edge.unwrap_or(head);
                while let Some(next) = self.edge(start).next_in_ael {
                    if self.e2_inserts_before_e1(next, edge) {
                        break;
                    }
                    start = next;
                }
                let next = self.edge(start).next_in_ael;
                self.edge_mut(edge).next_in_ael = next;
                if let Some(n) = next {
                    self.edge_mut(n).prev_in_ael = Some(edge);
                }
                self.edge_mut(edge).prev_in_ael = Some(start);
                self.edge_mut(start).next_in_ael = Some(edge);
            }
        }
    }

    fn e2_inserts_before_e1(&self, e1: EdgeIdx, e2: EdgeIdx) -> bool {
        let a = self.edge(e1);
        let b = self.edge(e2);
        if b.curr.x == a.curr.x {
            // Break the tie by projecting to the higher of the two tops.
            if b.top.y > a.top.y {
                b.top.x < self.top_x(e1, b.top.y)
            } else {
                a.top.x > self.top_x(e2, a.top.y)
            }
        } else {
            b.curr.x < a.curr.x
        }
    }

    fn is_even_odd_fill_type(&self, edge: EdgeIdx) -> bool {
        match self.edge(edge).poly_type {
            PolyType::Subject => self.subj_fill == FillRule::EvenOdd,
            PolyType::Clip => self.clip_fill == FillRule::EvenOdd,
        }
    }

    fn is_even_odd_alt_fill_type(&self, edge: EdgeIdx) -> bool {
        match self.edge(edge).poly_type {
            PolyType::Subject => self.clip_fill == FillRule::EvenOdd,
            PolyType::Clip => self.subj_fill == FillRule::EvenOdd,
        }
    }

    /// Whether an edge just arriving in the AEL belongs to the output under
    /// the active fill rules and clip operation.
    fn is_contributing(&self, edge: EdgeIdx) -> bool {
        let e = self.edge(edge);
        let (pft, pft2) = match e.poly_type {
            PolyType::Subject => (self.subj_fill, self.clip_fill),
            PolyType::Clip => (self.clip_fill, self.subj_fill),
        };

        match pft {
            FillRule::EvenOdd => {
                // an open line flagged as inside its own polygon never
                // contributes
                if e.wind_delta == 0 && e.wind_cnt != 1 {
                    return false;
                }
            }
            FillRule::NonZero => {
                if e.wind_cnt.abs() != 1 {
                    return false;
                }
            }
            FillRule::Positive => {
                if e.wind_cnt != 1 {
                    return false;
                }
            }
            FillRule::Negative => {
                if e.wind_cnt != -1 {
                    return false;
                }
            }
        }

        match self.clip_type {
            ClipOp::Intersection => match pft2 {
                FillRule::EvenOdd | FillRule::NonZero => e.wind_cnt2 != 0,
                FillRule::Positive => e.wind_cnt2 > 0,
                FillRule::Negative => e.wind_cnt2 < 0,
            },
            ClipOp::Union => match pft2 {
                FillRule::EvenOdd | FillRule::NonZero => e.wind_cnt2 == 0,
                FillRule::Positive => e.wind_cnt2 <= 0,
                FillRule::Negative => e.wind_cnt2 >= 0,
            },
            ClipOp::Difference => {
                if e.poly_type == PolyType::Subject {
                    match pft2 {
                        FillRule::EvenOdd | FillRule::NonZero => e.wind_cnt2 == 0,
                        FillRule::Positive => e.wind_cnt2 <= 0,
                        FillRule::Negative => e.wind_cnt2 >= 0,
                    }
                } else {
                    match pft2 {
                        FillRule::EvenOdd | FillRule::NonZero => e.wind_cnt2 != 0,
                        FillRule::Positive => e.wind_cnt2 > 0,
                        FillRule::Negative => e.wind_cnt2 < 0,
                    }
                }
            }
            ClipOp::Xor => {
                if e.wind_delta == 0 {
                    // xor always contributes unless the edge is open
                    match pft2 {
                        FillRule::EvenOdd | FillRule::NonZero => e.wind_cnt2 == 0,
                        FillRule::Positive => e.wind_cnt2 <= 0,
                        FillRule::Negative => e.wind_cnt2 >= 0,
                    }
                } else {
                    true
                }
            }
        }
    }

    fn set_winding_count(&mut self, edge: EdgeIdx) {
        // the edge of the same polytype that immediately precedes this one
        let mut prev = self.edge(edge).prev_in_ael;
        while let Some(p) = prev {
            if self.edge(p).poly_type == self.edge(edge).poly_type && self.edge(p).wind_delta != 0 {
                break;
            }
            prev = self.edge(p).prev_in_ael;
        }

        let mut iter: Option<EdgeIdx>;
        match prev {
            None => {
                let wd = self.edge(edge).wind_delta;
                self.edge_mut(edge).wind_cnt = if wd == 0 { 1 } else { wd };
                self.edge_mut(edge).wind_cnt2 = 0;
                iter = self.active_edges;
            }
            Some(p) if self.edge(edge).wind_delta == 0 && self.clip_type != ClipOp::Union => {
                self.edge_mut(edge).wind_cnt = 1;
                self.edge_mut(edge).wind_cnt2 = self.edge(p).wind_cnt2;
                iter = self.edge(p).next_in_ael;
            }
            Some(p) if self.is_even_odd_fill_type(edge) => {
                if self.edge(edge).wind_delta == 0 {
                    // is the open edge inside a polygon of its own type?
                    let mut inside = true;
                    let mut e2 = self.edge(p).prev_in_ael;
                    while let Some(i2) = e2 {
                        if self.edge(i2).poly_type == self.edge(p).poly_type
                            && self.edge(i2).wind_delta != 0
                        {
                            inside = !inside;
                        }
                        e2 = self.edge(i2).prev_in_ael;
                    }
                    self.edge_mut(edge).wind_cnt = if inside { 0 } else { 1 };
                } else {
                    let wd = self.edge(edge).wind_delta;
                    self.edge_mut(edge).wind_cnt = wd;
                }
                self.edge_mut(edge).wind_cnt2 = self.edge(p).wind_cnt2;
                iter = self.edge(p).next_in_ael;
            }
            Some(p) => {
                // nonzero, positive or negative filling
                let prev_cnt = self.edge(p).wind_cnt;
                let prev_delta = self.edge(p).wind_delta;
                let own_delta = self.edge(edge).wind_delta;
                let cnt = if prev_cnt * prev_delta < 0 {
                    // the previous edge is winding down toward zero, so we
                    // are outside the previous polygon
                    if prev_cnt.abs() > 1 {
                        // outside it, but still inside another; keep the
                        // same count when the wind direction reverses
                        if prev_delta * own_delta < 0 {
                            prev_cnt
                        } else {
                            prev_cnt + own_delta
                        }
                    } else if own_delta == 0 {
                        1
                    } else {
                        own_delta
                    }
                } else {
                    // the previous edge is winding away from zero, so we are
                    // inside the previous polygon
                    if own_delta == 0 {
                        if prev_cnt < 0 {
                            prev_cnt - 1
                        } else {
                            prev_cnt + 1
                        }
                    } else if prev_delta * own_delta < 0 {
                        prev_cnt
                    } else {
                        prev_cnt + own_delta
                    }
                };
                self.edge_mut(edge).wind_cnt = cnt;
                self.edge_mut(edge).wind_cnt2 = self.edge(p).wind_cnt2;
                iter = self.edge(p).next_in_ael;
            }
        }

        // accumulate the opposite polytype's winding count over the edges
        // between the found neighbour and this edge
        if self.is_even_odd_alt_fill_type(edge) {
            while let Some(i) = iter {
                if i == edge {
                    break;
                }
                if self.edge(i).wind_delta != 0 {
                    let flipped = if self.edge(edge).wind_cnt2 == 0 { 1 } else { 0 };
                    self.edge_mut(edge).wind_cnt2 = flipped;
                }
                iter = self.edge(i).next_in_ael;
            }
        } else {
            while let Some(i) = iter {
                if i == edge {
                    break;
                }
                let wd = self.edge(i).wind_delta;
                self.edge_mut(edge).wind_cnt2 += wd;
                iter = self.edge(i).next_in_ael;
            }
        }
    }

    pub(crate) fn add_edge_to_sel(&mut self, edge: EdgeIdx) {
        // SEL links double as the horizontal-edge queue; order is
        // irrelevant for horizontals.
        match self.sorted_edges {
            None => {
                self.sorted_edges = Some(edge);
                self.edge_mut(edge).prev_in_sel = None;
                self.edge_mut(edge).next_in_sel = None;
            }
            Some(head) => {
                self.edge_mut(edge).next_in_sel = Some(head);
                self.edge_mut(edge).prev_in_sel = None;
                self.edge_mut(head).prev_in_sel = Some(edge);
                self.sorted_edges = Some(edge);
            }
        }
    }

    fn copy_ael_to_sel(&mut self) {
        self.sorted_edges = self.active_edges;
        let mut e = self.active_edges;
        while let Some(i) = e {
            let prev = self.edge(i).prev_in_ael;
            let next = self.edge(i).next_in_ael;
            self.edge_mut(i).prev_in_sel = prev;
            self.edge_mut(i).next_in_sel = next;
            e = next;
        }
    }

    pub(crate) fn swap_positions_in_ael(&mut self, edge1: EdgeIdx, edge2: EdgeIdx) {
        // ignore edges already removed from the AEL
        if self.edge(edge1).next_in_ael == self.edge(edge1).prev_in_ael
            || self.edge(edge2).next_in_ael == self.edge(edge2).prev_in_ael
        {
            return;
        }

        if self.edge(edge1).next_in_ael == Some(edge2) {
            let next = self.edge(edge2).next_in_ael;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_ael = Some(edge1);
            }
            let prev = self.edge(edge1).prev_in_ael;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_ael = Some(edge2);
            }
            self.edge_mut(edge2).prev_in_ael = prev;
            self.edge_mut(edge2).next_in_ael = Some(edge1);
            self.edge_mut(edge1).prev_in_ael = Some(edge2);
            self.edge_mut(edge1).next_in_ael = next;
        } else if self.edge(edge2).next_in_ael == Some(edge1) {
            let next = self.edge(edge1).next_in_ael;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_ael = Some(edge2);
            }
            let prev = self.edge(edge2).prev_in_ael;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_ael = Some(edge1);
            }
            self.edge_mut(edge1).prev_in_ael = prev;
            self.edge_mut(edge1).next_in_ael = Some(edge2);
            self.edge_mut(edge2).prev_in_ael = Some(edge1);
            self.edge_mut(edge2).next_in_ael = next;
        } else {
            let next = self.edge(edge1).next_in_ael;
            let prev = self.edge(edge1).prev_in_ael;
            let next2 = self.edge(edge2).next_in_ael;
            let prev2 = self.edge(edge2).prev_in_ael;
            self.edge_mut(edge1).next_in_ael = next2;
            if let Some(n) = next2 {
                self.edge_mut(n).prev_in_ael = Some(edge1);
            }
            self.edge_mut(edge1).prev_in_ael = prev2;
            if let Some(p) = prev2 {
                self.edge_mut(p).next_in_ael = Some(edge1);
            }
            self.edge_mut(edge2).next_in_ael = next;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_ael = Some(edge2);
            }
            self.edge_mut(edge2).prev_in_ael = prev;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_ael = Some(edge2);
            }
        }

        if self.edge(edge1).prev_in_ael.is_none() {
            self.active_edges = Some(edge1);
        } else if self.edge(edge2).prev_in_ael.is_none() {
            self.active_edges = Some(edge2);
        }
    }

    fn swap_positions_in_sel(&mut self, edge1: EdgeIdx, edge2: EdgeIdx) {
        if self.edge(edge1).next_in_sel.is_none() && self.edge(edge1).prev_in_sel.is_none() {
            return;
        }
        if self.edge(edge2).next_in_sel.is_none() && self.edge(edge2).prev_in_sel.is_none() {
            return;
        }

        if self.edge(edge1).next_in_sel == Some(edge2) {
            let next = self.edge(edge2).next_in_sel;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_sel = Some(edge1);
            }
            let prev = self.edge(edge1).prev_in_sel;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_sel = Some(edge2);
            }
            self.edge_mut(edge2).prev_in_sel = prev;
            self.edge_mut(edge2).next_in_sel = Some(edge1);
            self.edge_mut(edge1).prev_in_sel = Some(edge2);
            self.edge_mut(edge1).next_in_sel = next;
        } else if self.edge(edge2).next_in_sel == Some(edge1) {
            let next = self.edge(edge1).next_in_sel;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_sel = Some(edge2);
            }
            let prev = self.edge(edge2).prev_in_sel;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_sel = Some(edge1);
            }
            self.edge_mut(edge1).prev_in_sel = prev;
            self.edge_mut(edge1).next_in_sel = Some(edge2);
            self.edge_mut(edge2).prev_in_sel = Some(edge1);
            self.edge_mut(edge2).next_in_sel = next;
        } else {
            let next = self.edge(edge1).next_in_sel;
            let prev = self.edge(edge1).prev_in_sel;
            let next2 = self.edge(edge2).next_in_sel;
            let prev2 = self.edge(edge2).prev_in_sel;
            self.edge_mut(edge1).next_in_sel = next2;
            if let Some(n) = next2 {
                self.edge_mut(n).prev_in_sel = Some(edge1);
            }
            self.edge_mut(edge1).prev_in_sel = prev2;
            if let Some(p) = prev2 {
                self.edge_mut(p).next_in_sel = Some(edge1);
            }
            self.edge_mut(edge2).next_in_sel = next;
            if let Some(n) = next {
                self.edge_mut(n).prev_in_sel = Some(edge2);
            }
            self.edge_mut(edge2).prev_in_sel = prev;
            if let Some(p) = prev {
                self.edge_mut(p).next_in_sel = Some(edge2);
            }
        }

        if self.edge(edge1).prev_in_sel.is_none() {
            self.sorted_edges = Some(edge1);
        } else if self.edge(edge2).prev_in_sel.is_none() {
            self.sorted_edges = Some(edge2);
        }
    }

    pub(crate) fn swap_sides(&mut self, edge1: EdgeIdx, edge2: EdgeIdx) {
        let side = self.edge(edge1).side;
        self.edge_mut(edge1).side = self.edge(edge2).side;
        self.edge_mut(edge2).side = side;
    }

    pub(crate) fn swap_poly_indexes(&mut self, edge1: EdgeIdx, edge2: EdgeIdx) {
        let out = self.edge(edge1).out;
        self.edge_mut(edge1).out = self.edge(edge2).out;
        self.edge_mut(edge2).out = out;
    }

    /// Handles two edges meeting at `pt`. `e1` must be to the left of `e2`
    /// below the intersection (so to its right above it).
    pub(crate) fn intersect_edges(&mut self, e1: EdgeIdx, e2: EdgeIdx, pt: Point) {
        let e1_contributing = self.edge(e1).out.is_assigned();
        let e2_contributing = self.edge(e2).out.is_assigned();

        // open path edges
        if self.edge(e1).wind_delta == 0 || self.edge(e2).wind_delta == 0 {
            // line-line intersections never produce output
            if self.edge(e1).wind_delta == 0 && self.edge(e2).wind_delta == 0 {
                return;
            }
            if self.edge(e1).poly_type == self.edge(e2).poly_type
                && self.edge(e1).wind_delta != self.edge(e2).wind_delta
                && self.clip_type == ClipOp::Union
            {
                if self.edge(e1).wind_delta == 0 {
                    if e2_contributing {
                        self.add_out_pt(e1, pt);
                        if e1_contributing {
                            self.edge_mut(e1).out = OutTag::Unassigned;
                        }
                    }
                } else if e1_contributing {
                    self.add_out_pt(e2, pt);
                    if e2_contributing {
                        self.edge_mut(e2).out = OutTag::Unassigned;
                    }
                }
            } else if self.edge(e1).poly_type != self.edge(e2).poly_type {
                if self.edge(e1).wind_delta == 0
                    && self.edge(e2).wind_cnt.abs() == 1
                    && (self.clip_type != ClipOp::Union || self.edge(e2).wind_cnt2 == 0)
                {
                    self.add_out_pt(e1, pt);
                    if e1_contributing {
                        self.edge_mut(e1).out = OutTag::Unassigned;
                    }
                } else if self.edge(e2).wind_delta == 0
                    && self.edge(e1).wind_cnt.abs() == 1
                    && (self.clip_type != ClipOp::Union || self.edge(e1).wind_cnt2 == 0)
                {
                    self.add_out_pt(e2, pt);
                    if e2_contributing {
                        self.edge_mut(e2).out = OutTag::Unassigned;
                    }
                }
            }
            return;
        }

        // update winding counts; e1 is to the right of e2 above the
        // intersection
        if self.edge(e1).poly_type == self.edge(e2).poly_type {
            if self.is_even_odd_fill_type(e1) {
                let old = self.edge(e1).wind_cnt;
                self.edge_mut(e1).wind_cnt = self.edge(e2).wind_cnt;
                self.edge_mut(e2).wind_cnt = old;
            } else {
                let w1 = self.edge(e1).wind_cnt;
                let w2 = self.edge(e2).wind_cnt;
                let d1 = self.edge(e1).wind_delta;
                let d2 = self.edge(e2).wind_delta;
                self.edge_mut(e1).wind_cnt = if w1 + d2 == 0 { -w1 } else { w1 + d2 };
                self.edge_mut(e2).wind_cnt = if w2 - d1 == 0 { -w2 } else { w2 - d1 };
            }
        } else {
            if !self.is_even_odd_fill_type(e2) {
                let d2 = self.edge(e2).wind_delta;
                self.edge_mut(e1).wind_cnt2 += d2;
            } else {
                let flipped = if self.edge(e1).wind_cnt2 == 0 { 1 } else { 0 };
                self.edge_mut(e1).wind_cnt2 = flipped;
            }
            if !self.is_even_odd_fill_type(e1) {
                let d1 = self.edge(e1).wind_delta;
                self.edge_mut(e2).wind_cnt2 -= d1;
            } else {
                let flipped = if self.edge(e2).wind_cnt2 == 0 { 1 } else { 0 };
                self.edge_mut(e2).wind_cnt2 = flipped;
            }
        }

        let (e1_fill, e1_fill2) = match self.edge(e1).poly_type {
            PolyType::Subject => (self.subj_fill, self.clip_fill),
            PolyType::Clip => (self.clip_fill, self.subj_fill),
        };
        let (e2_fill, e2_fill2) = match self.edge(e2).poly_type {
            PolyType::Subject => (self.subj_fill, self.clip_fill),
            PolyType::Clip => (self.clip_fill, self.subj_fill),
        };

        let e1_wc = match e1_fill {
            FillRule::Positive => self.edge(e1).wind_cnt,
            FillRule::Negative => -self.edge(e1).wind_cnt,
            _ => self.edge(e1).wind_cnt.abs(),
        };
        let e2_wc = match e2_fill {
            FillRule::Positive => self.edge(e2).wind_cnt,
            FillRule::Negative => -self.edge(e2).wind_cnt,
            _ => self.edge(e2).wind_cnt.abs(),
        };

        if e1_contributing && e2_contributing {
            if (e1_wc != 0 && e1_wc != 1)
                || (e2_wc != 0 && e2_wc != 1)
                || (self.edge(e1).poly_type != self.edge(e2).poly_type
                    && self.clip_type != ClipOp::Xor)
            {
                self.add_local_max_poly(e1, e2, pt);
            } else {
                self.add_out_pt(e1, pt);
                self.add_out_pt(e2, pt);
                self.swap_sides(e1, e2);
                self.swap_poly_indexes(e1, e2);
            }
        } else if e1_contributing {
            if e2_wc == 0 || e2_wc == 1 {
                self.add_out_pt(e1, pt);
                self.swap_sides(e1, e2);
                self.swap_poly_indexes(e1, e2);
            }
        } else if e2_contributing {
            if e1_wc == 0 || e1_wc == 1 {
                self.add_out_pt(e2, pt);
                self.swap_sides(e1, e2);
                self.swap_poly_indexes(e1, e2);
            }
        } else if (e1_wc == 0 || e1_wc == 1) && (e2_wc == 0 || e2_wc == 1) {
            // neither edge is currently contributing
            let e1_wc2 = match e1_fill2 {
                FillRule::Positive => self.edge(e1).wind_cnt2,
                FillRule::Negative => -self.edge(e1).wind_cnt2,
                _ => self.edge(e1).wind_cnt2.abs(),
            };
            let e2_wc2 = match e2_fill2 {
                FillRule::Positive => self.edge(e2).wind_cnt2,
                FillRule::Negative => -self.edge(e2).wind_cnt2,
                _ => self.edge(e2).wind_cnt2.abs(),
            };

            if self.edge(e1).poly_type != self.edge(e2).poly_type {
                self.add_local_min_poly(e1, e2, pt);
            } else if e1_wc == 1 && e2_wc == 1 {
                match self.clip_type {
                    ClipOp::Intersection => {
                        if e1_wc2 > 0 && e2_wc2 > 0 {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipOp::Union => {
                        if e1_wc2 <= 0 && e2_wc2 <= 0 {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipOp::Difference => {
                        let ty = self.edge(e1).poly_type;
                        if (ty == PolyType::Clip && e1_wc2 > 0 && e2_wc2 > 0)
                            || (ty == PolyType::Subject && e1_wc2 <= 0 && e2_wc2 <= 0)
                        {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipOp::Xor => {
                        self.add_local_min_poly(e1, e2, pt);
                    }
                }
            } else {
                self.swap_sides(e1, e2);
            }
        }
    }

    pub(crate) fn delete_from_ael(&mut self, e: EdgeIdx) {
        let prev = self.edge(e).prev_in_ael;
        let next = self.edge(e).next_in_ael;
        if prev.is_none() && next.is_none() && self.active_edges != Some(e) {
            return; // already deleted
        }
        match prev {
            Some(p) => self.edge_mut(p).next_in_ael = next,
            None => self.active_edges = next,
        }
        if let Some(n) = next {
            self.edge_mut(n).prev_in_ael = prev;
        }
        self.edge_mut(e).next_in_ael = None;
        self.edge_mut(e).prev_in_ael = None;
    }

    fn delete_from_sel(&mut self, e: EdgeIdx) {
        let prev = self.edge(e).prev_in_sel;
        let next = self.edge(e).next_in_sel;
        if prev.is_none() && next.is_none() && self.sorted_edges != Some(e) {
            return; // already deleted
        }
        match prev {
            Some(p) => self.edge_mut(p).next_in_sel = next,
            None => self.sorted_edges = next,
        }
        if let Some(n) = next {
            self.edge_mut(n).prev_in_sel = prev;
        }
        self.edge_mut(e).next_in_sel = None;
        self.edge_mut(e).prev_in_sel = None;
    }

    /// Replaces an edge in the AEL with the next edge up its bound,
    /// carrying over the winding state.
    pub(crate) fn update_edge_into_ael(&mut self, e: EdgeIdx) -> Result<EdgeIdx> {
        let next_lml = self.edge(e).next_in_lml.ok_or(Error::EdgeChain)?;
        let ael_prev = self.edge(e).prev_in_ael;
        let ael_next = self.edge(e).next_in_ael;

        self.edge_mut(next_lml).out = self.edge(e).out;
        match ael_prev {
            Some(p) => self.edge_mut(p).next_in_ael = Some(next_lml),
            None => self.active_edges = Some(next_lml),
        }
        if let Some(n) = ael_next {
            self.edge_mut(n).prev_in_ael = Some(next_lml);
        }
        let side = self.edge(e).side;
        let wind_delta = self.edge(e).wind_delta;
        let wind_cnt = self.edge(e).wind_cnt;
        let wind_cnt2 = self.edge(e).wind_cnt2;
        let new = self.edge_mut(next_lml);
        new.side = side;
        new.wind_delta = wind_delta;
        new.wind_cnt = wind_cnt;
        new.wind_cnt2 = wind_cnt2;
        new.curr = new.bot;
        new.prev_in_ael = ael_prev;
        new.next_in_ael = ael_next;
        if !self.edge(next_lml).is_horizontal() {
            let top_y = self.edge(next_lml).top.y;
            self.insert_scanbeam(top_y);
        }
        Ok(next_lml)
    }

    pub(crate) fn process_horizontals(&mut self, is_top_of_scanbeam: bool) -> Result<()> {
        while let Some(horz) = self.sorted_edges {
            self.delete_from_sel(horz);
            self.process_horizontal(horz, is_top_of_scanbeam)?;
        }
        Ok(())
    }

    fn get_horz_direction(&self, horz: EdgeIdx) -> (Direction, i64, i64) {
        let e = self.edge(horz);
        if e.bot.x < e.top.x {
            (Direction::LeftToRight, e.bot.x, e.top.x)
        } else {
            (Direction::RightToLeft, e.top.x, e.bot.x)
        }
    }

    fn get_next_in_ael(&self, e: EdgeIdx, dir: Direction) -> Option<EdgeIdx> {
        match dir {
            Direction::LeftToRight => self.edge(e).next_in_ael,
            Direction::RightToLeft => self.edge(e).prev_in_ael,
        }
    }

    fn process_horizontal(&mut self, mut horz: EdgeIdx, is_top_of_scanbeam: bool) -> Result<()> {
        let (mut dir, mut horz_left, mut horz_right) = self.get_horz_direction(horz);

        // find the last of this run of consecutive horizontals and, when it
        // ends the bound, its maxima pair
        let mut last_horz = horz;
        while let Some(next) = self.edge(last_horz).next_in_lml {
            if !self.edge(next).is_horizontal() {
                break;
            }
            last_horz = next;
        }
        let max_pair = if self.edge(last_horz).next_in_lml.is_none() {
            self.get_maxima_pair(last_horz)
        } else {
            None
        };

        loop {
            let is_last_horz = horz == last_horz;
            let mut e = self.get_next_in_ael(horz, dir);
            while let Some(ei) = e {
                // break at the end of an intermediate horizontal; smaller
                // dx's are to the right of larger dx's above a horizontal
                if self.edge(ei).curr.x == self.edge(horz).top.x {
                    if let Some(next_lml) = self.edge(horz).next_in_lml {
                        if self.edge(ei).dx < self.edge(next_lml).dx {
                            break;
                        }
                    }
                }

                let e_next = self.get_next_in_ael(ei, dir);

                let in_range = match dir {
                    Direction::LeftToRight => self.edge(ei).curr.x <= horz_right,
                    Direction::RightToLeft => self.edge(ei).curr.x >= horz_left,
                };
                if in_range {
                    // still within the horizontal's span; when matching the
                    // maxima pair we must be at the last consecutive
                    // horizontal
                    if Some(ei) == max_pair && is_last_horz {
                        if self.edge(horz).out.is_assigned() {
                            let top = self.edge(horz).top;
                            let op1 = self.add_out_pt(horz, top);
                            let mut next_horz = self.sorted_edges;
                            while let Some(nh) = next_horz {
                                if self.edge(nh).out.is_assigned()
                                    && horz_segments_overlap(
                                        self.edge(horz).bot.x,
                                        self.edge(horz).top.x,
                                        self.edge(nh).bot.x,
                                        self.edge(nh).top.x,
                                    )
                                {
                                    let nh_bot = self.edge(nh).bot;
                                    let op2 = self.add_out_pt(nh, nh_bot);
                                    let nh_top = self.edge(nh).top;
                                    self.add_join(op2, op1, nh_top);
                                }
                                next_horz = self.edge(nh).next_in_sel;
                            }
                            let bot = self.edge(horz).bot;
                            self.add_ghost_join(op1, bot);
                            let mp = max_pair.expect("matched the maxima pair");
                            let top = self.edge(horz).top;
                            self.add_local_max_poly(horz, mp, top);
                        }
                        self.delete_from_ael(horz);
                        if let Some(mp) = max_pair {
                            self.delete_from_ael(mp);
                        }
                        return Ok(());
                    } else if dir == Direction::LeftToRight {
                        let pt = Point::new(self.edge(ei).curr.x, self.edge(horz).curr.y);
                        self.intersect_edges(horz, ei, pt);
                    } else {
                        let pt = Point::new(self.edge(ei).curr.x, self.edge(horz).curr.y);
                        self.intersect_edges(ei, horz, pt);
                    }
                    self.swap_positions_in_ael(horz, ei);
                } else {
                    let past = match dir {
                        Direction::LeftToRight => self.edge(ei).curr.x >= horz_right,
                        Direction::RightToLeft => self.edge(ei).curr.x <= horz_left,
                    };
                    if past {
                        break;
                    }
                }
                e = e_next;
            }

            let next_is_horizontal = match self.edge(horz).next_in_lml {
                Some(next) => self.edge(next).is_horizontal(),
                None => false,
            };
            if next_is_horizontal {
                horz = self.update_edge_into_ael(horz)?;
                if self.edge(horz).out.is_assigned() {
                    let bot = self.edge(horz).bot;
                    self.add_out_pt(horz, bot);
                }
                let (d, l, r) = self.get_horz_direction(horz);
                dir = d;
                horz_left = l;
                horz_right = r;
            } else {
                break;
            }
        }

        if self.edge(horz).next_in_lml.is_some() {
            if self.edge(horz).out.is_assigned() {
                let top = self.edge(horz).top;
                let op1 = self.add_out_pt(horz, top);
                if is_top_of_scanbeam {
                    let bot = self.edge(horz).bot;
                    self.add_ghost_join(op1, bot);
                }

                horz = self.update_edge_into_ael(horz)?;
                if self.edge(horz).wind_delta == 0 {
                    return Ok(());
                }
                // nb: horz is no longer horizontal here
                let e_prev = self.edge(horz).prev_in_ael;
                let e_next = self.edge(horz).next_in_ael;
                let bot = self.edge(horz).bot;
                if let Some(p) = e_prev {
                    if self.edge(p).curr.x == bot.x
                        && self.edge(p).curr.y == bot.y
                        && self.edge(p).wind_delta != 0
                        && self.edge(p).out.is_assigned()
                        && self.edge(p).curr.y > self.edge(p).top.y
                        && self.slopes_equal_edges(horz, p)
                    {
                        let op2 = self.add_out_pt(p, bot);
                        let top = self.edge(horz).top;
                        self.add_join(op1, op2, top);
                        return Ok(());
                    }
                }
                if let Some(n) = e_next {
                    if self.edge(n).curr.x == bot.x
                        && self.edge(n).curr.y == bot.y
                        && self.edge(n).wind_delta != 0
                        && self.edge(n).out.is_assigned()
                        && self.edge(n).curr.y > self.edge(n).top.y
                        && self.slopes_equal_edges(horz, n)
                    {
                        let op2 = self.add_out_pt(n, bot);
                        let top = self.edge(horz).top;
                        self.add_join(op1, op2, top);
                    }
                }
            } else {
                self.update_edge_into_ael(horz)?;
            }
        } else {
            if self.edge(horz).out.is_assigned() {
                let top = self.edge(horz).top;
                self.add_out_pt(horz, top);
            }
            self.delete_from_ael(horz);
        }
        Ok(())
    }

    fn is_maxima(&self, e: EdgeIdx, y: i64) -> bool {
        self.edge(e).top.y == y && self.edge(e).next_in_lml.is_none()
    }

    fn is_intermediate(&self, e: EdgeIdx, y: i64) -> bool {
        self.edge(e).top.y == y && self.edge(e).next_in_lml.is_some()
    }

    pub(crate) fn get_maxima_pair(&self, e: EdgeIdx) -> Option<EdgeIdx> {
        let top = self.edge(e).top;
        let next = self.edge(e).next;
        let prev = self.edge(e).prev;
        let result = if self.edge(next).top == top && self.edge(next).next_in_lml.is_none() {
            Some(next)
        } else if self.edge(prev).top == top && self.edge(prev).next_in_lml.is_none() {
            Some(prev)
        } else {
            None
        };
        if let Some(r) = result {
            if self.edge(r).out == OutTag::Skip
                || (self.edge(r).next_in_ael == self.edge(r).prev_in_ael
                    && !self.edge(r).is_horizontal())
            {
                return None;
            }
        }
        result
    }

    fn process_intersections(&mut self, top_y: i64) -> Result<()> {
        if self.active_edges.is_none() {
            return Ok(());
        }
        self.build_intersect_list(top_y);
        if self.intersect_list.is_empty() {
            return Ok(());
        }
        if self.intersect_list.len() == 1 || self.fixup_intersection_order() {
            self.process_intersect_list();
        } else {
            self.sorted_edges = None;
            self.intersect_list.clear();
            return Err(Error::IntersectionOrder);
        }
        self.sorted_edges = None;
        Ok(())
    }

    fn build_intersect_list(&mut self, top_y: i64) {
        if self.active_edges.is_none() {
            return;
        }

        // prepare for sorting
        self.sorted_edges = self.active_edges;
        let mut e = self.active_edges;
        while let Some(i) = e {
            let prev = self.edge(i).prev_in_ael;
            let next = self.edge(i).next_in_ael;
            self.edge_mut(i).prev_in_sel = prev;
            self.edge_mut(i).next_in_sel = next;
            let x = self.top_x(i, top_y);
            self.edge_mut(i).curr.x = x;
            e = next;
        }

        // bubble sort, recording each adjacent swap as an intersection
        let mut is_modified = true;
        while is_modified {
            let Some(mut e) = self.sorted_edges else {
                break;
            };
            is_modified = false;
            while let Some(next) = self.edge(e).next_in_sel {
                if self.edge(e).curr.x > self.edge(next).curr.x {
                    let pt = self.intersect_point(e, next);
                    self.intersect_list.push(IntersectNode {
                        edge1: e,
                        edge2: next,
                        pt,
                    });
                    self.swap_positions_in_sel(e, next);
                    is_modified = true;
                } else {
                    e = next;
                }
            }
            match self.edge(e).prev_in_sel {
                Some(p) => self.edge_mut(p).next_in_sel = None,
                None => break,
            }
        }
        self.sorted_edges = None;
    }

    fn edges_adjacent(&self, node: &IntersectNode) -> bool {
        self.edge(node.edge1).next_in_sel == Some(node.edge2)
            || self.edge(node.edge1).prev_in_sel == Some(node.edge2)
    }

    /// Bubble sorting only detects adjacent-pair crossings, so the raw
    /// intersect list must be reordered until every consumed pair is
    /// adjacent in a replayed SEL. Fails when no such order exists.
    fn fixup_intersection_order(&mut self) -> bool {
        // intersections must be processed bottom-most first
        self.intersect_list.sort_by(|a, b| b.pt.y.cmp(&a.pt.y));

        self.copy_ael_to_sel();
        let cnt = self.intersect_list.len();
        for i in 0..cnt {
            if !self.edges_adjacent(&self.intersect_list[i]) {
                let mut j = i + 1;
                while j < cnt && !self.edges_adjacent(&self.intersect_list[j]) {
                    j += 1;
                }
                if j == cnt {
                    trace!("intersection order cannot be fixed up");
                    return false;
                }
                self.intersect_list.swap(i, j);
            }
            let node = self.intersect_list[i];
            self.swap_positions_in_sel(node.edge1, node.edge2);
        }
        true
    }

    fn process_intersect_list(&mut self) {
        for i in 0..self.intersect_list.len() {
            let node = self.intersect_list[i];
            self.intersect_edges(node.edge1, node.edge2, node.pt);
            self.swap_positions_in_ael(node.edge1, node.edge2);
        }
        self.intersect_list.clear();
    }

    fn intersect_point(&self, edge1: EdgeIdx, edge2: EdgeIdx) -> Point {
        let a = self.edge(edge1);
        let b = self.edge(edge2);
        let mut ip = Point::default();

        // nb: with very large coordinates it is possible for slope equality
        // to fail while the dx values still compare equal after rounding
        if a.dx == b.dx {
            ip.y = a.curr.y;
            ip.x = self.top_x(edge1, ip.y);
            return ip;
        }

        if a.delta.x == 0 {
            ip.x = a.bot.x;
            if b.is_horizontal() {
                ip.y = b.bot.y;
            } else {
                let b2 = b.bot.y as f64 - b.bot.x as f64 / b.dx;
                ip.y = round(ip.x as f64 / b.dx + b2);
            }
        } else if b.delta.x == 0 {
            ip.x = b.bot.x;
            if a.is_horizontal() {
                ip.y = a.bot.y;
            } else {
                let b1 = a.bot.y as f64 - a.bot.x as f64 / a.dx;
                ip.y = round(ip.x as f64 / a.dx + b1);
            }
        } else {
            let b1 = a.bot.x as f64 - a.bot.y as f64 * a.dx;
            let b2 = b.bot.x as f64 - b.bot.y as f64 * b.dx;
            let q = (b2 - b1) / (a.dx - b.dx);
            ip.y = round(q);
            ip.x = if a.dx.abs() < b.dx.abs() {
                round(a.dx * q + b1)
            } else {
                round(b.dx * q + b2)
            };
        }

        if ip.y < a.top.y || ip.y < b.top.y {
            ip.y = a.top.y.max(b.top.y);
            ip.x = if a.dx.abs() < b.dx.abs() {
                self.top_x(edge1, ip.y)
            } else {
                self.top_x(edge2, ip.y)
            };
        }
        // never allow the point below the bottom of the scanbeam
        if ip.y > a.curr.y {
            ip.y = a.curr.y;
            // the more vertical edge gives the more reliable x
            ip.x = if a.dx.abs() > b.dx.abs() {
                self.top_x(edge2, ip.y)
            } else {
                self.top_x(edge1, ip.y)
            };
        }
        ip
    }

    fn process_edges_at_top_of_scanbeam(&mut self, top_y: i64) -> Result<()> {
        let mut e = self.active_edges;
        while let Some(ei) = e {
            // maxima are treated as if they were 'bent' horizontal edges,
            // except maxima paired with a horizontal
            let mut is_maxima_edge = self.is_maxima(ei, top_y);
            if is_maxima_edge {
                let max_pair = self.get_maxima_pair(ei);
                is_maxima_edge = match max_pair {
                    None => true,
                    Some(mp) => !self.edge(mp).is_horizontal(),
                };
            }

            if is_maxima_edge {
                let e_prev = self.edge(ei).prev_in_ael;
                self.do_maxima(ei)?;
                e = match e_prev {
                    None => self.active_edges,
                    Some(p) => self.edge(p).next_in_ael,
                };
            } else {
                // promote horizontal edges, otherwise just update curr
                let promote = self.is_intermediate(ei, top_y)
                    && self
                        .edge(ei)
                        .next_in_lml
                        .map(|n| self.edge(n).is_horizontal())
                        .unwrap_or(false);
                if promote {
                    let new_e = self.update_edge_into_ael(ei)?;
                    if self.edge(new_e).out.is_assigned() {
                        let bot = self.edge(new_e).bot;
                        self.add_out_pt(new_e, bot);
                    }
                    self.add_edge_to_sel(new_e);
                    e = self.edge(new_e).next_in_ael;
                } else {
                    let x = self.top_x(ei, top_y);
                    self.edge_mut(ei).curr = Point::new(x, top_y);
                    e = self.edge(ei).next_in_ael;
                }
            }
        }

        self.process_horizontals(true)?;

        // promote intermediate vertices
        let mut e = self.active_edges;
        while let Some(ei) = e {
            if self.is_intermediate(ei, top_y) {
                let op = if self.edge(ei).out.is_assigned() {
                    let top = self.edge(ei).top;
                    Some(self.add_out_pt(ei, top))
                } else {
                    None
                };
                let ei = self.update_edge_into_ael(ei)?;

                // if output polygons share an edge, they need joining later
                let e_prev = self.edge(ei).prev_in_ael;
                let e_next = self.edge(ei).next_in_ael;
                let bot = self.edge(ei).bot;
                let mut joined = false;
                if let (Some(p), Some(op1)) = (e_prev, op) {
                    if self.edge(p).curr.x == bot.x
                        && self.edge(p).curr.y == bot.y
                        && self.edge(p).out.is_assigned()
                        && self.edge(p).curr.y > self.edge(p).top.y
                        && self.slopes_equal_edges(ei, p)
                        && self.edge(ei).wind_delta != 0
                        && self.edge(p).wind_delta != 0
                    {
                        let op2 = self.add_out_pt(p, bot);
                        let top = self.edge(ei).top;
                        self.add_join(op1, op2, top);
                        joined = true;
                    }
                }
                if !joined {
                    if let (Some(n), Some(op1)) = (e_next, op) {
                        if self.edge(n).curr.x == bot.x
                            && self.edge(n).curr.y == bot.y
                            && self.edge(n).out.is_assigned()
                            && self.edge(n).curr.y > self.edge(n).top.y
                            && self.slopes_equal_edges(ei, n)
                            && self.edge(ei).wind_delta != 0
                            && self.edge(n).wind_delta != 0
                        {
                            let op2 = self.add_out_pt(n, bot);
                            let top = self.edge(ei).top;
                            self.add_join(op1, op2, top);
                        }
                    }
                }
                e = self.edge(ei).next_in_ael;
            } else {
                e = self.edge(ei).next_in_ael;
            }
        }
        Ok(())
    }

    fn do_maxima(&mut self, e: EdgeIdx) -> Result<()> {
        let max_pair = match self.get_maxima_pair(e) {
            Some(mp) => mp,
            None => {
                if self.edge(e).out.is_assigned() {
                    let top = self.edge(e).top;
                    self.add_out_pt(e, top);
                }
                self.delete_from_ael(e);
                return Ok(());
            }
        };

        let mut next = self.edge(e).next_in_ael;
        while let Some(n) = next {
            if n == max_pair {
                break;
            }
            let top = self.edge(e).top;
            self.intersect_edges(e, n, top);
            self.swap_positions_in_ael(e, n);
            next = self.edge(e).next_in_ael;
        }

        let e_assigned = self.edge(e).out.is_assigned();
        let mp_assigned = self.edge(max_pair).out.is_assigned();
        if self.edge(e).out == OutTag::Unassigned && self.edge(max_pair).out == OutTag::Unassigned {
            self.delete_from_ael(e);
            self.delete_from_ael(max_pair);
        } else if e_assigned && mp_assigned {
            let top = self.edge(e).top;
            self.add_local_max_poly(e, max_pair, top);
            self.delete_from_ael(e);
            self.delete_from_ael(max_pair);
        } else if self.edge(e).wind_delta == 0 {
            if e_assigned {
                let top = self.edge(e).top;
                self.add_out_pt(e, top);
                self.edge_mut(e).out = OutTag::Unassigned;
            }
            self.delete_from_ael(e);

            if self.edge(max_pair).out.is_assigned() {
                let top = self.edge(e).top;
                self.add_out_pt(max_pair, top);
                self.edge_mut(max_pair).out = OutTag::Unassigned;
            }
            self.delete_from_ael(max_pair);
        } else {
            return Err(Error::MaximaMismatch);
        }
        Ok(())
    }
}
