use proptest::prelude::*;

use polyclip::{
    area, boolean_op, orientation, point_in_polygon, ClipOp, Clipper, Error, FillRule, Options,
    Path, Paths, Point, PointInPolygon, PolyType,
};

fn pts(v: &[(i64, i64)]) -> Path {
    v.iter().map(|&(x, y)| Point::new(x, y)).collect()
}

fn square(x: i64, y: i64, size: i64) -> Path {
    pts(&[(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
}

fn total_area(paths: &Paths) -> f64 {
    paths.iter().map(|p| area(p).abs()).sum()
}

#[test]
fn overlapping_squares_all_ops() {
    let subject = vec![square(0, 0, 10)];
    let clip = vec![square(5, 5, 10)];

    let union = boolean_op(&subject, &clip, ClipOp::Union, FillRule::EvenOdd).unwrap();
    assert_eq!(union.len(), 1);
    assert_eq!(union[0].len(), 8);
    assert_eq!(total_area(&union), 175.0);

    let inter = boolean_op(&subject, &clip, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
    assert_eq!(inter.len(), 1);
    assert_eq!(total_area(&inter), 25.0);
    // the intersection is exactly the square (5,5)..(10,10)
    let ring = &inter[0];
    assert_eq!(ring.len(), 4);
    for &(x, y) in &[(5, 5), (10, 5), (10, 10), (5, 10)] {
        assert!(ring.contains(&Point::new(x, y)));
    }

    let diff = boolean_op(&subject, &clip, ClipOp::Difference, FillRule::EvenOdd).unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(total_area(&diff), 75.0);

    let xor = boolean_op(&subject, &clip, ClipOp::Xor, FillRule::EvenOdd).unwrap();
    assert_eq!(total_area(&xor), 150.0);
}

#[test]
fn all_fill_rules_agree_on_simple_input() {
    let subject = vec![square(0, 0, 10)];
    let clip = vec![square(5, 5, 10)];
    for fill in [
        FillRule::EvenOdd,
        FillRule::NonZero,
        FillRule::Positive,
        FillRule::Negative,
    ] {
        // negative fill treats counter-clockwise rings as empty, so flip
        let (subject, clip) = if fill == FillRule::Negative {
            let mut s = subject.clone();
            let mut c = clip.clone();
            polyclip::reverse_paths(&mut s);
            polyclip::reverse_paths(&mut c);
            (s, c)
        } else {
            (subject.clone(), clip.clone())
        };
        let inter = boolean_op(&subject, &clip, ClipOp::Intersection, fill).unwrap();
        assert_eq!(total_area(&inter), 25.0, "fill rule {fill:?}");
    }
}

#[test]
fn union_of_disjoint_squares() {
    let subject = vec![square(0, 0, 10)];
    let clip = vec![square(100, 100, 20)];
    let union = boolean_op(&subject, &clip, ClipOp::Union, FillRule::EvenOdd).unwrap();
    assert_eq!(union.len(), 2);
    assert_eq!(total_area(&union), 100.0 + 400.0);
}

#[test]
fn intersection_of_disjoint_squares_is_empty() {
    let subject = vec![square(0, 0, 10)];
    let clip = vec![square(100, 100, 20)];
    let inter = boolean_op(&subject, &clip, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
    assert!(inter.is_empty());
}

#[test]
fn difference_of_polygon_with_itself_is_empty() {
    let poly = vec![pts(&[(0, 0), (50, 10), (60, 60), (10, 50)])];
    let diff = boolean_op(&poly, &poly, ClipOp::Difference, FillRule::NonZero).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn self_union_round_trip() {
    let poly = vec![pts(&[(0, 0), (50, 10), (60, 60), (10, 50)])];
    let expected = area(&poly[0]).abs();
    for fill in [
        FillRule::EvenOdd,
        FillRule::NonZero,
        FillRule::Positive,
        FillRule::Negative,
    ] {
        let poly = if fill == FillRule::Negative {
            let mut p = poly.clone();
            polyclip::reverse_paths(&mut p);
            p
        } else {
            poly.clone()
        };
        let union = boolean_op(&poly, &[], ClipOp::Union, fill).unwrap();
        assert_eq!(union.len(), 1, "fill rule {fill:?}");
        assert_eq!(area(&union[0]).abs(), expected);
        assert_eq!(union[0].len(), 4);
    }
}

#[test]
fn hole_gets_opposite_orientation() {
    // outer ring and inner ring with the same winding; even-odd makes the
    // inner one a hole
    let subject = vec![square(0, 0, 20), square(5, 5, 10)];
    let union = boolean_op(&subject, &[], ClipOp::Union, FillRule::EvenOdd).unwrap();
    assert_eq!(union.len(), 2);
    let (outer, hole) = if area(&union[0]).abs() > area(&union[1]).abs() {
        (&union[0], &union[1])
    } else {
        (&union[1], &union[0])
    };
    assert!(orientation(outer));
    assert!(!orientation(hole));
    assert_eq!(area(outer) + area(hole), 400.0 - 100.0);
}

#[test]
fn polytree_nesting() {
    let mut c = Clipper::default();
    c.add_paths(
        &[square(0, 0, 20), square(5, 5, 10)],
        PolyType::Subject,
        true,
    )
    .unwrap();
    let tree = c
        .execute_tree(ClipOp::Union, FillRule::EvenOdd, FillRule::EvenOdd)
        .unwrap();
    assert_eq!(tree.total(), 2);
    assert_eq!(tree.childs().len(), 1);
    let outer = tree.first().unwrap();
    assert!(!tree.is_hole(outer));
    assert_eq!(tree.child_count(outer), 1);
    let hole = tree.children(outer)[0];
    assert!(tree.is_hole(hole));
    assert_eq!(area(tree.contour(hole)), -100.0);
    assert_eq!(area(tree.contour(outer)), 400.0);
}

#[test]
fn island_inside_hole() {
    // three concentric squares alternate filled/hole/filled under even-odd
    let subject = vec![square(0, 0, 30), square(5, 5, 20), square(10, 10, 10)];
    let mut c = Clipper::default();
    c.add_paths(&subject, PolyType::Subject, true).unwrap();
    let tree = c
        .execute_tree(ClipOp::Union, FillRule::EvenOdd, FillRule::EvenOdd)
        .unwrap();
    assert_eq!(tree.total(), 3);
    let outer = tree.first().unwrap();
    let hole = tree.children(outer)[0];
    let island = tree.children(hole)[0];
    assert!(!tree.is_hole(outer));
    assert!(tree.is_hole(hole));
    assert!(!tree.is_hole(island));
}

#[test]
fn open_path_clipped_to_square() {
    let mut c = Clipper::default();
    c.add_path(&pts(&[(5, -5), (5, 15)]), PolyType::Subject, false)
        .unwrap();
    c.add_path(&square(0, 0, 10), PolyType::Clip, true).unwrap();

    // the flat-result form cannot represent open output
    assert_eq!(
        c.execute(ClipOp::Intersection, FillRule::EvenOdd, FillRule::EvenOdd),
        Err(Error::TreeRequired)
    );

    let tree = c
        .execute_tree(ClipOp::Intersection, FillRule::EvenOdd, FillRule::EvenOdd)
        .unwrap();
    let open = polyclip::open_paths_from_polytree(&tree);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].len(), 2);
    assert!(open[0].contains(&Point::new(5, 0)));
    assert!(open[0].contains(&Point::new(5, 10)));
}

#[test]
fn strictly_simple_splits_self_touching_ring() {
    // two squares joined through the single point (10, 10), drawn as one
    // self-touching ring
    let ring = pts(&[
        (0, 0),
        (10, 0),
        (10, 10),
        (20, 10),
        (20, 20),
        (10, 20),
        (10, 10),
        (0, 10),
    ]);
    let expected = area(&ring).abs();
    let simple = polyclip::simplify_polygon(&ring, FillRule::EvenOdd).unwrap();
    assert_eq!(simple.len(), 2);
    assert_eq!(total_area(&simple), expected);
    for p in &simple {
        assert_eq!(p.len(), 4);
    }
}

#[test]
fn reverse_solution_flips_orientations() {
    let subject = vec![square(0, 0, 10)];
    let mut c = Clipper::new(Options {
        reverse_solution: true,
        ..Options::default()
    });
    c.add_paths(&subject, PolyType::Subject, true).unwrap();
    let union = c
        .execute(ClipOp::Union, FillRule::EvenOdd, FillRule::EvenOdd)
        .unwrap();
    assert_eq!(union.len(), 1);
    assert!(!orientation(&union[0]));
}

#[test]
fn preserved_collinear_vertices_survive() {
    let subject = vec![pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (0, 10)])];
    let mut c = Clipper::new(Options {
        preserve_collinear: true,
        ..Options::default()
    });
    c.add_paths(&subject, PolyType::Subject, true).unwrap();
    let union = c
        .execute(ClipOp::Union, FillRule::EvenOdd, FillRule::EvenOdd)
        .unwrap();
    assert_eq!(union.len(), 1);
    assert_eq!(union[0].len(), 5);
}

#[test]
fn point_in_polygon_against_result() {
    let subject = vec![square(0, 0, 10)];
    let clip = vec![square(5, 5, 10)];
    let inter = boolean_op(&subject, &clip, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
    let ring = &inter[0];
    assert_eq!(point_in_polygon(Point::new(7, 7), ring), PointInPolygon::Inside);
    assert_eq!(point_in_polygon(Point::new(2, 2), ring), PointInPolygon::Outside);
    assert_eq!(
        point_in_polygon(Point::new(5, 7), ring),
        PointInPolygon::OnBoundary
    );
}

/// A star polygon around (cx, cy): guaranteed simple as long as the radii
/// dwarf the integer rounding of the vertex positions.
fn star(cx: i64, cy: i64, n: usize, radii: &[i64]) -> Path {
    (0..n)
        .map(|i| {
            let angle = (i as f64) * std::f64::consts::TAU / (n as f64);
            let r = radii[i % radii.len()] as f64;
            Point::new(
                cx + (r * angle.cos()).round() as i64,
                cy + (r * angle.sin()).round() as i64,
            )
        })
        .collect()
}

#[test]
fn thousand_edge_star_terminates() {
    // pseudo-random radii from a fixed linear congruential sequence
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let radii: Vec<i64> = (0..1000)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            500_000 + (seed >> 44) as i64
        })
        .collect();
    let poly = star(0, 0, 1000, &radii);
    let expected = area(&poly).abs();

    let union = boolean_op(&vec![poly], &[], ClipOp::Union, FillRule::NonZero).unwrap();
    assert_eq!(union.len(), 1);
    assert_eq!(area(&union[0]).abs(), expected);
}

#[test]
fn large_coordinates_use_full_range_arithmetic() {
    let big = 1 << 40;
    let subject = vec![square(big, big, 1000)];
    let clip = vec![square(big + 500, big + 500, 1000)];
    let inter = boolean_op(&subject, &clip, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
    assert_eq!(inter.len(), 1);
    assert_eq!(total_area(&inter), 250_000.0);
}

prop_compose! {
    fn arb_star()(
        n in 5usize..24,
        radii in prop::collection::vec(1000i64..100_000, 3..8),
        cx in -1000i64..1000,
        cy in -1000i64..1000,
    ) -> Path {
        star(cx, cy, n, &radii)
    }
}

proptest! {
    #[test]
    fn self_union_of_simple_polygon_is_one_ring(poly in arb_star()) {
        let expected = area(&poly).abs();
        let union = boolean_op(&vec![poly], &[], ClipOp::Union, FillRule::EvenOdd).unwrap();
        prop_assert_eq!(union.len(), 1);
        prop_assert_eq!(area(&union[0]).abs(), expected);
        prop_assert!(orientation(&union[0]));
    }

    #[test]
    fn union_with_itself_reproduces_polygon(poly in arb_star()) {
        let expected = area(&poly).abs();
        let union = boolean_op(
            &vec![poly.clone()],
            &vec![poly],
            ClipOp::Union,
            FillRule::NonZero,
        )
        .unwrap();
        prop_assert_eq!(union.len(), 1);
        prop_assert_eq!(area(&union[0]).abs(), expected);
    }

    #[test]
    fn disjoint_union_is_exact(size_a in 1i64..500, size_b in 1i64..500) {
        let a = vec![square(0, 0, size_a)];
        let b = vec![square(1000, 1000, size_b)];
        let union = boolean_op(&a, &b, ClipOp::Union, FillRule::EvenOdd).unwrap();
        prop_assert_eq!(union.len(), 2);
        let total: f64 = union.iter().map(|p| area(p).abs()).sum();
        prop_assert_eq!(total, (size_a * size_a + size_b * size_b) as f64);

        let inter = boolean_op(&a, &b, ClipOp::Intersection, FillRule::EvenOdd).unwrap();
        prop_assert!(inter.is_empty());
    }

    #[test]
    fn clean_polygon_is_idempotent(poly in arb_star(), distance in 1.0f64..100.0) {
        let once = polyclip::clean_polygon(&poly, distance);
        let twice = polyclip::clean_polygon(&once, distance);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn tree_orientation_matches_hole_state(poly in arb_star()) {
        let mut c = Clipper::default();
        c.add_path(&poly, PolyType::Subject, true).unwrap();
        let tree = c
            .execute_tree(ClipOp::Union, FillRule::EvenOdd, FillRule::EvenOdd)
            .unwrap();
        for node in tree.iter() {
            let contour = tree.contour(node);
            prop_assert_eq!(orientation(contour), !tree.is_hole(node));
        }
    }
}
