use std::path::PathBuf;

use clap::Parser;
use svg::Document;

use polyclip::{boolean_op, ClipOp, FillRule, Paths, Point};

#[derive(Parser)]
struct Args {
    /// Where to write the SVG.
    output: PathBuf,

    #[arg(long)]
    non_zero: bool,

    /// Overlap between the two squares, in units.
    #[arg(long, default_value_t = 40)]
    overlap: i64,
}

fn square(x: i64, y: i64, size: i64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]
}

fn paths_data(paths: &Paths, x_off: f64, y_off: f64) -> svg::node::element::path::Data {
    let mut data = svg::node::element::path::Data::new();
    for path in paths {
        let Some(first) = path.first() else { continue };
        data = data.move_to((first.x as f64 + x_off, first.y as f64 + y_off));
        for p in &path[1..] {
            data = data.line_to((p.x as f64 + x_off, p.y as f64 + y_off));
        }
        data = data.close();
    }
    data
}

fn add_panel(
    mut doc: Document,
    paths: &Paths,
    fill: &str,
    x_off: f64,
    y_off: f64,
) -> Document {
    let path = svg::node::element::Path::new()
        .set("d", paths_data(paths, x_off, y_off))
        .set("stroke", "black")
        .set("stroke-width", 1.0)
        .set("fill", fill)
        .set("fill-rule", "evenodd");
    doc = doc.add(path);
    doc
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let size = 100;
    let shift = size - args.overlap;
    let subject = vec![square(0, 0, size)];
    let clip = vec![square(shift, shift, size)];

    let fill_rule = if args.non_zero {
        FillRule::NonZero
    } else {
        FillRule::EvenOdd
    };

    let extent = (size + shift) as f64;
    let pad = 10.0;
    let panel = extent + 2.0 * pad;
    let mut document =
        Document::new().set("viewBox", (-pad, -pad, panel * 5.0, extent + 2.0 * pad));

    // the inputs, then one panel per operation
    let mut inputs = subject.clone();
    inputs.extend(clip.iter().cloned());
    document = add_panel(document, &inputs, "#94D2BD", 0.0, 0.0);

    let ops = [
        (ClipOp::Union, "#005F73"),
        (ClipOp::Intersection, "#0A9396"),
        (ClipOp::Difference, "#EE9B00"),
        (ClipOp::Xor, "#CA6702"),
    ];
    for (i, (op, color)) in ops.iter().enumerate() {
        let result = boolean_op(&subject, &clip, *op, fill_rule)?;
        eprintln!("{op:?}: {} ring(s)", result.len());
        document = add_panel(document, &result, color, panel * (i + 1) as f64, 0.0);
    }

    svg::save(&args.output, &document)?;
    Ok(())
}
