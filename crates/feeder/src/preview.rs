use std::path::Path;

use penplot_geom::{Config, Point};
use svg::{
    node::element::{path::Data, Path as SvgPath, Rectangle},
    Document,
};

use crate::simulator::Stroke;

const MARGIN_MM: f32 = 2.0;

/// Draws the strokes, in millimeters.
///
/// The machine has positive y pointing up and SVG has it pointing down, so
/// everything gets flipped on the way out.
pub fn document(strokes: &[Stroke], config: &Config) -> Document {
    let flip = |p: Point| (p.x, -p.y);
    let points = || {
        strokes
            .iter()
            .flatten()
            .map(|s| flip(config.steps_to_point(s)))
    };

    let (min_x, min_y, max_x, max_y) = points().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(x0, y0, x1, y1), (x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    );
    let (min_x, min_y, w, h) = if min_x.is_finite() {
        (
            min_x - MARGIN_MM,
            min_y - MARGIN_MM,
            max_x - min_x + 2.0 * MARGIN_MM,
            max_y - min_y + 2.0 * MARGIN_MM,
        )
    } else {
        (0.0, 0.0, 1.0, 1.0)
    };

    let mut document = Document::new()
        .set("viewBox", (min_x, min_y, w, h))
        .set("width", format!("{w}mm"))
        .set("height", format!("{h}mm"))
        .add(
            Rectangle::new()
                .set("x", min_x)
                .set("y", min_y)
                .set("width", w)
                .set("height", h)
                .set("fill", "white"),
        );

    for stroke in strokes {
        let mut pts = stroke.iter().map(|s| flip(config.steps_to_point(s)));
        let Some(start) = pts.next() else {
            continue;
        };
        let data = pts.fold(Data::new().move_to(start), |d, p| d.line_to(p));
        document = document.add(
            SvgPath::new()
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", 0.3)
                .set("stroke-linecap", "round")
                .set("stroke-linejoin", "round")
                .set("d", data),
        );
    }
    document
}

pub fn save(path: &Path, strokes: &[Stroke], config: &Config) -> anyhow::Result<()> {
    svg::save(path, &document(strokes, config))?;
    log::info!("wrote {} strokes to {}", strokes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use penplot_geom::XY;

    #[test]
    fn one_path_per_stroke() {
        let config = Config::default();
        let strokes = vec![
            vec![XY::new(0, 0), XY::new(200, 0), XY::new(200, 200)],
            vec![XY::new(-20, 40), XY::new(0, 0)],
        ];
        let out = document(&strokes, &config).to_string();
        assert_eq!(out.matches("<path").count(), 2);
        assert_eq!(out.matches("<rect").count(), 1);
    }

    #[test]
    fn nothing_drawn() {
        let out = document(&[], &Config::default()).to_string();
        assert!(!out.contains("<path"));
        assert!(out.contains("viewBox"));
    }
}
