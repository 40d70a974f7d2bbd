//!
//! # Footprints
//!
//! Areas a chip must provide: for its pads, and for the dies stacked upon it.
//! Buried dies are embedded within their parent and never contribute.
//!

// Local Imports
use crate::data::StackSide;
use crate::library::AssemblyProcess;
use crate::wafer::die_dims;

/// A stacked child, as seen by its parent's footprint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub area: f64,
    pub aspect_ratio: f64,
    pub location: Option<(f64, f64)>,
    pub side: StackSide,
    pub buried: bool,
}

/// Area of a rectangular array of `pads` at `pitch`, shaped to `aspect_ratio`
pub fn pad_area(pads: u64, pitch: f64, aspect_ratio: f64) -> f64 {
    if pads == 0 || pitch == 0.0 {
        return 0.0;
    }
    let columns = (pads as f64 * aspect_ratio).sqrt().ceil().max(1.0);
    let rows = (pads as f64 / columns).ceil();
    columns * rows * pitch * pitch
}

/// Area of one side of a parent covered by `children`, die separation included.
///
/// Placed children are bounded by their enclosing rectangle;
/// if any child lacks a location, the separated areas are summed instead.
fn side_area(children: &[&Placement], separation: f64) -> f64 {
    let rects: Option<Vec<(f64, f64, f64, f64)>> = children
        .iter()
        .map(|c| {
            let (w, h) = die_dims(c.area, c.aspect_ratio);
            c.location.map(|(x, y)| {
                (
                    x - separation / 2.0,
                    y - separation / 2.0,
                    x + w + separation / 2.0,
                    y + h + separation / 2.0,
                )
            })
        })
        .collect();
    match rects {
        Some(rects) if !rects.is_empty() => {
            let x0 = rects.iter().map(|r| r.0).fold(f64::INFINITY, f64::min);
            let y0 = rects.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
            let x1 = rects.iter().map(|r| r.2).fold(f64::NEG_INFINITY, f64::max);
            let y1 = rects.iter().map(|r| r.3).fold(f64::NEG_INFINITY, f64::max);
            (x1 - x0) * (y1 - y0)
        }
        _ => children
            .iter()
            .map(|c| {
                let (w, h) = die_dims(c.area, c.aspect_ratio);
                (w + separation) * (h + separation)
            })
            .sum(),
    }
}

/// Area a parent assembled by `process` must provide for `children`:
/// the larger of its two sides, plus the process's edge exclusion all around.
pub fn stacked_die_area(children: &[Placement], process: &AssemblyProcess) -> f64 {
    let side = |s: StackSide| -> f64 {
        let on_side: Vec<&Placement> = children
            .iter()
            .filter(|c| c.side == s && !c.buried)
            .collect();
        side_area(&on_side, process.die_separation)
    };
    let area = side(StackSide::Face).max(side(StackSide::Back));
    if area == 0.0 {
        return 0.0;
    }
    (area.sqrt() + 2.0 * process.edge_exclusion).powi(2)
}
