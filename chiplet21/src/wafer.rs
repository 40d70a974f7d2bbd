//!
//! # Wafer Packing Model
//!
//! Counts the rectangular dies which fit within the usable (edge-excluded) disc of a wafer.
//!

// Std-Lib
use std::f64::consts::PI;

// Crates.io
use serde::Serialize;

// Local Imports
use crate::library::WaferProcess;

/// # Die Packing Policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackingPolicy {
    /// Every die aligned to a single column grid
    Grid,
    /// Each row positioned independently of the others
    Flexible,
}
impl PackingPolicy {
    pub fn of(wafer: &WaferProcess) -> Self {
        match wafer.wafer_fill_grid {
            true => Self::Grid,
            false => Self::Flexible,
        }
    }
}

/// Width and height of a die of `area` and `aspect_ratio` (width / height)
pub fn die_dims(area: f64, aspect_ratio: f64) -> (f64, f64) {
    ((area * aspect_ratio).sqrt(), (area / aspect_ratio).sqrt())
}

/// Half-length of the chord at distance `h` from the center of a circle of radius `r`.
/// Zero beyond the circle.
fn half_chord(r: f64, h: f64) -> f64 {
    (r * r - h * h).max(0.0).sqrt()
}

///
/// Dies per wafer, with every die on a common column grid.
///
/// The first block of `k` rows straddles the wafer's horizontal diameter and sets the column grid.
/// Rows above and below it are packed only at grid-aligned positions.
/// Each block height `k` is tried until the block no longer fits; the best count is returned.
///
pub fn grid_dies(x: f64, y: f64, usable_diameter: f64, dicing: f64) -> u64 {
    let xe = x + dicing;
    let ye = y + dicing;
    let r = usable_diameter / 2.0;
    let first_column_dist = r - half_chord(r, ye / 2.0);
    let crossover = half_chord(r, r - first_column_dist - xe);

    let mut best: i64 = 0;
    let mut block_rows: i64 = 1;
    while block_rows as f64 * ye / 2.0 < crossover {
        let mut dies: i64 = 0;

        // Central block of rows
        let mut height = block_rows as f64 * ye / 2.0 - dicing / 2.0;
        let chord = 2.0 * half_chord(r, height);
        let per_row = ((chord + dicing) / xe).floor() as i64;
        dies += per_row * block_rows;
        height += ye;

        // One more die per block row, where the far edge of the wafer allows
        let end_of_rows = per_row as f64 * xe - chord / 2.0;
        let far = end_of_rows + xe;
        for i in 0..block_rows {
            let row_y = ye * i as f64 - height + ye;
            if far * far + row_y * row_y <= r * r && far * far + (row_y + ye).powi(2) <= r * r {
                dies += 1;
            }
        }

        // Row pairs above and below, aligned to the first block's columns
        let grid_origin = (usable_diameter - chord) / 2.0;
        while height < r {
            let chord = 2.0 * half_chord(r, height);
            let candidate = (usable_diameter - chord) / 2.0;
            let start = ((candidate - grid_origin) / xe).ceil() * xe + grid_origin;
            let usable_chord = chord - (start - candidate);
            dies += 2 * (usable_chord / xe).floor().max(0.0) as i64;
            height += ye;
        }

        best = best.max(dies);
        block_rows += 1;
    }
    best.max(0) as u64
}

///
/// Dies per wafer, with each row packed independently to the chord at its height.
///
/// Two row arrangements are considered: a row centered on the horizontal diameter,
/// and a pair of rows meeting at it. Since any grid packing is also a valid flexible one,
/// the result never falls below [grid_dies].
///
pub fn flexible_dies(x: f64, y: f64, usable_diameter: f64, dicing: f64) -> u64 {
    let xe = x + dicing;
    let ye = y + dicing;
    let r = usable_diameter / 2.0;
    let per_row = |height: f64| -> i64 {
        let chord = 2.0 * half_chord(r, height - dicing / 2.0) + dicing;
        (chord / xe).floor() as i64
    };

    // Centered row, then pairs above and below
    let mut height = ye / 2.0;
    let mut centered = per_row(height);
    height += ye;
    while height < r {
        centered += 2 * per_row(height);
        height += ye;
    }

    // Pairs of rows, starting at the diameter
    let mut height = ye;
    let mut straddled = 2 * per_row(height);
    height += ye;
    while height < r {
        straddled += 2 * per_row(height);
        height += ye;
    }

    let flexible = centered.max(straddled).max(0) as u64;
    flexible.max(grid_dies(x, y, usable_diameter, dicing))
}

/// Dies per wafer under `policy`
pub fn dies_per_wafer(
    x: f64,
    y: f64,
    usable_diameter: f64,
    dicing: f64,
    policy: PackingPolicy,
) -> u64 {
    match policy {
        PackingPolicy::Grid => grid_dies(x, y, usable_diameter, dicing),
        PackingPolicy::Flexible => flexible_dies(x, y, usable_diameter, dicing),
    }
}

/// # Wafer Packing Result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaferPacking {
    pub dies_per_wafer: u64,
    /// Full wafer area, edge exclusion included, mm^2
    pub wafer_area: f64,
    pub policy: PackingPolicy,
}

/// Most die pitches fitting across a usable wafer diameter.
/// Smaller dies make the grid search impractically long.
pub const MAX_DIES_ACROSS: f64 = 4096.0;

/// Pack dies of `area` and `aspect_ratio` onto `wafer`.
/// Fails with a description of the problem for zero-sized dies, dies too small to pack in
/// reasonable time, dies too large to place reliably, and packings which fit no dies at all.
pub fn pack(area: f64, aspect_ratio: f64, wafer: &WaferProcess) -> Result<WaferPacking, String> {
    let (x, y) = die_dims(area, aspect_ratio);
    if !(x > 0.0 && y > 0.0) {
        return Err(format!("Zero-sized die ({} x {} mm)", x, y));
    }
    let usable = wafer.wafer_diameter - 2.0 * wafer.edge_exclusion;
    if (x * x + y * y).sqrt() > usable / 2.0 {
        return Err(format!(
            "Die of {} x {} mm is too large for the {} mm usable diameter of wafer process `{}`",
            x, y, usable, wafer.name
        ));
    }
    let pitch = x.min(y) + wafer.dicing_distance;
    if usable / pitch > MAX_DIES_ACROSS {
        return Err(format!(
            "Die of {} x {} mm is too small to pack across the {} mm usable diameter of wafer process `{}`",
            x, y, usable, wafer.name
        ));
    }
    let policy = PackingPolicy::of(wafer);
    let dies = dies_per_wafer(x, y, usable, wafer.dicing_distance, policy);
    if dies == 0 {
        return Err(format!(
            "No {} x {} mm dies fit on wafer process `{}`",
            x, y, wafer.name
        ));
    }
    Ok(WaferPacking {
        dies_per_wafer: dies,
        wafer_area: PI * (wafer.wafer_diameter / 2.0).powi(2),
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_at_least_grid() {
        let dims = [
            (1.0, 1.0),
            (5.0, 5.0),
            (10.0, 3.0),
            (2.5, 17.0),
            (26.0, 33.0),
            (40.0, 40.0),
            (0.7, 0.3),
        ];
        for &(x, y) in dims.iter() {
            for &dicing in [0.0, 0.1, 0.5].iter() {
                for &d in [150.0, 200.0, 294.0].iter() {
                    let grid = grid_dies(x, y, d, dicing);
                    let flex = flexible_dies(x, y, d, dicing);
                    assert!(flex >= grid, "{}x{} on {}: {} < {}", x, y, d, flex, grid);
                }
            }
        }
    }

    #[test]
    fn counts_stay_below_area_bound() {
        // No packing may exceed the usable disc's area divided by the die pitch area
        for &(x, y) in [(1.0, 1.0), (10.0, 10.0), (4.0, 9.0)].iter() {
            let d = 294.0;
            let bound = PI * (d / 2.0f64).powi(2) / (x * y);
            let flex = flexible_dies(x, y, d, 0.0) as f64;
            assert!(flex <= bound);
            // And a reasonable packing fills most of it
            assert!(flex > 0.8 * bound, "{} vs {}", flex, bound);
        }
    }

    #[test]
    fn smaller_dies_pack_more() {
        let d = 294.0;
        let big = flexible_dies(20.0, 20.0, d, 0.1);
        let small = flexible_dies(10.0, 10.0, d, 0.1);
        assert!(small > 3 * big);
        let big = grid_dies(20.0, 20.0, d, 0.1);
        let small = grid_dies(10.0, 10.0, d, 0.1);
        assert!(small > 3 * big);
    }

    #[test]
    fn dims_follow_aspect_ratio() {
        let (x, y) = die_dims(8.0, 2.0);
        assert!((x - 4.0).abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pack_rejects_oversized_dies() {
        let wafer = crate::tests::wafer("w", false);
        assert!(pack(100.0, 1.0, &wafer).is_ok());
        assert!(pack(0.0, 1.0, &wafer).is_err());
        // Diagonal longer than the usable radius
        assert!(pack(150.0 * 150.0, 1.0, &wafer).is_err());
    }

    #[test]
    fn pack_rejects_tiny_dies() {
        let mut wafer = crate::tests::wafer("w", false);
        wafer.dicing_distance = 0.0;
        assert!(pack(1e-6, 1.0, &wafer).is_err());
        // A dicing street keeps the pitch packable
        wafer.dicing_distance = 0.1;
        assert!(pack(1e-6, 1.0, &wafer).is_ok());
    }

    #[test]
    fn flexible_at_least_grid_across_sizes() {
        for i in 1..=60 {
            let x = 0.5 * i as f64;
            for &aspect in [0.5, 1.0, 1.7].iter() {
                let y = x * aspect;
                if (x * x + y * y).sqrt() > 147.0 {
                    continue;
                }
                for policy in [PackingPolicy::Grid, PackingPolicy::Flexible] {
                    assert!(dies_per_wafer(x, y, 294.0, 0.1, policy) > 0);
                }
                let grid = dies_per_wafer(x, y, 294.0, 0.1, PackingPolicy::Grid);
                let flex = dies_per_wafer(x, y, 294.0, 0.1, PackingPolicy::Flexible);
                assert!(flex >= grid, "{}x{}: {} < {}", x, y, flex, grid);
            }
        }
    }
}
