//!
//! # Layer & Yield Model
//!
//! Per-layer defect yield (negative binomial), reticle stitching, and litho-scaled layer cost,
//! and their combination over a chip's stackup.
//!

// Std-Lib
use std::sync::Arc;

// Crates.io
use serde::Serialize;

// Local Imports
use crate::library::{Layer, WaferProcess};
use crate::wafer::{die_dims, WaferPacking};

impl Layer {
    /// Logic gates per mm^2, at four transistors per gate. Zero for inactive layers.
    pub fn gates_per_mm2(&self) -> f64 {
        match self.active {
            true => self.transistor_density * 1e6 / 4.0,
            false => 0.0,
        }
    }
    /// Negative-binomial defect yield of one instance of this layer over `area`
    pub fn defect_yield(&self, area: f64) -> f64 {
        if self.defect_density == 0.0 || area == 0.0 {
            return 1.0;
        }
        let c = self.clustering_factor;
        (1.0 + self.defect_density * self.critical_area_ratio * area / c).powf(-c)
    }
    /// Yield of one instance of this layer across `stitches` reticle boundaries
    pub fn stitch_yield(&self, stitches: u32) -> f64 {
        self.stitching_yield.powi(stitches as i32)
    }
    /// Cost of one instance of this layer on one die.
    ///
    /// The wafer's cost is split evenly among its dies,
    /// and the lithography share of it is inflated by poor reticle utilization.
    pub fn cost_per_die(&self, packing: &WaferPacking, reticle_utilization: f64) -> f64 {
        let base = self.cost_per_mm2 * packing.wafer_area / packing.dies_per_wafer as f64;
        if self.litho_percent == 0.0 {
            return base;
        }
        base * (1.0 - self.litho_percent) + base * self.litho_percent / reticle_utilization
    }
    /// Escape-routing tracks available beneath a die of `area` and `aspect_ratio`.
    /// Unlimited for a zero routing pitch.
    pub fn routing_tracks(&self, area: f64, aspect_ratio: f64) -> f64 {
        if self.routing_layer_pitch == 0.0 {
            return f64::INFINITY;
        }
        let (w, h) = die_dims(area, aspect_ratio);
        self.routing_layer_count as f64 * 2.0 * (w + h) / self.routing_layer_pitch
    }
}

/// Reticle boundaries crossed by a die of `area` and `aspect_ratio`, summed over both axes
pub fn stitch_count(area: f64, aspect_ratio: f64, wafer: &WaferProcess) -> u32 {
    let (x, y) = die_dims(area, aspect_ratio);
    let per_axis = |dim: f64, reticle: f64| ((dim / reticle).ceil() as u32).saturating_sub(1);
    per_axis(x, wafer.reticle_x) + per_axis(y, wafer.reticle_y)
}

///
/// Fraction of the exposed reticle field patterned with whole dies.
///
/// Dies larger than a reticle are exposed over the smallest whole number of reticle fields covering them.
///
pub fn reticle_utilization(area: f64, reticle_x: f64, reticle_y: f64) -> f64 {
    let reticle = reticle_x * reticle_y;
    if area <= 0.0 || reticle <= 0.0 {
        return 1.0;
    }
    let field = (area / reticle).ceil().max(1.0) * reticle;
    let dies = (field / area).floor();
    dies * area / field
}

/// # Layer Instance Group
/// `count` repeated instances of a shared [Layer]
#[derive(Debug, Clone)]
pub struct StackupLayer {
    pub count: u32,
    pub layer: Arc<Layer>,
}

/// # Fabrication Result
/// Yield and cost of a single die, before any test.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Fabrication {
    /// Wafer-process and layer yields combined
    #[serde(rename = "yield")]
    pub yield_: f64,
    /// Reticle stitches per layer instance
    pub stitches: u32,
    pub reticle_utilization: f64,
    /// Summed over every layer instance
    pub cost_per_die: f64,
    /// Dies per wafer surviving fabrication
    pub good_dies: f64,
    /// Fabrication cost carried by each surviving die
    pub cost_per_good_die: f64,
}

/// Yield and cost of a die of `area` and `aspect_ratio`, built from `stackup` on `wafer`
pub fn fabricate(
    stackup: &[StackupLayer],
    area: f64,
    aspect_ratio: f64,
    wafer: &WaferProcess,
    packing: &WaferPacking,
) -> Fabrication {
    let stitches = stitch_count(area, aspect_ratio, wafer);
    let utilization = reticle_utilization(area, wafer.reticle_x, wafer.reticle_y);
    let mut yield_ = wafer.wafer_process_yield;
    let mut cost = 0.0;
    for entry in stackup {
        let n = entry.count as i32;
        let layer = &entry.layer;
        yield_ *= (layer.defect_yield(area) * layer.stitch_yield(stitches)).powi(n);
        cost += entry.count as f64 * layer.cost_per_die(packing, utilization);
    }
    Fabrication {
        yield_,
        stitches,
        reticle_utilization: utilization,
        cost_per_die: cost,
        good_dies: packing.dies_per_wafer as f64 * yield_,
        cost_per_good_die: cost / yield_,
    }
}

/// Gates per mm^2 summed over every active layer instance of `stackup`
pub fn gates_per_mm2(stackup: &[StackupLayer]) -> f64 {
    stackup
        .iter()
        .map(|e| e.count as f64 * e.layer.gates_per_mm2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{layer, wafer};
    use crate::wafer::PackingPolicy;

    #[test]
    fn defect_yield_is_monotone() {
        let mut l = layer("m", 0.1);
        let mut last = 1.0;
        for &area in [0.0, 1.0, 10.0, 100.0, 800.0].iter() {
            let y = l.defect_yield(area);
            assert!(y <= last && y > 0.0 && y <= 1.0);
            last = y;
        }
        let mut last = 1.0;
        for &d in [0.0, 0.01, 0.05, 0.2, 1.0].iter() {
            l.defect_density = d;
            let y = l.defect_yield(50.0);
            assert!(y <= last);
            last = y;
        }
        l.defect_density = 0.0;
        assert_eq!(l.defect_yield(500.0), 1.0);
    }

    #[test]
    fn defect_yield_matches_closed_form() {
        let mut l = layer("m", 0.002);
        l.critical_area_ratio = 0.5;
        l.clustering_factor = 2.0;
        let expected = (1.0f64 + 0.002 * 0.5 * 100.0 / 2.0).powf(-2.0);
        assert!((l.defect_yield(100.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn counts_stitches() {
        let w = wafer("w", false); // 26 x 33 reticle
        assert_eq!(stitch_count(100.0, 1.0, &w), 0);
        assert_eq!(stitch_count(800.0, 26.0 / 33.0, &w), 0);
        // 40 x 40: one stitch in each axis
        assert_eq!(stitch_count(1600.0, 1.0, &w), 2);
        // 60 x 20: two stitches across x
        assert_eq!(stitch_count(1200.0, 3.0, &w), 2);
    }

    #[test]
    fn reticle_utilization_bounds() {
        // 26 x 33 = 858: exactly one die fills the field
        assert!((reticle_utilization(858.0, 26.0, 33.0) - 1.0).abs() < 1e-12);
        // 500: one die, 358 unused
        assert!((reticle_utilization(500.0, 26.0, 33.0) - 500.0 / 858.0).abs() < 1e-12);
        // 1000: two fields, one die
        assert!((reticle_utilization(1000.0, 26.0, 33.0) - 1000.0 / 1716.0).abs() < 1e-12);
        for &a in [1.0, 7.0, 123.0, 431.0, 2000.0].iter() {
            let u = reticle_utilization(a, 26.0, 33.0);
            assert!(u > 0.0 && u <= 1.0);
        }
    }

    #[test]
    fn litho_share_scales_with_utilization() {
        let mut l = layer("m", 0.0);
        l.cost_per_mm2 = 1.0;
        let packing = WaferPacking {
            dies_per_wafer: 100,
            wafer_area: 1000.0,
            policy: PackingPolicy::Flexible,
        };
        l.litho_percent = 0.0;
        assert!((l.cost_per_die(&packing, 0.5) - 10.0).abs() < 1e-12);
        l.litho_percent = 0.4;
        assert!((l.cost_per_die(&packing, 1.0) - 10.0).abs() < 1e-12);
        assert!((l.cost_per_die(&packing, 0.5) - (6.0 + 8.0)).abs() < 1e-12);
    }

    #[test]
    fn fabricate_combines_layers() {
        let w = wafer("w", false);
        let a = Arc::new(layer("a", 0.05));
        let b = Arc::new(layer("b", 0.01));
        let stackup = vec![
            StackupLayer {
                count: 1,
                layer: a.clone(),
            },
            StackupLayer {
                count: 3,
                layer: b.clone(),
            },
        ];
        let packing = crate::wafer::pack(50.0, 1.0, &w).unwrap();
        let fab = fabricate(&stackup, 50.0, 1.0, &w, &packing);
        let expected =
            w.wafer_process_yield * a.defect_yield(50.0) * b.defect_yield(50.0).powi(3);
        assert!((fab.yield_ - expected).abs() < 1e-12);
        let cost = a.cost_per_die(&packing, fab.reticle_utilization)
            + 3.0 * b.cost_per_die(&packing, fab.reticle_utilization);
        assert!((fab.cost_per_die - cost).abs() < 1e-9);
        assert!((fab.good_dies - packing.dies_per_wafer as f64 * fab.yield_).abs() < 1e-9);
        assert!((fab.cost_per_good_die * fab.yield_ - fab.cost_per_die).abs() < 1e-9);
        assert!(fab.cost_per_good_die > fab.cost_per_die);
    }

    #[test]
    fn oversized_dies_pay_for_stitches() {
        let w = wafer("w", false);
        let a = Arc::new(layer("a", 0.0));
        let stackup = vec![StackupLayer {
            count: 2,
            layer: a.clone(),
        }];
        // 40 x 40 on a 26 x 33 reticle: one stitch across each axis
        let packing = crate::wafer::pack(1600.0, 1.0, &w).unwrap();
        let fab = fabricate(&stackup, 1600.0, 1.0, &w, &packing);
        assert_eq!(fab.stitches, 2);
        let expected = w.wafer_process_yield * a.stitching_yield.powi(4);
        assert!((fab.yield_ - expected).abs() < 1e-12);

        let packing = crate::wafer::pack(100.0, 1.0, &w).unwrap();
        let fab = fabricate(&stackup, 100.0, 1.0, &w, &packing);
        assert_eq!(fab.stitches, 0);
        assert!((fab.yield_ - w.wafer_process_yield).abs() < 1e-12);
    }

    #[test]
    fn routing_tracks() {
        let mut l = layer("m", 0.0);
        l.routing_layer_count = 2;
        l.routing_layer_pitch = 0.01;
        // 10 x 10 die: perimeter 40 mm, 4000 tracks per layer
        assert!((l.routing_tracks(100.0, 1.0) - 8000.0).abs() < 1e-6);
        l.routing_layer_pitch = 0.0;
        assert!(l.routing_tracks(100.0, 1.0).is_infinite());
    }
}
