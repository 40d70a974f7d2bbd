//!
//! # NRE Model
//!
//! One-time design and mask costs, amortized over a chip's own production quantity.
//!

// Crates.io
use serde::Serialize;

// Local Imports
use crate::library::WaferProcess;
use crate::tree::{ChipNode, Fractions};

impl WaferProcess {
    /// Front- plus back-end design cost per mm^2 of core, for a core split by `fractions`
    pub fn design_cost_per_mm2(&self, fractions: &Fractions) -> f64 {
        fractions.memory
            * (self.nre_front_end_cost_per_mm2_memory + self.nre_back_end_cost_per_mm2_memory)
            + fractions.logic
                * (self.nre_front_end_cost_per_mm2_logic + self.nre_back_end_cost_per_mm2_logic)
            + fractions.analog
                * (self.nre_front_end_cost_per_mm2_analog + self.nre_back_end_cost_per_mm2_analog)
    }
}

/// # Non-Recurring Engineering Cost
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Nre {
    pub design: f64,
    /// This chip's share of its mask set
    pub mask: f64,
}
impl Nre {
    /// Design and mask NRE of `node` alone
    pub fn of(node: &ChipNode) -> Self {
        let design = node.core_area * node.wafer.design_cost_per_mm2(&node.fractions);
        let masks: f64 = node
            .stackup
            .iter()
            .map(|e| e.count as f64 * e.layer.nre_mask_cost)
            .sum();
        Self {
            design,
            mask: masks * node.reticle_share,
        }
    }
    pub fn total(&self) -> f64 {
        self.design + self.mask
    }
    /// Amortized over `quantity` units
    pub fn per_unit(&self, quantity: u64) -> f64 {
        self.total() / quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{demo_design, demo_libraries};
    use crate::tree::build_tree;

    #[test]
    fn design_cost_by_fraction() {
        let mut w = crate::tests::wafer("w", false);
        w.nre_front_end_cost_per_mm2_logic = 100.0;
        w.nre_back_end_cost_per_mm2_logic = 50.0;
        w.nre_front_end_cost_per_mm2_memory = 10.0;
        w.nre_back_end_cost_per_mm2_memory = 5.0;
        w.nre_front_end_cost_per_mm2_analog = 1000.0;
        w.nre_back_end_cost_per_mm2_analog = 0.0;
        let f = Fractions {
            memory: 0.5,
            logic: 0.25,
            analog: 0.25,
        };
        let expected = 0.5 * 15.0 + 0.25 * 150.0 + 0.25 * 1000.0;
        assert!((w.design_cost_per_mm2(&f) - expected).abs() < 1e-9);
    }

    #[test]
    fn amortization_is_monotone() -> crate::error::ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let cpu = root.find("cpu").unwrap();
        let nre = Nre::of(cpu);
        assert!(nre.design > 0.0 && nre.mask > 0.0);
        let mut last = f64::INFINITY;
        for &q in [1u64, 10, 1_000, 1_000_000, 1_000_000_000_000].iter() {
            let per_unit = nre.per_unit(q);
            assert!(per_unit <= last);
            last = per_unit;
        }
        assert!(last < 1e-3);
        Ok(())
    }

    #[test]
    fn reticle_share_splits_masks() -> crate::error::ChipResult<()> {
        let libs = demo_libraries()?;
        let mut root = build_tree(&demo_design()?, &libs)?;
        let full = Nre::of(&root.children[0]);
        root.children[0].reticle_share = 0.25;
        let shared = Nre::of(&root.children[0]);
        assert!((shared.mask - full.mask * 0.25).abs() < 1e-6);
        assert_eq!(shared.design, full.design);
        Ok(())
    }
}
