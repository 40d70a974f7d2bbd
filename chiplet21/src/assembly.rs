//!
//! # Assembly Model
//!
//! Machine rates, and the cost and yield of bonding dies onto a parent.
//! The parent's assembly process governs every die bonded onto it.
//!

// Std-Lib
use std::f64::consts::PI;

// Crates.io
use serde::Serialize;

// Local Imports
use crate::library::{AssemblyProcess, AssemblyStep};

pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

impl AssemblyStep {
    /// Machine depreciation plus technician cost, $/s of machine time
    pub fn rate(&self) -> f64 {
        let in_use = SECONDS_PER_YEAR * self.machine_uptime;
        let machine = match self.machine_cost {
            c if c == 0.0 => 0.0,
            c => c / (self.machine_lifetime * in_use),
        };
        let technician = match self.technician_yearly_cost {
            c if c == 0.0 => 0.0,
            c => c / in_use,
        };
        machine + technician
    }
    /// Cost of this step, per die
    pub fn cost_per_die(&self, rate: f64) -> f64 {
        self.time / self.group as f64 * rate
    }
}

/// A die being bonded onto its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    /// Footprint of the bonded die, mm^2
    pub area: f64,
    /// Through-silicon vias exercised by the bond
    pub tsvs: u64,
}

/// # Assembly Result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assembly {
    pub cost: f64,
    #[serde(rename = "yield")]
    pub yield_: f64,
}
impl Default for Assembly {
    fn default() -> Self {
        Self {
            cost: 0.0,
            yield_: 1.0,
        }
    }
}

impl AssemblyProcess {
    pub fn picknplace_rate(&self) -> f64 {
        self.bb_cost_per_second.or(self.picknplace.rate())
    }
    pub fn bonding_rate(&self) -> f64 {
        self.bb_cost_per_second.or(self.bonding.rate())
    }
    /// Machine cost of placing and bonding one die
    pub fn machine_cost_per_die(&self) -> f64 {
        self.picknplace.cost_per_die(self.picknplace_rate())
            + self.bonding.cost_per_die(self.bonding_rate())
    }
    /// Probability that bonding `bond` succeeds
    pub fn bond_yield(&self, bond: &Bond) -> f64 {
        let dielectric = (1.0 - self.dielectric_bond_defect_density * bond.area).clamp(0.0, 1.0);
        self.alignment_yield
            * self.bonding_yield
            * self.tsv_yield.powf(bond.tsvs as f64)
            * dielectric
    }
    /// Cost and yield of bonding every one of `bonds` onto a single parent
    pub fn assemble(&self, bonds: &[Bond]) -> Assembly {
        if bonds.is_empty() {
            return Assembly::default();
        }
        let area: f64 = bonds.iter().map(|b| b.area).sum();
        let cost = bonds.len() as f64 * self.machine_cost_per_die()
            + self.materials_cost_per_mm2 * area;
        let yield_ = bonds.iter().map(|b| self.bond_yield(b)).product();
        Assembly { cost, yield_ }
    }
    /// Power delivered by a single pad at `voltage`, W
    pub fn power_per_pad(&self, voltage: f64) -> f64 {
        let radius = self.bonding_pitch / 4.0;
        self.max_pad_current_density * PI * radius * radius * voltage
    }
    /// Power and ground pads needed to deliver `power` at `voltage`.
    /// None when either the voltage or the per-pad power is zero.
    pub fn power_pads(&self, power: f64, voltage: f64) -> u64 {
        let per_pad = self.power_per_pad(voltage);
        match voltage == 0.0 || per_pad == 0.0 {
            true => 0,
            false => 2 * (power / per_pad).ceil() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{assembly_process, dummy_assembly};

    #[test]
    fn machine_rates() {
        let mut step = assembly_process("a").bonding;
        step.machine_cost = SECONDS_PER_YEAR * 5.0;
        step.machine_lifetime = 5.0;
        step.machine_uptime = 0.5;
        step.technician_yearly_cost = SECONDS_PER_YEAR;
        // $1/s of depreciation and $1/s of technician, each over half the hours
        assert!((step.rate() - 4.0).abs() < 1e-12);

        step.machine_cost = 0.0;
        step.technician_yearly_cost = 0.0;
        step.machine_uptime = 0.0;
        assert_eq!(step.rate(), 0.0);
    }

    #[test]
    fn black_box_rate_overrides() {
        let mut p = assembly_process("a");
        p.bb_cost_per_second = crate::data::Override::Fixed(2.0);
        assert_eq!(p.picknplace_rate(), 2.0);
        assert_eq!(p.bonding_rate(), 2.0);
        let expected = p.picknplace.time / p.picknplace.group as f64 * 2.0
            + p.bonding.time / p.bonding.group as f64 * 2.0;
        assert!((p.machine_cost_per_die() - expected).abs() < 1e-12);
    }

    #[test]
    fn bond_yields() {
        let mut p = assembly_process("a");
        p.alignment_yield = 0.99;
        p.bonding_yield = 0.98;
        p.tsv_yield = 0.9999;
        p.dielectric_bond_defect_density = 0.001;
        let bond = Bond {
            area: 100.0,
            tsvs: 1000,
        };
        let expected = 0.99 * 0.98 * 0.9999f64.powf(1000.0) * 0.9;
        assert!((p.bond_yield(&bond) - expected).abs() < 1e-12);
        // Dielectric defects beyond the bonded area clamp to zero
        p.dielectric_bond_defect_density = 1.0;
        assert_eq!(p.bond_yield(&bond), 0.0);
    }

    #[test]
    fn dummy_process_is_free_and_perfect() {
        let p = dummy_assembly();
        let bonds = [
            Bond {
                area: 10.0,
                tsvs: 100,
            },
            Bond {
                area: 80.0,
                tsvs: 0,
            },
        ];
        let a = p.assemble(&bonds);
        assert_eq!(a.cost, 0.0);
        assert_eq!(a.yield_, 1.0);
        assert_eq!(p.assemble(&[]), Assembly::default());
    }

    #[test]
    fn assembly_cost_scales_with_dies() {
        let p = assembly_process("a");
        let one = p.assemble(&[Bond {
            area: 10.0,
            tsvs: 0,
        }]);
        let two = p.assemble(&[
            Bond {
                area: 10.0,
                tsvs: 0,
            },
            Bond {
                area: 10.0,
                tsvs: 0,
            },
        ]);
        assert!((two.cost - 2.0 * one.cost).abs() < 1e-9);
        assert!((two.yield_ - one.yield_ * one.yield_).abs() < 1e-12);
    }

    #[test]
    fn pad_power() {
        let mut p = assembly_process("a");
        p.bonding_pitch = 0.04;
        p.max_pad_current_density = 1000.0;
        // 10 um radius pads at 1V
        let expected = 1000.0 * PI * 0.01 * 0.01;
        assert!((p.power_per_pad(1.0) - expected).abs() < 1e-12);
        assert!((p.power_per_pad(0.5) - expected / 2.0).abs() < 1e-12);
    }

    #[test]
    fn power_pads_round_up_in_pairs() {
        let mut p = assembly_process("a");
        p.bonding_pitch = 0.04;
        p.max_pad_current_density = 1000.0;
        let per_pad = p.power_per_pad(1.0);
        // Exactly four pads' worth: one power and one ground pad each
        assert_eq!(p.power_pads(4.0 * per_pad, 1.0), 8);
        assert_eq!(p.power_pads(4.0 * per_pad * 1.001, 1.0), 10);
        assert_eq!(p.power_pads(0.5 * per_pad, 1.0), 2);
        assert_eq!(p.power_pads(0.0, 1.0), 0);
        assert_eq!(p.power_pads(10.0, 0.0), 0);
        p.max_pad_current_density = 0.0;
        assert_eq!(p.power_pads(10.0, 1.0), 0);
    }
}
