//!
//! # Test Model
//!
//! Scan-based test of a die alone ("self" test) or of an assembled stack ("assembly" test):
//! pattern counts, scan-chain lengths, tester time and cost,
//! and the pass-rate and post-test quality they produce.
//!

// Crates.io
use serde::Serialize;

// Local Imports
use crate::library::{TestPhase, TestProcess};
use crate::tree::ChipNode;

/// # Test Subject
/// The logic under test, for either a single die or a stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestSubject {
    /// Core area under test, mm^2
    pub area: f64,
    pub gates_per_mm2: f64,
    pub gate_flop_ratio: f64,
}
impl TestSubject {
    /// A die alone
    pub fn die(node: &ChipNode) -> Self {
        Self {
            area: node.core_area,
            gates_per_mm2: node.gates_per_mm2(),
            gate_flop_ratio: node.gate_flop_ratio,
        }
    }
    /// A die and everything stacked upon it, densities weighted by core area
    pub fn stack(node: &ChipNode) -> Self {
        let area = node.subtree_core_area();
        if area == 0.0 {
            return Self {
                area,
                ..Self::die(node)
            };
        }
        let (mut gates, mut gate_flop) = (0.0, 0.0);
        for n in node.iter() {
            gates += n.gates_per_mm2() * n.core_area;
            gate_flop += n.gate_flop_ratio * n.core_area;
        }
        Self {
            area,
            gates_per_mm2: gates / area,
            gate_flop_ratio: gate_flop / area,
        }
    }
    pub fn gates(&self) -> f64 {
        self.gates_per_mm2 * self.area
    }
    pub fn flops(&self) -> f64 {
        match self.gates() {
            g if g == 0.0 => 0.0,
            g => g / self.gate_flop_ratio,
        }
    }
}

/// # Test Outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestOutcome {
    pub enabled: bool,
    pub patterns: f64,
    pub scan_chain_length: f64,
    /// Tester seconds per unit
    pub time: f64,
    pub cost: f64,
    /// Fraction of units passing: the test yield
    pub pass_rate: f64,
    /// Probability a passing unit is good
    pub quality: f64,
}
impl TestOutcome {
    /// The outcome of not testing units of `true_yield`
    pub fn untested(true_yield: f64) -> Self {
        Self {
            enabled: false,
            patterns: 0.0,
            scan_chain_length: 0.0,
            time: 0.0,
            cost: 0.0,
            pass_rate: 1.0,
            quality: true_yield,
        }
    }
}

impl TestPhase {
    /// Pattern count: fixed, or exponential in logic depth (approximated by the gate/flop ratio)
    pub fn pattern_count(&self, subject: &TestSubject) -> f64 {
        self.bb_pattern_count
            .or(2f64.powf(1.5 * subject.gate_flop_ratio))
    }
    /// Flops per scan chain
    pub fn scan_chain_length(&self, subject: &TestSubject) -> f64 {
        match (self.bb_scan_chain_length.fixed(), self.num_scan_chains) {
            (Some(len), _) => len,
            (None, 0) => 0.0,
            (None, n) => subject.flops() / n as f64,
        }
    }
    /// Fraction of units of `true_yield` passing this test
    pub fn pass_rate(&self, true_yield: f64) -> f64 {
        1.0 - (1.0 - true_yield) * self.defect_coverage
    }
}

impl TestProcess {
    /// Run `phase` of this process on `subject`, of which a fraction `true_yield` is good
    pub fn run(&self, phase: &TestPhase, subject: &TestSubject, true_yield: f64) -> TestOutcome {
        if !phase.enabled {
            return TestOutcome::untested(true_yield);
        }
        let patterns = phase.pattern_count(subject);
        let scan_chain_length = phase.scan_chain_length(subject);
        let time = patterns * scan_chain_length * self.time_per_test_cycle
            / phase.test_reuse
            / self.samples_per_input;
        let pass_rate = phase.pass_rate(true_yield);
        let quality = match pass_rate {
            p if p == 0.0 => 0.0,
            p => (true_yield / p).min(1.0),
        };
        TestOutcome {
            enabled: true,
            patterns,
            scan_chain_length,
            time,
            cost: time * self.cost_per_second,
            pass_rate,
            quality,
        }
    }
    /// Test `node` alone, fabricated at `true_yield`
    pub fn self_test(&self, node: &ChipNode, true_yield: f64) -> TestOutcome {
        self.run(&self.self_test, &TestSubject::die(node), true_yield)
    }
    /// Test the stack rooted at `node`, assembled at `true_yield`
    pub fn assembly_test(&self, node: &ChipNode, true_yield: f64) -> TestOutcome {
        self.run(&self.assembly_test, &TestSubject::stack(node), true_yield)
    }
}
