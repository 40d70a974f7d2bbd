//!
//! # Stacked-Chiplet Design Generator
//!
//! Generates a design of `N` equal chiplets stacked vertically upon an interposer,
//! connected by a square mesh of nets, plus off-package nets on the mesh perimeter.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local Imports
use crate::data::{
    ChipRecord, Design, NetRecord, Netlist, Orientation, Override, StackSide, StackupRecord,
    EXTERNAL,
};

/// # Generator Options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackGenOptions {
    pub chiplets: usize,
    /// IO type of every net
    pub io_type: String,
    /// Whether `io_type` is bidirectional.
    /// Directional types get a net in each direction between neighbours.
    pub bidirectional: bool,
    /// Off-package bandwidth, summed over the perimeter
    pub external_bandwidth: f64,
    /// Core area summed over all chiplets, mm^2
    pub total_area: f64,
    /// Power summed over all chiplets, W
    pub total_power: f64,
    pub logic_fraction: f64,
    /// Quantity of systems. Each chiplet is produced this many times over per system.
    pub quantity: u64,
    pub wafer_process: String,
    pub assembly_process: String,
    pub test_process: String,
    pub interposer_test_process: String,
    pub chiplet_stackup: String,
    pub interposer_stackup: String,
}
impl Default for StackGenOptions {
    fn default() -> Self {
        Self {
            chiplets: 4,
            io_type: "ucie_standard".into(),
            bidirectional: true,
            external_bandwidth: 1600.0,
            total_area: 800.0,
            total_power: 100.0,
            logic_fraction: 1.0,
            quantity: 10_000_000,
            wafer_process: "process_300mm".into(),
            assembly_process: "silicon_individual_bonding".into(),
            test_process: "kgd_test".into(),
            interposer_test_process: "no_test".into(),
            chiplet_stackup: "1:active_7nm,8:metal_7nm".into(),
            interposer_stackup: "1:interposer_silicon".into(),
        }
    }
}

/// A chip with the common fields of every generated chip
fn chip(name: String, opts: &StackGenOptions) -> ChipRecord {
    ChipRecord {
        name,
        bb_area: Override::Computed,
        bb_cost: Override::Computed,
        bb_quality: Override::Computed,
        bb_power: Override::Computed,
        aspect_ratio: Override::Computed,
        x_location: Override::Computed,
        y_location: Override::Computed,
        orientation: Orientation::FaceDown,
        stack_side: StackSide::Face,
        core_area: 0.0,
        fraction_memory: 0.0,
        fraction_logic: 0.0,
        fraction_analog: 0.0,
        gate_flop_ratio: 1.0,
        reticle_share: 1.0,
        buried: false,
        assembly_process: opts.assembly_process.clone(),
        test_process: opts.test_process.clone(),
        wafer_process: opts.wafer_process.clone(),
        stackup: StackupRecord::Text(opts.chiplet_stackup.clone()),
        core_voltage: 1.0,
        power: 0.0,
        quantity: 0,
        chips: Vec::new(),
    }
}

fn chiplet_name(i: usize) -> String {
    format!("chiplet_{}", i)
}

/// Generate the design and netlist described by `opts`
pub fn generate_stack(opts: &StackGenOptions) -> (Design, Netlist) {
    let n = opts.chiplets;

    // Build the stack from the top down, each chiplet carried on the back of the one before
    let mut stack: Option<ChipRecord> = None;
    for i in (0..n).rev() {
        let mut c = chip(chiplet_name(i), opts);
        c.stack_side = match i {
            0 => StackSide::Face,
            _ => StackSide::Back,
        };
        c.core_area = opts.total_area / n as f64;
        c.fraction_logic = opts.logic_fraction;
        c.power = opts.total_power / n as f64;
        c.quantity = (opts.quantity * n as u64) as i64;
        c.chips = stack.take().into_iter().collect();
        stack = Some(c);
    }
    let mut root = chip("interposer".into(), opts);
    root.orientation = Orientation::FaceUp;
    root.fraction_analog = 1.0;
    root.test_process = opts.interposer_test_process.clone();
    root.stackup = StackupRecord::Text(opts.interposer_stackup.clone());
    root.quantity = opts.quantity as i64;
    root.chips = stack.into_iter().collect();

    (root, mesh(opts))
}

/// Nets of the chiplet mesh, and from its perimeter off-package
fn mesh(opts: &StackGenOptions) -> Netlist {
    let n = opts.chiplets;
    let mut nets = Vec::new();
    if n == 0 {
        return Netlist { nets };
    }
    let side = (n as f64).sqrt().ceil() as usize;
    let rows = (n + side - 1) / side;
    let edge_bandwidth = opts.external_bandwidth / ((n as f64).sqrt() * 4.0);
    let net = |b0: String, b1: String, bandwidth: f64| NetRecord {
        io_type: opts.io_type.clone(),
        block0: b0,
        block1: b1,
        bb_count: Override::Computed,
        bandwidth,
        average_bandwidth_utilization: 0.5,
    };

    for i in 0..n {
        let (row, col) = (i / side, i % side);
        let row_edge = row == 0 || row == rows - 1;
        let col_edge = col == 0 || col == side - 1;
        let external = match (row_edge, col_edge) {
            (true, true) => 2.0 * edge_bandwidth,
            (true, false) | (false, true) => edge_bandwidth,
            (false, false) => 0.0,
        };
        if external > 0.0 {
            nets.push(net(chiplet_name(i), EXTERNAL.into(), external));
            nets.push(net(EXTERNAL.into(), chiplet_name(i), external));
        }
    }
    for i in 0..n {
        let col = i % side;
        let mut neighbour =
            |j: usize| nets.push(net(chiplet_name(i), chiplet_name(j), edge_bandwidth));
        if col + 1 < side && i + 1 < n {
            neighbour(i + 1);
        }
        if i >= side {
            neighbour(i - side);
        }
        if !opts.bidirectional {
            if col > 0 {
                neighbour(i - 1);
            }
            if i + side < n {
                neighbour(i + side);
            }
        }
    }
    Netlist { nets }
}
