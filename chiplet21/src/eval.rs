//!
//! # Chip-Tree Evaluation
//!
//! Post-order aggregation of area, yield, cost, NRE, and power over a resolved chip tree.
//!
//! Each die is fabricated, optionally self-tested, then has its children bonded onto it,
//! and the assembled stack optionally tested again.
//! Costs are carried as cost-per-passing-unit: every test divides the cost accumulated so far
//! by its pass rate, and every chip inherits the quality (post-test good fraction) of its children.
//!

// Crates.io
use serde::Serialize;

// Workspace Imports
use chiplet21utils::ErrorContext;

// Local Imports
use crate::assembly::{Assembly, Bond};
use crate::data::{Design, Netlist, Orientation, StackSide};
use crate::dft::TestOutcome;
use crate::error::{ChipError, ChipResult};
use crate::footprint::{pad_area, stacked_die_area, Placement};
use crate::layer::{fabricate, Fabrication};
use crate::library::Libraries;
use crate::nets::{resolve_nets, NetResolution};
use crate::nre::Nre;
use crate::tree::{build_tree, ChipNode};
use crate::wafer::{pack, WaferPacking};

/// # Pad Summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pads {
    /// Signal wires leaving this chip's subtree
    pub signals: u64,
    pub power: u64,
    pub test: u64,
    /// Pads of children passing through this chip toward its parent
    pub pass_through: u64,
    pub total: u64,
    pub tsvs: u64,
    /// Effective bonding pitch, mm
    pub pitch: f64,
}

/// # Per-Chip Evaluation Report
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    /// Footprint, mm^2
    pub area: f64,
    pub core_area: f64,
    pub io_area: f64,
    pub tsv_area: f64,
    pub pad_area: f64,
    pub stacked_area: f64,
    pub pads: Pads,
    pub packing: WaferPacking,
    pub fabrication: Fabrication,
    pub self_test: TestOutcome,
    pub assembly: Assembly,
    pub assembly_test: TestOutcome,
    /// Cost per die passing self test
    pub self_cost: f64,
    /// Good fraction of assembled units, before assembly test
    pub true_yield: f64,
    /// Good fraction of units passing every test
    pub quality: f64,
    /// Recurring cost per passing unit
    pub cost: f64,
    /// Recurring cost with every yield loss removed
    pub perfect_cost: f64,
    /// Carried NRE per unit, children included
    pub nre: f64,
    pub own_nre: Nre,
    pub total_cost: f64,
    pub scrap_cost: f64,
    pub non_scrap_cost: f64,
    /// Power of this chip alone, W
    pub own_power: f64,
    pub io_power: f64,
    /// Power of the subtree, W
    pub power: f64,
    pub children: Vec<NodeReport>,
}
impl NodeReport {
    /// Depth-first, pre-order iteration over this report and all its descendants
    pub fn iter(&self) -> impl Iterator<Item = &NodeReport> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
    /// Find the report for chip `name`
    pub fn find(&self, name: &str) -> Option<&NodeReport> {
        self.iter().find(|n| n.name == name)
    }
}

/// Evaluate the tree rooted at `root`, with net loads `nets`
pub fn evaluate(root: &ChipNode, nets: &NetResolution) -> ChipResult<NodeReport> {
    Evaluator {
        nets,
        ctx: Vec::new(),
    }
    .eval(root, None)
}

/// A chip's parent, as seen by its children
#[derive(Clone, Copy)]
struct Parent<'a> {
    node: &'a ChipNode,
    pitch: f64,
}

/// # Evaluator
struct Evaluator<'a> {
    nets: &'a NetResolution,
    ctx: Vec<ErrorContext>,
}
impl Evaluator<'_> {
    fn eval(&mut self, node: &ChipNode, parent: Option<Parent>) -> ChipResult<NodeReport> {
        self.ctx.push(ErrorContext::Chip(node.name.clone()));
        let pitch = self.bonding_pitch(node, parent);
        let children = node
            .children
            .iter()
            .map(|c| self.eval(c, Some(Parent { node, pitch })))
            .collect::<Result<Vec<_>, _>>()?;

        // Power, and the pads it and our signals require
        let load = self.nets.load(&node.name);
        let own_power = node.black_box.power.or(node.power + load.io_power);
        let power = own_power + children.iter().map(|c| c.power).sum::<f64>();
        let pads = self.pads(node, &children, power, pitch);

        // Footprint
        let tsv_area = node.assembly.tsv_area * pads.tsvs as f64;
        let pad_area = pad_area(pads.total, pads.pitch, node.aspect_ratio);
        let placements: Vec<Placement> = node
            .children
            .iter()
            .zip(children.iter())
            .map(|(c, r)| Placement {
                area: r.area,
                aspect_ratio: c.aspect_ratio,
                location: c.location,
                side: c.stack_side,
                buried: c.buried,
            })
            .collect();
        let stacked_area = stacked_die_area(&placements, &node.assembly);
        let computed = (node.core_area + load.io_area + tsv_area)
            .max(pad_area)
            .max(stacked_area);
        let area = node.black_box.area.or(computed);
        if !(area > 0.0) {
            return Err(self.geometry(format!(
                "Chip `{}` has non-positive area {}",
                node.name, area
            )));
        }
        if let Some(parent) = parent {
            self.check_routing(node, parent.node, area, pads.signals + pads.test);
        }

        // Fabrication and self test
        let packing = pack(area, node.aspect_ratio, &node.wafer).map_err(|e| self.geometry(e))?;
        let fabrication = fabricate(
            &node.stackup,
            area,
            node.aspect_ratio,
            &node.wafer,
            &packing,
        );
        let self_test = node.test.self_test(node, fabrication.yield_);
        self.check_pass_rate("self", &self_test)?;
        let self_quality = node.black_box.quality.or(self_test.quality);
        let perfect_self_cost = node
            .black_box
            .cost
            .or(fabrication.cost_per_die + self_test.cost);
        let self_cost = node
            .black_box
            .cost
            .or(perfect_self_cost / self_test.pass_rate);

        // Assembly and assembly test
        let bonds: Vec<Bond> = children
            .iter()
            .map(|c| Bond {
                area: c.area,
                tsvs: c.pads.tsvs,
            })
            .collect();
        let assembly = node.assembly.assemble(&bonds);
        let true_yield =
            self_quality * children.iter().map(|c| c.quality).product::<f64>() * assembly.yield_;
        let assembly_test = match children.is_empty() {
            true => TestOutcome::untested(true_yield),
            false => node.test.assembly_test(node, true_yield),
        };
        self.check_pass_rate("assembly", &assembly_test)?;

        // Cost roll-up
        let child_cost: f64 = children.iter().map(|c| c.cost).sum();
        let child_perfect: f64 = children.iter().map(|c| c.perfect_cost).sum();
        let recurring = self_cost + child_cost + assembly.cost + assembly_test.cost;
        let cost = recurring / assembly_test.pass_rate;
        let perfect_cost = perfect_self_cost + child_perfect + assembly.cost + assembly_test.cost;
        let own_nre = Nre::of(node);
        let nre = own_nre.per_unit(node.quantity) + children.iter().map(|c| c.nre).sum::<f64>();
        let total_cost = cost + nre;

        log::debug!(
            "{}: area {:.3} mm^2, quality {:.5}, cost {:.4}, nre {:.4}, power {:.3} W",
            node.name,
            area,
            assembly_test.quality,
            cost,
            nre,
            power
        );
        self.ctx.pop();
        Ok(NodeReport {
            name: node.name.clone(),
            area,
            core_area: node.core_area,
            io_area: load.io_area,
            tsv_area,
            pad_area,
            stacked_area,
            pads,
            packing,
            fabrication,
            self_test,
            assembly,
            assembly_test,
            self_cost,
            true_yield,
            quality: assembly_test.quality,
            cost,
            perfect_cost,
            nre,
            own_nre,
            total_cost,
            scrap_cost: cost - perfect_cost,
            non_scrap_cost: perfect_cost + nre,
            own_power,
            io_power: load.io_power,
            power,
            children,
        })
    }
    /// Effective bonding pitch of `node`: the coarsest of its own pitch, its parent's,
    /// and the TSV pitches of any TSVs its pads pass through.
    fn bonding_pitch(&self, node: &ChipNode, parent: Option<Parent>) -> f64 {
        let own = node.assembly.bonding_pitch;
        let mut pitch = match parent {
            None => return own,
            Some(p) => p.pitch.max(own),
        };
        if let Some(p) = parent {
            if node.stack_side == StackSide::Back {
                pitch = pitch.max(p.node.assembly.tsv_pitch);
            }
        }
        if node.orientation == Orientation::FaceUp {
            pitch = pitch.max(node.assembly.tsv_pitch);
        }
        pitch
    }
    /// Pad and TSV counts of `node`, given its evaluated `children` and total `power`
    fn pads(&self, node: &ChipNode, children: &[NodeReport], power: f64, pitch: f64) -> Pads {
        let signals = self.nets.external_signals(node);
        let power_pads = node.assembly.power_pads(power, node.core_voltage);
        let test = node.test.num_test_ios();
        let pads_on = |side: StackSide| -> u64 {
            node.children
                .iter()
                .zip(children.iter())
                .filter(|(c, _)| c.stack_side == side)
                .map(|(_, r)| r.pads.total)
                .sum()
        };
        let pass_through = pads_on(node.parent_facing_side());
        let total = signals + power_pads + test + pass_through;
        let tsvs = match node.orientation {
            Orientation::FaceUp => total,
            Orientation::FaceDown => pads_on(StackSide::Back),
        };
        Pads {
            signals,
            power: power_pads,
            test,
            pass_through,
            total,
            tsvs,
            pitch,
        }
    }
    /// Warn when `parent`'s routing layers cannot escape the `needed` wires of a die of `area`
    fn check_routing(&self, node: &ChipNode, parent: &ChipNode, area: f64, needed: u64) {
        let tracks: f64 = parent
            .stackup
            .iter()
            .map(|e| e.count as f64 * e.layer.routing_tracks(area, node.aspect_ratio))
            .sum();
        if tracks < needed as f64 {
            log::warn!(
                "Routing congestion: `{}` needs {} escape tracks beneath `{}`, which provides {:.0}",
                node.name,
                needed,
                parent.name,
                tracks
            );
        }
    }
    fn check_pass_rate(&self, phase: &str, outcome: &TestOutcome) -> ChipResult<()> {
        if outcome.pass_rate > 0.0 {
            return Ok(());
        }
        Err(ChipError::Evaluation {
            message: format!("No units pass {} test", phase),
            stack: self.ctx.clone(),
        })
    }
    fn geometry(&self, message: impl Into<String>) -> ChipError {
        ChipError::Geometry {
            message: message.into(),
            stack: self.ctx.clone(),
        }
    }
}

/// # System-Level Result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemResult {
    /// mm^2
    pub area: f64,
    #[serde(rename = "yield")]
    pub yield_: f64,
    /// Per-unit cost, NRE included
    pub cost: f64,
    /// W
    pub power: f64,
}

/// # Scrap / Non-Scrap Split of Total Cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub scrap_cost: f64,
    pub non_scrap_cost: f64,
    /// Fabrication cost per good die, summed over every chip in the system
    pub good_die_cost: f64,
}

/// # Evaluation
/// A resolved design and netlist, and the report they evaluate to.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub root: ChipNode,
    pub nets: NetResolution,
    pub report: NodeReport,
}
impl Evaluation {
    /// Resolve `design` and `netlist` against `libs`, and evaluate them
    pub fn run(design: &Design, netlist: &Netlist, libs: &Libraries) -> ChipResult<Self> {
        let root = build_tree(design, libs)?;
        let nets = resolve_nets(netlist, &root, libs)?;
        let report = evaluate(&root, &nets)?;
        let rv = Self { root, nets, report };
        let sys = rv.system();
        log::info!(
            "Evaluated `{}`: area {:.3} mm^2, yield {:.5}, cost {:.4}, power {:.3} W",
            rv.report.name,
            sys.area,
            sys.yield_,
            sys.cost,
            sys.power
        );
        Ok(rv)
    }
    pub fn system(&self) -> SystemResult {
        SystemResult {
            area: self.report.area,
            yield_: self.report.quality,
            cost: self.report.total_cost,
            power: self.report.power,
        }
    }
    pub fn breakdown(&self) -> CostBreakdown {
        CostBreakdown {
            scrap_cost: self.report.scrap_cost,
            non_scrap_cost: self.report.non_scrap_cost,
            good_die_cost: self
                .report
                .iter()
                .map(|r| r.fabrication.cost_per_good_die)
                .sum(),
        }
    }
}
