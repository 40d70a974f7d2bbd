//!
//! # Parameter Sweeps
//!
//! Re-evaluation of a design across production quantities,
//! and one-at-a-time sensitivity of total cost to every numeric input.
//!

// Std-Lib
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// Crates.io
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// Local Imports
use crate::data::{Design, Netlist};
use crate::error::ChipResult;
use crate::eval::Evaluation;
use crate::library::Libraries;

/// # Quantity Sweep Point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantityPoint {
    pub quantity: u64,
    /// Recurring cost per unit
    pub cost: f64,
    /// NRE per unit
    pub nre: f64,
    pub total_cost: f64,
}

/// Evaluate `design` with every chip's quantity set to each of `quantities`
pub fn sweep_quantity(
    design: &Design,
    netlist: &Netlist,
    libs: &Libraries,
    quantities: &[u64],
) -> ChipResult<Vec<QuantityPoint>> {
    quantities
        .par_iter()
        .map(|&quantity| {
            let mut design = design.clone();
            design.visit_mut(&mut |chip| chip.quantity = quantity as i64);
            let report = Evaluation::run(&design, netlist, libs)?.report;
            Ok(QuantityPoint {
                quantity,
                cost: report.cost,
                nre: report.nre,
                total_cost: report.total_cost,
            })
        })
        .collect()
}

/// # Sensitivity Target
/// The record, chip, or net a perturbation modifies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    WaferProcess(String),
    Layer(String),
    AssemblyProcess(String),
    TestProcess(String),
    Io(String),
    Chip(String),
    Net(usize),
}
impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::WaferProcess(n) => write!(f, "wafer_processes/{}", n),
            Self::Layer(n) => write!(f, "layers/{}", n),
            Self::AssemblyProcess(n) => write!(f, "assembly_processes/{}", n),
            Self::TestProcess(n) => write!(f, "test_processes/{}", n),
            Self::Io(n) => write!(f, "ios/{}", n),
            Self::Chip(n) => write!(f, "chips/{}", n),
            Self::Net(i) => write!(f, "nets/{}", i),
        }
    }
}

/// # Sensitivity of Total Cost to a Single Parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensitivity {
    pub target: Target,
    /// JSON pointer to the parameter, within its target's serialized form
    pub field: String,
    pub base: f64,
    pub perturbed: f64,
    /// Total cost, perturbed
    pub cost: f64,
    /// Relative change in total cost
    pub change: f64,
}

/// Fields restricted to [0, 1]
const UNIT_FIELDS: [&str; 15] = [
    "fraction_memory",
    "fraction_logic",
    "fraction_analog",
    "reticle_share",
    "bb_quality",
    "critical_area_ratio",
    "litho_percent",
    "stitching_yield",
    "machine_uptime",
    "alignment_yield",
    "bonding_yield",
    "tsv_yield",
    "wafer_process_yield",
    "defect_coverage",
    "average_bandwidth_utilization",
];
/// Fields no less than one
const COUNT_FIELDS: [&str; 4] = ["group", "samples_per_input", "test_reuse", "quantity"];

/// Range a perturbed `field` must remain within
fn bounds(field: &str) -> (f64, f64) {
    if UNIT_FIELDS.contains(&field) {
        (0.0, 1.0)
    } else if COUNT_FIELDS.contains(&field) {
        (1.0, f64::INFINITY)
    } else if field == "x_location" || field == "y_location" {
        (f64::NEG_INFINITY, f64::INFINITY)
    } else {
        (0.0, f64::INFINITY)
    }
}

/// A numeric leaf of a serialized record
struct Leaf {
    pointer: String,
    field: String,
    value: f64,
    integer: bool,
}

/// Collect every numeric leaf of `value`, at or below `pointer`.
/// Keys in `skip` are not descended into.
fn leaves(value: &Value, pointer: &str, field: &str, skip: &[&str], out: &mut Vec<Leaf>) {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                out.push(Leaf {
                    pointer: pointer.to_string(),
                    field: field.to_string(),
                    value: v,
                    integer: n.is_i64() || n.is_u64(),
                })
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter().filter(|(k, _)| !skip.contains(&k.as_str())) {
                leaves(v, &format!("{}/{}", pointer, k), k, skip, out);
            }
        }
        Value::Array(list) => {
            // Array elements take the name of their enclosing field
            for (i, v) in list.iter().enumerate() {
                leaves(v, &format!("{}/{}", pointer, i), field, skip, out);
            }
        }
        _ => (),
    }
}

/// # Perturbation
/// A single parameter of a single target, moved to a new value.
struct Perturbation {
    target: Target,
    /// JSON pointer within the target
    field: String,
    /// JSON pointer within the whole design, for chips
    pointer: String,
    base: f64,
    value: Value,
}

/// # Perturbation Planner
struct Planner<'a> {
    design: &'a Design,
    netlist: &'a Netlist,
    libs: &'a Libraries,
    percent: f64,
    plan: Vec<Perturbation>,
}
impl Planner<'_> {
    /// Perturb `leaf` by our percentage, if that changes it and keeps it in bounds
    fn perturb(&mut self, target: &Target, pointer: &str, leaf: Leaf) {
        let (lo, hi) = bounds(&leaf.field);
        let (perturbed, value) = match leaf.integer {
            true => {
                let mut step = (leaf.value * self.percent / 100.0).round();
                if step == 0.0 {
                    step = self.percent.signum();
                }
                let v = leaf.value + step;
                (v, Value::from(v as i64))
            }
            false => {
                let v = leaf.value * (1.0 + self.percent / 100.0);
                (v, Value::from(v))
            }
        };
        if perturbed == leaf.value || perturbed < lo || perturbed > hi {
            return;
        }
        self.plan.push(Perturbation {
            target: target.clone(),
            field: leaf.pointer[pointer.len()..].to_string(),
            pointer: leaf.pointer,
            base: leaf.value,
            value,
        });
    }
    /// Plan perturbations of every numeric field of library record `record`
    fn record<T: Serialize>(&mut self, target: Target, record: &T) -> ChipResult<()> {
        let mut found = Vec::new();
        leaves(&serde_json::to_value(record)?, "", "", &[], &mut found);
        for leaf in found {
            self.perturb(&target, "", leaf);
        }
        Ok(())
    }
    /// Plan perturbations of every library record referenced by `eval`, every chip, and every net
    fn plan(mut self, eval: &Evaluation) -> ChipResult<Vec<Perturbation>> {
        let mut referenced = BTreeSet::new();
        for node in eval.root.iter() {
            referenced.insert(Target::WaferProcess(node.wafer.name.clone()));
            referenced.insert(Target::AssemblyProcess(node.assembly.name.clone()));
            referenced.insert(Target::TestProcess(node.test.name.clone()));
            for e in node.stackup.iter() {
                referenced.insert(Target::Layer(e.layer.name.clone()));
            }
        }
        for net in eval.nets.nets.iter() {
            referenced.insert(Target::Io(net.io.name.clone()));
        }
        let libs = self.libs;
        for target in referenced {
            let t = target.clone();
            match &target {
                Target::WaferProcess(n) => self.record(t, libs.wafer_processes[n].as_ref())?,
                Target::Layer(n) => self.record(t, libs.layers[n].as_ref())?,
                Target::AssemblyProcess(n) => self.record(t, libs.assembly_processes[n].as_ref())?,
                Target::TestProcess(n) => self.record(t, libs.test_processes[n].as_ref())?,
                Target::Io(n) => self.record(t, libs.ios[n].as_ref())?,
                Target::Chip(_) | Target::Net(_) => (),
            }
        }
        let design = serde_json::to_value(self.design)?;
        self.chip(&design, "")?;
        let netlist = self.netlist;
        for (idx, net) in netlist.nets.iter().enumerate() {
            self.record(Target::Net(idx), net)?;
        }
        Ok(self.plan)
    }
    /// Plan perturbations of the chip serialized as `value` at `pointer`, and its children
    fn chip(&mut self, value: &Value, pointer: &str) -> ChipResult<()> {
        let name = value["name"].as_str().unwrap_or_default().to_string();
        let target = Target::Chip(name);
        let mut found = Vec::new();
        leaves(value, pointer, "", &["chips"], &mut found);
        for leaf in found {
            self.perturb(&target, pointer, leaf);
        }
        if let Some(chips) = value["chips"].as_array() {
            for (i, c) in chips.iter().enumerate() {
                self.chip(c, &format!("{}/chips/{}", pointer, i))?;
            }
        }
        Ok(())
    }
}

/// Replace the field at `pointer` of the record named `name` in `map`
fn replace<T: Serialize + DeserializeOwned>(
    map: &mut HashMap<String, Arc<T>>,
    name: &str,
    pointer: &str,
    value: &Value,
) -> ChipResult<()> {
    let mut record = match map.get(name) {
        Some(r) => serde_json::to_value(r.as_ref())?,
        None => return Err(format!("Unknown library record `{}`", name).into()),
    };
    set(&mut record, pointer, value)?;
    map.insert(name.to_string(), Arc::new(serde_json::from_value(record)?));
    Ok(())
}

/// Set the leaf at `pointer` within `root` to `value`
fn set(root: &mut Value, pointer: &str, value: &Value) -> ChipResult<()> {
    match root.pointer_mut(pointer) {
        Some(leaf) => {
            *leaf = value.clone();
            Ok(())
        }
        None => Err(format!("Invalid parameter pointer `{}`", pointer).into()),
    }
}

impl Perturbation {
    /// Evaluate the perturbed inputs, returning their total cost
    fn evaluate(&self, design: &Value, netlist: &Netlist, libs: &Libraries) -> ChipResult<f64> {
        let mut libs = libs.clone();
        let mut netlist = netlist.clone();
        let mut design = design.clone();
        let p = &self.field;
        match &self.target {
            Target::WaferProcess(n) => replace(&mut libs.wafer_processes, n, p, &self.value)?,
            Target::Layer(n) => replace(&mut libs.layers, n, p, &self.value)?,
            Target::AssemblyProcess(n) => {
                replace(&mut libs.assembly_processes, n, p, &self.value)?
            }
            Target::TestProcess(n) => replace(&mut libs.test_processes, n, p, &self.value)?,
            Target::Io(n) => replace(&mut libs.ios, n, p, &self.value)?,
            Target::Chip(_) => set(&mut design, &self.pointer, &self.value)?,
            Target::Net(idx) => {
                let mut net = serde_json::to_value(&netlist.nets[*idx])?;
                set(&mut net, p, &self.value)?;
                netlist.nets[*idx] = serde_json::from_value(net)?;
            }
        }
        let design: Design = serde_json::from_value(design)?;
        Ok(Evaluation::run(&design, &netlist, &libs)?.system().cost)
    }
}

///
/// Sensitivity of total cost to every numeric parameter of `design`, `netlist`,
/// and the library records they reference, each perturbed by `percent`.
///
/// Integer parameters move by at least one. Perturbations which would leave a parameter's
/// valid range are skipped, as are those whose evaluation fails (with a warning).
/// Perturbations are evaluated in parallel.
///
pub fn sensitivity(
    design: &Design,
    netlist: &Netlist,
    libs: &Libraries,
    percent: f64,
) -> ChipResult<Vec<Sensitivity>> {
    if percent == 0.0 {
        return Ok(Vec::new());
    }
    let eval = Evaluation::run(design, netlist, libs)?;
    let base = eval.system().cost;
    let plan = Planner {
        design,
        netlist,
        libs,
        percent,
        plan: Vec::new(),
    }
    .plan(&eval)?;
    log::info!("Evaluating {} perturbations of {}%", plan.len(), percent);
    let design = serde_json::to_value(design)?;
    let rv = plan
        .par_iter()
        .filter_map(|p| match p.evaluate(&design, netlist, libs) {
            Ok(cost) => Some(Sensitivity {
                target: p.target.clone(),
                field: p.field.clone(),
                base: p.base,
                perturbed: p.value.as_f64().unwrap_or(p.base),
                cost,
                change: (cost - base) / base,
            }),
            Err(e) => {
                log::warn!("Skipping {}{}: {}", p.target, p.field, e);
                None
            }
        })
        .collect();
    Ok(rv)
}
