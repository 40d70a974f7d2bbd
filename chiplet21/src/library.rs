//!
//! # Process Libraries
//!
//! Named, read-only process records: wafer processes, stackup layers, assembly processes,
//! test processes, and IO cell types. Each is range-checked as it is loaded,
//! then shared by reference-count among every chip which names it.
//!

// Std-Lib
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// Crates.io
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Workspace Imports
use chiplet21utils::{ErrorContext, SerdeFile};

// Local Imports
use crate::data::Override;
use crate::error::{ChipError, ChipResult};
use crate::validate::{RangeChecker, Validate};

/// # Wafer Process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WaferProcess {
    pub name: String,
    /// mm
    pub wafer_diameter: f64,
    /// Unusable ring at the wafer edge, mm
    pub edge_exclusion: f64,
    /// Baseline yield, independent of die area
    pub wafer_process_yield: f64,
    /// Kerf between adjacent dies, mm
    pub dicing_distance: f64,
    pub reticle_x: f64,
    pub reticle_y: f64,
    /// Pack dies on a strict grid, rather than row-by-row
    pub wafer_fill_grid: bool,
    pub nre_front_end_cost_per_mm2_memory: f64,
    pub nre_back_end_cost_per_mm2_memory: f64,
    pub nre_front_end_cost_per_mm2_logic: f64,
    pub nre_back_end_cost_per_mm2_logic: f64,
    pub nre_front_end_cost_per_mm2_analog: f64,
    pub nre_back_end_cost_per_mm2_analog: f64,
}
impl Validate for WaferProcess {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.positive("wafer_diameter", self.wafer_diameter)?;
        c.non_negative("edge_exclusion", self.edge_exclusion)?;
        if self.edge_exclusion * 2.0 >= self.wafer_diameter {
            return Err(c.err(
                "edge_exclusion",
                self.edge_exclusion,
                "leaves no usable wafer area",
            ));
        }
        c.unit("wafer_process_yield", self.wafer_process_yield)?;
        c.non_negative("dicing_distance", self.dicing_distance)?;
        c.positive("reticle_x", self.reticle_x)?;
        c.positive("reticle_y", self.reticle_y)?;
        c.non_negative(
            "nre_front_end_cost_per_mm2_memory",
            self.nre_front_end_cost_per_mm2_memory,
        )?;
        c.non_negative(
            "nre_back_end_cost_per_mm2_memory",
            self.nre_back_end_cost_per_mm2_memory,
        )?;
        c.non_negative(
            "nre_front_end_cost_per_mm2_logic",
            self.nre_front_end_cost_per_mm2_logic,
        )?;
        c.non_negative(
            "nre_back_end_cost_per_mm2_logic",
            self.nre_back_end_cost_per_mm2_logic,
        )?;
        c.non_negative(
            "nre_front_end_cost_per_mm2_analog",
            self.nre_front_end_cost_per_mm2_analog,
        )?;
        c.non_negative(
            "nre_back_end_cost_per_mm2_analog",
            self.nre_back_end_cost_per_mm2_analog,
        )
    }
}

/// # Stackup Layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Layer {
    pub name: String,
    /// Contains transistors
    pub active: bool,
    pub cost_per_mm2: f64,
    /// Millions of transistors per mm^2
    pub transistor_density: f64,
    /// Defects per mm^2
    pub defect_density: f64,
    pub critical_area_ratio: f64,
    /// Negative-binomial shape parameter
    pub clustering_factor: f64,
    /// Fraction of `cost_per_mm2` spent on lithography
    pub litho_percent: f64,
    pub nre_mask_cost: f64,
    /// Probability a single reticle stitch succeeds
    pub stitching_yield: f64,
    pub routing_layer_count: u32,
    /// mm. Zero allows unlimited tracks.
    pub routing_layer_pitch: f64,
}
impl Validate for Layer {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.non_negative("cost_per_mm2", self.cost_per_mm2)?;
        c.non_negative("transistor_density", self.transistor_density)?;
        c.non_negative("defect_density", self.defect_density)?;
        c.unit("critical_area_ratio", self.critical_area_ratio)?;
        c.positive("clustering_factor", self.clustering_factor)?;
        c.unit("litho_percent", self.litho_percent)?;
        c.non_negative("nre_mask_cost", self.nre_mask_cost)?;
        c.unit("stitching_yield", self.stitching_yield)?;
        c.non_negative("routing_layer_pitch", self.routing_layer_pitch)
    }
}

/// # Assembly Step
/// One machine-driven step of assembly, e.g. pick-and-place or bonding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyStep {
    pub machine_cost: f64,
    /// Years
    pub machine_lifetime: f64,
    /// Fraction of time the machine is in use
    pub machine_uptime: f64,
    pub technician_yearly_cost: f64,
    /// Seconds per operation
    pub time: f64,
    /// Dies processed per operation
    pub group: u32,
}
impl Validate for AssemblyStep {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.non_negative("machine_cost", self.machine_cost)?;
        c.non_negative("machine_lifetime", self.machine_lifetime)?;
        c.unit("machine_uptime", self.machine_uptime)?;
        c.non_negative("technician_yearly_cost", self.technician_yearly_cost)?;
        c.non_negative("time", self.time)?;
        c.at_least("group", self.group as f64, 1.0)?;
        // A machine with costs to recover must run for some time
        if self.machine_cost > 0.0 {
            c.positive("machine_lifetime", self.machine_lifetime)?;
        }
        if self.machine_cost > 0.0 || self.technician_yearly_cost > 0.0 {
            c.positive("machine_uptime", self.machine_uptime)?;
        }
        Ok(())
    }
}

/// # Assembly Process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyProcess {
    pub name: String,
    pub materials_cost_per_mm2: f64,
    /// Replaces both machine rates when fixed
    pub bb_cost_per_second: Override<f64>,
    pub picknplace: AssemblyStep,
    pub bonding: AssemblyStep,
    /// Spacing between adjacent dies on a common parent, mm
    pub die_separation: f64,
    /// Keep-out at the edge of the parent, mm
    pub edge_exclusion: f64,
    /// A/mm^2
    pub max_pad_current_density: f64,
    /// mm
    pub bonding_pitch: f64,
    pub alignment_yield: f64,
    pub bonding_yield: f64,
    /// Defects per mm^2 of bonded area
    pub dielectric_bond_defect_density: f64,
    /// mm^2 per through-silicon via
    pub tsv_area: f64,
    pub tsv_yield: f64,
    pub tsv_pitch: f64,
}
impl Validate for AssemblyProcess {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.non_negative("materials_cost_per_mm2", self.materials_cost_per_mm2)?;
        if let Some(rate) = self.bb_cost_per_second.fixed() {
            c.non_negative("bb_cost_per_second", rate)?;
        }
        let mut step = c.clone();
        step.ctx.push(ErrorContext::Field("picknplace".into()));
        self.picknplace.validate(&step)?;
        step.ctx.pop();
        step.ctx.push(ErrorContext::Field("bonding".into()));
        self.bonding.validate(&step)?;
        c.non_negative("die_separation", self.die_separation)?;
        c.non_negative("edge_exclusion", self.edge_exclusion)?;
        c.non_negative("max_pad_current_density", self.max_pad_current_density)?;
        c.non_negative("bonding_pitch", self.bonding_pitch)?;
        c.unit("alignment_yield", self.alignment_yield)?;
        c.unit("bonding_yield", self.bonding_yield)?;
        c.non_negative(
            "dielectric_bond_defect_density",
            self.dielectric_bond_defect_density,
        )?;
        c.non_negative("tsv_area", self.tsv_area)?;
        c.unit("tsv_yield", self.tsv_yield)?;
        c.non_negative("tsv_pitch", self.tsv_pitch)
    }
}

/// # Test Phase
/// Parameters for one of the two test insertions: a die alone, or an assembled stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestPhase {
    pub enabled: bool,
    pub bb_pattern_count: Override<f64>,
    pub bb_scan_chain_length: Override<f64>,
    /// Fraction of defective units caught
    pub defect_coverage: f64,
    pub test_reuse: f64,
    pub num_scan_chains: u32,
    pub num_io_per_scan_chain: u32,
    pub num_test_io_offset: u32,
    /// Carried for reporting. Does not affect the model.
    pub failure_dist: String,
}
impl Validate for TestPhase {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.unit("defect_coverage", self.defect_coverage)?;
        c.at_least("test_reuse", self.test_reuse, 1.0)?;
        if let Some(n) = self.bb_pattern_count.fixed() {
            c.non_negative("bb_pattern_count", n)?;
        }
        match self.bb_scan_chain_length.fixed() {
            Some(n) => c.non_negative("bb_scan_chain_length", n),
            None if self.enabled => c.at_least("num_scan_chains", self.num_scan_chains as f64, 1.0),
            None => Ok(()),
        }
    }
}

/// # Test Process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestProcess {
    pub name: String,
    /// Seconds
    pub time_per_test_cycle: f64,
    /// Tester cost, $/s
    pub cost_per_second: f64,
    pub samples_per_input: f64,
    pub self_test: TestPhase,
    pub assembly_test: TestPhase,
}
impl TestProcess {
    /// Test IOs required by all enabled phases
    pub fn num_test_ios(&self) -> u64 {
        [&self.self_test, &self.assembly_test]
            .iter()
            .filter(|p| p.enabled)
            .map(|p| {
                p.num_scan_chains as u64 * p.num_io_per_scan_chain as u64
                    + p.num_test_io_offset as u64
            })
            .sum()
    }
}
impl Validate for TestProcess {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.non_negative("time_per_test_cycle", self.time_per_test_cycle)?;
        c.non_negative("cost_per_second", self.cost_per_second)?;
        c.at_least("samples_per_input", self.samples_per_input, 1.0)?;
        let mut phase = c.clone();
        phase.ctx.push(ErrorContext::Field("self_test".into()));
        self.self_test.validate(&phase)?;
        phase.ctx.pop();
        phase.ctx.push(ErrorContext::Field("assembly_test".into()));
        self.assembly_test.validate(&phase)
    }
}

/// # IO Cell Type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IoType {
    #[serde(rename = "type")]
    pub name: String,
    pub rx_area: f64,
    pub tx_area: f64,
    /// Carried for floorplanning. Does not affect the model.
    pub shoreline: f64,
    /// Gbps per instance, combined over both directions for bidirectional types
    pub bandwidth: f64,
    pub wire_count: u32,
    pub bidirectional: bool,
    /// pJ/bit
    pub energy_per_bit: f64,
    /// Carried for floorplanning. Does not affect the model.
    pub reach: f64,
}
impl Validate for IoType {
    fn validate(&self, c: &RangeChecker) -> ChipResult<()> {
        c.non_negative("rx_area", self.rx_area)?;
        c.non_negative("tx_area", self.tx_area)?;
        c.non_negative("shoreline", self.shoreline)?;
        c.positive("bandwidth", self.bandwidth)?;
        c.non_negative("energy_per_bit", self.energy_per_bit)?;
        c.non_negative("reach", self.reach)
    }
}

/// Library records by category, as stored on disk.
/// Every category is optional, so that a file may hold one category or all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LibraryRecords {
    #[serde(default)]
    pub wafer_processes: Vec<WaferProcess>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assembly_processes: Vec<AssemblyProcess>,
    #[serde(default)]
    pub test_processes: Vec<TestProcess>,
    #[serde(default)]
    pub ios: Vec<IoType>,
}
impl SerdeFile for LibraryRecords {}
impl LibraryRecords {
    /// Append all of `other`'s records
    pub fn merge(&mut self, other: LibraryRecords) {
        self.wafer_processes.extend(other.wafer_processes);
        self.layers.extend(other.layers);
        self.assembly_processes.extend(other.assembly_processes);
        self.test_processes.extend(other.test_processes);
        self.ios.extend(other.ios);
    }
    /// Load and merge records from each of `paths`
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> ChipResult<Self> {
        let mut records = Self::default();
        for path in paths {
            records.merge(Self::load(path)?);
        }
        Ok(records)
    }
}

/// Something with a library-unique name
pub trait Named {
    fn name(&self) -> &str;
}
impl Named for WaferProcess {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Named for Layer {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Named for AssemblyProcess {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Named for TestProcess {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Named for IoType {
    fn name(&self) -> &str {
        &self.name
    }
}

///
/// # Process Libraries
///
/// Validated, immutable process records, keyed by name.
///
#[derive(Debug, Clone, Default)]
pub struct Libraries {
    pub wafer_processes: HashMap<String, Arc<WaferProcess>>,
    pub layers: HashMap<String, Arc<Layer>>,
    pub assembly_processes: HashMap<String, Arc<AssemblyProcess>>,
    pub test_processes: HashMap<String, Arc<TestProcess>>,
    pub ios: HashMap<String, Arc<IoType>>,
}
impl Libraries {
    /// Validate `records`, and index them by name.
    /// Fails on the first out-of-range field or duplicate name.
    pub fn from_records(records: LibraryRecords) -> ChipResult<Self> {
        let LibraryRecords {
            wafer_processes,
            layers,
            assembly_processes,
            test_processes,
            ios,
        } = records;
        Ok(Self {
            wafer_processes: index("wafer_processes", wafer_processes)?,
            layers: index("layers", layers)?,
            assembly_processes: index("assembly_processes", assembly_processes)?,
            test_processes: index("test_processes", test_processes)?,
            ios: index("ios", ios)?,
        })
    }
    /// Load, merge, and validate library files at each of `paths`
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> ChipResult<Self> {
        Self::from_records(LibraryRecords::load_all(paths)?)
    }
    pub fn wafer_process(&self, name: &str) -> Option<&Arc<WaferProcess>> {
        self.wafer_processes.get(name)
    }
    pub fn layer(&self, name: &str) -> Option<&Arc<Layer>> {
        self.layers.get(name)
    }
    pub fn assembly_process(&self, name: &str) -> Option<&Arc<AssemblyProcess>> {
        self.assembly_processes.get(name)
    }
    pub fn test_process(&self, name: &str) -> Option<&Arc<TestProcess>> {
        self.test_processes.get(name)
    }
    pub fn io(&self, name: &str) -> Option<&Arc<IoType>> {
        self.ios.get(name)
    }
}

/// Validate and index a category of records
fn index<T: Validate + Named>(
    category: &str,
    records: Vec<T>,
) -> ChipResult<HashMap<String, Arc<T>>> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let ctx = vec![
            ErrorContext::Library(category.to_string()),
            ErrorContext::Record(record.name().to_string()),
        ];
        record.validate(&RangeChecker::new(ctx.clone()))?;
        let name = record.name().to_string();
        if map.insert(name.clone(), Arc::new(record)).is_some() {
            return Err(ChipError::Reference {
                message: format!("Duplicate definition of `{}` in {}", name, category),
                stack: ctx,
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::demo_libraries;

    #[test]
    fn loads_demo_libraries() -> ChipResult<()> {
        let libs = demo_libraries()?;
        assert!(libs.layer("active_7nm").is_some());
        assert!(libs.io("ucie_standard").is_some());
        assert!(libs.wafer_process("process_300mm").is_some());
        assert!(libs.assembly_process("dummy").is_some());
        assert!(libs.test_process("kgd_test").is_some());
        assert!(libs.layer("nonexistent").is_none());
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_yield() -> ChipResult<()> {
        let mut records = crate::tests::demo_records()?;
        records.assembly_processes[0].alignment_yield = 1.5;
        match Libraries::from_records(records) {
            Err(ChipError::Range { field, stack, .. }) => {
                assert_eq!(field, "alignment_yield");
                assert_eq!(stack[0], ErrorContext::Library("assembly_processes".into()));
            }
            other => panic!("expected a range violation, got {:?}", other.map(|_| ())),
        }
        Ok(())
    }

    #[test]
    fn rejects_nested_range_violations() -> ChipResult<()> {
        let mut records = crate::tests::demo_records()?;
        records.test_processes[0].self_test.defect_coverage = -0.1;
        let err = Libraries::from_records(records).unwrap_err();
        assert!(err
            .stack()
            .contains(&ErrorContext::Field("self_test".into())));

        let mut records = crate::tests::demo_records()?;
        records.assembly_processes[0].bonding.group = 0;
        assert!(matches!(
            Libraries::from_records(records),
            Err(ChipError::Range { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_duplicates() -> ChipResult<()> {
        let mut records = crate::tests::demo_records()?;
        let dup = records.layers[0].clone();
        records.layers.push(dup);
        assert!(matches!(
            Libraries::from_records(records),
            Err(ChipError::Reference { .. })
        ));
        Ok(())
    }

    #[test]
    fn counts_test_ios() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let t = libs.test_process("kgd_test").unwrap();
        let expected = |p: &TestPhase| {
            if p.enabled {
                p.num_scan_chains as u64 * p.num_io_per_scan_chain as u64
                    + p.num_test_io_offset as u64
            } else {
                0
            }
        };
        assert_eq!(
            t.num_test_ios(),
            expected(&t.self_test) + expected(&t.assembly_test)
        );
        Ok(())
    }
}
