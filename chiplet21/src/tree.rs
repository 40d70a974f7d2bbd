//!
//! # Chip Tree
//!
//! [build_tree] resolves every library reference of a [Design] into shared [Arc]s,
//! range-checks every chip, and produces the owned [ChipNode] hierarchy the model evaluates.
//!

// Std-Lib
use std::collections::HashSet;
use std::sync::Arc;

// Workspace Imports
use chiplet21utils::{ErrorContext, ErrorHelper, Unwrapper};

// Local Imports
use crate::data::{ChipRecord, Design, Orientation, Override, StackSide, EXTERNAL};
use crate::error::{ChipError, ChipResult};
use crate::layer::{self, StackupLayer};
use crate::library::{AssemblyProcess, Libraries, TestProcess, WaferProcess};
use crate::validate::RangeChecker;

/// Fractions of core area by circuit category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractions {
    pub memory: f64,
    pub logic: f64,
    pub analog: f64,
}

/// Black-box overrides of a chip's own computed attributes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlackBox {
    pub area: Override<f64>,
    pub cost: Override<f64>,
    pub quality: Override<f64>,
    pub power: Override<f64>,
}

///
/// # Chip Node
///
/// One die, substrate, or interposer, with its library references resolved,
/// owning the chips stacked directly upon it.
///
#[derive(Debug, Clone)]
pub struct ChipNode {
    pub name: String,
    pub black_box: BlackBox,
    /// Width / height
    pub aspect_ratio: f64,
    /// Lower-left corner relative to the parent's, when both coordinates are given
    pub location: Option<(f64, f64)>,
    pub orientation: Orientation,
    pub stack_side: StackSide,
    pub core_area: f64,
    pub fractions: Fractions,
    pub gate_flop_ratio: f64,
    pub reticle_share: f64,
    pub buried: bool,
    pub wafer: Arc<WaferProcess>,
    pub assembly: Arc<AssemblyProcess>,
    pub test: Arc<TestProcess>,
    pub stackup: Vec<StackupLayer>,
    pub core_voltage: f64,
    pub power: f64,
    pub quantity: u64,
    pub children: Vec<ChipNode>,
}
impl ChipNode {
    /// Depth-first, pre-order iteration over this node and all its descendants
    pub fn iter(&self) -> impl Iterator<Item = &ChipNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
    /// Find the node named `name` in this subtree
    pub fn find(&self, name: &str) -> Option<&ChipNode> {
        self.iter().find(|n| n.name == name)
    }
    /// Names of every node in this subtree, this one included
    pub fn subtree_names(&self) -> HashSet<&str> {
        self.iter().map(|n| n.name.as_str()).collect()
    }
    /// Gates per mm^2 of this die alone
    pub fn gates_per_mm2(&self) -> f64 {
        layer::gates_per_mm2(&self.stackup)
    }
    /// Core area summed over this subtree
    pub fn subtree_core_area(&self) -> f64 {
        self.iter().map(|n| n.core_area).sum()
    }
    /// The stack-side facing this node's parent.
    /// Signals of children on this side pass through this node on their way down.
    pub fn parent_facing_side(&self) -> StackSide {
        match self.orientation {
            Orientation::FaceUp => StackSide::Back,
            Orientation::FaceDown => StackSide::Face,
        }
    }
}

/// Resolve `design` against `libs`, producing the root [ChipNode].
///
/// Fails on the first unknown library reference, duplicate chip name,
/// out-of-range field, malformed stackup, or non-positive quantity.
pub fn build_tree(design: &Design, libs: &Libraries) -> ChipResult<ChipNode> {
    TreeBuilder {
        libs,
        ctx: Vec::new(),
        names: HashSet::new(),
    }
    .build(design)
}

/// # Tree Builder
struct TreeBuilder<'lib> {
    libs: &'lib Libraries,
    ctx: Vec<ErrorContext>,
    names: HashSet<String>,
}
impl<'lib> TreeBuilder<'lib> {
    fn build(&mut self, rec: &ChipRecord) -> ChipResult<ChipNode> {
        self.ctx.push(ErrorContext::Chip(rec.name.clone()));
        self.assert(rec.name != EXTERNAL, format!("`{}` is a reserved chip name", EXTERNAL))?;
        let unique = self.names.insert(rec.name.clone());
        self.assert(unique, format!("Duplicate chip name `{}`", rec.name))?;
        self.check_ranges(rec)?;
        if rec.quantity <= 0 {
            return Err(ChipError::Amortization {
                quantity: rec.quantity,
                stack: self.ctx.clone(),
            });
        }

        let wafer = self
            .libs
            .wafer_process(&rec.wafer_process)
            .unwrapper(self, format!("Unknown wafer process `{}`", rec.wafer_process))?
            .clone();
        let assembly = self
            .libs
            .assembly_process(&rec.assembly_process)
            .unwrapper(
                self,
                format!("Unknown assembly process `{}`", rec.assembly_process),
            )?
            .clone();
        let test = self
            .libs
            .test_process(&rec.test_process)
            .unwrapper(self, format!("Unknown test process `{}`", rec.test_process))?
            .clone();
        let stackup = self.build_stackup(rec)?;

        let location = match (rec.x_location.fixed(), rec.y_location.fixed()) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };
        let children = rec
            .chips
            .iter()
            .map(|c| self.build(c))
            .collect::<Result<Vec<_>, _>>()?;

        self.ctx.pop();
        Ok(ChipNode {
            name: rec.name.clone(),
            black_box: BlackBox {
                area: rec.bb_area,
                cost: rec.bb_cost,
                quality: rec.bb_quality,
                power: rec.bb_power,
            },
            aspect_ratio: rec.aspect_ratio.or(1.0),
            location,
            orientation: rec.orientation,
            stack_side: rec.stack_side,
            core_area: rec.core_area,
            fractions: Fractions {
                memory: rec.fraction_memory,
                logic: rec.fraction_logic,
                analog: rec.fraction_analog,
            },
            gate_flop_ratio: rec.gate_flop_ratio,
            reticle_share: rec.reticle_share,
            buried: rec.buried,
            wafer,
            assembly,
            test,
            stackup,
            core_voltage: rec.core_voltage,
            power: rec.power,
            quantity: rec.quantity as u64,
            children,
        })
    }
    /// Parse the stackup and resolve each of its layers
    fn build_stackup(&self, rec: &ChipRecord) -> ChipResult<Vec<StackupLayer>> {
        let entries = rec.stackup.entries().map_err(|message| ChipError::Format {
            message,
            stack: self.ctx.clone(),
        })?;
        entries
            .into_iter()
            .map(|e| {
                let layer = self
                    .libs
                    .layer(&e.layer)
                    .unwrapper(self, format!("Unknown layer `{}` in stackup", e.layer))?;
                Ok::<_, ChipError>(StackupLayer {
                    count: e.count,
                    layer: layer.clone(),
                })
            })
            .collect()
    }
    fn check_ranges(&self, rec: &ChipRecord) -> ChipResult<()> {
        let c = RangeChecker::new(self.ctx.clone());
        c.non_negative("core_area", rec.core_area)?;
        c.unit("fraction_memory", rec.fraction_memory)?;
        c.unit("fraction_logic", rec.fraction_logic)?;
        c.unit("fraction_analog", rec.fraction_analog)?;
        let total = rec.fraction_memory + rec.fraction_logic + rec.fraction_analog;
        if total > 1.0 + 1e-9 {
            return Err(c.err(
                "fraction_memory + fraction_logic + fraction_analog",
                total,
                "must not exceed 1",
            ));
        }
        c.positive("gate_flop_ratio", rec.gate_flop_ratio)?;
        c.unit("reticle_share", rec.reticle_share)?;
        c.non_negative("core_voltage", rec.core_voltage)?;
        c.non_negative("power", rec.power)?;
        if let Some(ar) = rec.aspect_ratio.fixed() {
            c.positive("aspect_ratio", ar)?;
        }
        if let Some(q) = rec.bb_quality.fixed() {
            c.unit("bb_quality", q)?;
        }
        if let Some(cost) = rec.bb_cost.fixed() {
            c.non_negative("bb_cost", cost)?;
        }
        if let Some(p) = rec.bb_power.fixed() {
            c.non_negative("bb_power", p)?;
        }
        Ok(())
    }
}
impl ErrorHelper for TreeBuilder<'_> {
    type Error = ChipError;
    fn err(&self, msg: impl Into<String>) -> ChipError {
        ChipError::Reference {
            message: msg.into(),
            stack: self.ctx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StackupRecord;
    use crate::tests::{demo_design, demo_libraries};

    #[test]
    fn builds_demo_tree() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let names: Vec<_> = root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["interposer", "cpu", "mem", "gpu"]);
        assert_eq!(root.core_area, 0.0);
        assert_eq!(root.fractions.analog, 1.0);
        let cpu = root.find("cpu").unwrap();
        assert_eq!(cpu.children.len(), 1);
        assert!(cpu.gates_per_mm2() > 0.0);
        // Libraries are shared, not copied
        let gpu = root.find("gpu").unwrap();
        assert!(Arc::ptr_eq(&cpu.wafer, &gpu.wafer));
        Ok(())
    }

    #[test]
    fn rejects_unknown_references() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let mut design = demo_design()?;
        design.chips[0].wafer_process = "process_450mm".into();
        match build_tree(&design, &libs) {
            Err(ChipError::Reference { message, stack }) => {
                assert!(message.contains("process_450mm"));
                assert_eq!(stack.last(), Some(&ErrorContext::Chip("cpu".into())));
            }
            other => panic!("expected a reference error, got {:?}", other.map(|_| ())),
        }

        let mut design = demo_design()?;
        design.chips[1].stackup = StackupRecord::Text("1:unobtainium".into());
        assert!(matches!(
            build_tree(&design, &libs),
            Err(ChipError::Reference { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_names() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let mut design = demo_design()?;
        design.chips[1].name = "cpu".into();
        assert!(matches!(
            build_tree(&design, &libs),
            Err(ChipError::Reference { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_bad_quantities_and_fractions() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let mut design = demo_design()?;
        design.chips[0].chips[0].quantity = 0;
        assert!(matches!(
            build_tree(&design, &libs),
            Err(ChipError::Amortization { quantity: 0, .. })
        ));

        let mut design = demo_design()?;
        design.chips[0].fraction_logic = 0.8;
        design.chips[0].fraction_memory = 0.3;
        assert!(matches!(
            build_tree(&design, &libs),
            Err(ChipError::Range { .. })
        ));

        let mut design = demo_design()?;
        design.stackup = StackupRecord::Text("two:metal".into());
        assert!(matches!(
            build_tree(&design, &libs),
            Err(ChipError::Format { .. })
        ));
        Ok(())
    }

    #[test]
    fn resolves_defaults_and_locations() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let mut design = demo_design()?;
        design.chips[0].x_location = Override::Fixed(1.0);
        design.chips[0].y_location = Override::Fixed(2.0);
        design.chips[1].x_location = Override::Fixed(1.0);
        let root = build_tree(&design, &libs)?;
        assert_eq!(root.find("cpu").unwrap().location, Some((1.0, 2.0)));
        assert_eq!(root.find("gpu").unwrap().location, None);
        assert_eq!(root.aspect_ratio, 1.0);
        Ok(())
    }
}
