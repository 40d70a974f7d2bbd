//!
//! # Net Resolver
//!
//! Maps a [Netlist] onto a chip tree: IO-cell instance counts per net,
//! and the IO area, IO power, and signal wires each chip must host.
//!

// Std-Lib
use std::collections::HashMap;
use std::sync::Arc;

// Workspace Imports
use chiplet21utils::{ErrorContext, ErrorHelper, Unwrapper};

// Local Imports
use crate::data::{NetRecord, Netlist, EXTERNAL};
use crate::error::{ChipError, ChipResult};
use crate::library::{IoType, Libraries};
use crate::tree::ChipNode;
use crate::validate::RangeChecker;

/// # Resolved Net
#[derive(Debug, Clone)]
pub struct ResolvedNet {
    /// Index into the source netlist
    pub index: usize,
    pub io: Arc<IoType>,
    pub block0: String,
    pub block1: String,
    /// IO-cell instances at each endpoint
    pub instances: u64,
    /// Average utilization of the instantiated bandwidth
    pub utilization: f64,
    /// Average power drawn at each endpoint, W
    pub power: f64,
}
impl ResolvedNet {
    /// Signal wires at each endpoint
    pub fn signals(&self) -> u64 {
        self.instances * self.io.wire_count as u64
    }
}

/// # Per-Chip Net Load
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetLoad {
    /// mm^2
    pub io_area: f64,
    /// W
    pub io_power: f64,
    /// Signal wires, over all nets
    pub signals: u64,
}

/// # Net Resolution
/// Every net of a netlist, resolved, and the load each accumulates on its chips.
#[derive(Debug, Clone, Default)]
pub struct NetResolution {
    pub nets: Vec<ResolvedNet>,
    pub loads: HashMap<String, NetLoad>,
}
impl NetResolution {
    /// The load on chip `name`. Zero for chips no net touches.
    pub fn load(&self, name: &str) -> NetLoad {
        self.loads.get(name).copied().unwrap_or_default()
    }
    /// Signal wires of `node` connecting to chips outside its own subtree
    pub fn external_signals(&self, node: &ChipNode) -> u64 {
        let inside = node.subtree_names();
        self.nets
            .iter()
            .map(|net| {
                let mut n = 0;
                if net.block0 == node.name && !inside.contains(net.block1.as_str()) {
                    n += net.signals();
                }
                if net.block1 == node.name && !inside.contains(net.block0.as_str()) {
                    n += net.signals();
                }
                n
            })
            .sum()
    }
}

/// Resolve every net of `netlist` against the tree rooted at `root`.
///
/// Endpoints must name chips in the tree, or the reserved off-package endpoint `external`.
/// Fails on the first unknown chip or IO type. No partial resolution is returned.
pub fn resolve_nets(
    netlist: &Netlist,
    root: &ChipNode,
    libs: &Libraries,
) -> ChipResult<NetResolution> {
    let index: HashMap<&str, &ChipNode> = root.iter().map(|n| (n.name.as_str(), n)).collect();
    let mut resolver = NetResolver {
        index,
        libs,
        ctx: Vec::new(),
        rv: NetResolution::default(),
    };
    for (idx, net) in netlist.nets.iter().enumerate() {
        resolver.ctx.push(ErrorContext::Net(idx));
        resolver.resolve(idx, net)?;
        resolver.ctx.pop();
    }
    Ok(resolver.rv)
}

/// # Net Resolver
struct NetResolver<'a> {
    /// Transient name-to-node index
    index: HashMap<&'a str, &'a ChipNode>,
    libs: &'a Libraries,
    ctx: Vec<ErrorContext>,
    rv: NetResolution,
}
impl NetResolver<'_> {
    fn resolve(&mut self, idx: usize, net: &NetRecord) -> ChipResult<()> {
        let c = RangeChecker::new(self.ctx.clone());
        c.non_negative("bandwidth", net.bandwidth)?;
        c.unit(
            "average_bandwidth_utilization",
            net.average_bandwidth_utilization,
        )?;

        let io = self
            .libs
            .io(&net.io_type)
            .unwrapper(self, format!("Unknown IO type `{}`", net.io_type))?
            .clone();
        self.endpoint(&net.block0)?;
        self.endpoint(&net.block1)?;

        let instances = match net.bb_count.fixed() {
            Some(n) => n,
            None => (net.bandwidth / io.bandwidth).ceil() as u64,
        };
        let utilization = if net.bandwidth > 0.0 && instances > 0 {
            net.average_bandwidth_utilization * net.bandwidth / (instances as f64 * io.bandwidth)
        } else {
            net.average_bandwidth_utilization
        };
        let power = instances as f64 * io.bandwidth * utilization * io.energy_per_bit * 1e-3;
        let n = instances as f64;
        let (area0, area1) = match io.bidirectional {
            true => (n * (io.tx_area + io.rx_area), n * (io.tx_area + io.rx_area)),
            false => (n * io.tx_area, n * io.rx_area),
        };
        let signals = instances * io.wire_count as u64;

        for (block, area) in [(&net.block0, area0), (&net.block1, area1)] {
            if block.as_str() == EXTERNAL {
                continue;
            }
            let load = self.rv.loads.entry(block.clone()).or_default();
            load.io_area += area;
            load.io_power += power;
            load.signals += signals;
        }
        self.rv.nets.push(ResolvedNet {
            index: idx,
            io,
            block0: net.block0.clone(),
            block1: net.block1.clone(),
            instances,
            utilization,
            power,
        });
        Ok(())
    }
    /// Check that `name` is a chip in the tree, or the off-package endpoint
    fn endpoint(&self, name: &str) -> ChipResult<()> {
        if name == EXTERNAL {
            return Ok(());
        }
        self.index
            .get(name)
            .unwrapper(self, format!("Net endpoint `{}` is not a chip in the design", name))?;
        Ok(())
    }
}
impl ErrorHelper for NetResolver<'_> {
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
    use crate::data::Override;
    use crate::tests::{demo_design, demo_libraries, demo_netlist};
    use crate::tree::build_tree;

    fn net(io: &str, b0: &str, b1: &str, bandwidth: f64) -> NetRecord {
        NetRecord {
            io_type: io.into(),
            block0: b0.into(),
            block1: b1.into(),
            bb_count: Override::Computed,
            bandwidth,
            average_bandwidth_utilization: 0.5,
        }
    }

    #[test]
    fn charges_directional_areas() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let io = libs.io("lvds").unwrap().clone();
        assert!(!io.bidirectional);
        let netlist = Netlist {
            nets: vec![net("lvds", "cpu", "gpu", io.bandwidth * 2.5)],
        };
        let res = resolve_nets(&netlist, &root, &libs)?;
        assert_eq!(res.nets[0].instances, 3);
        let cpu = res.load("cpu");
        let gpu = res.load("gpu");
        assert!((cpu.io_area - 3.0 * io.tx_area).abs() < 1e-12);
        assert!((gpu.io_area - 3.0 * io.rx_area).abs() < 1e-12);
        assert_eq!(cpu.signals, 3 * io.wire_count as u64);
        assert_eq!(res.load("mem"), NetLoad::default());
        // 2.5 of 3 instances' bandwidth is needed, at 50% average utilization
        assert!((res.nets[0].utilization - 0.5 * 2.5 / 3.0).abs() < 1e-12);
        let power = 3.0 * io.bandwidth * (0.5 * 2.5 / 3.0) * io.energy_per_bit * 1e-3;
        assert!((cpu.io_power - power).abs() < 1e-12);
        assert!((gpu.io_power - power).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn charges_bidirectional_areas() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let io = libs.io("ucie_standard").unwrap().clone();
        assert!(io.bidirectional);
        let mut record = net("ucie_standard", "cpu", "mem", 0.0);
        record.bb_count = Override::Fixed(4);
        let res = resolve_nets(&Netlist { nets: vec![record] }, &root, &libs)?;
        let both = 4.0 * (io.tx_area + io.rx_area);
        assert!((res.load("cpu").io_area - both).abs() < 1e-12);
        assert!((res.load("mem").io_area - both).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn accepts_external_endpoints() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let netlist = Netlist {
            nets: vec![net("lvds", "gpu", EXTERNAL, 10.0)],
        };
        let res = resolve_nets(&netlist, &root, &libs)?;
        assert!(res.loads.get(EXTERNAL).is_none());
        assert!(res.load("gpu").io_area > 0.0);
        assert_eq!(res.external_signals(root.find("gpu").unwrap()), res.load("gpu").signals);
        Ok(())
    }

    #[test]
    fn fails_fast_on_unknown_names() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let netlist = Netlist {
            nets: vec![
                net("lvds", "cpu", "gpu", 10.0),
                net("lvds", "cpu", "npu", 10.0),
            ],
        };
        match resolve_nets(&netlist, &root, &libs) {
            Err(ChipError::Reference { message, stack }) => {
                assert!(message.contains("npu"));
                assert_eq!(stack, vec![ErrorContext::Net(1)]);
            }
            other => panic!("expected a reference error, got {:?}", other.map(|_| ())),
        }
        let netlist = Netlist {
            nets: vec![net("optical", "cpu", "gpu", 10.0)],
        };
        assert!(resolve_nets(&netlist, &root, &libs).is_err());
        Ok(())
    }

    #[test]
    fn counts_signals_leaving_subtrees() -> ChipResult<()> {
        let libs = demo_libraries()?;
        let root = build_tree(&demo_design()?, &libs)?;
        let res = resolve_nets(&demo_netlist()?, &root, &libs)?;
        let cpu = root.find("cpu").unwrap();
        let mem = root.find("mem").unwrap();
        // Nets between cpu and mem stay within cpu's subtree, but leave mem's
        let internal: u64 = res
            .nets
            .iter()
            .filter(|n| {
                (n.block0 == "cpu" && n.block1 == "mem") || (n.block0 == "mem" && n.block1 == "cpu")
            })
            .map(|n| n.signals())
            .sum();
        assert!(internal > 0);
        assert_eq!(res.external_signals(cpu), res.load("cpu").signals - internal);
        assert_eq!(res.external_signals(mem), res.load("mem").signals);
        // No net touches the interposer itself
        assert_eq!(res.external_signals(&root), 0);
        Ok(())
    }
}
