//! # chipgen
//!
//! Generate a design of equal chiplets stacked upon an interposer, and the mesh netlist connecting them.
//! Writes `design.yaml` and `netlist.yaml` into the output directory.

use clap::Parser;
use std::error::Error;
use std::path::Path;

use chiplet21::{generate_stack, SerdeFile, StackGenOptions};

#[derive(Parser)]
struct ProgramOptions {
    /// Number of chiplets
    #[clap(short = 'n', long, default_value_t = 4)]
    chiplets: usize,
    #[clap(long, default_value = "ucie_standard")]
    io_type: String,
    /// Whether `io_type` is directional, requiring a net each way between neighbours
    #[clap(long)]
    directional: bool,
    /// Off-package bandwidth, Gbps
    #[clap(long, default_value_t = 1600.0)]
    external_bandwidth: f64,
    /// Core area summed over all chiplets, mm^2
    #[clap(long, default_value_t = 800.0)]
    total_area: f64,
    /// Power summed over all chiplets, W
    #[clap(long, default_value_t = 100.0)]
    total_power: f64,
    #[clap(long, default_value_t = 1.0)]
    logic_fraction: f64,
    /// Quantity of systems
    #[clap(short, long, default_value_t = 10_000_000)]
    quantity: u64,
    #[clap(long, default_value = "process_300mm")]
    wafer_process: String,
    #[clap(long, default_value = "silicon_individual_bonding")]
    assembly_process: String,
    #[clap(long, default_value = "kgd_test")]
    test_process: String,
    #[clap(long, default_value = "no_test")]
    interposer_test_process: String,
    #[clap(long, default_value = "1:active_7nm,8:metal_7nm")]
    chiplet_stackup: String,
    #[clap(long, default_value = "1:interposer_silicon")]
    interposer_stackup: String,
    /// Output directory
    #[clap(short = 'o', long, default_value = ".")]
    output: String,
    #[clap(short, long)]
    verbose: bool,
}
impl ProgramOptions {
    fn generator_options(&self) -> StackGenOptions {
        StackGenOptions {
            chiplets: self.chiplets,
            io_type: self.io_type.clone(),
            bidirectional: !self.directional,
            external_bandwidth: self.external_bandwidth,
            total_area: self.total_area,
            total_power: self.total_power,
            logic_fraction: self.logic_fraction,
            quantity: self.quantity,
            wafer_process: self.wafer_process.clone(),
            assembly_process: self.assembly_process.clone(),
            test_process: self.test_process.clone(),
            interposer_test_process: self.interposer_test_process.clone(),
            chiplet_stackup: self.chiplet_stackup.clone(),
            interposer_stackup: self.interposer_stackup.clone(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let options = ProgramOptions::parse();
    return _main(&options);
}

fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    if options.chiplets == 0 {
        return Err("At least one chiplet is required".into());
    }
    let (design, netlist) = generate_stack(&options.generator_options());

    let dir = Path::new(&options.output);
    std::fs::create_dir_all(dir)?;
    let design_path = dir.join("design.yaml");
    let netlist_path = dir.join("netlist.yaml");
    design.store(&design_path)?;
    netlist.store(&netlist_path)?;
    if options.verbose {
        println!("wrote: {:?}, {:?}", design_path, netlist_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiplet21::{Design, Evaluation, Libraries, Netlist};

    fn options(output: String) -> ProgramOptions {
        ProgramOptions {
            chiplets: 2,
            io_type: "ucie_standard".into(),
            directional: false,
            external_bandwidth: 800.0,
            total_area: 400.0,
            total_power: 50.0,
            logic_fraction: 1.0,
            quantity: 1_000_000,
            wafer_process: "process_300mm".into(),
            assembly_process: "silicon_individual_bonding".into(),
            test_process: "kgd_test".into(),
            interposer_test_process: "no_test".into(),
            chiplet_stackup: "1:active_7nm,8:metal_7nm".into(),
            interposer_stackup: "1:interposer_silicon".into(),
            output,
            verbose: true,
        }
    }

    #[test]
    fn writes_an_evaluable_design() -> Result<(), Box<dyn Error>> {
        let dir = resource("generated/chipgen");
        _main(&options(dir.clone()))?;

        let design = Design::load(format!("{}/design.yaml", dir))?;
        let netlist = Netlist::load(format!("{}/netlist.yaml", dir))?;
        assert_eq!(design.iter().count(), 3);

        let libs = Libraries::load_all(&[
            resource("lib/wafer_processes.yaml"),
            resource("lib/layers.yaml"),
            resource("lib/assembly_processes.yaml"),
            resource("lib/test_processes.yaml"),
            resource("lib/ios.yaml"),
        ])?;
        let sys = Evaluation::run(&design, &netlist, &libs)?.system();
        assert!(sys.cost > 0.0);
        Ok(())
    }

    #[test]
    fn rejects_empty_stacks() {
        let mut opts = options(resource("generated/chipgen_empty"));
        opts.chiplets = 0;
        assert!(_main(&opts).is_err());
    }

    /// Grab the full path of resource-file `fname`
    fn resource(rname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
    }
}
