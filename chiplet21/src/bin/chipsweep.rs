//! # chipsweep
//!
//! Sweep a chiplet design over production quantities,
//! and/or measure the sensitivity of its cost to each of its numeric parameters.

use clap::Parser;
use serde::Serialize;
use std::error::Error;

use chiplet21::{
    sensitivity, sweep_quantity, Design, Libraries, Netlist, QuantityPoint, SerdeFile,
    SerializationFormat, Sensitivity,
};

#[derive(Parser)]
struct ProgramOptions {
    /// IO-cell library
    #[clap(long)]
    io: String,
    /// Layer library
    #[clap(long)]
    layers: String,
    /// Wafer-process library
    #[clap(long)]
    wafers: String,
    /// Assembly-process library
    #[clap(long)]
    assembly: String,
    /// Test-process library
    #[clap(long)]
    test: String,
    #[clap(short = 'n', long)]
    netlist: String,
    #[clap(short = 'd', long)]
    design: String,
    /// Production quantities to evaluate, comma-separated
    #[clap(short, long, value_delimiter = ',')]
    quantities: Vec<u64>,
    /// Perturb every numeric parameter by this percentage
    #[clap(short, long)]
    sensitivity: Option<f64>,
    /// Output file. Format is inferred from its extension. Printed as YAML if empty.
    #[clap(short = 'o', long, default_value = "")]
    output: String,
    #[clap(short, long)]
    verbose: bool,
}

/// Everything written by a run
#[derive(Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    quantities: Vec<QuantityPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensitivity: Vec<Sensitivity>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let options = ProgramOptions::parse();
    return _main(&options);
}

fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    if options.quantities.is_empty() && options.sensitivity.is_none() {
        return Err("Nothing to sweep: provide `--quantities` and/or `--sensitivity`".into());
    }
    let libs = Libraries::load_all(&[
        &options.wafers,
        &options.layers,
        &options.assembly,
        &options.test,
        &options.io,
    ])?;
    let design = Design::load(&options.design)?;
    let netlist = Netlist::load(&options.netlist)?;
    if options.verbose {
        println!("read: {:?}, {:?}", &options.design, &options.netlist);
    }

    let quantities = sweep_quantity(&design, &netlist, &libs, &options.quantities)?;
    let sensitivity = match options.sensitivity {
        Some(percent) => sensitivity(&design, &netlist, &libs, percent)?,
        None => Vec::new(),
    };
    if options.verbose {
        println!(
            "evaluated {} quantities, {} perturbations",
            quantities.len(),
            sensitivity.len()
        );
    }
    let output = Output {
        quantities,
        sensitivity,
    };

    if options.output.is_empty() {
        print!("{}", SerializationFormat::Yaml.to_string(&output)?);
    } else {
        let fmt = SerializationFormat::from_path(&options.output)?;
        fmt.save(&output, &options.output)?;
        if options.verbose {
            println!("wrote: {:?}", &options.output);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(output: String) -> ProgramOptions {
        ProgramOptions {
            io: resource("lib/ios.yaml"),
            layers: resource("lib/layers.yaml"),
            wafers: resource("lib/wafer_processes.yaml"),
            assembly: resource("lib/assembly_processes.yaml"),
            test: resource("lib/test_processes.yaml"),
            netlist: resource("demo/netlist.yaml"),
            design: resource("demo/design.yaml"),
            quantities: vec![10_000, 1_000_000],
            sensitivity: Some(5.0),
            output,
            verbose: true,
        }
    }

    #[test]
    fn sweeps_the_demo_design() -> Result<(), Box<dyn Error>> {
        let output_path = resource("generated/chipsweep_test_output.json");
        std::fs::create_dir_all(resource("generated"))?;
        _main(&options(output_path.clone()))?;

        let written: serde_json::Value = SerializationFormat::Json.open(&output_path)?;
        let points = written["quantities"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["quantity"], 10_000);
        // Fewer units carry more NRE each
        assert!(points[0]["nre"].as_f64().unwrap() > points[1]["nre"].as_f64().unwrap());
        assert!(!written["sensitivity"].as_array().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn requires_something_to_sweep() {
        let mut opts = options(String::new());
        opts.quantities.clear();
        opts.sensitivity = None;
        assert!(_main(&opts).is_err());
    }

    /// Grab the full path of resource-file `fname`
    fn resource(rname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
    }
}
