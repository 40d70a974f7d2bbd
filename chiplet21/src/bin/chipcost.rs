//! # chipcost
//!
//! Evaluate the area, yield, cost, and power of a chiplet design.
//!
//! Reads the five process libraries, a design tree, and a netlist,
//! and writes the system-level results, optionally with the cost breakdown and per-chip report.

use clap::Parser;
use serde::Serialize;
use std::error::Error;

use chiplet21::{
    CostBreakdown, Design, Evaluation, Libraries, Netlist, NodeReport, SerdeFile,
    SerializationFormat, SystemResult,
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
    /// Include the scrap / non-scrap cost breakdown
    #[clap(short, long)]
    breakdown: bool,
    /// Include the per-chip report
    #[clap(short, long)]
    report: bool,
    /// Output file. Format is inferred from its extension. Printed as YAML if empty.
    #[clap(short = 'o', long, default_value = "")]
    output: String,
    #[clap(short, long)]
    verbose: bool,
}

/// Everything written by a run
#[derive(Serialize)]
struct Output {
    system: SystemResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<NodeReport>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let options = ProgramOptions::parse();
    return _main(&options);
}

fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    let libs = Libraries::load_all(&[
        &options.wafers,
        &options.layers,
        &options.assembly,
        &options.test,
        &options.io,
    ])?;
    if options.verbose {
        println!("read libraries");
    }
    let design = Design::load(&options.design)?;
    let netlist = Netlist::load(&options.netlist)?;
    if options.verbose {
        println!("read: {:?}, {:?}", &options.design, &options.netlist);
    }

    let eval = Evaluation::run(&design, &netlist, &libs)?;
    let output = Output {
        system: eval.system(),
        breakdown: options.breakdown.then(|| eval.breakdown()),
        report: options.report.then(|| eval.report.clone()),
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
            breakdown: true,
            report: true,
            output,
            verbose: true,
        }
    }

    #[test]
    fn evaluates_the_demo_design() -> Result<(), Box<dyn Error>> {
        let output_path = resource("generated/chipcost_test_output.json");
        std::fs::create_dir_all(resource("generated"))?;
        _main(&options(output_path.clone()))?;

        let written: serde_json::Value = SerializationFormat::Json.open(&output_path)?;
        let system = &written["system"];
        assert!(system["cost"].as_f64().unwrap() > 0.0);
        let y = system["yield"].as_f64().unwrap();
        assert!(y > 0.0 && y <= 1.0);
        assert!(written["breakdown"]["scrap_cost"].as_f64().unwrap() > 0.0);
        assert_eq!(written["report"]["name"], "interposer");
        Ok(())
    }

    #[test]
    fn fails_on_missing_libraries() {
        let mut opts = options(String::new());
        opts.io = resource("lib/nonexistent.yaml");
        assert!(_main(&opts).is_err());
    }

    /// Grab the full path of resource-file `fname`
    fn resource(rname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
    }
}
