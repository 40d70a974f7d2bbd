//!
//! # Chiplet21
//!
//! Cost, yield, area, and power model for multi-die ("chiplet") systems.
//!
//! A design is a tree of chips: each chip is fabricated on a wafer process from a stackup of layers,
//! optionally tested, and bonded onto its parent by its parent's assembly process.
//! Chips communicate over a netlist of IO-cell connections.
//! Evaluation folds yields, costs, NRE, and power from the leaves of this tree up to its root.
//!
//! ```no_run
//! use chiplet21::{Design, Evaluation, Libraries, Netlist, SerdeFile};
//!
//! let libs = Libraries::load_all(&["layers.yaml", "ios.yaml"]).unwrap();
//! let design = Design::load("design.yaml").unwrap();
//! let netlist = Netlist::load("netlist.yaml").unwrap();
//! let sys = Evaluation::run(&design, &netlist, &libs).unwrap().system();
//! println!("{:?}", sys);
//! ```
//!

// Internal modules & re-exports
pub use chiplet21utils as utils;
pub use utils::{SerdeFile, SerializationFormat};

pub mod error;
pub use error::{ChipError, ChipResult};

pub mod data;
pub use data::{ChipRecord, Design, NetRecord, Netlist, Orientation, Override, StackSide};

pub mod library;
pub use library::{Libraries, LibraryRecords};

pub mod validate;
pub mod wafer;
pub mod layer;
pub mod assembly;
pub mod dft;
pub mod nre;
pub mod footprint;

pub mod tree;
pub use tree::{build_tree, ChipNode};

pub mod nets;
pub use nets::{resolve_nets, NetResolution};

pub mod eval;
pub use eval::{evaluate, CostBreakdown, Evaluation, NodeReport, SystemResult};

pub mod sweep;
pub use sweep::{sensitivity, sweep_quantity, QuantityPoint, Sensitivity};

pub mod generate;
pub use generate::{generate_stack, StackGenOptions};


/// JSON schema of every on-disk input: library records, designs, and netlists
pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "libraries": schemars::schema_for!(LibraryRecords),
        "design": schemars::schema_for!(Design),
        "netlist": schemars::schema_for!(Netlist),
    })
}
