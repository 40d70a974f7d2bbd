//!
//! # Design Records
//!
//! The serializable form of a design: a tree of [ChipRecord]s and a flat [Netlist] of [NetRecord]s.
//! Names in these records refer to process-library entries and to other chips;
//! they are resolved by [crate::tree::build_tree] and [crate::nets::resolve_nets].
//!

// Crates.io
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject, SubschemaValidation};
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Workspace Imports
use chiplet21utils::{enumstr, SerdeFile};

///
/// # Override
///
/// A value which is either computed by the model, or fixed ("black-boxed") by the design.
///
/// Serialized as either a number, or the empty string for [Override::Computed].
/// Deserialization also accepts `null` as [Override::Computed].
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Override<T> {
    Computed,
    Fixed(T),
}
impl<T> Default for Override<T> {
    fn default() -> Self {
        Self::Computed
    }
}
impl<T: Copy> Override<T> {
    /// The fixed value, if any
    pub fn fixed(&self) -> Option<T> {
        match self {
            Self::Fixed(v) => Some(*v),
            Self::Computed => None,
        }
    }
    /// Resolve to the fixed value, or to `computed` otherwise
    pub fn or(&self, computed: T) -> T {
        self.fixed().unwrap_or(computed)
    }
}
impl<T> From<Option<T>> for Override<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Self::Fixed(v),
            None => Self::Computed,
        }
    }
}
impl<T: Serialize> Serialize for Override<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Computed => serializer.serialize_str(""),
            Self::Fixed(v) => v.serialize(serializer),
        }
    }
}
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Override<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<V> {
            Value(V),
            Text(String),
        }
        match Option::<Raw<T>>::deserialize(deserializer)? {
            None => Ok(Self::Computed),
            Some(Raw::Value(v)) => Ok(Self::Fixed(v)),
            Some(Raw::Text(s)) if s.trim().is_empty() => Ok(Self::Computed),
            Some(Raw::Text(s)) => Err(D::Error::custom(format!(
                "expected a number or an empty string, found {:?}",
                s
            ))),
        }
    }
}
impl<T: JsonSchema> JsonSchema for Override<T> {
    fn schema_name() -> String {
        format!("Override_{}", T::schema_name())
    }
    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let empty = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            const_value: Some(serde_json::Value::String(String::new())),
            ..Default::default()
        };
        let any_of = vec![gen.subschema_for::<T>(), empty.into()];
        SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                any_of: Some(any_of),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

enumstr!(
    /// # Die Orientation
    /// Whether a die's active face points away from (up) or towards (down) its parent.
    #[derive(JsonSchema)]
    Orientation {
        FaceUp: "face-up",
        FaceDown: "face-down",
    }
);

enumstr!(
    /// # Stack Side
    /// Which side of its parent a die is bonded to.
    #[derive(JsonSchema)]
    StackSide {
        Face: "face",
        Back: "back",
    }
);

/// # Stackup Entry
/// `count` repeated instances of the layer named `layer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StackupEntry {
    pub count: u32,
    pub layer: String,
}

///
/// # Stackup Record
///
/// Either the compact text form `"1:active_5nm,10:metal_5nm"`,
/// or an explicit list of [StackupEntry].
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StackupRecord {
    Text(String),
    Entries(Vec<StackupEntry>),
}
impl Default for StackupRecord {
    fn default() -> Self {
        Self::Entries(Vec::new())
    }
}
impl StackupRecord {
    /// Parse into a list of [StackupEntry].
    /// Returns a description of the first malformed entry on failure.
    pub fn entries(&self) -> Result<Vec<StackupEntry>, String> {
        let text = match self {
            Self::Entries(e) => return Ok(e.clone()),
            Self::Text(t) => t,
        };
        let mut entries = Vec::new();
        for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (count, layer) = item
                .split_once(':')
                .ok_or_else(|| format!("stackup entry {:?} is not of the form `count:layer`", item))?;
            let count = count
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid layer count in stackup entry {:?}", item))?;
            let layer = layer.trim();
            if layer.is_empty() {
                return Err(format!("missing layer name in stackup entry {:?}", item));
            }
            entries.push(StackupEntry {
                count,
                layer: layer.to_string(),
            });
        }
        Ok(entries)
    }
}
impl From<Vec<StackupEntry>> for StackupRecord {
    fn from(e: Vec<StackupEntry>) -> Self {
        Self::Entries(e)
    }
}

///
/// # Chip Record
///
/// One die, substrate, or interposer, and (via `chips`) everything stacked directly upon it.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChipRecord {
    /// Chip name, unique within its design
    pub name: String,

    // Black-box overrides
    pub bb_area: Override<f64>,
    pub bb_cost: Override<f64>,
    pub bb_quality: Override<f64>,
    pub bb_power: Override<f64>,

    /// Width / height. Computed value is 1.0, a square die.
    pub aspect_ratio: Override<f64>,
    /// Offset (mm) of the lower-left corner from the parent's lower-left corner
    pub x_location: Override<f64>,
    pub y_location: Override<f64>,
    pub orientation: Orientation,
    pub stack_side: StackSide,

    /// Core (non-IO) area, mm^2
    pub core_area: f64,
    pub fraction_memory: f64,
    pub fraction_logic: f64,
    pub fraction_analog: f64,
    pub gate_flop_ratio: f64,
    /// Fraction of the mask set paid for by this chip
    pub reticle_share: f64,
    /// Embedded in its parent, contributing no footprint
    pub buried: bool,

    // Library references
    pub assembly_process: String,
    pub test_process: String,
    pub wafer_process: String,
    pub stackup: StackupRecord,

    /// Volts
    pub core_voltage: f64,
    /// Watts, excluding IO power
    pub power: f64,
    /// Production quantity, over which NRE is amortized
    pub quantity: i64,

    /// Chips stacked directly on this one
    pub chips: Vec<ChipRecord>,
}
impl SerdeFile for ChipRecord {}

/// A design is its root chip
pub type Design = ChipRecord;

impl ChipRecord {
    /// Depth-first, pre-order iteration over this record and all its descendants
    pub fn iter(&self) -> impl Iterator<Item = &ChipRecord> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.chips.iter().rev());
            Some(next)
        })
    }
    /// Mutable visit of this record and all its descendants, pre-order
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut ChipRecord)) {
        f(self);
        for chip in self.chips.iter_mut() {
            chip.visit_mut(f);
        }
    }
}

/// The reserved endpoint name for off-package connections
pub const EXTERNAL: &str = "external";

///
/// # Net Record
///
/// A connection between two chips (`block0` and `block1`) through IO cells of type `io_type`.
/// For directional IO types `block0` transmits and `block1` receives.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NetRecord {
    #[serde(rename = "type")]
    pub io_type: String,
    pub block0: String,
    pub block1: String,
    /// Explicit IO-cell instance count, superseding `bandwidth`
    pub bb_count: Override<u64>,
    /// Required bandwidth, Gbps
    pub bandwidth: f64,
    pub average_bandwidth_utilization: f64,
}

/// # Netlist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Netlist {
    pub nets: Vec<NetRecord>,
}
impl SerdeFile for Netlist {}
