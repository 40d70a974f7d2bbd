//!
//! # Error Contexts
//!
//! Breadcrumbs pushed and popped by tree-walkers, so that a failure deep in a design
//! can report which library record, chip, or net it came from.
//!

/// Enumerated evaluation contexts
/// Generally used for error reporting
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorContext {
    /// Process-library category, e.g. "layers"
    Library(String),
    /// Named record within a library category
    Record(String),
    /// Chip, by name
    Chip(String),
    /// Net, by index into its netlist
    Net(usize),
    /// Named field of the current record
    Field(String),
}
impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Library(s) => write!(f, "library `{}`", s),
            Self::Record(s) => write!(f, "record `{}`", s),
            Self::Chip(s) => write!(f, "chip `{}`", s),
            Self::Net(idx) => write!(f, "net #{}", idx),
            Self::Field(s) => write!(f, "field `{}`", s),
        }
    }
}

/// Render a context-stack as a single breadcrumb string, outermost first.
pub fn context_path(stack: &[ErrorContext]) -> String {
    stack
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" / ")
}
