//!
//! # Error-Helper Utilities
//!
//! ```rust
//! use chiplet21utils::error::{ErrorHelper, Unwrapper};
//!
//! /// A walker over a chip hierarchy, which remembers the chip it is currently visiting.
//! struct Walker {
//!     chip: String,
//! }
//! impl ErrorHelper for Walker {
//!     type Error = String;
//!
//!     fn err(&self, msg: impl Into<String>) -> Self::Error {
//!         format!("{} (while visiting chip `{}`)", msg.into(), self.chip)
//!     }
//! }
//! impl Walker {
//!     fn visit(&self, quantity: Option<u64>) -> Result<u64, String> {
//!         let quantity = quantity.unwrapper(self, "Missing quantity")?;
//!         self.assert(quantity > 0, "Quantity must be positive")?;
//!         Ok(quantity)
//!     }
//! }
//!
//! let w = Walker { chip: "cpu".into() };
//! assert_eq!(w.visit(Some(5)), Ok(5));
//! assert!(w.visit(None).unwrap_err().contains("cpu"));
//! ```
//!

///
/// # ErrorHelper
///
/// Helper trait shared by the tree-walkers which build, resolve, and evaluate chip hierarchies.
/// Implementers generally carry a context-stack to report upon failure,
/// which they inject in the required `err` method.
/// All other methods are provided in terms of `err`.
///
pub trait ErrorHelper {
    type Error;

    /// Create and return a [Self::Error] value.
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap the [Option] `opt` if it is [Some], and return our error if not.
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Assert a boolean condition. Returns through `self.fail` if it is not satisfied.
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        match b {
            true => Ok(()),
            false => self.fail(msg),
        }
    }
}

///
/// # Unwrapper
///
/// Post-fix application of [`ErrorHelper`] handling for [`Option`]s and [`Result`]s.
///
/// ```rust
/// use chiplet21utils::error::{ErrorHelper, Unwrapper};
///
/// fn lookup(h: &impl ErrorHelper<Error = String>, name: &str) -> Result<f64, String> {
///     let known = [("metal", 0.05), ("active", 0.1)];
///     let density = known
///         .iter()
///         .find(|(n, _)| *n == name)
///         .map(|(_, d)| *d)
///         .unwrapper(h, format!("Unknown layer `{}`", name))?;
///     Ok(density)
/// }
/// ```
///
/// The intent is not to implement [`Unwrapper`] for new types,
/// but to import it and use it on the standard library [`Option`] and [`Result`].
///
pub trait Unwrapper {
    type Ok;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper;
}

/// # Unwrapper for [`Option`]
/// Routes `None` to the paired [`ErrorHelper`] rather than panicking.
impl<T> Unwrapper for Option<T> {
    type Ok = T;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Some(t) => Ok(t),
            None => helper.fail(msg),
        }
    }
}

/// # Unwrapper for [`Result`]
/// Routes `Err` to the paired [`ErrorHelper`], discarding the original error.
impl<T, E> Unwrapper for Result<T, E> {
    type Ok = T;
    fn unwrapper<H>(
        self,
        helper: &H,
        msg: impl Into<String>,
    ) -> Result<<Self as Unwrapper>::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Ok(t) => Ok(t),
            Err(_) => helper.fail(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefixed(&'static str);
    impl ErrorHelper for Prefixed {
        type Error = String;
        fn err(&self, msg: impl Into<String>) -> String {
            format!("{}: {}", self.0, msg.into())
        }
    }

    #[test]
    fn asserts_route_through_err() {
        let h = Prefixed("chip");
        assert!(h.assert(true, "unused").is_ok());
        assert_eq!(h.assert(false, "duplicate"), Err("chip: duplicate".to_string()));
        assert_eq!(h.fail::<u32>("bad"), Err("chip: bad".to_string()));
    }

    #[test]
    fn unwrapper_routes_failures() {
        let h = Prefixed("lookup");
        let none: Option<u32> = None;
        assert_eq!(none.unwrapper(&h, "missing"), Err("lookup: missing".into()));
        let bad: Result<u32, ()> = Err(());
        assert_eq!(bad.unwrapper(&h, "failed"), Err("lookup: failed".into()));
        assert_eq!(Some(3).unwrapper(&h, "unused"), Ok(3));
    }
}
