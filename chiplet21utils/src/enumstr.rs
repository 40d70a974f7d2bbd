//!
//! # Enum-String Mapping Module
//!
//! Defines the [enumstr] macro and paired [EnumStr] trait,
//! for enumerations which appear in design files as one of a fixed set of strings,
//! e.g. a die's orientation of "face-up" or "face-down".
//!
//! ```rust
//! use chiplet21utils::{enumstr, EnumStr};
//!
//! enumstr!(
//!     /// # Bonding Technologies
//!     Bond {
//!         Hybrid: "hybrid",
//!         MicroBump: "micro-bump",
//!     }
//! );
//! assert_eq!(Bond::MicroBump.to_str(), "micro-bump");
//! assert_eq!(Bond::from_str("hybrid"), Some(Bond::Hybrid));
//! ```
//!

///
/// # String-Enumeration Trait
///
/// * `to_str(&self) -> &'static str` converts the enum to its string value.
/// * `from_str(&str) -> Option<Self>` does the opposite.
/// * `variants()` lists every variant, in declaration order.
///
pub trait EnumStr: std::marker::Sized + 'static {
    fn to_str(&self) -> &'static str;
    fn from_str(txt: &str) -> Option<Self>;
    fn variants() -> &'static [Self];
}

///
/// # Enum-String Pairing Macro
///
/// Creates a fieldless `enum` which:
/// * Implements [EnumStr] for conversions to and from its string-values
/// * Implements [std::fmt::Display], writing the string-values
/// * Derives `serde::{Serialize, Deserialize}`, (de)serializing *as* the string-values
///
/// Invoking crates must depend on `serde`.
///
#[macro_export]
macro_rules! enumstr {
    (   $(#[$meta: meta])*
        $enum_name: ident {
        $( $variant: ident : $strval: literal ),* $(,)?
    }) => {
        $(#[$meta])*
        #[allow(dead_code)]
        #[derive(Clone, Copy, Debug, ::serde::Deserialize, ::serde::Serialize, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $( #[doc=$strval]
               #[serde(rename = $strval)]
               $variant ),*
        }
        impl $crate::EnumStr for $enum_name {
            /// Convert a variant to its paired (static) string value.
            fn to_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $strval),*,
                }
            }
            /// Create from one of the string-values.
            /// Matching is case *sensitive*.
            fn from_str(txt: &str) -> Option<Self> {
                match txt {
                    $( $strval => Some(Self::$variant)),*,
                    _ => None,
                }
            }
            fn variants() -> &'static [Self] {
                &[ $( Self::$variant ),* ]
            }
        }
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", $crate::EnumStr::to_str(self))
            }
        }
    }
}
