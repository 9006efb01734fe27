//! Macro for implementing Display and FromStr for domain enums
//!
//! Generates a single canonical string per variant for `Display` and a
//! case-insensitive `FromStr`, so values read from environment variables or
//! account metadata (`"Session"`, `"session"`, `"SESSION"`) all parse.
//!
//! # Example
//!
//! ```rust
//! use polaris_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Hot,
//!     Cold,
//! }
//!
//! impl_domain_enum_conversions!(Tier {
//!     Hot => "Hot",
//!     Cold => "Cold",
//! });
//!
//! assert_eq!("hot".parse::<Tier>().unwrap(), Tier::Hot);
//! assert_eq!(Tier::Cold.to_string(), "Cold");
//! ```

/// Implements Display and case-insensitive FromStr for a fieldless enum
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
