//! Macro for implementing Display and FromStr for state enums
//!
//! Connection states and environment modes are logged and read from
//! configuration as lowercase strings; this macro keeps both directions in one
//! place and parses case-insensitively.
//!
//! # Example
//!
//! ```rust
//! use bdaybot_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeliveryOutcome {
//!     Sent,
//!     Skipped,
//!     Failed,
//! }
//!
//! impl_domain_status_conversions!(DeliveryOutcome {
//!     Sent => "sent",
//!     Skipped => "skipped",
//!     Failed => "failed",
//! });
//! ```

/// Implements `Display` (lowercase) and `FromStr` (case-insensitive) for a
/// unit-variant enum. Parse errors name the enum and the rejected input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
