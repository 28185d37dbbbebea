//! Location resolution: explicit coordinates, a built-in city dataset with
//! fuzzy matching, IP geolocation and the last stored location.

pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{builtin_lookup, LocationProvider};
pub use resolver::LocationResolver;
pub use types::{LocationError, LocationQuery, LocationSource, ResolvedLocation};
