//! Binary format readers.

pub mod codesign;
pub mod macho;
