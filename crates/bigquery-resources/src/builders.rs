//! Typestate builders for resources that are tedious to spell out by hand.
pub mod table_field_schema;

/// Marker for a builder slot that has not been filled in yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unset;
