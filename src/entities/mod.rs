//! Macros for declaring resources

pub mod macros;
