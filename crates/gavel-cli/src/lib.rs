//! Gavel CLI library.
//!
//! Exposes argument parsing, command implementations, and the local query
//! matcher so the binary stays a thin shell and tests can drive commands
//! directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod matcher;
