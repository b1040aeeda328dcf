//! Protocol module - U-Boot console grammar and constants.

pub mod constants;
pub mod grammar;

pub use constants::*;
pub use grammar::{DumpLine, clean_lines, parse_help_table, parse_key_values};
