//! Output formatting.
//!
//! This module handles everything the tool writes:
//! - [`terraform`] - Declaration for the provisioning engine
//! - [`csv`] - Address plan as CSV
//! - [`terminal`] - Terminal reports with colors

mod csv;
mod terminal;
mod terraform;

pub use csv::{csv_row, print_address_plan, CSV_HEADER};
pub use terminal::{format_check_report, format_field, format_order, format_plan, format_verdict};
pub use terraform::{render, write_declaration};
