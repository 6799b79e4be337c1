//! Flat listing of named unknowns.

use std::fmt::Write;

use fs_model::{Assignment, EntityModel};
use serde::Serialize;

use crate::display_value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub value: f64,
    pub fixed: bool,
}

/// Every live unknown in declaration order.
pub fn listing(model: &EntityModel, values: &Assignment) -> Vec<ListingEntry> {
    model
        .variables()
        .map(|v| ListingEntry {
            name: v.name.clone(),
            value: display_value(values.get(v.id)),
            fixed: v.fixed.is_some(),
        })
        .collect()
}

pub fn render_listing(entries: &[ListingEntry]) -> String {
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for e in entries {
        let _ = write!(out, "{:<width$}  {:.6}", e.name, e.value);
        if e.fixed {
            out.push_str("  (fixed)");
        }
        out.push('\n');
    }
    out
}
