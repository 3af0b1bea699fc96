//! Exported function extraction from header text
//!
//! A function is exported when its declaration reads
//! `MARKER <type/qualifier words> name(`. Every candidate from the coarse
//! scan is confirmed by a second search for the full declaration; candidates
//! that fail confirmation are discarded.
//!
//! Global invariants enforced:
//! - Pure function of the header text and marker
//! - Names are returned in order of first appearance, without duplicates

use crate::ast::{FunctionDescriptor, ParameterDescriptor};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// Compiled patterns for one export marker
#[derive(Debug, Clone)]
pub struct ExportScanner {
    marker: String,
    candidate: Regex,
}

impl ExportScanner {
    pub fn new(marker: &str) -> Result<Self> {
        let candidate = Regex::new(&format!(
            r"\b{}\s+(?:[A-Za-z0-9_*]+\s+)+\**\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(",
            regex::escape(marker)
        ))
        .with_context(|| format!("invalid export marker: {}", marker))?;

        Ok(ExportScanner {
            marker: marker.to_string(),
            candidate,
        })
    }

    /// Names of exported functions, in order of first appearance
    pub fn exported_names(&self, header: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.candidate
            .captures_iter(header)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Raw parameter text of the full declaration of `name`, if it can be confirmed
    pub fn declaration_params(&self, header: &str, name: &str) -> Option<String> {
        let full = Regex::new(&format!(
            r"(?s)\b{}\s+(?:[A-Za-z0-9_*]+\s+)+\**\s*{}\s*\(([^)]*)\)",
            regex::escape(&self.marker),
            regex::escape(name)
        ))
        .ok()?;
        full.captures(header)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Exported functions with their coarse, header-derived parameters
    pub fn exported_functions(&self, header: &str) -> Vec<FunctionDescriptor> {
        self.exported_names(header)
            .into_iter()
            .filter_map(|name| {
                let params = self.declaration_params(header, &name)?;
                Some(FunctionDescriptor::new(name, coarse_params(&params)))
            })
            .collect()
    }
}

/// Split header parameter text without any nesting awareness.
///
/// Provisional only: the parameter list is re-derived from the definition
/// once the function body is located.
pub fn coarse_params(text: &str) -> Vec<ParameterDescriptor> {
    text.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "void")
        .map(|p| {
            let is_pointer = p.contains('*');
            let mut words: Vec<&str> = p.split_whitespace().collect();
            let name = words.pop().unwrap_or_default().replace('*', "");
            let mut ty = words.join(" ");
            if ty.contains('*') {
                ty = ty.replace('*', "").trim().to_string();
            }
            ParameterDescriptor::new(name, ty, is_pointer)
        })
        .collect()
}
