//! Run reports and output listings
//!
//! Global invariants enforced:
//! - Deterministic output ordering (files in processing order, leftovers sorted by name)
//! - Byte-for-byte identical output across runs on identical input

use crate::ast::FunctionDescriptor;
use crate::rewrite::InstrumentedFunction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What happened to one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub instrumented: Vec<InstrumentedFunction>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub already_instrumented: Vec<String>,
    pub include_added: bool,
    /// False for unchanged files and for dry runs
    pub written: bool,
}

impl FileOutcome {
    pub fn changed(&self) -> bool {
        !self.instrumented.is_empty()
    }
}

/// A file that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// A parameter left out of (or annotated in) a log call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnformattedParam {
    pub function: String,
    pub param: String,
}

/// Summary of one instrumentation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: String,
    pub dry_run: bool,
    pub roots: Vec<String>,
    pub headers_scanned: usize,
    pub exported: usize,
    pub files_scanned: usize,
    /// Files with at least one instrumented function
    pub files: Vec<FileOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped: Vec<SkippedFile>,
    /// Exported functions never found in any source file
    pub leftovers: Vec<String>,
}

impl RunReport {
    pub fn files_changed(&self) -> usize {
        self.files.iter().filter(|f| f.changed()).count()
    }

    pub fn instrumented_count(&self) -> usize {
        self.files.iter().map(|f| f.instrumented.len()).sum()
    }

    pub fn already_instrumented_count(&self) -> usize {
        self.files.iter().map(|f| f.already_instrumented.len()).sum()
    }

    pub fn unformatted_params(&self) -> Vec<UnformattedParam> {
        self.files
            .iter()
            .flat_map(|f| &f.instrumented)
            .flat_map(|func| {
                func.unformatted.iter().map(|param| UnformattedParam {
                    function: func.name.clone(),
                    param: param.clone(),
                })
            })
            .collect()
    }
}

/// Render a run report as human-readable text
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    for file in report.files.iter().filter(|f| f.changed()) {
        out.push_str(&format!(
            "{} ({} function{}{})\n",
            file.path,
            file.instrumented.len(),
            if file.instrumented.len() == 1 { "" } else { "s" },
            if file.include_added { ", include added" } else { "" }
        ));
        for func in &file.instrumented {
            out.push_str(&format!("  {}:{} {}\n", file.path, func.line, func.name));
        }
    }

    for skipped in &report.skipped {
        out.push_str(&format!("skipped {}: {}\n", skipped.path, skipped.reason));
    }

    let unformatted = report.unformatted_params();
    if !unformatted.is_empty() {
        out.push_str("\nParameters without a format specifier:\n");
        for p in &unformatted {
            out.push_str(&format!("  {}: {}\n", p.function, p.param));
        }
    }

    out.push_str(&format!(
        "\nMode: {}{}\n",
        report.mode,
        if report.dry_run { " (dry run)" } else { "" }
    ));
    out.push_str(&format!("Headers scanned: {}\n", report.headers_scanned));
    out.push_str(&format!("Exported functions: {}\n", report.exported));
    out.push_str(&format!(
        "Source files: {} scanned, {} changed, {} skipped\n",
        report.files_scanned,
        report.files_changed(),
        report.skipped.len()
    ));
    out.push_str(&format!(
        "Functions instrumented: {} ({} already instrumented)\n",
        report.instrumented_count(),
        report.already_instrumented_count()
    ));
    out.push_str(&format!("Left over functions: {}\n", report.leftovers.len()));

    out
}

/// Render a run report as pretty JSON
pub fn render_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize run report")
}

/// Leftover listing: one name per line
pub fn render_leftovers(leftovers: &[String]) -> String {
    leftovers.join("\n")
}

/// Exported functions as a pretty JSON array
pub fn render_exports_json(functions: &[FunctionDescriptor]) -> Result<String> {
    serde_json::to_string_pretty(functions).context("failed to serialize exported functions")
}

/// Exported functions as text, one signature per line
pub fn render_exports_text(functions: &[FunctionDescriptor]) -> String {
    let mut out = String::new();
    for f in functions {
        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| {
                format!(
                    "{}{} {}",
                    p.ty,
                    if p.is_pointer { " *" } else { "" },
                    p.name
                )
            })
            .collect();
        out.push_str(&format!("{}({})\n", f.name, params.join(", ")));
    }
    out.push_str(&format!("\n{} exported functions\n", functions.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ParameterDescriptor;

    fn sample() -> RunReport {
        RunReport {
            mode: "full".to_string(),
            dry_run: false,
            roots: vec!["/src/libobs".to_string()],
            headers_scanned: 2,
            exported: 3,
            files_scanned: 2,
            files: vec![FileOutcome {
                path: "/src/libobs/obs.c".to_string(),
                instrumented: vec![InstrumentedFunction {
                    name: "obs_set".to_string(),
                    line: 12,
                    params: vec![ParameterDescriptor::new("pos", "struct vec2", false)],
                    unformatted: vec!["pos".to_string()],
                }],
                already_instrumented: vec!["obs_get".to_string()],
                include_added: true,
                written: true,
            }],
            skipped: vec![SkippedFile {
                path: "/src/libobs/bad.c".to_string(),
                reason: "not valid UTF-8".to_string(),
            }],
            leftovers: vec!["obs_missing".to_string()],
        }
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.files_changed(), 1);
        assert_eq!(report.instrumented_count(), 1);
        assert_eq!(report.already_instrumented_count(), 1);
        assert_eq!(
            report.unformatted_params(),
            vec![UnformattedParam {
                function: "obs_set".to_string(),
                param: "pos".to_string()
            }]
        );
    }

    #[test]
    fn test_render_text_summary() {
        let text = render_text(&sample());
        assert!(text.contains("/src/libobs/obs.c (1 function, include added)"));
        assert!(text.contains("  /src/libobs/obs.c:12 obs_set"));
        assert!(text.contains("skipped /src/libobs/bad.c: not valid UTF-8"));
        assert!(text.contains("  obs_set: pos"));
        assert!(text.contains("Functions instrumented: 1 (1 already instrumented)"));
        assert!(text.contains("Left over functions: 1"));
    }

    #[test]
    fn test_render_json_is_stable() {
        let report = sample();
        let a = render_json(&report).unwrap();
        let b = render_json(&report).unwrap();
        assert_eq!(a, b);

        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(value["leftovers"][0], "obs_missing");
        assert_eq!(value["files"][0]["instrumented"][0]["params"][0]["type"], "struct vec2");
    }

    #[test]
    fn test_leftover_listing() {
        assert_eq!(
            render_leftovers(&["obs_a".to_string(), "obs_b".to_string()]),
            "obs_a\nobs_b"
        );
        assert_eq!(render_leftovers(&[]), "");
    }

    #[test]
    fn test_exports_text() {
        let functions = vec![FunctionDescriptor::new(
            "obs_frame_init",
            vec![
                ParameterDescriptor::new("frame", "obs_frame_t", true),
                ParameterDescriptor::new("width", "int", false),
            ],
        )];
        assert_eq!(
            render_exports_text(&functions),
            "obs_frame_init(obs_frame_t * frame, int width)\n\n1 exported functions\n"
        );
    }
}
