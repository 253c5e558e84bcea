use std::io::{self, Write};

use crate::types::CycleReport;

const RULE: &str = "--------------------------------------------------";

/// Print a dry-run message preview to stdout.
pub fn report_preview(text: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{RULE}")?;
    writeln!(out, "{text}")?;
    writeln!(out, "{RULE}")?;
    out.flush()
}

/// Emit a cycle report as a single JSON line to stdout.
pub fn report_cycle(report: &CycleReport) {
    if let Ok(json) = serde_json::to_string(report) {
        println!("{json}");
    }
}
