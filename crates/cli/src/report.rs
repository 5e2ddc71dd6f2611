use anyhow::Result;
use iacscan_core::ScanReport;
use serde_json::json;
use std::io::Write;

pub fn render_cli(report: &ScanReport, w: &mut impl Write) -> Result<()> {
    let s = report.summary();
    writeln!(w, "Passed checks: {}, Failed checks: {}, Unknown checks: {}", s.passed, s.failed, s.unknown)?;
    for r in &report.records {
        writeln!(w)?;
        writeln!(w, "Check: {}: \"{}\"", r.check_id, r.check_name)?;
        writeln!(w, "\t{} for resource: {}.{}", r.result, r.resource_type, r.resource)?;
        writeln!(w, "\tFile: {}", r.file)?;
        for k in &r.evaluated_keys {
            writeln!(w, "\tEvaluated key: {}", k)?;
        }
    }
    Ok(())
}

pub fn render_json(report: &ScanReport, w: &mut impl Write) -> Result<()> {
    let body = json!({ "summary": report.summary(), "results": report.records });
    serde_json::to_writer_pretty(&mut *w, &body)?;
    writeln!(w)?;
    Ok(())
}
