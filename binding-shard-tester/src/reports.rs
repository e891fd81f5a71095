use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use crate::scenarios::ScenarioResult;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    total: usize,
    passed: usize,
    results: &'a [ScenarioResult],
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Drop Rule Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "============================".cyan())?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    writeln!(out, "Total runs: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", failed.to_string().red())?;
    #[allow(clippy::cast_precision_loss)]
    let success_rate = (passed as f64 / total.max(1) as f64) * 100.0;
    writeln!(out, "Success rate: {success_rate:.1}%")?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {}, {:?})",
            status,
            result.scenario_name.bold(),
            result.seed,
            result.backend
        )?;
        writeln!(
            out,
            "   Granted {} / Denied {} / Skipped {} in {} ms",
            result.grants, result.denials, result.skips, result.duration_ms
        )?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let report = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        total: results.len(),
        passed: results.iter().filter(|r| r.passed).count(),
        results,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# Binding Shard Drop Rule Results\n")?;
    writeln!(
        out,
        "| Scenario | Seed | Store | Result | Granted | Denied | Skipped | Time (ms) |"
    )?;
    writeln!(
        out,
        "|----------|------|-------|--------|---------|--------|---------|-----------|"
    )?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {} | {} | {:?} | {} | {} | {} | {} | {} |",
            result.scenario_name,
            result.seed,
            result.backend,
            status,
            result.grants,
            result.denials,
            result.skips,
            result.duration_ms
        )?;
    }

    let failing: Vec<_> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            for failure in &result.failures {
                writeln!(
                    out,
                    "- **{}** (seed {}): {}",
                    result.scenario_name, result.seed, failure
                )?;
            }
        }
    }
    Ok(())
}
