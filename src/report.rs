use crate::metrics::ActionMetrics;
use crate::scenarios::ScenarioReport;
use colored::Colorize;
use std::fs;
use std::path::Path;

pub fn print_scenario_report(report: &ScenarioReport) {
    println!();
    println!("📊 {} ({:.2}s)", report.name.bold(), report.elapsed_secs);
    println!("{}", "=".repeat(report.name.len() + 12));

    for phase in &report.phases {
        print_action_metrics(phase);
    }

    for note in &report.notes {
        println!("  • {}", note);
    }

    println!();
    if let Some(err) = &report.error {
        println!("{}", format!("❌ Scenario failed: {}", err).red());
    }
    if report.failed_operations() == 0 {
        println!("{}", "✅ All calls succeeded".green());
    } else {
        println!(
            "{}",
            format!("❌ {} calls failed", report.failed_operations()).red()
        );
    }
}

fn print_action_metrics(metrics: &ActionMetrics) {
    let status = if metrics.failed_operations == 0 {
        "PASS".green()
    } else {
        "FAIL".red()
    };
    println!();
    println!("{} [{}]", metrics.action, status);
    println!(
        "  Calls: {} total, {} ok, {} failed ({:.2}% errors)",
        metrics.total_operations,
        metrics.successful_operations,
        metrics.failed_operations,
        metrics.error_rate()
    );
    println!(
        "  Elapsed: {:.2}s, throughput {:.2} calls/sec",
        metrics.elapsed_secs(),
        metrics.throughput_ops_per_sec
    );
    println!(
        "  Latency: min {}ms, avg {}ms, p50 {}ms, p95 {}ms, p99 {}ms, max {}ms",
        metrics.min_latency_ms,
        metrics.avg_latency_ms,
        metrics.p50_latency_ms,
        metrics.p95_latency_ms,
        metrics.p99_latency_ms,
        metrics.max_latency_ms
    );
    if !metrics.errors_by_type.is_empty() {
        let mut kinds: Vec<_> = metrics.errors_by_type.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            println!("  Errors ({}): {}", kind, count);
        }
    }
    if let Some(first) = &metrics.first_error {
        println!("  First error: {}", first);
    }
}

pub fn report_json(report: &ScenarioReport) -> serde_json::Value {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "scenario": report.name,
        "elapsed_secs": report.elapsed_secs,
        "failed_operations": report.failed_operations(),
        "phases": report.phases,
        "notes": report.notes,
        "succeeded": report.succeeded(),
        "error": report.error,
    })
}

pub fn save_report_json(report: &ScenarioReport, path: &Path) -> std::io::Result<()> {
    fs::write(path, serde_json::to_string_pretty(&report_json(report))?)?;
    Ok(())
}
