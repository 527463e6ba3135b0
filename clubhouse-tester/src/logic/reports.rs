use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use clubhouse_game::numbers::{round_f64_to_u32, u64_to_f64};

use super::ScenarioResult;

fn count_to_f64(count: usize) -> f64 {
    u64_to_f64(u64::try_from(count).unwrap_or(u64::MAX))
}

fn success_rate(results: &[ScenarioResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    (count_to_f64(passed) / count_to_f64(results.len())) * 100.0
}

/// Mean turns per finished campaign, rounded.
fn average_turns(result: &ScenarioResult) -> u32 {
    if result.campaigns.is_empty() {
        return 0;
    }
    let total: u64 = result.campaigns.iter().map(|c| u64::from(c.turns)).sum();
    round_f64_to_u32(u64_to_f64(total) / count_to_f64(result.campaigns.len()))
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Campaign Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "================================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenarios: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(out, "{} {}", status, result.scenario_name.bold())?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;
        if !result.campaigns.is_empty() {
            let forced: u32 = result.campaigns.iter().map(|c| c.forced_stops).sum();
            let skipped: u32 = result.campaigns.iter().map(|c| c.skipped_events).sum();
            writeln!(
                out,
                "   Average turns: {} | forced stops: {forced} | skipped events: {skipped}",
                average_turns(result)
            )?;
        }

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# Clubhouse Campaign Test Results\n")?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {failed_tests}")?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };

        writeln!(out, "### {} {}\n", status, result.scenario_name)?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
        writeln!(out, "- **Average turns**: {}", average_turns(result))?;

        if !result.campaigns.is_empty() {
            writeln!(out, "\n| Seed | Turns | Reputation | Scripted | Headline |")?;
            writeln!(out, "|---|---|---|---|---|")?;
            for campaign in &result.campaigns {
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    campaign.seed,
                    campaign.turns,
                    campaign.final_reputation,
                    campaign.scripted_events,
                    campaign.headline
                )?;
            }
        }

        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
