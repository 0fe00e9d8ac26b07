//! Human and JSON renderings of runs. JSON goes to stdout unchanged so it can
//! be piped; logs stay on stderr.

use llmbench_core::model::{RunItem, StatusCounts};
use llmbench_core::{BenchmarkRun, ItemStatus, RunDetail};
use serde::Serialize;

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_run(detail: &RunDetail, json: bool) -> anyhow::Result<()> {
    let summary = detail.summary();
    if json {
        return print_json(&serde_json::json!({
            "summary": summary,
            "run": detail.run,
            "items": detail.items,
        }));
    }

    let run = &detail.run;
    let canceled = if run.is_canceled() { " (canceled)" } else { "" };
    println!("run {}  {}{}", run.id, run.status.as_str(), canceled);
    println!("collection {}  judge {}", run.task_collection_id, run.judge);
    println!("created {}", run.created_at.to_rfc3339());
    if let Some(finished) = run.finished_at {
        println!("finished {}", finished.to_rfc3339());
    }
    println!("items {}: {}", summary.counts.total(), counts_line(&summary.counts));
    if let Some(mean) = summary.mean_score {
        println!("mean score {:.1}", mean);
    }
    for item in &detail.items {
        println!("  {}", item_line(item));
    }
    Ok(())
}

pub(crate) fn print_runs(runs: &[(BenchmarkRun, StatusCounts)], json: bool) -> anyhow::Result<()> {
    if json {
        let rows: Vec<_> = runs
            .iter()
            .map(|(run, counts)| serde_json::json!({ "run": run, "counts": counts }))
            .collect();
        return print_json(&rows);
    }
    if runs.is_empty() {
        println!("no runs");
        return Ok(());
    }
    for (run, counts) in runs {
        let canceled = if run.is_canceled() { " canceled" } else { "" };
        println!(
            "{}  {:<9}{}  {}  {}  [{}]",
            run.id,
            run.status.as_str(),
            canceled,
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.task_collection_id,
            counts_line(counts)
        );
    }
    Ok(())
}

fn counts_line(counts: &StatusCounts) -> String {
    format!(
        "pending {}, waiting for judge {}, completed {}, failed {}",
        counts.pending, counts.waiting_for_judge, counts.completed, counts.failed
    )
}

fn item_line(item: &RunItem) -> String {
    let mut line = format!(
        "#{} {} {} {}",
        item.id,
        item.task_id,
        item.target,
        item.status.as_str()
    );
    match item.status {
        ItemStatus::Completed => {
            if let Some(score) = item.score {
                line.push_str(&format!(" score {}", score));
            }
        }
        ItemStatus::Failed => {
            if let Some(msg) = &item.error_msg {
                line.push_str(&format!(" error: {}", msg));
            }
        }
        ItemStatus::Pending | ItemStatus::WaitingForJudge => {
            if item.is_leased() {
                line.push_str(" (in progress)");
            } else if let Some(msg) = &item.error_msg {
                line.push_str(&format!(" retrying after: {}", msg));
            }
        }
    }
    line
}
