use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::engine::{MigrationStats, Preview};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    source: &'a str,
    #[serde(flatten)]
    stats: MigrationStats,
}

#[derive(Debug, Serialize)]
struct DryRunReport<'a> {
    dry_run: bool,
    source: &'a str,
    task_count: usize,
    #[serde(flatten)]
    preview: &'a Preview,
}

pub fn print_report(source: &str, stats: &MigrationStats, format: Format) -> Result<()> {
    match format {
        Format::Json => println!(
            "{}",
            serde_json::to_string(&Report {
                source,
                stats: *stats
            })?
        ),
        Format::Pretty => {
            println!("{}", format!("Imported {}", source).bold());
            println!("  tasks created:    {}", stats.tasks_created);
            println!("  comments created: {}", stats.comments_created);
            println!("  completed subtrees skipped: {}", stats.subtrees_skipped);
        }
        Format::Minimal => {
            println!(
                "{} tasks {} comments {} skipped",
                stats.tasks_created, stats.comments_created, stats.subtrees_skipped
            );
        }
    }
    Ok(())
}

pub fn print_preview(source: &str, preview: &Preview, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let report = DryRunReport {
                dry_run: true,
                source,
                task_count: preview.tasks.len(),
                preview,
            };
            println!("{}", serde_json::to_string(&report)?);
        }
        Format::Pretty => {
            println!(
                "{}",
                format!(
                    "Dry run: {} would create {} tasks (no conduit calls made)",
                    source,
                    preview.tasks.len()
                )
                .bold()
            );
            for planned in &preview.tasks {
                let indent = "  ".repeat(planned.depth);
                let assignee = planned
                    .assignee
                    .as_deref()
                    .map(|name| format!(" assignee={name}"))
                    .unwrap_or_default();
                let due = planned
                    .due_on
                    .map(|date| format!(" due={date}"))
                    .unwrap_or_default();
                let comments = if planned.comments == 0 {
                    String::new()
                } else {
                    format!(" comments={}", planned.comments)
                };
                println!(
                    "  {:>3}. {}{}{}{}{}",
                    planned.order, indent, planned.title, assignee, due, comments
                );
            }
            if preview.subtrees_skipped > 0 {
                println!(
                    "  {} completed subtree(s) would be skipped",
                    preview.subtrees_skipped
                );
            }
        }
        Format::Minimal => {
            println!(
                "dry-run {} {} {}",
                preview.tasks.len(),
                preview.subtrees_skipped,
                source
            );
            for planned in &preview.tasks {
                println!("{:>3}. {}", planned.order, planned.title);
            }
        }
    }
    Ok(())
}
