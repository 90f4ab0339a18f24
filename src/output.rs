use crate::aggregate::{GroupMean, Summary};
use crate::models::EvaluationUnit;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the score summary in the specified format
pub fn print_summary(summary: &Summary, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(summary),
        OutputFormat::Json => print_json(summary),
    }
}

/// Print summary in plain text format
fn print_plain(summary: &Summary) {
    println!("=== Score Summary ({} records) ===", summary.records);
    println!();

    print_groups_plain("Prompt Type", &summary.by_prompt_type);
    println!();
    print_groups_plain("Model (Thinking)", &summary.by_model_config);
    println!();
    print_groups_plain("Model Size (B)", &summary.by_model_size);

    for task in &summary.tasks {
        println!();
        println!("--- Task {}: {} ---", task.task_id, task.task_name);
        print_groups_plain("Prompt Type", &task.by_prompt_type);
    }
}

/// Print one grouping as a table of label, mean and count
fn print_groups_plain(title: &str, groups: &[GroupMean]) {
    if groups.is_empty() {
        println!("{}: no data.", title);
        return;
    }

    println!("{:<24} {:<8} {:<6}", title, "Mean", "Count");
    println!("{}", "-".repeat(40));

    for group in groups {
        println!("{:<24} {:<8.2} {:<6}", group.label, group.mean, group.count);
    }
}

/// Print summary in JSON format
fn print_json(summary: &Summary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing summary to JSON: {}", e),
    }
}

/// Print the enumerated units, one per line
pub fn print_plan(units: &[EvaluationUnit<'_>]) {
    for (i, unit) in units.iter().enumerate() {
        println!(
            "{:>4}  task {:<6} {:<24} thinking={:<5} {}",
            i + 1,
            unit.task.id,
            unit.model.name,
            unit.model.thinking,
            unit.prompt_type
        );
    }
    println!("{} units", units.len());
}
