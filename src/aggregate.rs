//! Descriptive statistics over a finished score log.
//!
//! Every grouping is a mean score on the shared 0-100 scale.

use crate::models::{PromptType, ScoreRecord, TaskId};
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean score of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMean {
    pub label: String,
    pub mean: f64,
    pub count: usize,
}

/// Mean score of one (group, series) cell of a grouped bar chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedMean {
    pub group: String,
    pub series: String,
    pub mean: f64,
    pub count: usize,
}

/// Per-task breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBreakdown {
    pub task_id: TaskId,
    pub task_name: String,
    /// Grouped by model-thinking pair, one series per prompt type
    pub by_config_and_prompt: Vec<GroupedMean>,
    pub by_model: Vec<GroupMean>,
    pub by_prompt_type: Vec<GroupMean>,
}

/// Mean score per prompt type (rows) and task (columns)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub prompt_types: Vec<String>,
    pub tasks: Vec<String>,
    /// `cells[row][column]`, `None` where no record exists
    pub cells: Vec<Vec<Option<f64>>>,
    /// Mean across tasks per prompt type
    pub overall: Vec<Option<f64>>,
}

impl Heatmap {
    /// Lowest and highest value over cells and the overall column
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .chain(self.overall.iter())
            .flatten()
            .fold(None, |range, &v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }
}

/// Everything the charts and the printed summary are drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub records: usize,
    pub tasks: Vec<TaskBreakdown>,
    pub heatmap: Heatmap,
    pub by_prompt_type: Vec<GroupMean>,
    pub by_model_config: Vec<GroupMean>,
    pub by_model_size: Vec<GroupMean>,
    /// Grouped by prompt type, one series per model-thinking pair
    pub by_prompt_and_config: Vec<GroupedMean>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

fn accumulate<'r, K: Ord>(
    records: impl IntoIterator<Item = &'r ScoreRecord>,
    key: impl Fn(&ScoreRecord) -> K,
) -> BTreeMap<K, Accumulator> {
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().add(record.score);
    }
    groups
}

fn group_means<'r>(
    records: impl IntoIterator<Item = &'r ScoreRecord>,
    key: impl Fn(&ScoreRecord) -> String,
) -> Vec<GroupMean> {
    accumulate(records, key)
        .into_iter()
        .map(|(label, acc)| GroupMean {
            label,
            mean: acc.mean(),
            count: acc.count,
        })
        .collect()
}

fn grouped_means<'r>(
    records: impl IntoIterator<Item = &'r ScoreRecord>,
    group: impl Fn(&ScoreRecord) -> String,
    series: impl Fn(&ScoreRecord) -> String,
) -> Vec<GroupedMean> {
    accumulate(records, |r| (group(r), series(r)))
        .into_iter()
        .map(|((group, series), acc)| GroupedMean {
            group,
            series,
            mean: acc.mean(),
            count: acc.count,
        })
        .collect()
}

/// `qwen3:1.7b` with thinking on becomes `qwen3:1.7b_true`
pub fn model_thinking_label(model: &str, thinking: bool) -> String {
    format!("{}_{}", model, thinking)
}

/// Parameter count in billions from a `family:<size>b` model name
pub fn parse_model_size(model: &str) -> Option<f64> {
    let (_, tag) = model.split_once(':')?;
    let digits = tag.strip_suffix('b').or_else(|| tag.strip_suffix('B'))?;
    digits.parse().ok()
}

fn prompt_label(record: &ScoreRecord) -> String {
    record.prompt_type.label().to_string()
}

fn config_label(record: &ScoreRecord) -> String {
    model_thinking_label(&record.model, record.thinking)
}

/// Compute all groupings over a score log
pub fn summarize(records: &[ScoreRecord]) -> Result<Summary> {
    for record in records {
        ensure!(
            (0.0..=100.0).contains(&record.score),
            "score {} for task {} model {} is outside 0-100",
            record.score,
            record.task_id,
            record.model
        );
    }

    // Task order follows task id
    let task_names: BTreeMap<&TaskId, &str> = records
        .iter()
        .map(|r| (&r.task_id, r.task_name.as_str()))
        .collect();

    let tasks = task_names
        .iter()
        .map(|(&task_id, &task_name)| {
            let task_records: Vec<&ScoreRecord> =
                records.iter().filter(|r| &r.task_id == task_id).collect();
            TaskBreakdown {
                task_id: task_id.clone(),
                task_name: task_name.to_string(),
                by_config_and_prompt: grouped_means(
                    task_records.iter().copied(),
                    config_label,
                    prompt_label,
                ),
                by_model: group_means(task_records.iter().copied(), |r| r.model.clone()),
                by_prompt_type: group_means(task_records.iter().copied(), prompt_label),
            }
        })
        .collect();

    let by_model_size = size_means(records);

    Ok(Summary {
        records: records.len(),
        tasks,
        heatmap: heatmap(records, &task_names),
        by_prompt_type: group_means(records, prompt_label),
        by_model_config: group_means(records, config_label),
        by_model_size,
        by_prompt_and_config: grouped_means(records, prompt_label, config_label),
    })
}

fn size_means(records: &[ScoreRecord]) -> Vec<GroupMean> {
    let mut sizes: Vec<(f64, Accumulator)> = Vec::new();
    for record in records {
        let Some(size) = parse_model_size(&record.model) else {
            tracing::warn!("Cannot read a model size from {}, skipped in size chart", record.model);
            continue;
        };
        match sizes.iter_mut().find(|(s, _)| *s == size) {
            Some((_, acc)) => acc.add(record.score),
            None => {
                let mut acc = Accumulator::default();
                acc.add(record.score);
                sizes.push((size, acc));
            }
        }
    }
    sizes.sort_by(|a, b| a.0.total_cmp(&b.0));

    sizes
        .into_iter()
        .map(|(size, acc)| GroupMean {
            label: size.to_string(),
            mean: acc.mean(),
            count: acc.count,
        })
        .collect()
}

fn heatmap(records: &[ScoreRecord], task_names: &BTreeMap<&TaskId, &str>) -> Heatmap {
    let cells_by_key = accumulate(records, |r| (r.prompt_type.label(), r.task_id.clone()));

    let mut prompt_types: Vec<&'static str> = PromptType::ALL
        .iter()
        .map(|p| p.label())
        .filter(|label| cells_by_key.keys().any(|(p, _)| p == label))
        .collect();
    prompt_types.sort();

    let cells: Vec<Vec<Option<f64>>> = prompt_types
        .iter()
        .map(|&prompt| {
            task_names
                .keys()
                .map(|&task_id| {
                    cells_by_key
                        .get(&(prompt, task_id.clone()))
                        .map(Accumulator::mean)
                })
                .collect()
        })
        .collect();

    let overall = cells
        .iter()
        .map(|row| {
            let present: Vec<f64> = row.iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect();

    Heatmap {
        prompt_types: prompt_types.into_iter().map(str::to_string).collect(),
        tasks: task_names.values().map(|name| name.to_string()).collect(),
        cells,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(task_id: u64, task_name: &str, model: &str, thinking: bool, prompt_type: PromptType, score: f64) -> ScoreRecord {
        ScoreRecord {
            task_id: TaskId::Number(task_id),
            task_name: task_name.to_string(),
            model: model.to_string(),
            thinking,
            prompt_type,
            prompt: String::new(),
            output: String::new(),
            score,
            invalid: score == 0.0,
        }
    }

    fn sample_records() -> Vec<ScoreRecord> {
        vec![
            record(2, "Math", "qwen3:1.7b", false, PromptType::Zero, 50.0),
            record(2, "Math", "qwen3:1.7b", false, PromptType::Cot, 100.0),
            record(2, "Math", "qwen3:14b", true, PromptType::Zero, 100.0),
            record(1, "Poetry", "qwen3:1.7b", false, PromptType::Zero, 0.0),
            record(1, "Poetry", "qwen3:14b", true, PromptType::Few, 75.0),
        ]
    }

    fn find<'a>(groups: &'a [GroupMean], label: &str) -> &'a GroupMean {
        groups.iter().find(|g| g.label == label).unwrap()
    }

    #[test]
    fn test_parse_model_size() {
        assert_eq!(parse_model_size("qwen3:14b"), Some(14.0));
        assert_eq!(parse_model_size("qwen3:1.7b"), Some(1.7));
        assert_eq!(parse_model_size("llama3:8B"), Some(8.0));
        assert_eq!(parse_model_size("gpt-4"), None);
        assert_eq!(parse_model_size("qwen3:latest"), None);
    }

    #[test]
    fn test_tasks_ordered_by_id() {
        let summary = summarize(&sample_records()).unwrap();
        let names: Vec<&str> = summary.tasks.iter().map(|t| t.task_name.as_str()).collect();
        assert_eq!(names, vec!["Poetry", "Math"]);
        assert_eq!(summary.heatmap.tasks, vec!["Poetry", "Math"]);
    }

    #[test]
    fn test_mean_per_prompt_type() {
        let summary = summarize(&sample_records()).unwrap();
        let labels: Vec<&str> = summary.by_prompt_type.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["cot", "few", "zero"]);

        let zero = find(&summary.by_prompt_type, "zero");
        assert_eq!(zero.count, 3);
        assert!((zero.mean - 50.0).abs() < 1e-9);
        assert_eq!(find(&summary.by_prompt_type, "few").mean, 75.0);
    }

    #[test]
    fn test_task_breakdown_groups() {
        let summary = summarize(&sample_records()).unwrap();
        let math = &summary.tasks[1];

        assert_eq!(find(&math.by_model, "qwen3:1.7b").mean, 75.0);
        assert_eq!(find(&math.by_model, "qwen3:14b").mean, 100.0);

        let cell = math
            .by_config_and_prompt
            .iter()
            .find(|g| g.group == "qwen3:1.7b_false" && g.series == "cot")
            .unwrap();
        assert_eq!(cell.mean, 100.0);
        assert_eq!(math.by_config_and_prompt.len(), 3);
    }

    #[test]
    fn test_model_size_groups_sorted_numerically() {
        let summary = summarize(&sample_records()).unwrap();
        let labels: Vec<&str> = summary.by_model_size.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["1.7", "14"]);
        assert_eq!(summary.by_model_size[0].mean, 50.0);
        assert_eq!(summary.by_model_size[1].mean, 87.5);
    }

    #[test]
    fn test_unparseable_size_only_skipped_in_size_chart() {
        let mut records = sample_records();
        records.push(record(1, "Poetry", "gpt-4", false, PromptType::Zero, 100.0));

        let summary = summarize(&records).unwrap();
        assert_eq!(summary.by_model_size.iter().map(|g| g.count).sum::<usize>(), 5);
        assert_eq!(summary.by_prompt_type.iter().map(|g| g.count).sum::<usize>(), 6);
    }

    #[test]
    fn test_heatmap_cells_and_overall() {
        let summary = summarize(&sample_records()).unwrap();
        let heatmap = &summary.heatmap;

        assert_eq!(heatmap.prompt_types, vec!["cot", "few", "zero"]);
        // cot: Poetry missing, Math 100
        assert_eq!(heatmap.cells[0], vec![None, Some(100.0)]);
        // zero: Poetry 0, Math (50 + 100) / 2
        assert_eq!(heatmap.cells[2], vec![Some(0.0), Some(75.0)]);
        assert_eq!(heatmap.overall[0], Some(100.0));
        assert_eq!(heatmap.overall[2], Some(37.5));
        assert_eq!(heatmap.value_range(), Some((0.0, 100.0)));
    }

    #[test]
    fn test_prompt_and_config_grouping() {
        let summary = summarize(&sample_records()).unwrap();
        let cell = summary
            .by_prompt_and_config
            .iter()
            .find(|g| g.group == "zero" && g.series == "qwen3:1.7b_false")
            .unwrap();
        assert_eq!(cell.count, 2);
        assert_eq!(cell.mean, 25.0);
    }

    #[test]
    fn test_rejects_scores_outside_scale() {
        let mut records = sample_records();
        records[0].score = 120.0;
        assert!(summarize(&records).unwrap_err().to_string().contains("outside 0-100"));
    }

    #[test]
    fn test_empty_log() {
        let summary = summarize(&[]).unwrap();
        assert_eq!(summary.records, 0);
        assert!(summary.tasks.is_empty());
        assert!(summary.heatmap.prompt_types.is_empty());
        assert_eq!(summary.heatmap.value_range(), None);
    }
}
