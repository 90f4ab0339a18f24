//! Loading and writing of the JSON artifacts: task definitions, generated answers,
//! score logs and rating checkpoints.

use crate::models::{GeneratedAnswer, ScoreRecord, Task, TaskId};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Task file problems that make a run impossible
#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("task {0} has no scoring criteria")]
    NoCriteria(TaskId),
    #[error("task id {0} appears more than once")]
    DuplicateTaskId(TaskId),
}

/// Load and validate the task definitions
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let tasks: Vec<Task> = read_json(path)?;
    validate_tasks(&tasks).with_context(|| format!("Invalid task file: {}", path.display()))?;
    tracing::debug!("Loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

/// Every task needs at least one criterion and a unique id
pub fn validate_tasks(tasks: &[Task]) -> Result<(), DatasetError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(&task.id) {
            return Err(DatasetError::DuplicateTaskId(task.id.clone()));
        }
        if task.scoring_instruction.is_empty() {
            return Err(DatasetError::NoCriteria(task.id.clone()));
        }
    }
    Ok(())
}

pub fn load_answers(path: &Path) -> Result<Vec<GeneratedAnswer>> {
    read_json(path)
}

pub fn load_scores(path: &Path) -> Result<Vec<ScoreRecord>> {
    read_json(path)
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

/// Serialize a value as pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json_content =
        serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, json_content)
        .with_context(|| format!("Failed to write: {}", path.display()))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PromptType;
    use tempfile::tempdir;

    const TASKS_JSON: &str = r#"[
        {
            "id": 1,
            "name": "Capitals",
            "task": "Capital of France?",
            "example_answer": "Paris",
            "examples": [["Capital of Spain?", "Madrid"]],
            "scoring_instruction": ["Says Paris", "One word"],
            "system_prompt": "Answer briefly."
        },
        {
            "id": 2,
            "name": "Arithmetic",
            "task": "2+2",
            "examples": [],
            "scoring_instruction": ["Says 4"],
            "system_prompt": "Answer with a number."
        }
    ]"#;

    #[test]
    fn test_load_tasks() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, TASKS_JSON).unwrap();

        let tasks = load_tasks(&path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].example_answer.as_deref(), Some("Paris"));
        assert_eq!(tasks[1].example_answer, None);
    }

    #[test]
    fn test_load_tasks_missing_file_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let err = load_tasks(&temp_dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_tasks_malformed_file_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, r#"[{"id": 1, "name": "No fields"}]"#).unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }

    #[test]
    fn test_load_tasks_rejects_task_without_criteria() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let json = TASKS_JSON.replace(r#"["Says 4"]"#, "[]");
        std::fs::write(&path, json).unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DatasetError>(),
            Some(&DatasetError::NoCriteria(TaskId::Number(2)))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, TASKS_JSON.replace(r#""id": 2"#, r#""id": 1"#)).unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DatasetError>(),
            Some(&DatasetError::DuplicateTaskId(TaskId::Number(1)))
        );
    }

    #[test]
    fn test_write_json_creates_nested_directories() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("out").join("answers.json");
        let answers = vec![GeneratedAnswer {
            task_id: TaskId::Number(1),
            task_name: "Capitals".to_string(),
            model: "qwen3:14b".to_string(),
            thinking: false,
            prompt_type: PromptType::Zero,
            prompt: "=== TASK ===\nInput: Capital of France?\nOutput:".to_string(),
            output: "Paris".to_string(),
        }];

        write_json(&path, &answers).unwrap();

        let loaded = load_answers(&path).unwrap();
        assert_eq!(loaded, answers);
    }

    #[test]
    fn test_write_json_to_invalid_path_fails() {
        let result = write_json(Path::new("/dev/null/cannot_exist.json"), &Vec::<ScoreRecord>::new());
        assert!(result.is_err());
    }
}
