use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a task as written in the task file.
///
/// Numeric and textual ids are both accepted; numeric ids sort before textual ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(u64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Number(n) => fmt::Display::fmt(n, f),
            TaskId::Text(s) => f.pad(s),
        }
    }
}

/// A unit of evaluatable work loaded from the task file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Display name
    pub name: String,
    /// Instruction text sent to the model and shown to the rater
    pub task: String,
    #[serde(default)]
    pub example_answer: Option<String>,
    /// (input, expected output) pairs used by few-shot and chain-of-thought prompts
    #[serde(default)]
    pub examples: Vec<(String, String)>,
    /// Yes/no criteria the rater checks off
    pub scoring_instruction: Vec<String>,
    pub system_prompt: String,
}

/// A model variant with its thinking-mode flag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub thinking: bool,
}

/// Prompting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Zero,
    Few,
    Cot,
}

impl PromptType {
    pub const ALL: [PromptType; 3] = [PromptType::Zero, PromptType::Few, PromptType::Cot];

    /// Label used in artifacts; also the sort key of the enumeration
    pub fn label(self) -> &'static str {
        match self {
            PromptType::Zero => "zero",
            PromptType::Few => "few",
            PromptType::Cot => "cot",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One (task, model, prompt type) combination to generate and rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationUnit<'a> {
    pub task: &'a Task,
    pub model: &'a ModelConfig,
    pub prompt_type: PromptType,
}

impl EvaluationUnit<'_> {
    pub fn key(&self) -> UnitKey {
        UnitKey {
            task_id: self.task.id.clone(),
            model: self.model.name.clone(),
            thinking: self.model.thinking,
            prompt_type: self.prompt_type,
        }
    }
}

/// Identity of a unit across the task file, the answers file and the score log.
///
/// `thinking` is part of the key since two configurations may share a model name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub task_id: TaskId,
    pub model: String,
    pub thinking: bool,
    pub prompt_type: PromptType,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(task {}, model {}, thinking {}, prompt {})",
            self.task_id, self.model, self.thinking, self.prompt_type
        )
    }
}

/// Raw backend output for one evaluation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub task_id: TaskId,
    pub task_name: String,
    pub model: String,
    pub thinking: bool,
    pub prompt_type: PromptType,
    /// Exact prompt text sent to the backend
    pub prompt: String,
    /// Model output, or an error placeholder when the backend call failed
    pub output: String,
}

impl GeneratedAnswer {
    pub fn key(&self) -> UnitKey {
        UnitKey {
            task_id: self.task_id.clone(),
            model: self.model.clone(),
            thinking: self.thinking,
            prompt_type: self.prompt_type,
        }
    }
}

/// A rater's judgment of one evaluation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub task_id: TaskId,
    pub task_name: String,
    pub model: String,
    pub thinking: bool,
    pub prompt_type: PromptType,
    pub prompt: String,
    pub output: String,
    /// Percentage of criteria met, 0 when the output was marked invalid
    pub score: f64,
    pub invalid: bool,
}
