//! Single-rater scoring session.
//!
//! Answers are joined to the enumerated units once, up front, by [`UnitKey`]. The
//! session then walks the paired units in order: `presenting(i)` for each cursor
//! value and `completed` once every unit has a [`ScoreRecord`]. Checkbox state is
//! held per unit so a re-rendered or resumed unit shows what was already entered.

use crate::models::{EvaluationUnit, GeneratedAnswer, ModelConfig, PromptType, ScoreRecord, Task, UnitKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// The enumeration and the stored answers do not line up
#[derive(Debug, Error, PartialEq)]
pub enum PairingError {
    #[error("expected {expected} answers for the enumerated units, found {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("no stored answer for unit {0}")]
    MissingAnswer(UnitKey),
    #[error("more than one stored answer for unit {0}")]
    DuplicateAnswer(UnitKey),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("the session is completed and accepts no further judgments")]
    Completed,
    #[error("the session is not completed yet ({cursor}/{total} units scored)")]
    NotCompleted { cursor: usize, total: usize },
    #[error("criterion {criterion} out of range, the task has {count} criteria")]
    CriterionOutOfRange { criterion: usize, count: usize },
    #[error("checkpoint does not match the current answers: {0}")]
    CheckpointMismatch(String),
}

/// An evaluation unit joined with its stored answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedUnit {
    pub task: Task,
    pub model: ModelConfig,
    pub prompt_type: PromptType,
    pub answer: GeneratedAnswer,
}

impl PairedUnit {
    pub fn key(&self) -> UnitKey {
        self.answer.key()
    }

    pub fn criteria(&self) -> &[String] {
        &self.task.scoring_instruction
    }

    /// Score record for this unit: identity from the task and model, text from the answer
    pub fn score_record(&self, judgments: &Judgments) -> ScoreRecord {
        ScoreRecord {
            task_id: self.task.id.clone(),
            task_name: self.task.name.clone(),
            model: self.model.name.clone(),
            thinking: self.model.thinking,
            prompt_type: self.prompt_type,
            prompt: self.answer.prompt.clone(),
            output: self.answer.output.clone(),
            score: judgments.score(),
            invalid: judgments.invalid,
        }
    }
}

/// Join the stored answers to the enumeration, failing on any gap or duplicate
pub fn pair_units(
    units: &[EvaluationUnit<'_>],
    answers: Vec<GeneratedAnswer>,
) -> Result<Vec<PairedUnit>, PairingError> {
    if answers.len() != units.len() {
        return Err(PairingError::CountMismatch {
            expected: units.len(),
            found: answers.len(),
        });
    }

    let mut by_key = HashMap::with_capacity(answers.len());
    for answer in answers {
        let key = answer.key();
        if by_key.contains_key(&key) {
            return Err(PairingError::DuplicateAnswer(key));
        }
        by_key.insert(key, answer);
    }

    units
        .iter()
        .map(|unit| {
            let key = unit.key();
            match by_key.remove(&key) {
                Some(answer) => Ok(PairedUnit {
                    task: unit.task.clone(),
                    model: unit.model.clone(),
                    prompt_type: unit.prompt_type,
                    answer,
                }),
                None => Err(PairingError::MissingAnswer(key)),
            }
        })
        .collect()
}

/// The rater's checkbox state for one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Judgments {
    /// Pass/fail per criterion, indexed like the task's criteria
    pub checked: Vec<bool>,
    pub invalid: bool,
}

impl Judgments {
    fn unchecked(criteria: usize) -> Self {
        Self {
            checked: vec![false; criteria],
            invalid: false,
        }
    }

    pub fn score(&self) -> f64 {
        compute_score(&self.checked, self.invalid)
    }
}

/// Percentage of criteria met; 0 when invalid.
///
/// A task without criteria scores 0; the loader rejects such tasks before a session starts.
pub fn compute_score(checked: &[bool], invalid: bool) -> f64 {
    if invalid || checked.is_empty() {
        return 0.0;
    }
    let passed = checked.iter().filter(|&&c| c).count();
    passed as f64 / checked.len() as f64 * 100.0
}

/// Where the session stands
#[derive(Debug, PartialEq)]
pub enum SessionState<'a> {
    Presenting { index: usize, unit: &'a PairedUnit },
    Completed,
}

/// Cursor, score log and checkbox drafts of one rating run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSession {
    units: Vec<PairedUnit>,
    cursor: usize,
    records: Vec<ScoreRecord>,
    /// Checkbox state keyed by unit index
    drafts: BTreeMap<usize, Judgments>,
}

impl RatingSession {
    pub fn new(units: Vec<PairedUnit>) -> Self {
        Self {
            units,
            cursor: 0,
            records: Vec::new(),
            drafts: BTreeMap::new(),
        }
    }

    /// Continue from a checkpoint, provided it was taken over the same paired units
    pub fn resume(units: Vec<PairedUnit>, checkpoint: RatingSession) -> Result<Self, SessionError> {
        if checkpoint.units.len() != units.len() {
            return Err(SessionError::CheckpointMismatch(format!(
                "checkpoint has {} units, current run has {}",
                checkpoint.units.len(),
                units.len()
            )));
        }
        if let Some((index, _)) = units
            .iter()
            .zip(&checkpoint.units)
            .enumerate()
            .find(|(_, (current, saved))| current != saved)
        {
            return Err(SessionError::CheckpointMismatch(format!(
                "unit {} differs: {}",
                index,
                units[index].key()
            )));
        }
        if checkpoint.cursor > units.len() || checkpoint.records.len() != checkpoint.cursor {
            return Err(SessionError::CheckpointMismatch(format!(
                "cursor {} inconsistent with {} records",
                checkpoint.cursor,
                checkpoint.records.len()
            )));
        }
        Ok(checkpoint)
    }

    pub fn state(&self) -> SessionState<'_> {
        match self.units.get(self.cursor) {
            Some(unit) => SessionState::Presenting {
                index: self.cursor,
                unit,
            },
            None => SessionState::Completed,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_completed(&self) -> bool {
        self.cursor >= self.units.len()
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    fn current_unit(&self) -> Result<&PairedUnit, SessionError> {
        self.units.get(self.cursor).ok_or(SessionError::Completed)
    }

    /// Checkbox state of the current unit, all unchecked if nothing was entered yet
    pub fn judgments(&self) -> Result<Judgments, SessionError> {
        let unit = self.current_unit()?;
        Ok(self
            .drafts
            .get(&self.cursor)
            .cloned()
            .unwrap_or_else(|| Judgments::unchecked(unit.criteria().len())))
    }

    fn draft_mut(&mut self) -> Result<&mut Judgments, SessionError> {
        let criteria = self.current_unit()?.criteria().len();
        Ok(self
            .drafts
            .entry(self.cursor)
            .or_insert_with(|| Judgments::unchecked(criteria)))
    }

    /// Mark one criterion of the current unit as passed or failed
    pub fn set_criterion(&mut self, criterion: usize, passed: bool) -> Result<(), SessionError> {
        let draft = self.draft_mut()?;
        let count = draft.checked.len();
        match draft.checked.get_mut(criterion) {
            Some(slot) => {
                *slot = passed;
                Ok(())
            }
            None => Err(SessionError::CriterionOutOfRange { criterion, count }),
        }
    }

    pub fn set_invalid(&mut self, invalid: bool) -> Result<(), SessionError> {
        self.draft_mut()?.invalid = invalid;
        Ok(())
    }

    /// Score the current unit would get if submitted now
    pub fn current_score(&self) -> Result<f64, SessionError> {
        Ok(self.judgments()?.score())
    }

    /// Record the current unit's score and advance the cursor
    pub fn submit(&mut self) -> Result<&ScoreRecord, SessionError> {
        let judgments = self.judgments()?;
        let unit = self.current_unit()?;
        let record = unit.score_record(&judgments);

        self.drafts.insert(self.cursor, judgments);
        self.records.push(record);
        self.cursor += 1;

        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    /// The full score log, available once every unit has been scored
    pub fn export(&self) -> Result<&[ScoreRecord], SessionError> {
        if !self.is_completed() {
            return Err(SessionError::NotCompleted {
                cursor: self.cursor,
                total: self.units.len(),
            });
        }
        Ok(&self.records)
    }
}
