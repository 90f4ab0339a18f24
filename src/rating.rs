use crate::session::{Judgments, PairedUnit, RatingSession, SessionState};
use crate::store;
use anyhow::Result;
use dialoguer::{Confirm, MultiSelect, Select};
use std::path::Path;

/// How an interactive rating run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOutcome {
    Completed,
    Paused { cursor: usize, total: usize },
}

/// What the rater does after judging a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Revise,
    Quit,
}

/// Source of the rater's input for each presented unit
pub trait Rater {
    /// Checkbox and invalid state for `unit`, starting from the saved draft
    fn judge(&mut self, unit: &PairedUnit, draft: &Judgments) -> Result<Judgments>;

    fn choose_action(&mut self) -> Result<Action>;
}

/// Rater driven by dialoguer prompts in the terminal
pub struct TerminalRater;

impl Rater for TerminalRater {
    fn judge(&mut self, unit: &PairedUnit, draft: &Judgments) -> Result<Judgments> {
        let selected = MultiSelect::new()
            .with_prompt("Scoring criteria (space to toggle, enter to confirm)")
            .items(unit.criteria())
            .defaults(&draft.checked)
            .interact()?;

        let invalid = Confirm::new()
            .with_prompt("Mark as invalid output (garbage/empty)?")
            .default(draft.invalid)
            .interact()?;

        Ok(Judgments {
            checked: (0..unit.criteria().len())
                .map(|criterion| selected.contains(&criterion))
                .collect(),
            invalid,
        })
    }

    fn choose_action(&mut self) -> Result<Action> {
        let choice = Select::new()
            .with_prompt("Next")
            .items(&["Submit score and next", "Revise judgments", "Save and quit"])
            .default(0)
            .interact()?;

        Ok(match choice {
            0 => Action::Submit,
            1 => Action::Revise,
            _ => Action::Quit,
        })
    }
}

/// Walk the rater through the session, checkpointing after every submission
pub fn run_session(
    session: &mut RatingSession,
    rater: &mut impl Rater,
    checkpoint_path: &Path,
) -> Result<RatingOutcome> {
    loop {
        let (index, unit) = match session.state() {
            SessionState::Presenting { index, unit } => (index, unit.clone()),
            SessionState::Completed => return Ok(RatingOutcome::Completed),
        };

        println!("{}", render_unit(index, session.len(), &unit));
        let judgments = rater.judge(&unit, &session.judgments()?)?;
        for (criterion, &passed) in judgments.checked.iter().enumerate() {
            session.set_criterion(criterion, passed)?;
        }
        session.set_invalid(judgments.invalid)?;
        println!("Score: {:.2}", session.current_score()?);

        match rater.choose_action()? {
            Action::Submit => {
                session.submit()?;
                store::write_json(checkpoint_path, session)?;
                tracing::debug!("Checkpoint written after unit {}", index + 1);
            }
            Action::Revise => continue,
            Action::Quit => {
                store::write_json(checkpoint_path, session)?;
                return Ok(RatingOutcome::Paused {
                    cursor: session.cursor(),
                    total: session.len(),
                });
            }
        }
    }
}

/// Text shown for one unit: task, example answer and the model output as-is
pub fn render_unit(index: usize, total: usize, unit: &PairedUnit) -> String {
    let example = unit.task.example_answer.as_deref().unwrap_or("N/A");
    format!(
        "\n{rule}\n[{current}/{total}] Task {id}: {name}\nModel: {model} (thinking: {thinking}), prompt: {prompt_type}\n{rule}\nTask:\n{task}\n\nExample Answer:\n{example}\n\nOutput:\n{output}\n{rule}",
        rule = "=".repeat(50),
        current = index + 1,
        total = total,
        id = unit.task.id,
        name = unit.task.name,
        model = unit.model.name,
        thinking = unit.model.thinking,
        prompt_type = unit.prompt_type,
        task = unit.task.task,
        example = example,
        output = unit.answer.output,
    )
}
