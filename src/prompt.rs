use crate::models::{PromptType, Task};

const COT_CUE: &str = " Let's think step by step.";

/// Build the prompt sent to the model for a task under the given strategy
pub fn build_prompt(task: &Task, prompt_type: PromptType) -> String {
    match prompt_type {
        PromptType::Zero => task_block(task),
        PromptType::Few => format!("{}\n\n{}", examples_block(task), task_block(task)),
        PromptType::Cot => format!("{}\n\n{}{}", examples_block(task), task_block(task), COT_CUE),
    }
}

fn task_block(task: &Task) -> String {
    format!("=== TASK ===\nInput: {}\nOutput:", task.task)
}

fn examples_block(task: &Task) -> String {
    let examples = task
        .examples
        .iter()
        .map(|(input, output)| format!("Input: {}\nOutput: {}", input, output))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("=== EXAMPLES ===\n{}", examples)
}
