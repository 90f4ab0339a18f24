use crate::models::{EvaluationUnit, ModelConfig, PromptType, Task};

/// Thinking models already reason before answering, so they never get a chain-of-thought prompt
pub fn is_excluded(model: &ModelConfig, prompt_type: PromptType) -> bool {
    model.thinking && prompt_type == PromptType::Cot
}

/// Expand tasks × models × prompt types into the ordered list of evaluation units.
///
/// The order (task id, model name, prompt type label) is the one every artifact is
/// keyed and sorted by. The sort is stable, so configurations sharing a model name
/// keep their configured order.
pub fn enumerate_units<'a>(
    tasks: &'a [Task],
    models: &'a [ModelConfig],
    prompt_types: &[PromptType],
) -> Vec<EvaluationUnit<'a>> {
    let mut units = Vec::with_capacity(tasks.len() * models.len() * prompt_types.len());

    for task in tasks {
        for model in models {
            for &prompt_type in prompt_types {
                if is_excluded(model, prompt_type) {
                    continue;
                }
                units.push(EvaluationUnit {
                    task,
                    model,
                    prompt_type,
                });
            }
        }
    }

    units.sort_by(|a, b| {
        a.task
            .id
            .cmp(&b.task.id)
            .then_with(|| a.model.name.cmp(&b.model.name))
            .then_with(|| a.prompt_type.label().cmp(b.prompt_type.label()))
    });
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskId;

    fn task(id: u64) -> Task {
        Task {
            id: TaskId::Number(id),
            name: format!("Task {}", id),
            task: "Do it".to_string(),
            example_answer: None,
            examples: vec![],
            scoring_instruction: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            system_prompt: "system".to_string(),
        }
    }

    fn model(name: &str, thinking: bool) -> ModelConfig {
        ModelConfig {
            name: name.to_string(),
            thinking,
        }
    }

    fn standard_models() -> Vec<ModelConfig> {
        vec![
            model("qwen3:1.7b", false),
            model("qwen3:1.7b", true),
            model("qwen3:14b", false),
            model("qwen3:14b", true),
        ]
    }

    #[test]
    fn test_never_pairs_thinking_with_cot() {
        let tasks = vec![task(1), task(2)];
        let models = standard_models();
        let units = enumerate_units(&tasks, &models, &PromptType::ALL);

        assert!(
            units
                .iter()
                .all(|u| !(u.model.thinking && u.prompt_type == PromptType::Cot))
        );
    }

    #[test]
    fn test_length_is_product_minus_exclusions() {
        let tasks = vec![task(1), task(2), task(3)];
        let models = standard_models();
        let units = enumerate_units(&tasks, &models, &PromptType::ALL);

        let thinking_models = models.iter().filter(|m| m.thinking).count();
        let expected = tasks.len() * models.len() * PromptType::ALL.len() - tasks.len() * thinking_models;
        assert_eq!(units.len(), expected);
        assert_eq!(units.len(), 30);
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let tasks = vec![task(2), task(1)];
        let models = standard_models();

        let first: Vec<_> = enumerate_units(&tasks, &models, &PromptType::ALL)
            .iter()
            .map(|u| u.key())
            .collect();
        let second: Vec<_> = enumerate_units(&tasks, &models, &PromptType::ALL)
            .iter()
            .map(|u| u.key())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sorted_by_task_model_and_prompt_label() {
        let tasks = vec![task(10), task(2)];
        let models = vec![model("qwen3:14b", false), model("qwen3:1.7b", false)];
        let units = enumerate_units(&tasks, &models, &PromptType::ALL);

        let keys: Vec<(String, &str, &str)> = units
            .iter()
            .map(|u| (u.task.id.to_string(), u.model.name.as_str(), u.prompt_type.label()))
            .collect();

        assert_eq!(keys[0], ("2".to_string(), "qwen3:1.7b", "cot"));
        assert_eq!(keys[1], ("2".to_string(), "qwen3:1.7b", "few"));
        assert_eq!(keys[2], ("2".to_string(), "qwen3:1.7b", "zero"));
        assert_eq!(keys[3], ("2".to_string(), "qwen3:14b", "cot"));
        assert_eq!(keys[6], ("10".to_string(), "qwen3:1.7b", "cot"));
    }

    #[test]
    fn test_shared_model_name_keeps_configured_order() {
        let tasks = vec![task(1)];
        let models = vec![model("qwen3:1.7b", false), model("qwen3:1.7b", true)];
        let units = enumerate_units(&tasks, &models, &[PromptType::Zero]);

        assert_eq!(units.len(), 2);
        assert!(!units[0].model.thinking);
        assert!(units[1].model.thinking);
    }

    #[test]
    fn test_single_non_thinking_model_yields_three_units() {
        let tasks = vec![task(1)];
        let models = vec![model("qwen3:14b", false)];
        assert_eq!(enumerate_units(&tasks, &models, &PromptType::ALL).len(), 3);
    }

    #[test]
    fn test_single_thinking_model_skips_cot() {
        let tasks = vec![task(1)];
        let models = vec![model("qwen3:14b", true)];
        let units = enumerate_units(&tasks, &models, &PromptType::ALL);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].prompt_type, PromptType::Few);
        assert_eq!(units[1].prompt_type, PromptType::Zero);
    }

    #[test]
    fn test_empty_tasks_yield_no_units() {
        let models = standard_models();
        assert!(enumerate_units(&[], &models, &PromptType::ALL).is_empty());
    }
}
