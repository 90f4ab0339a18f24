use crate::backend::{GenerateRequest, ModelBackend};
use crate::config::BackendConfig;
use crate::models::{EvaluationUnit, GeneratedAnswer};
use crate::prompt::build_prompt;
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Knobs for the generation loop
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub context_size: u32,
    pub rate_limit_rps: f64,
    pub max_retries: u32,
    /// Base wait between attempts; attempt `n` waits `n` times this
    pub retry_backoff: Duration,
}

impl From<&BackendConfig> for GenerationSettings {
    fn from(config: &BackendConfig) -> Self {
        Self {
            context_size: config.context_size,
            rate_limit_rps: config.rate_limit_rps,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Runs every evaluation unit through the backend, one call at a time
pub struct Generator {
    backend: Box<dyn ModelBackend>,
    settings: GenerationSettings,
    /// Last request time, for rate limiting
    last_request: Option<Instant>,
}

impl Generator {
    pub fn new(backend: Box<dyn ModelBackend>, settings: GenerationSettings) -> Self {
        Self {
            backend,
            settings,
            last_request: None,
        }
    }

    /// Generate one answer per unit, in unit order.
    ///
    /// Never fails: a unit whose backend call fails gets an error placeholder as output.
    pub async fn generate_all(&mut self, units: &[EvaluationUnit<'_>]) -> Vec<GeneratedAnswer> {
        let mut answers = Vec::with_capacity(units.len());
        let total = units.len();

        for (index, unit) in units.iter().enumerate() {
            tracing::info!(
                "Generating {}/{}: task {} ({}), model {}, thinking {}, prompt {}",
                index + 1,
                total,
                unit.task.id,
                unit.task.name,
                unit.model.name,
                unit.model.thinking,
                unit.prompt_type
            );
            answers.push(self.generate_answer(unit).await);
        }

        answers
    }

    /// Build the prompt for a unit and obtain its answer
    pub async fn generate_answer(&mut self, unit: &EvaluationUnit<'_>) -> GeneratedAnswer {
        let prompt = build_prompt(unit.task, unit.prompt_type);
        let request = GenerateRequest {
            model: &unit.model.name,
            system: &unit.task.system_prompt,
            prompt: &prompt,
            thinking: unit.model.thinking,
            context_size: self.settings.context_size,
        };

        let output = match self.call_backend(&request).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Backend call failed for {}: {:#}", unit.key(), e);
                format!("Error generating response: {:#}", e)
            }
        };

        GeneratedAnswer {
            task_id: unit.task.id.clone(),
            task_name: unit.task.name.clone(),
            model: unit.model.name.clone(),
            thinking: unit.model.thinking,
            prompt_type: unit.prompt_type,
            prompt,
            output,
        }
    }

    /// Call the backend, retrying up to `max_retries` extra times
    async fn call_backend(&mut self, request: &GenerateRequest<'_>) -> Result<String> {
        let mut attempt = 0;
        loop {
            Self::enforce_rate_limit(&mut self.last_request, self.settings.rate_limit_rps).await;

            match self.backend.generate(request).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Attempt {}/{} failed: {:#}",
                        attempt,
                        self.settings.max_retries + 1,
                        e
                    );
                    sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Enforce rate limiting for backend requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / rate_limit_rps);

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}
