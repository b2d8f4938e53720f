//! Bulk night-plan generation.
//!
//! Works through upcoming events that still lack a night plan, one
//! batch per run. Generation failures are retried once, logged, and
//! never abort the rest of the batch.

use anyhow::Result;
use tokio::sync::Mutex;

use super::{night_plan_prompt, ContentError, ContentGenerator};
use crate::storage::EventStore;
use crate::types::Event;

/// Attempts per event before it is skipped for this run.
const MAX_ATTEMPTS: usize = 2;

/// What one batch run accomplished.
#[derive(Debug, Clone, Copy)]
pub struct BatchOutcome {
    pub generated: usize,
    pub failed: usize,
    /// Events still missing a plan after this run.
    pub remaining: u64,
}

/// Run one night-plan generation batch.
pub async fn run_batch(
    store: &Mutex<EventStore>,
    generator: &dyn ContentGenerator,
    today: &str,
    batch_size: usize,
) -> Result<BatchOutcome> {
    let pending = store
        .lock()
        .await
        .events_missing_night_plan(today, batch_size)?;
    tracing::info!(pending = pending.len(), "Starting night-plan batch");

    let mut generated = 0;
    let mut failed = 0;
    for event in &pending {
        match generate_validated(generator, event).await {
            Ok(content) => {
                store.lock().await.set_night_plan(event.id, &content)?;
                generated += 1;
                tracing::info!(event = event.id, name = %event.name, "Night plan saved");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    event = event.id,
                    name = %event.name,
                    error = %e,
                    "Night-plan generation failed, continuing batch"
                );
            }
        }
    }

    let remaining = store.lock().await.missing_night_plan_count(today)?;
    Ok(BatchOutcome {
        generated,
        failed,
        remaining,
    })
}

/// Generate a night plan for one event, retrying once. The model must
/// return Markdown sections; anything else is treated as a failure.
async fn generate_validated(
    generator: &dyn ContentGenerator,
    event: &Event,
) -> Result<String, ContentError> {
    let prompt = night_plan_prompt(event);
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match generator.generate(&prompt).await {
            Ok(content) if content.contains("##") => return Ok(content),
            Ok(_) => {
                last_err = Some(ContentError::Invalid(format!(
                    "response has no Markdown sections for \"{}\"",
                    event.name
                )));
            }
            Err(e) => last_err = Some(e),
        }
        if attempt < MAX_ATTEMPTS {
            tracing::debug!(event = event.id, attempt, "Retrying night-plan generation");
        }
    }
    Err(last_err.unwrap_or(ContentError::EmptyResponse))
}
