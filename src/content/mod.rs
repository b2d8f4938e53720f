//! AI content generation.
//!
//! The rest of the service treats this as an opaque collaborator: a
//! prompt goes in, Markdown comes out. The Gemini-backed client lives
//! in [`gemini`]; [`batch`] drives bulk night-plan generation.

pub mod batch;
pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Event;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content API key is not configured")]
    MissingApiKey,
    #[error("Content API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Content API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Content API returned an empty or malformed response")]
    EmptyResponse,
    #[error("Generated content failed validation: {0}")]
    Invalid(String),
}

/// The request/response contract of the content service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ContentError>;
}

/// Fallback shown by the trip planner when no events match.
pub const NO_EVENTS_FALLBACK: &str = "What a shame! No flamenco events were found for these \
     dates and destination. Try a different date range, or explore the local peñas flamencas \
     and tablaos in the city.";

/// Prompt for the per-event "night plan" mini guide.
pub fn night_plan_prompt(event: &Event) -> String {
    format!(
        r#"You are "Duende", a local connoisseur and flamenco aficionado.
Write a mini guide for a perfect night built around one flamenco event.
Be warm, use evocative language, and structure the plan in Markdown sections (## headings).
EVENT:
- Name: {name}
- Artist: {artist}
- Venue: {venue}, {city}
GUIDE STRUCTURE:
1. **A Pinch of Wisdom:** share a curious fact or anecdote about the artist, the venue, or a related flamenco palo.
2. **Warming Up (Before the Show):** recommend 1 or 2 tapas bars or restaurants near the venue, describing the atmosphere. Wrap every recommended place name in square brackets, e.g. [Restaurante el Salero].
3. **The Temple of Duende (The Show):** briefly describe what to expect from the performance, focusing on the emotion.
4. **Stretching the Magic (After the Show):** suggest a nearby spot for one last drink in a relaxed setting. Wrap the place name in square brackets, e.g. [Bar La Plazuela].

Keep the tone inspiring and practical."#,
        name = event.name,
        artist = event.artist,
        venue = event.venue,
        city = event.city,
    )
}

/// Prompt for the trip-planner itinerary.
pub fn trip_prompt(destination: &str, start_date: &str, end_date: &str, events: &[Event]) -> String {
    let event_list = events
        .iter()
        .map(|ev| {
            format!(
                "- {}: \"{}\" with {} at {}.",
                human_date(&ev.date),
                ev.name,
                ev.artist,
                ev.venue
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Act as the best flamenco trip planner in Andalucía: friendly, expert, and passionate. A traveler wants to visit {destination} from {start_date} to {end_date}. Their list of available shows is:
{event_list}

Create a detailed, professional itinerary. Follow these rules STRICTLY:

1. **Day-by-Day Structure:** organize the plan per day.
2. **Themed Titles:** give each day an evocative themed title (e.g. "Tuesday: Immersion in the Sacromonte").
3. **Days With Shows:** make the listed show the highlight of the day, suggesting activities that complement it.
4. **Free Days:** offer two clear alternatives: a "Plan A" (a main cultural activity such as a museum, an emblematic neighborhood, or a guitar shop) and a "Plan B" (a more relaxed or different option, like a compás class or a viewpoint to unwind).
5. **Final Glossary:** end the whole itinerary with a `### Flamenco Glossary for the Traveler` section briefly explaining 2-3 key terms you used (e.g. peña, tablao, duende, tercio).

Keep the tone inspiring and practical. Wrap recommended place names in square brackets: [Place Name]."#,
    )
}

/// Render an ISO date as "Saturday 2 March". Falls back to the raw
/// string when the date does not parse.
fn human_date(iso: &str) -> String {
    chrono::NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .map(|d| d.format("%A %-d %B").to_string())
        .unwrap_or_else(|_| iso.to_string())
}
