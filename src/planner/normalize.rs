//! Result normalization.
//!
//! Downstream consumers read the content-publication status fields on
//! every listed event. The `Event` type already guarantees the fields
//! serialize (null when unset); this pass additionally collapses
//! empty-string statuses left behind by older ingestion runs to null
//! so callers see one consistent "absent" value.

use crate::types::Event;

/// Normalize executor output before it leaves the service.
pub fn normalize(mut events: Vec<Event>) -> Vec<Event> {
    for event in &mut events {
        clear_blank(&mut event.content_status);
        clear_blank(&mut event.blog_post_url);
    }
    events
}

fn clear_blank(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *field = None;
    }
}
