//! Pipeline assembly.
//!
//! Translates a classified search request into the ordered stage list
//! handed to the event store. Stage ordering is a hard contract: the
//! executor folds stages left to right and each stage narrows or
//! transforms the working set of the previous one.

use chrono::{Duration, NaiveDate};

use crate::planner::classify::{classify, Classification};
use crate::planner::{Plan, PlanError};
use crate::references::ReferenceData;
use crate::types::{Category, MatchFilter, SearchRequest, SortKey, Stage, TextScope};

/// Typo tolerance of the full-text stage, in character edits per token.
const FUZZY_MAX_EDITS: usize = 1;

/// Default timeframe window for `timeframe=week`, in days.
const WEEK_DAYS: i64 = 7;

/// Build the stage pipeline for one request, or stop with an ambiguity
/// notice before anything executes.
pub fn assemble(
    request: &SearchRequest,
    refs: &ReferenceData,
    today: NaiveDate,
) -> Result<Plan, PlanError> {
    let geo = parse_geo(request)?;
    let term = request
        .search
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let mut stages = Vec::new();
    let mut filter = MatchFilter {
        date_from: today.format("%Y-%m-%d").to_string(),
        require_complete: true,
        ..Default::default()
    };
    let mut text_active = false;

    if let Some((latitude, longitude, radius_km)) = geo {
        stages.push(Stage::GeoNear {
            latitude,
            longitude,
            max_distance_m: radius_km * 1000.0,
        });
        // Location order takes priority: the term degrades to a plain
        // substring filter instead of being classified.
        if let Some(term) = term {
            filter.term_any_field = Some(term.to_string());
        }
    } else if let Some(term) = term {
        let choice = request
            .preferred_option
            .as_deref()
            .and_then(Category::parse);
        match classify(term, choice, refs) {
            Classification::Ambiguous(options) => {
                return Ok(Plan::Ambiguous {
                    term: term.to_string(),
                    options,
                });
            }
            Classification::City => filter.city_or_province = Some(term.to_string()),
            Classification::Country => filter.country = Some(term.to_string()),
            Classification::Artist => {
                stages.push(Stage::TextSearch {
                    query: term.to_string(),
                    scope: TextScope::Artist,
                    max_edits: FUZZY_MAX_EDITS,
                });
                text_active = true;
            }
            Classification::Text => {
                stages.push(Stage::TextSearch {
                    query: term.to_string(),
                    scope: TextScope::AllFields,
                    max_edits: FUZZY_MAX_EDITS,
                });
                text_active = true;
            }
        }
    }

    // Explicit filters override whatever classification derived.
    if let Some(city) = trimmed(&request.city) {
        filter.city_or_province = Some(city);
    }
    if let Some(country) = trimmed(&request.country) {
        filter.country = Some(country);
    }
    if let Some(artist) = trimmed(&request.artist) {
        filter.artist = Some(artist);
    }
    if let Some(from) = trimmed(&request.date_from) {
        filter.date_from = from;
    }
    if let Some(to) = trimmed(&request.date_to) {
        filter.date_to = Some(to);
    } else if request.timeframe.as_deref() == Some("week") {
        let upper = today + Duration::days(WEEK_DAYS);
        filter.date_to = Some(upper.format("%Y-%m-%d").to_string());
    }
    filter.featured_only = matches!(
        request.featured.as_deref().map(str::trim),
        Some("true") | Some("1")
    );

    stages.push(Stage::Match(filter));
    stages.push(Stage::GroupFirst);

    // Geo results are already distance-ordered; adding a sort here
    // would destroy that ordering.
    if geo.is_none() {
        // Only date sorting is supported; unknown sort fields fall back
        // to the defaults.
        let date_sort = request
            .sort
            .as_deref()
            .map_or(true, |s| s.trim().eq_ignore_ascii_case("date"));
        let descending = date_sort
            && request
                .order
                .as_deref()
                .is_some_and(|o| o.eq_ignore_ascii_case("desc"));
        let key = if descending {
            SortKey::DateDesc
        } else if text_active {
            SortKey::Relevance
        } else {
            SortKey::DateAsc
        };
        stages.push(Stage::Sort(key));
    }

    Ok(Plan::Pipeline(stages))
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse the geolocation triple. All three parameters must be supplied
/// together and parse as finite numbers; anything else is a hard
/// validation failure, never a silent skip.
fn parse_geo(request: &SearchRequest) -> Result<Option<(f64, f64, f64)>, PlanError> {
    let lat = trimmed(&request.lat);
    let lon = trimmed(&request.lon);
    let radius = trimmed(&request.radius);

    match (lat, lon, radius) {
        (None, None, None) => Ok(None),
        (Some(lat), Some(lon), Some(radius)) => {
            let latitude = parse_coord(&lat, "lat")?;
            let longitude = parse_coord(&lon, "lon")?;
            let radius_km = parse_coord(&radius, "radius")?;
            Ok(Some((latitude, longitude, radius_km)))
        }
        _ => Err(PlanError::InvalidGeo(
            "lat, lon and radius must be supplied together".to_string(),
        )),
    }
}

fn parse_coord(value: &str, name: &str) -> Result<f64, PlanError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PlanError::InvalidGeo(format!("{name} is not a valid number: {value:?}")))
}
