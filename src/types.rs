use serde::{Deserialize, Serialize};

/// Placeholder value the ingestion process writes for unknown fields.
/// Events carrying it in a required field are never listed.
pub const PLACEHOLDER: &str = "N/A";

/// One performance listing.
///
/// Created by an external ingestion process; this service only reads
/// events and lazily attaches generated night-plan content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Assigned by the store on insert; import files may omit it.
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub artist: String,
    /// ISO-8601 calendar date (`YYYY-MM-DD`). Compared lexicographically.
    pub date: String,
    pub time: String,
    pub venue: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub featured: bool,
    /// AI-generated night-plan guide, populated lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_plan: Option<String>,
    /// Content-publication status fields. Always serialized, null when
    /// unset, so downstream consumers can rely on their presence.
    #[serde(default)]
    pub content_status: Option<String>,
    #[serde(default)]
    pub blog_post_url: Option<String>,
    /// Distance from the query point in meters, set by the geo stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    /// Text-relevance score, set by the full-text stage.
    #[serde(skip)]
    pub relevance: Option<f64>,
}

/// One search request, as received on the query string. Geolocation
/// parameters stay raw strings here: parsing them is the assembler's
/// job and a parse failure must surface as a controlled client error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    pub search: Option<String>,
    pub artist: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub timeframe: Option<String>,
    pub preferred_option: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub radius: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub featured: Option<String>,
}

/// Interpretation categories a search term can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    City,
    Country,
    Artist,
    Text,
}

impl Category {
    /// Lenient parse for the `preferredOption` query parameter.
    /// Unknown values are treated as absent.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "city" => Some(Category::City),
            "country" => Some(Category::Country),
            "artist" => Some(Category::Artist),
            "text" => Some(Category::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::City => write!(f, "city"),
            Category::Country => write!(f, "country"),
            Category::Artist => write!(f, "artist"),
            Category::Text => write!(f, "text"),
        }
    }
}

/// Outcome of a search: an ordered, deduplicated result set, or a
/// request for disambiguation. Ambiguity is a successful outcome, not
/// an error.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Results(Vec<Event>),
    Ambiguous { term: String, options: Vec<Category> },
}

/// Which fields the full-text stage matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    AllFields,
    Artist,
}

/// Final ordering of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DateAsc,
    DateDesc,
    Relevance,
}

/// One discrete step in the assembled query pipeline. The executor is
/// stage-order-sensitive: each stage narrows or transforms the working
/// set produced by the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Restrict and order candidates by distance from a point.
    /// Must be the first stage when present.
    GeoNear {
        latitude: f64,
        longitude: f64,
        max_distance_m: f64,
    },
    /// Fuzzy full-text match tolerating up to `max_edits` character
    /// edits per query token. Mutually exclusive with `GeoNear`.
    TextSearch {
        query: String,
        scope: TextScope,
        max_edits: usize,
    },
    /// Conjunction of eligibility, classification, and explicit filters.
    Match(MatchFilter),
    /// Collapse events sharing the same (date, artist, name) triple,
    /// keeping the first encountered representative.
    GroupFirst,
    Sort(SortKey),
}

/// The conjunction evaluated by the match stage. All substring and
/// equality checks are case-insensitive; user input is matched as a
/// literal, never as a pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilter {
    /// Lower date bound, inclusive. Defaults to "today".
    pub date_from: String,
    /// Upper date bound, inclusive.
    pub date_to: Option<String>,
    /// Require name/artist/time/venue to be non-empty and not "N/A".
    pub require_complete: bool,
    /// Substring match on city OR province (CITY classification, and
    /// the explicit `city` filter).
    pub city_or_province: Option<String>,
    /// Anchored full match on country.
    pub country: Option<String>,
    /// Substring match on artist.
    pub artist: Option<String>,
    /// Degraded free-text term: OR-substring across
    /// name/artist/city/venue. Set only when the geo stage is active.
    pub term_any_field: Option<String>,
    /// Restrict to featured listings.
    pub featured_only: bool,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn present(value: &str) -> bool {
    !value.trim().is_empty() && value != PLACEHOLDER
}

impl MatchFilter {
    /// Evaluate the conjunction against one event.
    pub fn matches(&self, event: &Event) -> bool {
        if event.date.as_str() < self.date_from.as_str() {
            return false;
        }
        if let Some(to) = &self.date_to {
            if event.date.as_str() > to.as_str() {
                return false;
            }
        }
        if self.require_complete
            && !(present(&event.name)
                && present(&event.artist)
                && present(&event.time)
                && present(&event.venue))
        {
            return false;
        }
        if let Some(loc) = &self.city_or_province {
            let in_city = contains_ci(&event.city, loc);
            let in_province = event
                .province
                .as_deref()
                .is_some_and(|p| contains_ci(p, loc));
            if !in_city && !in_province {
                return false;
            }
        }
        if let Some(country) = &self.country {
            let matched = event
                .country
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == country.to_lowercase());
            if !matched {
                return false;
            }
        }
        if let Some(artist) = &self.artist {
            if !contains_ci(&event.artist, artist) {
                return false;
            }
        }
        if let Some(term) = &self.term_any_field {
            let hit = contains_ci(&event.name, term)
                || contains_ci(&event.artist, term)
                || contains_ci(&event.city, term)
                || contains_ci(&event.venue, term);
            if !hit {
                return false;
            }
        }
        if self.featured_only && !event.featured {
            return false;
        }
        true
    }
}

/// Aggregated view counts for one artist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopArtist {
    pub artist: String,
    pub view_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            id: 1,
            name: "Noche Flamenca".into(),
            artist: "Israel Galván".into(),
            date: "2030-05-01".into(),
            time: "21:00".into(),
            venue: "Teatro Lope de Vega".into(),
            city: "Sevilla".into(),
            province: Some("Sevilla".into()),
            country: Some("España".into()),
            longitude: Some(-5.99),
            latitude: Some(37.38),
            featured: false,
            night_plan: None,
            content_status: None,
            blog_post_url: None,
            distance_meters: None,
            relevance: None,
        }
    }

    #[test]
    fn match_filter_rejects_past_dates() {
        let event = sample_event();
        let filter = MatchFilter {
            date_from: "2031-01-01".into(),
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }

    #[test]
    fn match_filter_date_bounds_inclusive() {
        let event = sample_event();
        let filter = MatchFilter {
            date_from: "2030-05-01".into(),
            date_to: Some("2030-05-01".into()),
            ..Default::default()
        };
        assert!(filter.matches(&event));
    }

    #[test]
    fn match_filter_rejects_placeholder_fields() {
        let mut event = sample_event();
        event.venue = PLACEHOLDER.into();
        let filter = MatchFilter {
            date_from: "2030-01-01".into(),
            require_complete: true,
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }

    #[test]
    fn match_filter_city_falls_through_to_province() {
        let mut event = sample_event();
        event.city = "Dos Hermanas".into();
        let filter = MatchFilter {
            date_from: "2030-01-01".into(),
            city_or_province: Some("sevilla".into()),
            ..Default::default()
        };
        assert!(filter.matches(&event));
    }

    #[test]
    fn match_filter_country_is_anchored() {
        let event = sample_event();
        let anchored = MatchFilter {
            date_from: "2030-01-01".into(),
            country: Some("españa".into()),
            ..Default::default()
        };
        assert!(anchored.matches(&event));

        let partial = MatchFilter {
            date_from: "2030-01-01".into(),
            country: Some("Espa".into()),
            ..Default::default()
        };
        assert!(!partial.matches(&event));
    }

    #[test]
    fn match_filter_term_any_field_checks_venue() {
        let event = sample_event();
        let filter = MatchFilter {
            date_from: "2030-01-01".into(),
            term_any_field: Some("lope".into()),
            ..Default::default()
        };
        assert!(filter.matches(&event));
    }

    #[test]
    fn category_parse_is_lenient() {
        assert_eq!(Category::parse(" City "), Some(Category::City));
        assert_eq!(Category::parse("venue"), None);
    }

    #[test]
    fn event_serializes_status_fields_as_null() {
        let event = sample_event();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("contentStatus").is_some_and(|v| v.is_null()));
        assert!(json.get("blogPostUrl").is_some_and(|v| v.is_null()));
    }
}
