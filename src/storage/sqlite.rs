use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

use crate::types::{Event, MatchFilter, SortKey, Stage, TextScope, TopArtist, PLACEHOLDER};

/// Event, subscription, and analytics storage using SQLite.
///
/// Opened once at startup and shared for the process lifetime; callers
/// close it explicitly on shutdown. The event collection is small (a
/// few thousand listings), so the pipeline executor folds stages over
/// the full set in memory, which keeps stage-order semantics exact.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Test use only.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Close the underlying connection. Part of the documented
    /// lifecycle: create once, reuse, close on shutdown.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow::Error::from(e).context("Failed to close database"))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Performance listings (written by the ingestion process)
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                artist TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                venue TEXT NOT NULL,
                city TEXT NOT NULL,
                province TEXT,
                country TEXT,
                longitude REAL,
                latitude REAL,
                featured INTEGER NOT NULL DEFAULT 0,
                night_plan TEXT,
                content_status TEXT,
                blog_post_url TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Web-push subscriptions, keyed by endpoint
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                endpoint TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- User interactions for the analytics endpoints
            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                session_id TEXT NOT NULL,
                event_id INTEGER,
                details TEXT,
                created_at TEXT NOT NULL
            );

            -- App-level config flags served to the frontend
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
            CREATE INDEX IF NOT EXISTS idx_interactions_kind ON interactions(kind);
        "#,
        )?;
        Ok(())
    }

    // -- Events --

    /// Insert a listing and return its id. The id on the passed event
    /// is ignored.
    pub fn insert_event(&self, event: &Event) -> Result<i64> {
        self.conn.execute(
            r#"INSERT INTO events
               (name, artist, date, time, venue, city, province, country,
                longitude, latitude, featured, night_plan, content_status, blog_post_url)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            (
                &event.name,
                &event.artist,
                &event.date,
                &event.time,
                &event.venue,
                &event.city,
                &event.province,
                &event.country,
                event.longitude,
                event.latitude,
                event.featured,
                &event.night_plan,
                &event.content_status,
                &event.blog_post_url,
            ),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch a single event by id.
    pub fn event(&self, id: i64) -> Result<Option<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map([id], row_to_event)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Execute an assembled stage pipeline in declaration order.
    pub fn execute_pipeline(&self, stages: &[Stage]) -> Result<Vec<Event>> {
        let mut working = self.all_events()?;
        for stage in stages {
            working = apply_stage(working, stage);
        }
        Ok(working)
    }

    /// Count events matching a filter. Used by the counting endpoint
    /// with the bare eligibility filter.
    pub fn count_matching(&self, filter: &MatchFilter) -> Result<u64> {
        let count = self
            .all_events()?
            .iter()
            .filter(|e| filter.matches(e))
            .count();
        Ok(count as u64)
    }

    /// Events in a city (case-insensitive substring) within an
    /// inclusive date range, date ascending. Trip-planner lookup.
    pub fn find_by_city_and_range(&self, city: &str, from: &str, to: &str) -> Result<Vec<Event>> {
        let needle = city.to_lowercase();
        let mut events: Vec<Event> = self
            .all_events()?
            .into_iter()
            .filter(|e| {
                e.city.to_lowercase().contains(&needle)
                    && e.date.as_str() >= from
                    && e.date.as_str() <= to
            })
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(events)
    }

    /// Attach generated night-plan content to an event.
    pub fn set_night_plan(&self, id: i64, content: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE events SET night_plan = ?2 WHERE id = ?1",
            (id, content),
        )?;
        anyhow::ensure!(updated == 1, "No event with id {id}");
        Ok(())
    }

    /// Upcoming events that still need a night plan, oldest date first.
    pub fn events_missing_night_plan(&self, today: &str, limit: usize) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE night_plan IS NULL AND date >= ?1
             ORDER BY date, id LIMIT ?2"
        ))?;
        let rows = stmt.query_map((today, limit as i64), row_to_event)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// How many upcoming events still lack a night plan.
    pub fn missing_night_plan_count(&self, today: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE night_plan IS NULL AND date >= ?1",
            [today],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_event)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -- Push subscriptions --

    /// Store a push subscription, replacing any previous payload for
    /// the same endpoint.
    pub fn upsert_subscription(&self, endpoint: &str, payload: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO push_subscriptions (endpoint, payload, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(endpoint) DO UPDATE SET
                   payload = excluded.payload,
                   updated_at = excluded.updated_at"#,
            (
                endpoint,
                payload.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn subscription_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM push_subscriptions", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    // -- Analytics --

    /// Record one user interaction.
    pub fn record_interaction(
        &self,
        kind: &str,
        session_id: &str,
        event_id: Option<i64>,
        details: &serde_json::Value,
    ) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO interactions (kind, session_id, event_id, details, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            (
                kind,
                session_id,
                event_id,
                details.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    /// Total recorded event views.
    pub fn total_event_views(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE kind = 'eventView'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Artists ranked by event views, most viewed first. Interactions
    /// are joined to their events; rows without a usable artist are
    /// dropped.
    pub fn top_artists(&self, limit: usize) -> Result<Vec<TopArtist>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT e.artist, COUNT(*) AS views
               FROM interactions i
               JOIN events e ON e.id = i.event_id
               WHERE i.kind = 'eventView'
                 AND e.artist IS NOT NULL AND e.artist != '' AND e.artist != ?1
               GROUP BY e.artist
               ORDER BY views DESC, e.artist
               LIMIT ?2"#,
        )?;
        let rows = stmt.query_map((PLACEHOLDER, limit as i64), |row| {
            Ok(TopArtist {
                artist: row.get(0)?,
                view_count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -- App config --

    /// The stored app-config flags document, or the default when none
    /// has been written yet.
    pub fn app_config(&self) -> Result<serde_json::Value> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'app_config'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(raw) => serde_json::from_str(&raw).context("Corrupt app_config document"),
            None => Ok(serde_json::json!({ "welcomeModal_enabled": false })),
        }
    }

    #[cfg(test)]
    pub fn set_app_config(&self, value: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO meta (key, value) VALUES ('app_config', ?1)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
            [value.to_string()],
        )?;
        Ok(())
    }
}

const EVENT_COLUMNS: &str = "id, name, artist, date, time, venue, city, province, country, \
     longitude, latitude, featured, night_plan, content_status, blog_post_url";

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        artist: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        venue: row.get(5)?,
        city: row.get(6)?,
        province: row.get(7)?,
        country: row.get(8)?,
        longitude: row.get(9)?,
        latitude: row.get(10)?,
        featured: row.get(11)?,
        night_plan: row.get(12)?,
        content_status: row.get(13)?,
        blog_post_url: row.get(14)?,
        distance_meters: None,
        relevance: None,
    })
}

/// Apply one stage to the working set.
fn apply_stage(events: Vec<Event>, stage: &Stage) -> Vec<Event> {
    match stage {
        Stage::GeoNear {
            latitude,
            longitude,
            max_distance_m,
        } => {
            let mut near: Vec<Event> = events
                .into_iter()
                .filter_map(|mut e| {
                    let (Some(ev_lat), Some(ev_lon)) = (e.latitude, e.longitude) else {
                        return None;
                    };
                    let distance = haversine_m(*latitude, *longitude, ev_lat, ev_lon);
                    if distance > *max_distance_m {
                        return None;
                    }
                    e.distance_meters = Some(distance);
                    Some(e)
                })
                .collect();
            near.sort_by(|a, b| {
                a.distance_meters
                    .partial_cmp(&b.distance_meters)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            near
        }
        Stage::TextSearch {
            query,
            scope,
            max_edits,
        } => events
            .into_iter()
            .filter_map(|mut e| {
                let score = fuzzy_score(query, &text_fields(&e, *scope), *max_edits);
                if score <= 0.0 {
                    return None;
                }
                e.relevance = Some(score);
                Some(e)
            })
            .collect(),
        Stage::Match(filter) => events.into_iter().filter(|e| filter.matches(e)).collect(),
        Stage::GroupFirst => {
            let mut seen = HashSet::new();
            events
                .into_iter()
                .filter(|e| seen.insert((e.date.clone(), e.artist.clone(), e.name.clone())))
                .collect()
        }
        Stage::Sort(key) => {
            let mut sorted = events;
            match key {
                SortKey::DateAsc => sorted.sort_by(|a, b| a.date.cmp(&b.date)),
                SortKey::DateDesc => sorted.sort_by(|a, b| b.date.cmp(&a.date)),
                SortKey::Relevance => sorted.sort_by(|a, b| {
                    b.relevance
                        .unwrap_or(0.0)
                        .partial_cmp(&a.relevance.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                }),
            }
            sorted
        }
    }
}

fn text_fields(event: &Event, scope: TextScope) -> Vec<String> {
    match scope {
        TextScope::Artist => vec![event.artist.clone()],
        TextScope::AllFields => {
            let mut fields = vec![
                event.name.clone(),
                event.artist.clone(),
                event.venue.clone(),
                event.city.clone(),
            ];
            fields.extend(event.province.clone());
            fields.extend(event.country.clone());
            fields
        }
    }
}

/// Score a fuzzy match of `query` against the given fields. Each query
/// token contributes 1.0 for an exact token hit and 0.5 for a hit
/// within `max_edits` character edits; 0.0 means no match at all.
fn fuzzy_score(query: &str, fields: &[String], max_edits: usize) -> f64 {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let words: Vec<String> = fields
        .iter()
        .flat_map(|f| f.split_whitespace())
        .map(str::to_lowercase)
        .collect();

    let mut score = 0.0;
    for token in &tokens {
        let mut best = 0.0_f64;
        for word in &words {
            if word == token {
                best = 1.0;
                break;
            }
            if strsim::levenshtein(word, token) <= max_edits {
                best = best.max(0.5);
            }
        }
        score += best;
    }
    score
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, artist: &str, date: &str, city: &str) -> Event {
        Event {
            id: 0,
            name: name.into(),
            artist: artist.into(),
            date: date.into(),
            time: "21:00".into(),
            venue: "Tablao El Arenal".into(),
            city: city.into(),
            province: None,
            country: Some("España".into()),
            longitude: None,
            latitude: None,
            featured: false,
            night_plan: None,
            content_status: None,
            blog_post_url: None,
            distance_meters: None,
            relevance: None,
        }
    }

    fn located(mut e: Event, lat: f64, lon: f64) -> Event {
        e.latitude = Some(lat);
        e.longitude = Some(lon);
        e
    }

    #[test]
    fn pipeline_deduplicates_and_sorts() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_event(&event("Noche", "Farruquito", "2030-03-02", "Sevilla"))
            .unwrap();
        store
            .insert_event(&event("Noche", "Farruquito", "2030-03-02", "Sevilla"))
            .unwrap();
        store
            .insert_event(&event("Recital", "Farruquito", "2030-03-01", "Sevilla"))
            .unwrap();

        let stages = vec![
            Stage::Match(MatchFilter {
                date_from: "2030-01-01".into(),
                require_complete: true,
                ..Default::default()
            }),
            Stage::GroupFirst,
            Stage::Sort(SortKey::DateAsc),
        ];
        let events = store.execute_pipeline(&stages).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "Recital");
        assert_eq!(events[1].name, "Noche");
    }

    #[test]
    fn group_first_keeps_first_encountered() {
        let mut duplicate = event("Noche", "Farruquito", "2030-03-02", "Sevilla");
        duplicate.venue = "Second Venue".into();
        let first = event("Noche", "Farruquito", "2030-03-02", "Sevilla");
        let grouped = apply_stage(vec![first, duplicate], &Stage::GroupFirst);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].venue, "Tablao El Arenal");
    }

    #[test]
    fn geo_stage_orders_by_distance_and_caps_radius() {
        // Seville city center vs. Triana (~2 km) vs. Madrid (~390 km)
        let center = (37.389, -5.984);
        let events = vec![
            located(event("Far", "A", "2030-01-01", "Madrid"), 40.416, -3.703),
            located(event("Near", "B", "2030-01-01", "Sevilla"), 37.385, -6.003),
            located(event("Here", "C", "2030-01-01", "Sevilla"), 37.389, -5.984),
            event("NoCoords", "D", "2030-01-01", "Sevilla"),
        ];
        let near = apply_stage(
            events,
            &Stage::GeoNear {
                latitude: center.0,
                longitude: center.1,
                max_distance_m: 10_000.0,
            },
        );
        let names: Vec<&str> = near.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Here", "Near"]);
        assert!(near[1].distance_meters.unwrap() > near[0].distance_meters.unwrap());
    }

    #[test]
    fn text_stage_tolerates_one_edit() {
        let events = vec![
            event("Cante Jondo", "Camarón Tribute", "2030-01-01", "Cádiz"),
            event("Guitarra Clásica", "Paco", "2030-01-01", "Madrid"),
        ];
        let hits = apply_stage(
            events,
            &Stage::TextSearch {
                query: "cadiz".into(),
                scope: TextScope::AllFields,
                max_edits: 1,
            },
        );
        // "cadiz" is one edit from "cádiz"
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].city, "Cádiz");
        assert!(hits[0].relevance.unwrap() > 0.0);
    }

    #[test]
    fn artist_scope_ignores_other_fields() {
        let events = vec![event("Sevilla de Noche", "Rosalía", "2030-01-01", "Sevilla")];
        let hits = apply_stage(
            events,
            &Stage::TextSearch {
                query: "sevilla".into(),
                scope: TextScope::Artist,
                max_edits: 1,
            },
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn relevance_sort_puts_exact_hits_first() {
        let events = vec![
            event("Bulerias", "A", "2030-01-01", "Jerez"),
            event("Bulerías", "B", "2030-01-01", "Jerez"),
        ];
        let mut hits = apply_stage(
            events,
            &Stage::TextSearch {
                query: "bulerias".into(),
                scope: TextScope::AllFields,
                max_edits: 1,
            },
        );
        hits = apply_stage(hits, &Stage::Sort(SortKey::Relevance));
        assert_eq!(hits[0].name, "Bulerias");
    }

    #[test]
    fn count_matching_applies_eligibility() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_event(&event("Past", "A", "2000-01-01", "Sevilla"))
            .unwrap();
        let mut placeholder = event("Incomplete", "B", "2030-01-01", "Sevilla");
        placeholder.venue = PLACEHOLDER.into();
        store.insert_event(&placeholder).unwrap();
        store
            .insert_event(&event("Upcoming", "C", "2030-01-01", "Sevilla"))
            .unwrap();

        let filter = MatchFilter {
            date_from: "2020-01-01".into(),
            require_complete: true,
            ..Default::default()
        };
        assert_eq!(store.count_matching(&filter).unwrap(), 1);
    }

    #[test]
    fn night_plan_roundtrip() {
        let store = EventStore::open_in_memory().unwrap();
        let id = store
            .insert_event(&event("Noche", "Farruquito", "2030-03-02", "Sevilla"))
            .unwrap();

        let missing = store.events_missing_night_plan("2030-01-01", 10).unwrap();
        assert_eq!(missing.len(), 1);

        store.set_night_plan(id, "## Una noche en Sevilla").unwrap();
        assert_eq!(
            store.event(id).unwrap().unwrap().night_plan.as_deref(),
            Some("## Una noche en Sevilla")
        );
        assert!(store
            .events_missing_night_plan("2030-01-01", 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn set_night_plan_unknown_event_fails() {
        let store = EventStore::open_in_memory().unwrap();
        assert!(store.set_night_plan(999, "## plan").is_err());
    }

    #[test]
    fn subscription_upsert_is_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        let payload = serde_json::json!({"endpoint": "https://push/1", "keys": {"auth": "x"}});
        store
            .upsert_subscription("https://push/1", &payload)
            .unwrap();
        store
            .upsert_subscription("https://push/1", &payload)
            .unwrap();
        assert_eq!(store.subscription_count().unwrap(), 1);
    }

    #[test]
    fn top_artists_ranks_by_views() {
        let store = EventStore::open_in_memory().unwrap();
        let a = store
            .insert_event(&event("Noche", "Farruquito", "2030-03-02", "Sevilla"))
            .unwrap();
        let b = store
            .insert_event(&event("Recital", "Mayte Martín", "2030-03-05", "Barcelona"))
            .unwrap();

        for _ in 0..3 {
            store
                .record_interaction("eventView", "s1", Some(a), &serde_json::json!({}))
                .unwrap();
        }
        store
            .record_interaction("eventView", "s2", Some(b), &serde_json::json!({}))
            .unwrap();
        // Non-view interactions are ignored
        store
            .record_interaction("searchPerformed", "s2", None, &serde_json::json!({}))
            .unwrap();

        let top = store.top_artists(10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].artist, "Farruquito");
        assert_eq!(top[0].view_count, 3);
        assert_eq!(store.total_event_views().unwrap(), 4);
    }

    #[test]
    fn app_config_defaults_then_persists() {
        let store = EventStore::open_in_memory().unwrap();
        let default = store.app_config().unwrap();
        assert_eq!(default["welcomeModal_enabled"], false);

        store
            .set_app_config(&serde_json::json!({"welcomeModal_enabled": true}))
            .unwrap();
        assert_eq!(store.app_config().unwrap()["welcomeModal_enabled"], true);
    }

    #[test]
    fn find_by_city_and_range_sorts_by_date() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert_event(&event("Late", "A", "2030-03-10", "Granada"))
            .unwrap();
        store
            .insert_event(&event("Early", "B", "2030-03-02", "Granada"))
            .unwrap();
        store
            .insert_event(&event("Elsewhere", "C", "2030-03-03", "Sevilla"))
            .unwrap();

        let events = store
            .find_by_city_and_range("granada", "2030-03-01", "2030-03-31")
            .unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }
}
