//! The Event Query Planner.
//!
//! Receives a structured search request and produces an ordered,
//! deduplicated list of upcoming events, or an ambiguity notice asking
//! the caller to disambiguate. The flow is strictly sequential:
//! classify, assemble, execute against the store, normalize. Only the
//! store call suspends; classification and assembly are pure and never
//! retried.

mod assemble;
mod classify;
mod normalize;

pub use normalize::normalize;

use chrono::NaiveDate;
use thiserror::Error;

use crate::references::ReferenceData;
use crate::storage::EventStore;
use crate::types::{Category, MatchFilter, SearchOutcome, SearchRequest, Stage};

/// Planner-side failures. Validation errors surface before any stage
/// executes; store failures wrap whatever the executor reported.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid geolocation parameters: {0}")]
    InvalidGeo(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("query execution failed")]
    Store(#[source] anyhow::Error),
}

/// What the assembler decided for one request: run a pipeline, or stop
/// and ask the caller to disambiguate.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Ambiguous {
        term: String,
        options: Vec<Category>,
    },
    Pipeline(Vec<Stage>),
}

/// Classifies terms and assembles stage pipelines against one canonical
/// reference-data set, injected at construction.
pub struct QueryPlanner {
    refs: ReferenceData,
}

impl QueryPlanner {
    pub fn new(refs: ReferenceData) -> Self {
        Self { refs }
    }

    /// Plan a request against the server's current calendar date.
    pub fn plan(&self, request: &SearchRequest) -> Result<Plan, PlanError> {
        self.plan_at(request, chrono::Local::now().date_naive())
    }

    /// Plan a request against an explicit "today". Lets tests pin the
    /// clock; production callers use [`plan`](Self::plan).
    pub fn plan_at(&self, request: &SearchRequest, today: NaiveDate) -> Result<Plan, PlanError> {
        assemble::assemble(request, &self.refs, today)
    }

    /// Full search flow: plan, execute, normalize.
    pub fn search(
        &self,
        store: &EventStore,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, SearchError> {
        match self.plan(request)? {
            Plan::Ambiguous { term, options } => Ok(SearchOutcome::Ambiguous { term, options }),
            Plan::Pipeline(stages) => {
                let events = store.execute_pipeline(&stages).map_err(SearchError::Store)?;
                Ok(SearchOutcome::Results(normalize(events)))
            }
        }
    }

    /// The eligibility invariant as a standalone filter: complete
    /// required fields and date ≥ today. Used by the counting endpoint.
    pub fn eligibility_filter(today: NaiveDate) -> MatchFilter {
        MatchFilter {
            date_from: today.format("%Y-%m-%d").to_string(),
            require_complete: true,
            ..Default::default()
        }
    }
}
