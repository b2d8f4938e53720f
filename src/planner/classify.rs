//! Free-text term classification.
//!
//! Decides how a search term is interpreted before any query runs:
//! ambiguous terms stop the request for caller disambiguation, known
//! place names become location filters, everything else goes to the
//! fuzzy full-text stage. Pure function of the term, the caller's
//! disambiguation choice, and the reference lists — identical inputs
//! always classify identically.

use crate::references::ReferenceData;
use crate::types::Category;

/// How a search term should be interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The term is in the ambiguous-terms table and no choice was
    /// supplied; the caller must pick one of the candidate categories.
    Ambiguous(Vec<Category>),
    City,
    Country,
    Artist,
    Text,
}

/// Classify a raw search term.
///
/// Precedence is fixed: ambiguity table, then the supplied choice, then
/// exact city/province equality, then exact country equality, then
/// country containment, then free text. Exact checks run before
/// contains checks and city before country.
pub fn classify(term: &str, choice: Option<Category>, refs: &ReferenceData) -> Classification {
    let normalized = term.trim().to_lowercase();

    if choice.is_none() {
        if let Some(options) = refs.ambiguity_of(&normalized) {
            return Classification::Ambiguous(options.to_vec());
        }
    }

    if let Some(choice) = choice {
        return match choice {
            Category::City => Classification::City,
            Category::Country => Classification::Country,
            Category::Artist => Classification::Artist,
            Category::Text => Classification::Text,
        };
    }

    if refs.is_city(&normalized) {
        return Classification::City;
    }
    if refs.is_country(&normalized) || refs.is_country_fragment(&normalized) {
        return Classification::Country;
    }

    Classification::Text
}
