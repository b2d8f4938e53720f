//! Canonical reference data for term classification.
//!
//! The production handlers used to carry their own copies of these
//! lists, which drifted apart over time. Here there is exactly one
//! versioned set, loaded once at startup and injected into the planner.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::Category;

/// Known city/province names, country names, and the ambiguous-terms
/// table. All matching against these lists is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    /// Bumped whenever the lists change; logged at startup so deployed
    /// instances can be checked for drift.
    pub version: u32,
    pub cities_and_provinces: Vec<String>,
    pub countries: Vec<String>,
    /// Terms that need caller disambiguation, mapped to their candidate
    /// interpretation categories. Keys are stored normalized (lowercase).
    pub ambiguous_terms: BTreeMap<String, Vec<Category>>,
}

impl Default for ReferenceData {
    fn default() -> Self {
        let cities_and_provinces = [
            "Sevilla",
            "Málaga",
            "Granada",
            "Cádiz",
            "Ceuta",
            "Córdoba",
            "Huelva",
            "Jaén",
            "Almería",
            "Madrid",
            "Barcelona",
            "Valencia",
            "Murcia",
            "Alicante",
            "Bilbao",
            "Zaragoza",
            "Jerez",
            "Úbeda",
            "Baeza",
            "Ronda",
            "Estepona",
            "Lebrija",
            "Morón de la Frontera",
            "Utrera",
            "Algeciras",
            "Cartagena",
            "Logroño",
            "Santander",
            "Vitoria",
            "Pamplona",
            "Vigo",
            "A Coruña",
            "Oviedo",
            "Gijón",
            "León",
            "Salamanca",
            "Valladolid",
            "Burgos",
            "Cáceres",
            "Badajoz",
            "Toledo",
            "Cuenca",
            "Guadalajara",
            "Albacete",
        ];
        let countries = [
            "España",
            "Francia",
            "Italia",
            "Portugal",
            "Países Bajos",
            "Bélgica",
            "Austria",
            "Bulgaria",
            "Croacia",
            "Chipre",
            "República Checa",
            "Dinamarca",
            "Estonia",
            "Finlandia",
            "Grecia",
            "Hungría",
            "Irlanda",
            "Letonia",
            "Lituania",
            "Luxemburgo",
            "Malta",
            "Polonia",
            "Rumanía",
            "Eslovaquia",
            "Eslovenia",
            "Suiza",
            "Noruega",
            "Suecia",
            "Alemania",
            "Reino Unido",
            "EEUU",
            "Japón",
            "China",
            "Corea del Sur",
            "Argentina",
        ];

        let mut ambiguous_terms = BTreeMap::new();
        ambiguous_terms.insert(
            "argentina".to_string(),
            vec![Category::Country, Category::Artist],
        );
        ambiguous_terms.insert(
            "granaino".to_string(),
            vec![Category::City, Category::Artist],
        );

        Self {
            version: 3,
            cities_and_provinces: cities_and_provinces.map(String::from).to_vec(),
            countries: countries.map(String::from).to_vec(),
            ambiguous_terms,
        }
    }
}

impl ReferenceData {
    /// Load reference data from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference data: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse reference data: {}", path.display()))
    }

    /// Save reference data to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize reference data")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write reference data: {}", path.display()))
    }

    /// True if the normalized term exactly equals a known city or
    /// province name.
    pub fn is_city(&self, normalized: &str) -> bool {
        self.cities_and_provinces
            .iter()
            .any(|c| c.to_lowercase() == normalized)
    }

    /// True if the normalized term exactly equals a known country name.
    pub fn is_country(&self, normalized: &str) -> bool {
        self.countries.iter().any(|c| c.to_lowercase() == normalized)
    }

    /// True if the normalized term is contained in a known country name
    /// ("reino" matches "Reino Unido").
    pub fn is_country_fragment(&self, normalized: &str) -> bool {
        self.countries
            .iter()
            .any(|c| c.to_lowercase().contains(normalized))
    }

    /// Candidate categories for an ambiguous term, if listed.
    pub fn ambiguity_of(&self, normalized: &str) -> Option<&[Category]> {
        self.ambiguous_terms.get(normalized).map(Vec::as_slice)
    }
}
