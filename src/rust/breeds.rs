//! Static breed metadata keyed by normalized breed name.
//!
//! Names coming from the classifier (`golden_retriever`), from URLs
//! (`golden-retriever`) and from people (`Golden Retriever`) all resolve to
//! the same [`BreedKey`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read breed info file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid breed info JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A breed name with `_` and `-` folded to spaces, trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreedKey(String);

impl BreedKey {
    pub fn new(name: &str) -> Self {
        BreedKey(spaced(name).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BreedKey {
    fn from(name: &str) -> Self {
        BreedKey::new(name)
    }
}

impl fmt::Display for BreedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn spaced(name: &str) -> String {
    name.replace(['_', '-'], " ").trim().to_string()
}

/// Human-facing form of a class label: `shih-tzu` becomes `Shih Tzu`.
///
/// Every letter that follows a non-letter is uppercased, every other letter
/// lowercased.
pub fn display_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for ch in spaced(name).chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Descriptive attributes for one breed.
///
/// Fields absent from the source file default to empty. Fields the struct
/// does not know about are kept in `extra` and serialized back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreedInfo {
    pub size: String,
    pub temperament: Vec<String>,
    pub energy_level: String,
    pub life_span: String,
    pub group: String,
    pub good_with_kids: String,
    pub good_with_pets: String,
    pub trainability: String,
    pub origin: String,
    pub exercise_needs: String,
    pub grooming_needs: String,
    pub barking_tendency: String,
    pub bred_for: String,
    pub weight_range: String,
    pub height_range: String,
    pub coat_type: String,
    pub colors: Vec<String>,
    pub mental_stimulation_needs: String,
    pub prey_drive: String,
    pub sensitivity_level: String,
    pub daily_food_amount: String,
    pub calorie_requirements: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

lazy_static! {
    /// Returned for breeds with no metadata. `origin` is `"Unknown"`.
    pub static ref DEFAULT_BREED_INFO: BreedInfo = {
        let s = |v: &str| v.to_string();
        BreedInfo {
            size: s("Medium"),
            temperament: vec![s("Friendly"), s("Intelligent")],
            energy_level: s("Moderate"),
            life_span: s("10-15 years"),
            group: s("Not specified"),
            good_with_kids: s("Unknown"),
            good_with_pets: s("Unknown"),
            trainability: s("Moderate"),
            origin: s("Unknown"),
            exercise_needs: s("Moderate"),
            grooming_needs: s("Moderate"),
            barking_tendency: s("Moderate"),
            bred_for: s("Companionship"),
            weight_range: s("Unknown"),
            height_range: s("Unknown"),
            coat_type: s("Unknown"),
            colors: vec![s("Various")],
            mental_stimulation_needs: s("Moderate"),
            prey_drive: s("Moderate"),
            sensitivity_level: s("Moderate"),
            daily_food_amount: s("Unknown"),
            calorie_requirements: s("Unknown"),
            extra: BTreeMap::new(),
        }
    };
}

#[derive(Debug)]
struct CatalogEntry {
    name: String,
    info: BreedInfo,
}

/// Immutable breed name to [`BreedInfo`] map.
#[derive(Debug, Default)]
pub struct BreedCatalog {
    entries: HashMap<BreedKey, CatalogEntry>,
}

impl BreedCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let map: BTreeMap<String, BreedInfo> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(map))
    }

    /// Builds the catalog. When two names normalize to the same key the one
    /// that comes first in iteration order is kept.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, BreedInfo)>) -> Self {
        let mut map = HashMap::new();
        for (name, info) in entries {
            map.entry(BreedKey::new(&name)).or_insert(CatalogEntry { name, info });
        }
        Self { entries: map }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata for `name`, if the catalog has it.
    pub fn find(&self, name: &str) -> Option<&BreedInfo> {
        self.entries.get(&BreedKey::new(name)).map(|e| &e.info)
    }

    /// Metadata for `name`, falling back to [`DEFAULT_BREED_INFO`].
    pub fn lookup(&self, name: &str) -> &BreedInfo {
        self.find(name).unwrap_or(&DEFAULT_BREED_INFO)
    }

    /// Source names of every breed, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }
}
