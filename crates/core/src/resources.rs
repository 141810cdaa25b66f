use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compute::{ComputationError, LinearModel, NumericPredictor};
use crate::config::ResourcesConfig;
use crate::domain::fields::title_case;

pub const ADDRESS_MAP_FILE: &str = "address_map.json";
pub const SUBDISTRICT_CODE_MAP_FILE: &str = "subdistrict_code_map.json";
pub const PROPERTY_TYPE_MAP_FILE: &str = "property_type_map.json";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read resource {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse resource {path}: {message}")]
    ParseFile { path: PathBuf, message: String },
}

/// Label to model code mapping for one categorical feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupTable {
    codes: BTreeMap<String, f64>,
}

impl LookupTable {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self { codes: pairs.into_iter().map(|(label, code)| (label.to_owned(), code)).collect() }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Tries the label as given, uppercased, then title-cased. Unknown labels take the
    /// first entry's code so the model still gets a valid category.
    pub fn encode(&self, label: &str) -> Option<f64> {
        let label = label.trim();
        self.codes
            .get(label)
            .or_else(|| self.codes.get(&label.to_uppercase()))
            .or_else(|| self.codes.get(&title_case(label)))
            .or_else(|| self.codes.values().next())
            .copied()
    }

    /// Exact code match only, no fallback.
    pub fn encode_exact(&self, label: &str) -> Option<f64> {
        let label = label.trim();
        self.codes
            .get(label)
            .or_else(|| self.codes.get(&label.to_uppercase()))
            .or_else(|| self.codes.get(&title_case(label)))
            .copied()
    }

    pub fn decode(&self, code: f64) -> Option<&str> {
        self.codes.iter().find(|(_, value)| **value == code).map(|(label, _)| label.as_str())
    }

    fn load(path: &Path) -> Result<Self, ResourceError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ResourceError::ReadFile { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw).map_err(|error| ResourceError::ParseFile {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LookupTables {
    pub address: LookupTable,
    pub subdistrict_code: LookupTable,
    pub property_type: LookupTable,
}

impl LookupTables {
    pub fn load_dir(dir: &Path) -> Result<Self, ResourceError> {
        Ok(Self {
            address: LookupTable::load(&dir.join(ADDRESS_MAP_FILE))?,
            subdistrict_code: LookupTable::load(&dir.join(SUBDISTRICT_CODE_MAP_FILE))?,
            property_type: LookupTable::load(&dir.join(PROPERTY_TYPE_MAP_FILE))?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.subdistrict_code.is_empty() && self.property_type.is_empty()
    }
}

/// A known rental listing used for "compare" follow-ups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparableListing {
    pub address: String,
    pub subdistrict_code: String,
    pub property_type: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub size: f64,
    pub rent: f64,
}

/// Models, lookup tables and listings, loaded once and shared read-only.
#[derive(Clone, Default)]
pub struct ResourceProvider {
    rent_model: Option<Arc<dyn NumericPredictor>>,
    maintenance_model: Option<Arc<dyn NumericPredictor>>,
    lookups: LookupTables,
    listings: Vec<ComparableListing>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceReadiness {
    pub rent_model: bool,
    pub maintenance_model: bool,
    pub lookup_tables: bool,
    pub listings: usize,
}

impl ResourceProvider {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads every configured artefact. Paths left unset stay unavailable.
    pub fn load(config: &ResourcesConfig) -> Result<Self, ResourceError> {
        let mut provider = Self::empty();
        if let Some(path) = &config.rent_model_path {
            provider.rent_model = Some(Arc::new(load_model(path)?));
        }
        if let Some(path) = &config.maintenance_model_path {
            provider.maintenance_model = Some(Arc::new(load_model(path)?));
        }
        if let Some(dir) = &config.lookup_dir {
            provider.lookups = LookupTables::load_dir(dir)?;
        }
        if let Some(path) = &config.listings_path {
            provider.listings = load_listings(path)?;
        }
        Ok(provider)
    }

    pub fn with_rent_model(mut self, model: Arc<dyn NumericPredictor>) -> Self {
        self.rent_model = Some(model);
        self
    }

    pub fn with_maintenance_model(mut self, model: Arc<dyn NumericPredictor>) -> Self {
        self.maintenance_model = Some(model);
        self
    }

    pub fn with_lookups(mut self, lookups: LookupTables) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn with_listings(mut self, listings: Vec<ComparableListing>) -> Self {
        self.listings = listings;
        self
    }

    pub fn rent_model(&self) -> Result<&dyn NumericPredictor, ComputationError> {
        self.rent_model
            .as_deref()
            .ok_or_else(|| ComputationError::ModelUnavailable("rent".to_owned()))
    }

    pub fn maintenance_model(&self) -> Result<&dyn NumericPredictor, ComputationError> {
        self.maintenance_model
            .as_deref()
            .ok_or_else(|| ComputationError::ModelUnavailable("maintenance".to_owned()))
    }

    pub fn lookups(&self) -> &LookupTables {
        &self.lookups
    }

    pub fn listings(&self) -> &[ComparableListing] {
        &self.listings
    }

    pub fn readiness(&self) -> ResourceReadiness {
        ResourceReadiness {
            rent_model: self.rent_model.is_some(),
            maintenance_model: self.maintenance_model.is_some(),
            lookup_tables: !self.lookups.is_empty(),
            listings: self.listings.len(),
        }
    }
}

impl std::fmt::Debug for ResourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceProvider")
            .field("rent_model", &self.rent_model.as_ref().map(|model| model.model_id()))
            .field(
                "maintenance_model",
                &self.maintenance_model.as_ref().map(|model| model.model_id()),
            )
            .field("lookups", &self.lookups)
            .field("listings", &self.listings.len())
            .finish()
    }
}

fn load_model(path: &Path) -> Result<LinearModel, ResourceError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ResourceError::ReadFile { path: path.to_path_buf(), source })?;
    LinearModel::from_json(&raw)
        .map_err(|error| ResourceError::ParseFile {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
}

fn load_listings(path: &Path) -> Result<Vec<ComparableListing>, ResourceError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ResourceError::ReadFile { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|error| ResourceError::ParseFile {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}
