//! YAML catalog files
//!
//! A catalog file has the same shape as the built-in catalogs:
//!
//! ```yaml
//! name: smoke
//! profile: steady
//! pacing: { min_wait: 0.1, max_wait: 0.5 }
//! policies:
//!   expectation: { required_fields: [userIgn, totalCost, items], check_item_counts: true }
//! scenarios:
//!   - name: v3_expectation
//!     endpoint: /api/v3/characters/{userIgn}/expectation
//!     tags: [v3]
//!     weight: 3
//!     policy: expectation
//!     params: { userIgn: [아델, 강은호] }
//!     pacing: { min_wait: 0.5, max_wait: 2.0 }
//! ```
//!
//! A scenario's own `pacing` replaces the catalog range for the pause that
//! follows it.

use super::{CatalogProfile, ScenarioCatalog, ScenarioDefinition, WarmupPlan};
use crate::classifier::ClassifierPolicy;
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use stampede_config::PacingOverride;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub name: String,

    #[serde(default)]
    pub profile: CatalogProfile,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingOverride>,

    #[serde(default)]
    pub policies: BTreeMap<String, ClassifierPolicy>,

    pub scenarios: Vec<ScenarioDefinition>,

    #[serde(default)]
    pub warmup: WarmupPlan,

    #[serde(default)]
    pub hints: BTreeMap<String, String>,
}

impl CatalogFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        debug!("Loading catalog file: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Register everything the file declares
    pub fn into_catalog(self) -> Result<ScenarioCatalog, CatalogError> {
        let mut catalog = ScenarioCatalog::new(self.name, self.profile);
        if let Some(pacing) = self.pacing {
            catalog.set_pacing(pacing)?;
        }
        for (name, policy) in self.policies {
            catalog.add_policy(name, policy);
        }
        for definition in self.scenarios {
            catalog.register(definition)?;
        }
        catalog.set_warmup(self.warmup);
        for (tag, cause) in self.hints {
            catalog.add_hint(tag, cause);
        }
        Ok(catalog)
    }
}

impl From<&ScenarioCatalog> for CatalogFile {
    fn from(catalog: &ScenarioCatalog) -> Self {
        Self {
            name: catalog.name().to_string(),
            profile: catalog.profile(),
            pacing: Some(catalog.pacing()),
            policies: catalog.policies().clone(),
            scenarios: catalog
                .scenarios()
                .iter()
                .map(|scenario| scenario.definition.clone())
                .collect(),
            warmup: catalog.warmup().clone(),
            hints: catalog.hints().clone(),
        }
    }
}
