//! Problem settings file (YAML or JSON).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wd_sim::HydraulicSettings;

use crate::error::{OptError, OptResult};
use crate::formulation::FormulationSwitches;
use crate::objectives::ObjectiveSettings;
use crate::options::OptionTables;

/// Everything needed to build a [`crate::Problem`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemSettings {
    /// Network description; relative paths resolve against the settings file.
    pub network: PathBuf,
    /// Named ID sequences loaded onto the network, e.g. `existing_pipes`.
    pub subnetworks: BTreeMap<String, Vec<String>>,
    pub formulation: FormulationSwitches,
    pub options: OptionTables,
    pub hydraulics: HydraulicSettings,
    pub objectives: ObjectiveSettings,
    /// Pumps running in each pattern period, written onto the pump patterns
    /// when pumps are not decision variables.
    pub operations: Option<Vec<f64>>,
}

impl ProblemSettings {
    /// Load by file extension (`.yaml`/`.yml` or `.json`).
    pub fn load(path: &Path) -> OptResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: ProblemSettings = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(OptError::settings(format!(
                    "unsupported settings format: {}",
                    path.display()
                )));
            }
        };
        if settings.network.is_relative()
            && let Some(dir) = path.parent()
        {
            settings.network = dir.join(&settings.network);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> OptResult<()> {
        self.options.validate()?;
        self.objectives.validate()?;
        self.hydraulics.validate()?;
        if let Some((name, _)) = self.subnetworks.iter().find(|(name, _)| name.is_empty()) {
            return Err(OptError::settings(format!("empty subnetwork name '{name}'")));
        }
        if let Some(operations) = &self.operations
            && (operations.is_empty() || operations.iter().any(|v| !(v.is_finite() && *v >= 0.0)))
        {
            return Err(OptError::settings(
                "operations must list non-negative pump counts",
            ));
        }
        Ok(())
    }
}
