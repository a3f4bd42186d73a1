//! Serializable logic tree definitions
//!
//! A definition lists branching levels in order; each level holds one or
//! more branch-sets and each branch-set its weighted branches. Definitions
//! are loaded from TOML:
//!
//! ```toml
//! [[branching_levels]]
//! id = "bl1"
//!
//! [[branching_levels.branch_sets]]
//! id = "bs1"
//! uncertainty_type = "sourceModel"
//!
//! [[branching_levels.branch_sets.branches]]
//! id = "b1"
//! value = "source_model_1"
//! weight = 1.0
//! ```
//!
//! Structural validation happens when the definition is built into a
//! [`LogicTree`](super::LogicTree).

use hazard_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicTreeDefinition {
    #[serde(default)]
    pub branching_levels: Vec<BranchingLevelDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchingLevelDefinition {
    pub id: String,
    #[serde(default)]
    pub branch_sets: Vec<BranchSetDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSetDefinition {
    pub id: String,
    pub uncertainty_type: String,

    /// Previous-level branches this set attaches to; empty means every
    /// open branch of the previous level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_to_branches: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to_sources: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to_source_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to_tectonic_region_type: Option<String>,

    #[serde(default)]
    pub branches: Vec<BranchDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDefinition {
    pub id: String,
    /// Raw uncertainty value, parsed according to the branch-set type
    pub value: String,
    pub weight: f64,
}

impl LogicTreeDefinition {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Single-level tree with one branch-set
    pub fn single_level(branch_set: BranchSetDefinition) -> Self {
        Self {
            branching_levels: vec![BranchingLevelDefinition {
                id: "bl1".to_string(),
                branch_sets: vec![branch_set],
            }],
        }
    }
}

impl BranchSetDefinition {
    pub fn new(id: impl Into<String>, uncertainty_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uncertainty_type: uncertainty_type.into(),
            apply_to_branches: Vec::new(),
            apply_to_sources: None,
            apply_to_source_type: None,
            apply_to_tectonic_region_type: None,
            branches: Vec::new(),
        }
    }

    pub fn branch(mut self, id: impl Into<String>, value: impl Into<String>, weight: f64) -> Self {
        self.branches.push(BranchDefinition {
            id: id.into(),
            value: value.into(),
            weight,
        });
        self
    }

    pub fn for_region(mut self, trt: impl Into<String>) -> Self {
        self.apply_to_tectonic_region_type = Some(trt.into());
        self
    }

    pub fn for_sources<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_to_sources = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn for_source_type(mut self, typology: impl Into<String>) -> Self {
        self.apply_to_source_type = Some(typology.into());
        self
    }

    pub fn after<I, S>(mut self, branch_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_to_branches = branch_ids.into_iter().map(Into::into).collect();
        self
    }
}
