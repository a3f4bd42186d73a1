//! Logic trees
//!
//! A logic tree is a tree of branch-sets. Each branch-set groups mutually
//! exclusive weighted branches; a branch may point at a child branch-set
//! on the next branching level. A path from the root branch-set to a
//! childless branch selects one alternative per traversed branch-set.
//!
//! Trees are stored as an arena of branch-sets indexed by position, with
//! the root at index 0.

pub mod definition;
pub mod processor;
pub mod uncertainty;

pub use definition::{BranchDefinition, BranchSetDefinition, BranchingLevelDefinition, LogicTreeDefinition};
pub use processor::{AppliedUncertainty, LogicTreeProcessor, RealizationPath, SourceModelPath};
pub use uncertainty::{apply_uncertainty, BranchSetFilter, UncertaintyType, UncertaintyValue};

use crate::source::SourceTypology;
use hazard_common::{Error, Result};
use rand::Rng;
use std::collections::HashMap;

/// Tolerance on the sum of branch weights within a branch-set
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Which of the two logic trees a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    SourceModel,
    Gsim,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: String,
    pub weight: f64,
    pub value: UncertaintyValue,
    /// Index of the child branch-set in the tree arena
    pub child: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchSet {
    pub id: String,
    pub uncertainty_type: UncertaintyType,
    pub filter: Option<BranchSetFilter>,
    pub branches: Vec<Branch>,
}

impl BranchSet {
    /// Pick a branch with probability equal to its weight
    ///
    /// Draws one uniform number in [0, 1) and walks the cumulative weights
    /// until the roll falls inside a branch interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let roll: f64 = rng.gen();
        let mut acc = 0.0;
        for (i, branch) in self.branches.iter().enumerate() {
            acc += branch.weight;
            if acc >= roll {
                return i;
            }
        }
        // Rounding can leave the cumulative sum a hair below 1
        self.branches.len() - 1
    }

    pub fn branch_index(&self, branch_id: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.id == branch_id)
    }
}

/// A validated logic tree
#[derive(Debug, Clone, PartialEq)]
pub struct LogicTree {
    kind: TreeKind,
    branch_sets: Vec<BranchSet>,
}

impl LogicTree {
    /// Build and validate a tree from its definition
    pub fn build(definition: &LogicTreeDefinition, kind: TreeKind) -> Result<Self> {
        if definition.branching_levels.is_empty() {
            return Err(Error::config("logic tree has no branching levels"));
        }

        let mut branch_sets: Vec<BranchSet> = Vec::new();
        // branch id -> (branch-set index, branch index)
        let mut branch_index: HashMap<String, (usize, usize)> = HashMap::new();
        let mut open_ends: Vec<(usize, usize)> = Vec::new();

        for (depth, level) in definition.branching_levels.iter().enumerate() {
            if level.branch_sets.is_empty() {
                return Err(Error::config(format!(
                    "branching level {} has no branch sets",
                    level.id
                )));
            }
            let mut new_open_ends = Vec::new();

            for (number, bs_def) in level.branch_sets.iter().enumerate() {
                let branch_set = parse_branch_set(bs_def, kind, depth, number)?;
                let set_index = branch_sets.len();

                for (i, branch) in branch_set.branches.iter().enumerate() {
                    if branch_index
                        .insert(branch.id.clone(), (set_index, i))
                        .is_some()
                    {
                        return Err(Error::config(format!(
                            "branch id {:?} is not unique",
                            branch.id
                        )));
                    }
                    new_open_ends.push((set_index, i));
                }
                branch_sets.push(branch_set);

                if depth == 0 && number == 0 {
                    continue;
                }

                // Attach to the previous level
                let targets: Vec<(usize, usize)> = if bs_def.apply_to_branches.is_empty() {
                    open_ends
                        .iter()
                        .copied()
                        .filter(|&(s, b)| branch_sets[s].branches[b].child.is_none())
                        .collect()
                } else {
                    if kind == TreeKind::Gsim {
                        return Err(Error::config(format!(
                            "branch set {}: applyToBranches is not allowed in the GSIM logic tree",
                            bs_def.id
                        )));
                    }
                    let mut targets = Vec::with_capacity(bs_def.apply_to_branches.len());
                    for branch_id in &bs_def.apply_to_branches {
                        let &(s, b) = branch_index.get(branch_id).ok_or_else(|| {
                            Error::config(format!(
                                "branch set {}: branch {:?} is not yet defined",
                                bs_def.id, branch_id
                            ))
                        })?;
                        if branch_sets[s].branches[b].child.is_some() {
                            return Err(Error::config(format!(
                                "branch set {}: branch {:?} already has a child branch set",
                                bs_def.id, branch_id
                            )));
                        }
                        if !open_ends.contains(&(s, b)) {
                            return Err(Error::config(format!(
                                "branch set {}: applyToBranches must reference only branches \
                                 from the previous branching level",
                                bs_def.id
                            )));
                        }
                        targets.push((s, b));
                    }
                    targets
                };

                if targets.is_empty() {
                    return Err(Error::config(format!(
                        "branch set {} has no open branch to attach to",
                        bs_def.id
                    )));
                }
                for (s, b) in targets {
                    branch_sets[s].branches[b].child = Some(set_index);
                }
            }
            open_ends = new_open_ends;
        }

        if kind == TreeKind::Gsim {
            let mut regions = std::collections::HashSet::new();
            for bs in &branch_sets {
                if let Some(BranchSetFilter::ApplyToTectonicRegionType(trt)) = &bs.filter {
                    if !regions.insert(trt.as_str()) {
                        return Err(Error::config(format!(
                            "GSIM uncertainty for tectonic region type {:?} has already been defined",
                            trt
                        )));
                    }
                }
            }
        }

        Ok(Self { kind, branch_sets })
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn root(&self) -> &BranchSet {
        &self.branch_sets[0]
    }

    pub fn branch_sets(&self) -> &[BranchSet] {
        &self.branch_sets
    }

    pub fn branch_set(&self, index: usize) -> &BranchSet {
        &self.branch_sets[index]
    }

    /// Lazy depth-first enumeration of every root-to-leaf path
    ///
    /// Each call returns a fresh iterator.
    pub fn paths(&self) -> PathIter<'_> {
        PathIter {
            tree: self,
            frames: vec![Frame { set: 0, next: 0 }],
        }
    }

    /// Number of distinct root-to-leaf paths
    pub fn count_paths(&self) -> usize {
        fn count(tree: &LogicTree, set: usize) -> usize {
            tree.branch_sets[set]
                .branches
                .iter()
                .map(|b| b.child.map_or(1, |child| count(tree, child)))
                .sum()
        }
        count(self, 0)
    }

    /// Draw one path, choosing each branch with probability equal to its weight
    pub fn sample_path<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(0);
        while let Some(set) = current {
            let branch_set = &self.branch_sets[set];
            let branch = &branch_set.branches[branch_set.sample(rng)];
            path.push(branch.id.clone());
            current = branch.child;
        }
        path
    }

    /// Resolve a path of branch ids to (branch-set index, branch index) steps
    pub fn resolve_path(&self, branch_ids: &[String]) -> Result<Vec<(usize, usize)>> {
        let mut steps = Vec::with_capacity(branch_ids.len());
        let mut current = Some(0);
        let mut ids = branch_ids.iter();
        while let Some(set) = current {
            let branch_set = &self.branch_sets[set];
            let id = ids.next().ok_or_else(|| {
                Error::config(format!(
                    "path {:?} ends before branch set {}",
                    branch_ids, branch_set.id
                ))
            })?;
            let branch = branch_set.branch_index(id).ok_or_else(|| {
                Error::config(format!(
                    "branch {:?} does not belong to branch set {}",
                    id, branch_set.id
                ))
            })?;
            steps.push((set, branch));
            current = branch_set.branches[branch].child;
        }
        if ids.next().is_some() {
            return Err(Error::config(format!(
                "path {:?} is longer than the tree",
                branch_ids
            )));
        }
        Ok(steps)
    }

    /// Product of branch weights along a path
    pub fn path_weight(&self, branch_ids: &[String]) -> Result<f64> {
        Ok(self
            .resolve_path(branch_ids)?
            .into_iter()
            .map(|(s, b)| self.branch_sets[s].branches[b].weight)
            .product())
    }
}

/// A root-to-leaf path: branch ids and the product of their weights
#[derive(Debug, Clone, PartialEq)]
pub struct LogicTreePath {
    pub branch_ids: Vec<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    set: usize,
    /// Next branch to visit; `next - 1` is the branch being descended
    next: usize,
}

/// Iterator over the paths of a [`LogicTree`]
#[derive(Debug, Clone)]
pub struct PathIter<'a> {
    tree: &'a LogicTree,
    frames: Vec<Frame>,
}

impl Iterator for PathIter<'_> {
    type Item = LogicTreePath;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let frame = self.frames.last_mut()?;
            let branch_set = &tree.branch_sets[frame.set];
            if frame.next == branch_set.branches.len() {
                self.frames.pop();
                continue;
            }
            let branch = &branch_set.branches[frame.next];
            frame.next += 1;

            if let Some(child) = branch.child {
                self.frames.push(Frame {
                    set: child,
                    next: 0,
                });
                continue;
            }

            let mut branch_ids = Vec::with_capacity(self.frames.len());
            let mut weight = 1.0;
            for frame in &self.frames {
                let branch = &tree.branch_sets[frame.set].branches[frame.next - 1];
                branch_ids.push(branch.id.clone());
                weight *= branch.weight;
            }
            return Some(LogicTreePath { branch_ids, weight });
        }
    }
}

fn parse_branch_set(
    def: &BranchSetDefinition,
    kind: TreeKind,
    depth: usize,
    number: usize,
) -> Result<BranchSet> {
    let uncertainty_type: UncertaintyType = def
        .uncertainty_type
        .parse()
        .map_err(|e| Error::config(format!("branch set {}: {}", def.id, e)))?;

    if def.branches.is_empty() {
        return Err(Error::config(format!("branch set {} has no branches", def.id)));
    }

    let filter = parse_filter(def)?;
    match kind {
        TreeKind::SourceModel => validate_source_model_branch_set(def, uncertainty_type, &filter, depth, number)?,
        TreeKind::Gsim => validate_gsim_branch_set(def, uncertainty_type, &filter, number)?,
    }

    let mut weight_sum = 0.0;
    let mut branches = Vec::with_capacity(def.branches.len());
    for branch in &def.branches {
        if !(0.0..=1.0).contains(&branch.weight) {
            return Err(Error::config(format!(
                "branch {}: weight {} outside [0, 1]",
                branch.id, branch.weight
            )));
        }
        weight_sum += branch.weight;
        let value = UncertaintyValue::parse(uncertainty_type, &branch.value)
            .map_err(|e| Error::config(format!("branch {}: {}", branch.id, e)))?;
        branches.push(Branch {
            id: branch.id.clone(),
            weight: branch.weight,
            value,
            child: None,
        });
    }
    if (weight_sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(Error::config(format!(
            "branch set {}: weights sum to {} instead of 1.0",
            def.id, weight_sum
        )));
    }

    Ok(BranchSet {
        id: def.id.clone(),
        uncertainty_type,
        filter,
        branches,
    })
}

fn parse_filter(def: &BranchSetDefinition) -> Result<Option<BranchSetFilter>> {
    let mut filters = Vec::new();
    if let Some(ids) = &def.apply_to_sources {
        if ids.is_empty() {
            return Err(Error::config(format!(
                "branch set {}: applyToSources must list at least one source id",
                def.id
            )));
        }
        filters.push(BranchSetFilter::ApplyToSources(ids.clone()));
    }
    if let Some(typology) = &def.apply_to_source_type {
        let typology: SourceTypology = typology
            .parse()
            .map_err(|e| Error::config(format!("branch set {}: {}", def.id, e)))?;
        filters.push(BranchSetFilter::ApplyToSourceType(typology));
    }
    if let Some(trt) = &def.apply_to_tectonic_region_type {
        filters.push(BranchSetFilter::ApplyToTectonicRegionType(trt.clone()));
    }
    if filters.len() > 1 {
        return Err(Error::config(format!(
            "branch set {}: only one filter is allowed per branch set",
            def.id
        )));
    }
    Ok(filters.pop())
}

fn validate_source_model_branch_set(
    def: &BranchSetDefinition,
    uncertainty_type: UncertaintyType,
    filter: &Option<BranchSetFilter>,
    depth: usize,
    number: usize,
) -> Result<()> {
    if depth == 0 {
        if number > 0 {
            return Err(Error::config(
                "there must be only one branch set on the first branching level",
            ));
        }
        if uncertainty_type != UncertaintyType::SourceModel {
            return Err(Error::config(format!(
                "branch set {}: first branch set must define an uncertainty of type \"sourceModel\"",
                def.id
            )));
        }
    } else if uncertainty_type == UncertaintyType::SourceModel {
        return Err(Error::config(format!(
            "branch set {}: uncertainty of type \"sourceModel\" can be defined on the first branch set only",
            def.id
        )));
    }
    if uncertainty_type == UncertaintyType::GmpeModel {
        return Err(Error::config(format!(
            "branch set {}: uncertainty of type \"gmpeModel\" is not allowed in the source model logic tree",
            def.id
        )));
    }
    if let (UncertaintyType::SourceModel, Some(filter)) = (uncertainty_type, filter) {
        return Err(Error::config(format!(
            "branch set {}: filter {} is not allowed on source model uncertainty",
            def.id,
            filter.name()
        )));
    }
    if uncertainty_type.is_absolute() {
        match filter {
            Some(BranchSetFilter::ApplyToSources(ids)) if ids.len() == 1 => {}
            _ => {
                return Err(Error::config(format!(
                    "branch set {}: uncertainty of type {:?} must define applyToSources \
                     with only one source id",
                    def.id,
                    uncertainty_type.as_str()
                )))
            }
        }
    }
    Ok(())
}

fn validate_gsim_branch_set(
    def: &BranchSetDefinition,
    uncertainty_type: UncertaintyType,
    filter: &Option<BranchSetFilter>,
    number: usize,
) -> Result<()> {
    if uncertainty_type != UncertaintyType::GmpeModel {
        return Err(Error::config(format!(
            "branch set {}: only uncertainties of type \"gmpeModel\" are allowed in the GSIM logic tree",
            def.id
        )));
    }
    if number != 0 {
        return Err(Error::config(format!(
            "branch set {}: only one branch set per branching level is allowed in the GSIM logic tree",
            def.id
        )));
    }
    if !matches!(filter, Some(BranchSetFilter::ApplyToTectonicRegionType(_))) {
        return Err(Error::config(format!(
            "branch set {}: branch sets in the GSIM logic tree must define only \
             the applyToTectonicRegionType filter, got {}",
            def.id,
            filter.as_ref().map_or("none", BranchSetFilter::name)
        )));
    }
    Ok(())
}
