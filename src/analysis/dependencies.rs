//! Dependency version drift across projects.

use serde::{Deserialize, Serialize};

use crate::{DeclaredDep, OperationResult};

use super::{AggregateReport, aggregate};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub projects: Vec<OperationResult<Vec<DeclaredDep>>>,
    /// Dependency name → version requirement → projects, over all three dependency tables.
    pub report: AggregateReport,
}

pub fn analyze_dependencies(results: Vec<OperationResult<Vec<DeclaredDep>>>) -> DependencyAnalysis {
    let report = aggregate(&results, |deps| {
        deps.iter()
            .map(|d| (d.name.clone(), d.version.clone()))
            .collect::<Vec<_>>()
    });
    DependencyAnalysis {
        projects: results,
        report,
    }
}
