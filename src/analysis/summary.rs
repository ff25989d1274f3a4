//! Scalar totals for outdated/audit batches.

use serde::{Deserialize, Serialize};

use crate::{AuditReport, OperationResult, OutdatedDep};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedSummary {
    pub projects_checked: usize,
    pub projects_failed: usize,
    pub projects_with_outdated: usize,
    pub total_outdated: usize,
}

impl OutdatedSummary {
    pub fn from_results(results: &[OperationResult<Vec<OutdatedDep>>]) -> Self {
        let mut summary = Self {
            projects_checked: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.payload() {
                Some(deps) if r.is_success() => {
                    if !deps.is_empty() {
                        summary.projects_with_outdated += 1;
                    }
                    summary.total_outdated += deps.len();
                }
                _ => summary.projects_failed += 1,
            }
        }
        summary
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub projects_checked: usize,
    pub projects_failed: usize,
    pub vulnerable_projects: usize,
    pub total_vulnerabilities: usize,
    pub total_warnings: usize,
}

impl AuditSummary {
    pub fn from_results(results: &[OperationResult<AuditReport>]) -> Self {
        let mut summary = Self {
            projects_checked: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.payload() {
                Some(report) if r.is_success() => {
                    if !report.vulnerabilities.is_empty() {
                        summary.vulnerable_projects += 1;
                    }
                    summary.total_vulnerabilities += report.vulnerabilities.len();
                    summary.total_warnings += report.warnings.len();
                }
                _ => summary.projects_failed += 1,
            }
        }
        summary
    }
}
