//! Toolchain pin and MSRV spread across projects.

use serde::{Deserialize, Serialize};

use crate::{OperationResult, ToolchainInfo};

use super::{ValueGroup, aggregate};

const TOOLCHAIN: &str = "toolchain";
const MSRV: &str = "msrv";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolchainAnalysis {
    pub projects: Vec<OperationResult<ToolchainInfo>>,
    pub toolchain_groups: Vec<ValueGroup>,
    pub msrv_groups: Vec<ValueGroup>,
    /// More than one toolchain pin, or more than one MSRV.
    pub has_mismatches: bool,
}

pub fn analyze_toolchains(results: Vec<OperationResult<ToolchainInfo>>) -> ToolchainAnalysis {
    let report = aggregate(&results, |info| {
        let toolchain = info.toolchain.clone().map(|t| (TOOLCHAIN.to_string(), t));
        let msrv = info.msrv.clone().map(|m| (MSRV.to_string(), m));
        toolchain.into_iter().chain(msrv)
    });
    let values_of = |name: &str| {
        report
            .group(name)
            .map(|g| g.values.clone())
            .unwrap_or_default()
    };
    let toolchain_groups = values_of(TOOLCHAIN);
    let msrv_groups = values_of(MSRV);
    ToolchainAnalysis {
        has_mismatches: toolchain_groups.len() > 1 || msrv_groups.len() > 1,
        projects: results,
        toolchain_groups,
        msrv_groups,
    }
}
