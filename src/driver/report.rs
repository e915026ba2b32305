//! Per-run outcome reporting.

use std::fmt;

use serde::Serialize;

/// Whether an entity was served from the transformation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Disabled,
    Hit,
    Miss,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Disabled => write!(f, "disabled"),
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::Miss => write!(f, "miss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub name: String,
    pub rows: usize,
    pub nodes_written: usize,
    pub node_failures: usize,
    pub assets_fetched: usize,
    pub asset_failures: usize,
    pub cache: CacheStatus,
}

/// Entities that ran, and entities skipped because their query failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub entities: Vec<EntityReport>,
    pub failed_entities: Vec<(String, String)>,
}

impl RunReport {
    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|report| report.name == name)
    }

    pub fn total_rows(&self) -> usize {
        self.entities.iter().map(|report| report.rows).sum()
    }

    pub fn total_nodes_written(&self) -> usize {
        self.entities.iter().map(|report| report.nodes_written).sum()
    }

    pub fn total_node_failures(&self) -> usize {
        self.entities.iter().map(|report| report.node_failures).sum()
    }

    /// True when every entity ran and every node was written
    pub fn is_clean(&self) -> bool {
        self.failed_entities.is_empty() && self.total_node_failures() == 0
    }

    pub fn log_summary(&self) {
        for report in &self.entities {
            log::info!(
                "{}: {} rows, {} nodes created, {} failed, {} assets ({} failed), cache {}",
                report.name,
                report.rows,
                report.nodes_written,
                report.node_failures,
                report.assets_fetched,
                report.asset_failures,
                report.cache
            );
        }
        for (name, error) in &self.failed_entities {
            log::error!("{}: skipped, {}", name, error);
        }
        log::info!(
            "Sourced {} nodes from {} rows across {} entities ({} node failures, {} entities skipped)",
            self.total_nodes_written(),
            self.total_rows(),
            self.entities.len(),
            self.total_node_failures(),
            self.failed_entities.len()
        );
    }
}
