//! Deletion ordering, risk scoring and backup requirements of an inventory.
//!
//! A resource referenced by others gets a higher priority number than all of them and is
//! therefore deleted later. Leaf resources (nothing references them) get priority 1.

use crate::models::cleanup::DeletionStepType;
use crate::models::graph::{
    BackupRequirement, BackupType, DeletionOrderEntry, DependencyGraph, RiskAssessment, RiskFactor, RiskLevel,
};
use crate::models::inventory::{Resource, ResourceInventory};
use itertools::Itertools;
use std::collections::BTreeMap;

pub fn build_graph(inventory: &ResourceInventory) -> DependencyGraph {
    let resources = inventory.resources();
    let graph = DependencyGraph {
        deletion_order: deletion_order(&resources),
        risk_assessment: assess_risk(&resources),
        backup_requirements: resources.iter().map(backup_requirement).collect(),
    };

    debug!(
        "dependency graph of `{}`: {} resource(s), overall risk {}",
        inventory.project_name(),
        graph.deletion_order.len(),
        graph.risk_assessment.overall
    );

    graph
}

/// Entries sorted by `(priority, id)`, every entry listing the ids which must be deleted before it.
pub fn deletion_order(resources: &[Resource]) -> Vec<DeletionOrderEntry> {
    // dependents[i]: indexes of resources referencing resources[i]
    let dependents: Vec<Vec<usize>> = resources
        .iter()
        .map(|target| {
            resources
                .iter()
                .enumerate()
                .filter(|(_, r)| r.references(target))
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect();

    let mut priorities: Vec<Option<u32>> = vec![None; resources.len()];
    for idx in 0..resources.len() {
        priority_of(idx, &dependents, &mut priorities, 0);
    }

    resources
        .iter()
        .enumerate()
        .map(|(idx, resource)| DeletionOrderEntry {
            id: resource.id(),
            resource_type: resource.step_type(),
            priority: priorities[idx].unwrap_or(1),
            dependencies: dependents[idx].iter().map(|d| resources[*d].id()).sorted().collect(),
        })
        .sorted_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)))
        .collect()
}

fn priority_of(idx: usize, dependents: &[Vec<usize>], priorities: &mut [Option<u32>], depth: usize) -> u32 {
    if let Some(priority) = priorities[idx] {
        return priority;
    }

    // reference edges only go down the hosting > env vars > database/storage chain,
    // a path can't be longer than the number of resources
    if depth > dependents.len() {
        return 1;
    }

    let priority = dependents[idx]
        .iter()
        .map(|d| priority_of(*d, dependents, priorities, depth + 1))
        .max()
        .map(|max| max + 1)
        .unwrap_or(1);
    priorities[idx] = Some(priority);

    priority
}

/// One factor per resource type present in `resources`, overall risk is the highest severity.
pub fn assess_risk(resources: &[Resource]) -> RiskAssessment {
    let by_type: BTreeMap<DeletionStepType, Vec<&Resource>> = resources
        .iter()
        .into_group_map_by(|r| r.step_type())
        .into_iter()
        .collect();

    let factors: Vec<RiskFactor> = by_type
        .into_iter()
        .map(|(resource_type, members)| {
            let severity = members
                .iter()
                .map(|r| r.risk_severity())
                .max()
                .unwrap_or(RiskLevel::Low);

            RiskFactor {
                resource_type,
                severity,
                description: risk_description(resource_type, severity, members.len()),
                affected_resources: members.iter().map(|r| r.id()).sorted().collect(),
            }
        })
        .collect();

    let overall = factors.iter().map(|f| f.severity).max().unwrap_or(RiskLevel::Low);
    let mitigations = factors.iter().flat_map(mitigations).unique().collect();

    RiskAssessment {
        overall,
        factors,
        mitigations,
    }
}

fn risk_description(resource_type: DeletionStepType, severity: RiskLevel, count: usize) -> String {
    match (resource_type, severity) {
        (DeletionStepType::Database, RiskLevel::Critical) => {
            format!("{} database(s) including production data will be permanently destroyed", count)
        }
        (DeletionStepType::Database, _) => format!("{} database(s) and their data will be permanently destroyed", count),
        (DeletionStepType::HostingProject, _) => "the hosting project and its deployments will be removed".to_string(),
        (DeletionStepType::EnvironmentVariables, _) => {
            format!("hosting environment variables of {} environment(s) will be cleared", count)
        }
        (DeletionStepType::Domains, _) => format!("{} domain(s) will stop resolving to the application", count),
        (DeletionStepType::StorageStore, _) => format!("{} storage store(s) and their objects will be removed", count),
    }
}

fn mitigations(factor: &RiskFactor) -> Vec<String> {
    let mut mitigations = match factor.resource_type {
        DeletionStepType::Database => vec!["Export a dump of every database before deleting it".to_string()],
        DeletionStepType::StorageStore => vec!["Download the stored objects you want to keep".to_string()],
        DeletionStepType::HostingProject | DeletionStepType::EnvironmentVariables => {
            vec!["Save hosting project settings and environment variables".to_string()]
        }
        DeletionStepType::Domains => vec!["Write down DNS records pointing to the hosting project".to_string()],
    };

    if factor.severity == RiskLevel::Critical {
        mitigations.push("Take a full backup of production data and confirm it can be restored".to_string());
    }

    mitigations
}

pub fn backup_requirement(resource: &Resource) -> BackupRequirement {
    let (required, backup_type) = resource.backup();

    BackupRequirement {
        resource_type: resource.step_type(),
        resource_id: resource.id(),
        required,
        backup_type,
        estimated_size: match backup_type {
            BackupType::Config => Some("< 1 MB".to_string()),
            BackupType::Data | BackupType::Full => None,
        },
    }
}
