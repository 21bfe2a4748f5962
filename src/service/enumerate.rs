use crate::models::error::Result;
use crate::models::file_record::FileRecord;
use crate::models::filter::FileFilter;
use crate::pdm::types::{Node, NodeKind, Project};
use crate::pdm::PdmSource;
use crate::utils::paths::sanitize_component;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Lists every file eligible for backup across all reachable projects.
///
/// The whole list is collected before any copying starts. Projects without an
/// id or a default branch are skipped with a warning; a listing failure on
/// any project aborts the run.
pub fn enumerate_files(source: &dyn PdmSource, filter: &FileFilter) -> Result<Vec<FileRecord>> {
    let projects = source.projects()?;
    info!("Found {} projects", projects.len());

    let mut records = Vec::new();
    let mut scanned = 0usize;

    for project in &projects {
        if project.id.is_empty() {
            warn!("Skipping project '{}': no project id", project.name);
            continue;
        }
        let branch = match &project.default_branch {
            Some(branch) => branch,
            None => {
                warn!("Skipping project '{}': no default branch", project.name);
                continue;
            }
        };

        let nodes = source.project_files(&project.id)?;
        let project_dir = PathBuf::from(sanitize_component(&project.name));
        flatten_into(
            &nodes,
            &project_dir,
            project,
            &branch.id,
            filter,
            &mut records,
        );
        scanned += 1;
    }

    info!(
        "Enumerated {} files across {} projects",
        records.len(),
        scanned
    );
    Ok(records)
}

fn flatten_into(
    nodes: &[Node],
    dir: &Path,
    project: &Project,
    branch_id: &str,
    filter: &FileFilter,
    out: &mut Vec<FileRecord>,
) {
    for node in nodes {
        match node.kind {
            NodeKind::File => {
                let record = FileRecord {
                    project_id: project.id.clone(),
                    project_name: project.name.clone(),
                    branch_id: branch_id.to_string(),
                    file_id: node.id.clone(),
                    file_name: node.name.clone(),
                    relative_path: dir.join(sanitize_component(&node.name)),
                    last_modified: node.last_modified,
                };
                if filter.matches(&record) {
                    out.push(record);
                }
            }
            NodeKind::Folder => {
                let sub = dir.join(sanitize_component(&node.name));
                flatten_into(&node.children, &sub, project, branch_id, filter, out);
            }
            NodeKind::Other => {}
        }
    }
}
