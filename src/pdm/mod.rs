pub mod client;
pub mod types;

use crate::models::error::Result;
use crate::pdm::types::{Node, Project, ReleasedFile};
use std::path::Path;

/// The PDM backend surface the backup pipeline runs against.
///
/// Kept as a trait so tests can substitute an in-memory source for the real
/// HTTP client.
pub trait PdmSource {
    /// All projects the account can reach.
    fn projects(&self) -> Result<Vec<Project>>;

    /// The file tree of a project's default branch.
    fn project_files(&self, project_id: &str) -> Result<Vec<Node>>;

    /// Details of the latest released revision, including its download URL.
    fn resolve_download(
        &self,
        project_id: &str,
        branch_id: &str,
        file_id: &str,
    ) -> Result<ReleasedFile>;

    /// Streams the content at `url` into `dest`, returning the byte count.
    /// Implementations must not leave partial files behind on error.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}
