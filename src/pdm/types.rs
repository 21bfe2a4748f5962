use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A Bild project visible to the account.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default = "unknown_project_name")]
    pub name: String,
    #[serde(rename = "defaultBranch", default)]
    pub default_branch: Option<Branch>,
}

fn unknown_project_name() -> String {
    "Unknown Project".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub id: String,
}

/// One entry in a project's file tree. Folders nest via `children`.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(rename = "lastModifiedAt", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
    #[default]
    #[serde(other)]
    Other,
}

/// Details of the latest released revision of a file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleasedFile {
    #[serde(rename = "downloadUrl", default)]
    pub download_url: Option<String>,
}

/// The API returns lists either bare or wrapped in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Wrapped { data } => data,
            Listing::Bare(items) => items,
        }
    }
}

/// Single objects get the same optional `{"data": ...}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Payload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Payload::Wrapped { data } => data,
            Payload::Bare(inner) => inner,
        }
    }
}
