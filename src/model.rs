use chrono::NaiveDate;
use serde::Deserialize;

/// Top-level shape of an Asana project export: an ordered list of root
/// tasks under `data`. Everything is materialized up front and never
/// mutated during migration.
#[derive(Debug, Clone, Deserialize)]
pub struct AsanaExport {
    pub data: Vec<AsanaTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsanaTask {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee: Option<AsanaUser>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub projects: Vec<AsanaProject>,
    #[serde(default)]
    pub subtasks: Vec<AsanaTask>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsanaUser {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsanaProject {
    pub id: u64,
}

/// A history item on an Asana task. Only `comment` stories are migrated;
/// every other kind (status changes, attachments, likes) collapses into
/// `Other` and produces no remote calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Story {
    #[serde(rename = "comment")]
    Comment { created_by: AsanaUser, text: String },
    #[serde(other)]
    Other,
}

impl Story {
    /// Author name and body text when this story is a comment.
    pub fn as_comment(&self) -> Option<(&str, &str)> {
        match self {
            Self::Comment { created_by, text } => Some((created_by.name.as_str(), text.as_str())),
            Self::Other => None,
        }
    }
}
