//! Pure field mapping from Asana task data onto Maniphest payloads. No
//! side effects here; everything remote lives in [`crate::conduit`] and
//! [`crate::engine`].

use chrono::{NaiveDate, NaiveTime};
use serde_json::{Value, json};

use crate::error::{ImportError, Result};
use crate::model::AsanaTask;

/// Maniphest auxiliary field that carries the imported due date.
pub const DUE_DATE_FIELD: &str = "std:maniphest:tulip:due-date";

/// Canonical Asana URL for a task, derived from its first project id.
/// Used only for subtree roots; descendants inherit the root's URL.
pub fn asana_url(task: &AsanaTask) -> Result<String> {
    let project = task
        .projects
        .first()
        .ok_or_else(|| ImportError::MissingProject(task.id, task.name.clone()))?;
    Ok(format!(
        "https://app.asana.com/0/{}/{}",
        project.id, task.id
    ))
}

/// Subtask titles carry the parent's current Maniphest title as a prefix,
/// so nested imports compound: "Epic - Feature - Task".
pub fn subtask_title(parent_title: &str, name: &str) -> String {
    format!("{parent_title} - {name}")
}

/// Task description: the Asana notes followed by a provenance footer.
pub fn description(notes: &str, url: &str) -> String {
    format!("{notes}\n\nImported from Asana: {url}")
}

/// Comment body with a fixed attribution header; the original text is
/// carried verbatim.
pub fn comment_body(author: &str, text: &str) -> String {
    format!("{author} commented on Asana:\n\n{text}")
}

/// Asana due dates have no time-of-day; Maniphest wants epoch seconds.
/// The conversion pins the date to midnight UTC so the same calendar date
/// always yields the same string.
pub fn due_date_epoch(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().timestamp().to_string()
}

/// `maniphest.createtask` payload. Absent owner and due date are sent as
/// explicit nulls, matching what Phabricator expects on the wire.
pub fn create_payload(
    title: &str,
    owner_phid: Option<&str>,
    description: &str,
    due_epoch: Option<&str>,
) -> Value {
    let mut auxiliary = serde_json::Map::new();
    auxiliary.insert(DUE_DATE_FIELD.to_string(), json!(due_epoch));
    json!({
        "title": title,
        "ownerPHID": owner_phid,
        "description": description,
        "auxiliary": auxiliary,
    })
}
