use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::conduit::Conduit;
use crate::error::{ImportError, Result};

/// Phabricator user roster, indexed by lower-cased real name.
///
/// Built once per run from `user.query` and read-only afterwards.
/// Duplicate real names collide last-write-wins; matching is by name only,
/// so two Phabricator users sharing a real name cannot be told apart. A
/// future refinement could match on linked Asana account ids instead,
/// which is why `resolve` already accepts one.
#[derive(Debug)]
pub struct UserDirectory {
    by_name: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ConduitUser {
    #[serde(rename = "realName")]
    real_name: String,
    phid: String,
}

impl UserDirectory {
    /// Fetch every destination user via `user.query`.
    pub fn build(conduit: &dyn Conduit) -> Result<Self> {
        let response = conduit.call("user.query", json!({}))?;
        let users: Vec<ConduitUser> =
            serde_json::from_value(response).map_err(|e| ImportError::UnexpectedResponse {
                method: "user.query".into(),
                detail: e.to_string(),
            })?;

        let by_name = users
            .into_iter()
            .map(|user| (user.real_name.to_lowercase(), user.phid))
            .collect();
        Ok(Self { by_name })
    }

    #[cfg(test)]
    pub fn from_names(entries: &[(&str, &str)]) -> Self {
        Self {
            by_name: entries
                .iter()
                .map(|(name, phid)| (name.to_lowercase(), phid.to_string()))
                .collect(),
        }
    }

    /// Map an Asana assignee to a Phabricator PHID by case-insensitive
    /// real-name equality. `_asana_id` is unused for now (see the type
    /// docs); no match is an expected outcome, not an error — the task is
    /// created unowned.
    pub fn resolve(&self, _asana_id: u64, name: &str) -> Option<&str> {
        self.by_name.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
