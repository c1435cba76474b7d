use serde::Serialize;
use serde_json::{Value, json};

use crate::conduit::Conduit;
use crate::error::{ImportError, Result};
use crate::mapper;
use crate::model::{AsanaTask, Story};
use crate::users::UserDirectory;

/// Counts accumulated over a migration run. Summed across top-level tasks
/// for the final report.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct MigrationStats {
    pub tasks_created: usize,
    pub comments_created: usize,
    pub subtrees_skipped: usize,
}

impl MigrationStats {
    pub fn absorb(&mut self, other: MigrationStats) {
        self.tasks_created += other.tasks_created;
        self.comments_created += other.comments_created;
        self.subtrees_skipped += other.subtrees_skipped;
    }
}

/// Parent context threaded down the recursion: the freshly created
/// Maniphest PHID and the subtree's inherited Asana URL. Top-level tasks
/// have neither.
struct ParentContext<'a> {
    phid: &'a str,
    url: &'a str,
}

/// Title and owner of an existing Maniphest task, read back once per
/// subtask creation via `maniphest.query`.
struct ParentTask {
    title: String,
    owner_phid: Option<String>,
}

/// Walks a source task tree depth-first, pre-order, creating each node in
/// Maniphest before touching its subtasks or comments.
///
/// One blocking Conduit call is in flight at a time; any failure aborts
/// the whole run via `?`. The walk is plain recursion; export trees are
/// assumed finite, acyclic, and shallow.
pub struct Migrator<'a> {
    conduit: &'a dyn Conduit,
    users: &'a UserDirectory,
}

impl<'a> Migrator<'a> {
    pub fn new(conduit: &'a dyn Conduit, users: &'a UserDirectory) -> Self {
        Self { conduit, users }
    }

    /// Migrate one top-level task and everything beneath it.
    pub fn migrate(&self, task: &AsanaTask) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();
        self.migrate_node(task, None, &mut stats)?;
        Ok(stats)
    }

    fn migrate_node(
        &self,
        task: &AsanaTask,
        parent: Option<&ParentContext<'_>>,
        stats: &mut MigrationStats,
    ) -> Result<()> {
        // A completed node short-circuits its whole subtree, regardless of
        // the children's own completion flags.
        if task.completed {
            stats.subtrees_skipped += 1;
            return Ok(());
        }

        let own_url;
        let url = match parent {
            Some(ctx) => ctx.url,
            None => {
                own_url = mapper::asana_url(task)?;
                own_url.as_str()
            }
        };

        let description = mapper::description(&task.notes, url);
        let due = task.due_on.map(mapper::due_date_epoch);

        let phid = match parent {
            Some(ctx) => self.create_subtask(task, ctx.phid, &description, due.as_deref())?,
            None => {
                let owner = task
                    .assignee
                    .as_ref()
                    .and_then(|a| self.users.resolve(a.id, &a.name));
                self.create_task(&task.name, owner, &description, due.as_deref())?
            }
        };
        stats.tasks_created += 1;

        let context = ParentContext { phid: &phid, url };
        for subtask in &task.subtasks {
            self.migrate_node(subtask, Some(&context), stats)?;
        }

        // Comments go after subtask recursion, matching the order the
        // original importer established.
        for (author, text) in task.stories.iter().filter_map(Story::as_comment) {
            self.add_comment(&phid, author, text)?;
            stats.comments_created += 1;
        }

        Ok(())
    }

    /// Create a child task. The parent is read back once to get its
    /// current title (always the prefix) and owner (inherited only when
    /// the child has no Asana assignee of its own; an assignee that fails
    /// to resolve leaves the child unowned).
    fn create_subtask(
        &self,
        task: &AsanaTask,
        parent_phid: &str,
        description: &str,
        due: Option<&str>,
    ) -> Result<String> {
        let parent = self.query_task(parent_phid)?;
        let owner = match &task.assignee {
            Some(assignee) => self
                .users
                .resolve(assignee.id, &assignee.name)
                .map(str::to_string),
            None => parent.owner_phid,
        };
        let title = mapper::subtask_title(&parent.title, &task.name);
        self.create_task(&title, owner.as_deref(), description, due)
    }

    fn create_task(
        &self,
        title: &str,
        owner: Option<&str>,
        description: &str,
        due: Option<&str>,
    ) -> Result<String> {
        let payload = mapper::create_payload(title, owner, description, due);
        let response = self.conduit.call("maniphest.createtask", payload)?;
        match response.get("phid").and_then(Value::as_str) {
            Some(phid) => Ok(phid.to_string()),
            None => Err(ImportError::UnexpectedResponse {
                method: "maniphest.createtask".into(),
                detail: "response has no string `phid`".into(),
            }),
        }
    }

    fn query_task(&self, phid: &str) -> Result<ParentTask> {
        let response = self
            .conduit
            .call("maniphest.query", json!({"phids": [phid]}))?;
        let record = response
            .get(phid)
            .ok_or_else(|| ImportError::UnexpectedResponse {
                method: "maniphest.query".into(),
                detail: format!("response has no entry for {phid}"),
            })?;
        let title = record
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| ImportError::UnexpectedResponse {
                method: "maniphest.query".into(),
                detail: format!("entry for {phid} has no string `title`"),
            })?;
        let owner_phid = record
            .get("ownerPHID")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(ParentTask {
            title: title.to_string(),
            owner_phid,
        })
    }

    fn add_comment(&self, phid: &str, author: &str, text: &str) -> Result<()> {
        let body = mapper::comment_body(author, text);
        self.conduit
            .call("maniphest.update", json!({"phid": phid, "comments": body}))?;
        Ok(())
    }
}

/// One line of the dry-run preview: what a live run would create, in
/// creation order, without any Conduit calls. Titles compound through the
/// prefix chain exactly as live creation would produce them.
#[derive(Debug, Serialize)]
pub struct PlannedTask {
    pub order: usize,
    pub depth: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<chrono::NaiveDate>,
    pub comments: usize,
}

#[derive(Debug, Serialize)]
pub struct Preview {
    pub tasks: Vec<PlannedTask>,
    pub subtrees_skipped: usize,
}

pub fn preview(tasks: &[AsanaTask]) -> Preview {
    let mut out = Preview {
        tasks: Vec::new(),
        subtrees_skipped: 0,
    };
    for task in tasks {
        preview_node(task, None, 0, &mut out);
    }
    out
}

fn preview_node(task: &AsanaTask, parent_title: Option<&str>, depth: usize, out: &mut Preview) {
    if task.completed {
        out.subtrees_skipped += 1;
        return;
    }

    let title = match parent_title {
        Some(parent) => mapper::subtask_title(parent, &task.name),
        None => task.name.clone(),
    };
    out.tasks.push(PlannedTask {
        order: out.tasks.len() + 1,
        depth,
        title: title.clone(),
        assignee: task.assignee.as_ref().map(|a| a.name.clone()),
        due_on: task.due_on,
        comments: task
            .stories
            .iter()
            .filter_map(Story::as_comment)
            .count(),
    });

    for subtask in &task.subtasks {
        preview_node(subtask, Some(&title), depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AsanaExport;
    use std::cell::RefCell;

    /// In-memory Phabricator stand-in: stores created tasks so subsequent
    /// `maniphest.query` reads answer with what was just created, and
    /// records every call in order.
    struct FakePhabricator {
        calls: RefCell<Vec<(String, Value)>>,
        created: RefCell<Vec<Value>>,
        reject_call: Option<usize>,
    }

    impl FakePhabricator {
        fn new() -> Self {
            Self {
                calls: RefCell::new(vec![]),
                created: RefCell::new(vec![]),
                reject_call: None,
            }
        }

        fn rejecting_call(index: usize) -> Self {
            Self {
                reject_call: Some(index),
                ..Self::new()
            }
        }

        fn methods(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|(method, _)| method.clone())
                .collect()
        }

        fn calls_for(&self, method: &str) -> Vec<Value> {
            self.calls
                .borrow()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, params)| params.clone())
                .collect()
        }
    }

    impl Conduit for FakePhabricator {
        fn call(&self, method: &str, params: Value) -> Result<Value> {
            let call_index = {
                let mut calls = self.calls.borrow_mut();
                calls.push((method.to_string(), params.clone()));
                calls.len()
            };
            if self.reject_call == Some(call_index) {
                return Err(ImportError::ConduitRejected {
                    method: method.to_string(),
                    input: params.to_string(),
                    bin: "arc".into(),
                    message: "injected rejection".into(),
                });
            }

            match method {
                "maniphest.createtask" => {
                    let mut created = self.created.borrow_mut();
                    let phid = format!("PHID-TASK-{}", created.len() + 1);
                    let mut record = params;
                    record["phid"] = Value::String(phid.clone());
                    created.push(record);
                    Ok(json!({"phid": phid}))
                }
                "maniphest.query" => {
                    let phid = params["phids"][0].as_str().unwrap().to_string();
                    let record = self
                        .created
                        .borrow()
                        .iter()
                        .find(|r| r["phid"].as_str() == Some(phid.as_str()))
                        .cloned()
                        .unwrap();
                    let mut response = serde_json::Map::new();
                    response.insert(
                        phid,
                        json!({
                            "title": record["title"],
                            "ownerPHID": record["ownerPHID"],
                        }),
                    );
                    Ok(Value::Object(response))
                }
                "maniphest.update" => Ok(json!({})),
                other => panic!("unexpected conduit method {other}"),
            }
        }
    }

    fn task(id: u64, name: &str) -> AsanaTask {
        AsanaTask {
            id,
            name: name.into(),
            notes: String::new(),
            completed: false,
            assignee: None,
            due_on: None,
            projects: vec![crate::model::AsanaProject { id: 100 }],
            subtasks: vec![],
            stories: vec![],
        }
    }

    fn assigned(mut t: AsanaTask, id: u64, name: &str) -> AsanaTask {
        t.assignee = Some(crate::model::AsanaUser {
            id,
            name: name.into(),
        });
        t
    }

    fn comment(author: &str, text: &str) -> Story {
        Story::Comment {
            created_by: crate::model::AsanaUser {
                id: 0,
                name: author.into(),
            },
            text: text.into(),
        }
    }

    #[test]
    fn parent_and_child_are_created_in_order_with_threaded_phid() {
        let raw = r#"{"data":[{"id":1,"name":"Parent","notes":"n","completed":false,"assignee":null,"due_on":null,"projects":[{"id":100}],"subtasks":[{"id":2,"name":"Child","notes":"c","completed":false,"assignee":null,"due_on":null}],"stories":[]}]}"#;
        let export: AsanaExport = serde_json::from_str(raw).unwrap();
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        let stats = Migrator::new(&phab, &users)
            .migrate(&export.data[0])
            .unwrap();

        assert_eq!(stats.tasks_created, 2);
        assert_eq!(
            phab.methods(),
            vec!["maniphest.createtask", "maniphest.query", "maniphest.createtask"]
        );

        let creates = phab.calls_for("maniphest.createtask");
        assert_eq!(creates[0]["title"], "Parent");
        assert!(creates[0]["ownerPHID"].is_null());
        assert_eq!(creates[1]["title"], "Parent - Child");
        // Parent is unowned, so the freshly read owner is null too.
        assert!(creates[1]["ownerPHID"].is_null());

        let queries = phab.calls_for("maniphest.query");
        assert_eq!(queries[0]["phids"], json!(["PHID-TASK-1"]));
    }

    #[test]
    fn child_without_assignee_inherits_parent_owner() {
        let mut parent = assigned(task(1, "Parent"), 42, "Jane Doe");
        parent.subtasks = vec![task(2, "Child")];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[("Jane Doe", "PHID-USER-1")]);

        Migrator::new(&phab, &users).migrate(&parent).unwrap();

        let creates = phab.calls_for("maniphest.createtask");
        assert_eq!(creates[0]["ownerPHID"], "PHID-USER-1");
        assert_eq!(creates[1]["ownerPHID"], "PHID-USER-1");
    }

    #[test]
    fn child_with_unresolvable_assignee_stays_unowned() {
        let mut parent = assigned(task(1, "Parent"), 42, "Jane Doe");
        parent.subtasks = vec![assigned(task(2, "Child"), 77, "Nobody Known")];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[("Jane Doe", "PHID-USER-1")]);

        Migrator::new(&phab, &users).migrate(&parent).unwrap();

        let creates = phab.calls_for("maniphest.createtask");
        assert_eq!(creates[0]["ownerPHID"], "PHID-USER-1");
        assert!(creates[1]["ownerPHID"].is_null());
    }

    #[test]
    fn completed_subtree_yields_zero_calls() {
        let mut root = task(1, "Done already");
        root.completed = true;
        root.subtasks = vec![task(2, "Live child"), task(3, "Another")];
        root.stories = vec![comment("Ann", "hello")];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        let stats = Migrator::new(&phab, &users).migrate(&root).unwrap();

        assert!(phab.methods().is_empty());
        assert_eq!(stats.tasks_created, 0);
        assert_eq!(stats.subtrees_skipped, 1);
    }

    #[test]
    fn completed_child_is_skipped_but_siblings_survive() {
        let mut root = task(1, "Root");
        let mut dead = task(2, "Dead branch");
        dead.completed = true;
        dead.subtasks = vec![task(3, "Buried")];
        root.subtasks = vec![dead, task(4, "Alive")];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        let stats = Migrator::new(&phab, &users).migrate(&root).unwrap();

        assert_eq!(stats.tasks_created, 2);
        assert_eq!(stats.subtrees_skipped, 1);
        let creates = phab.calls_for("maniphest.createtask");
        assert_eq!(creates[1]["title"], "Root - Alive");
    }

    #[test]
    fn descendants_inherit_the_root_url() {
        let mut root = task(1, "Root");
        let mut child = task(2, "Child");
        child.projects = vec![crate::model::AsanaProject { id: 999 }];
        root.subtasks = vec![child];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        Migrator::new(&phab, &users).migrate(&root).unwrap();

        let creates = phab.calls_for("maniphest.createtask");
        let root_url = "https://app.asana.com/0/100/1";
        assert!(creates[0]["description"].as_str().unwrap().contains(root_url));
        // The child never derives its own URL, even though it could.
        assert!(creates[1]["description"].as_str().unwrap().contains(root_url));
        assert!(!creates[1]["description"].as_str().unwrap().contains("999"));
    }

    #[test]
    fn top_level_task_without_project_fails_before_any_call() {
        let mut root = task(1, "Root");
        root.projects = vec![];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        let err = Migrator::new(&phab, &users).migrate(&root).unwrap_err();
        assert!(matches!(err, ImportError::MissingProject(1, _)));
        assert!(phab.methods().is_empty());
    }

    #[test]
    fn only_comment_stories_become_updates() {
        let mut root = task(1, "Root");
        root.stories = vec![
            comment("Ann", "first"),
            Story::Other,
            comment("Bob", "second"),
            Story::Other,
        ];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        let stats = Migrator::new(&phab, &users).migrate(&root).unwrap();

        assert_eq!(stats.comments_created, 2);
        let updates = phab.calls_for("maniphest.update");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0]["phid"], "PHID-TASK-1");
        assert_eq!(
            updates[0]["comments"],
            "Ann commented on Asana:\n\nfirst"
        );
        assert_eq!(
            updates[1]["comments"],
            "Bob commented on Asana:\n\nsecond"
        );
    }

    #[test]
    fn comments_are_imported_after_subtasks() {
        let mut root = task(1, "Root");
        root.subtasks = vec![task(2, "Child")];
        root.stories = vec![comment("Ann", "note")];
        let phab = FakePhabricator::new();
        let users = UserDirectory::from_names(&[]);

        Migrator::new(&phab, &users).migrate(&root).unwrap();

        assert_eq!(
            phab.methods(),
            vec![
                "maniphest.createtask",
                "maniphest.query",
                "maniphest.createtask",
                "maniphest.update",
            ]
        );
        // The comment still attaches to the root, not the child.
        let updates = phab.calls_for("maniphest.update");
        assert_eq!(updates[0]["phid"], "PHID-TASK-1");
    }

    #[test]
    fn rejection_mid_list_stops_before_later_nodes() {
        let tasks = vec![task(1, "One"), task(2, "Two"), task(3, "Three")];
        // Call 2 is the createtask for the second top-level task.
        let phab = FakePhabricator::rejecting_call(2);
        let users = UserDirectory::from_names(&[]);
        let migrator = Migrator::new(&phab, &users);

        let mut processed = 0;
        let mut failure = None;
        for t in &tasks {
            match migrator.migrate(t) {
                Ok(_) => processed += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        assert_eq!(processed, 1);
        assert!(matches!(failure, Some(ImportError::ConduitRejected { .. })));
        // Node three was never attempted.
        assert_eq!(phab.calls_for("maniphest.createtask").len(), 2);
    }

    #[test]
    fn stats_absorb_sums_counts() {
        let mut total = MigrationStats::default();
        total.absorb(MigrationStats {
            tasks_created: 2,
            comments_created: 1,
            subtrees_skipped: 0,
        });
        total.absorb(MigrationStats {
            tasks_created: 3,
            comments_created: 0,
            subtrees_skipped: 2,
        });
        assert_eq!(total.tasks_created, 5);
        assert_eq!(total.comments_created, 1);
        assert_eq!(total.subtrees_skipped, 2);
    }

    #[test]
    fn preview_compounds_titles_and_counts_skips_without_calls() {
        let mut root = task(1, "Epic");
        let mut feature = task(2, "Feature");
        feature.subtasks = vec![task(3, "Leaf")];
        feature.stories = vec![comment("Ann", "x"), Story::Other];
        let mut done = task(4, "Finished");
        done.completed = true;
        root.subtasks = vec![feature, done];

        let plan = preview(std::slice::from_ref(&root));

        let titles: Vec<&str> = plan.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Epic", "Epic - Feature", "Epic - Feature - Leaf"]);
        assert_eq!(plan.tasks[1].depth, 1);
        assert_eq!(plan.tasks[1].comments, 1);
        assert_eq!(plan.tasks[2].order, 3);
        assert_eq!(plan.subtrees_skipped, 1);
    }
}
