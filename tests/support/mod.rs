#![allow(dead_code)]

use std::path::Path;

use fieldops::assign::Engine;
use fieldops::project::Project;
use fieldops::store::Store;
use fieldops::task::Task;
use fieldops::worker::Worker;
use tempfile::TempDir;

/// An initialized store in a tempdir, plus seed helpers.
pub struct TestStore {
    dir: TempDir,
    store: Store,
}

impl TestStore {
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store = Store::new(dir.path().to_path_buf());
        store.init().expect("store init");
        Self { dir, store }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.store.clone())
    }

    /// Register a worker, returning its id.
    pub fn add_worker(&self, name: &str) -> String {
        let worker = Worker::new(name);
        let id = worker.id.clone();
        self.store
            .update_workers(|registry| registry.insert(worker))
            .expect("insert worker");
        id
    }

    /// Create a project with one unassigned task, returning (project, task) ids.
    pub fn add_project_with_task(
        &self,
        number: &str,
        client: &str,
        description: &str,
    ) -> (String, String) {
        let mut project = Project::new(number, client);
        let task_id = project.add_task(Task::new("", description));
        let project_id = project.id.clone();
        self.store.put_project(&project).expect("put project");
        (project_id, task_id)
    }

    /// Add another task to an existing project, returning its id.
    pub fn add_task(&self, project_id: &str, description: &str) -> String {
        self.store
            .update_project(project_id, |project| {
                Ok(project.add_task(Task::new("", description)))
            })
            .expect("add task")
    }
}

/// A `fieldops` command pointed at the fixture's data dir with a fixed actor.
pub fn fieldops_cmd(store: &TestStore, actor: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("fieldops").expect("binary");
    cmd.env("FIELDOPS_DATA", store.path());
    cmd.env("FIELDOPS_ACTOR", actor);
    cmd.env_remove("RUST_LOG");
    cmd
}
