mod support;

use serde_json::Value;

use support::{fieldops_cmd, TestStore};

fn json_output(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("json envelope")
}

fn add_worker(fixture: &TestStore, name: &str) -> String {
    let output = fieldops_cmd(fixture, "Office")
        .args(["worker", "add", name, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    json_output(&output)["data"]["id"]
        .as_str()
        .expect("worker id")
        .to_string()
}

fn add_project(fixture: &TestStore, number: &str, client: &str) -> String {
    let output = fieldops_cmd(fixture, "Office")
        .args(["project", "add", number, client, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    json_output(&output)["data"]["id"]
        .as_str()
        .expect("project id")
        .to_string()
}

fn add_task(fixture: &TestStore, project_id: &str, description: &str) -> String {
    let output = fieldops_cmd(fixture, "Office")
        .args(["task", "add", project_id, description, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    json_output(&output)["data"]["id"]
        .as_str()
        .expect("task id")
        .to_string()
}

#[test]
fn full_flow_through_the_binary() {
    let fixture = TestStore::init();
    let dana = add_worker(&fixture, "Dana Reyes");
    let project = add_project(&fixture, "2025-020", "Acme");
    let task = add_task(&fixture, &project, "Replace valve");
    let target = format!("{project}:{task}");
    let (dana, project, task, target) =
        (dana.as_str(), project.as_str(), task.as_str(), target.as_str());

    // Assign with schedule.
    let output = fieldops_cmd(&fixture, "Office")
        .args([
            "assign", target, "--worker", dana, "--date", "2025-10-08", "--time", "09:00",
            "--hours", "4", "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope = json_output(&output);
    assert_eq!(envelope["schema_version"], "fieldops.v1");
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["status"], "pending_acceptance");

    // Starting before accepting is an invalid transition: exit code 2.
    let output = fieldops_cmd(&fixture, "Dana Reyes")
        .args(["task", "start", project, task, "--json"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let envelope = json_output(&output);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["kind"], "user_error");

    // Accept, start, complete as the worker.
    for action in ["accept", "start", "complete"] {
        fieldops_cmd(&fixture, "Dana Reyes")
            .args(["task", action, project, task])
            .assert()
            .success();
    }

    let output = fieldops_cmd(&fixture, "Office")
        .args(["task", "show", project, task, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_output(&output)["data"]["status"], "completed");

    // The activity trail is visible and newest-first.
    let output = fieldops_cmd(&fixture, "Office")
        .args(["activity", "--task", task, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries = json_output(&output)["data"]["entries"]
        .as_array()
        .expect("entries")
        .clone();
    assert_eq!(entries.len(), 4);
    assert!(entries[0]["action"]
        .as_str()
        .expect("action")
        .starts_with("Completed"));
}

#[test]
fn reassignment_gate_exits_with_conflict_code() {
    let fixture = TestStore::init();
    let dana = add_worker(&fixture, "Dana Reyes");
    let eli = add_worker(&fixture, "Eli Ward");
    let project = add_project(&fixture, "2025-021", "Borealis");
    let task = add_task(&fixture, &project, "Fit closers");
    let target = format!("{project}:{task}");
    let (dana, eli, target) = (dana.as_str(), eli.as_str(), target.as_str());

    let schedule = ["--date", "2025-10-08", "--time", "09:00"];
    fieldops_cmd(&fixture, "Office")
        .args(["assign", target, "--worker", dana])
        .args(schedule)
        .assert()
        .success();

    // Moving a pending task to another worker is refused without --yes.
    let output = fieldops_cmd(&fixture, "Office")
        .args(["assign", target, "--worker", eli, "--json"])
        .args(schedule)
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();
    let envelope = json_output(&output);
    assert_eq!(envelope["error"]["kind"], "conflict");

    fieldops_cmd(&fixture, "Office")
        .args(["assign", target, "--worker", eli, "--yes"])
        .args(schedule)
        .assert()
        .success();
}

#[test]
fn messages_and_notifications_round_through_the_cli() {
    let fixture = TestStore::init();
    let dana = add_worker(&fixture, "Dana Reyes");
    let project = add_project(&fixture, "2025-022", "Cobalt");
    let task = add_task(&fixture, &project, "Hang doors");
    let target = format!("{project}:{task}");
    let (dana, project, task, target) =
        (dana.as_str(), project.as_str(), task.as_str(), target.as_str());

    fieldops_cmd(&fixture, "Office")
        .args([
            "assign", target, "--worker", dana, "--date", "2025-10-08", "--time", "09:00",
        ])
        .assert()
        .success();

    fieldops_cmd(&fixture, "Office")
        .args(["msg", "send", project, task, "gate code is 4415"])
        .assert()
        .success();

    // Dana sees one unread message and one unread notification.
    let output = fieldops_cmd(&fixture, "Dana Reyes")
        .args(["msg", "list", project, task, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_output(&output)["data"]["unread"], 1);

    let output = fieldops_cmd(&fixture, "Dana Reyes")
        .args(["notify", "list", dana, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_output(&output)["data"]["unread"], 1);

    // Reading clears both feeds.
    fieldops_cmd(&fixture, "Dana Reyes")
        .args(["msg", "read", project, task])
        .assert()
        .success();
    fieldops_cmd(&fixture, "Dana Reyes")
        .args(["notify", "read", dana])
        .assert()
        .success();

    let output = fieldops_cmd(&fixture, "Dana Reyes")
        .args(["msg", "list", project, task, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_output(&output)["data"]["unread"], 0);
}

#[test]
fn export_then_import_is_idempotent() {
    let fixture = TestStore::init();
    add_worker(&fixture, "Dana Reyes");
    let project = add_project(&fixture, "2025-023", "Acme");
    add_task(&fixture, &project, "Survey");

    let snapshot_path = fixture.path().join("snapshot.json");
    fieldops_cmd(&fixture, "Office")
        .args(["export", "--out"])
        .arg(&snapshot_path)
        .assert()
        .success();

    let output = fieldops_cmd(&fixture, "Office")
        .arg("import")
        .arg(&snapshot_path)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope = json_output(&output);
    assert_eq!(envelope["data"]["projects"], 1);
    assert_eq!(envelope["data"]["removed"], 0);

    // The collections survived the round trip.
    let output = fieldops_cmd(&fixture, "Office")
        .args(["project", "list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let projects = json_output(&output)["data"]["projects"]
        .as_array()
        .expect("projects")
        .clone();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["number"], "2025-023");
}
