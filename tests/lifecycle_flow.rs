mod support;

use fieldops::assign::AssignRequest;
use fieldops::error::Error;
use fieldops::lifecycle::TaskAction;
use fieldops::messages::{MessageThreads, ThreadKey};
use fieldops::notify::NotificationKind;
use fieldops::task::TaskStatus;

use support::TestStore;

fn request(project_id: &str, task_id: &str, worker_id: &str) -> AssignRequest {
    AssignRequest {
        project_id: project_id.to_string(),
        task_id: task_id.to_string(),
        worker_id: worker_id.to_string(),
        date: "2025-10-08".to_string(),
        time: "09:00".to_string(),
        hours: 4.0,
    }
}

#[test]
fn assign_reject_reassign_accept_start_complete() {
    let fixture = TestStore::init();
    let dana = fixture.add_worker("Dana Reyes");
    let eli = fixture.add_worker("Eli Ward");
    let (project_id, task_id) = fixture.add_project_with_task("2025-001", "Acme", "Replace valve");
    let engine = fixture.engine();

    // Office assigns to Dana.
    let task = engine
        .assign(&request(&project_id, &task_id, &dana), "Office", false)
        .expect("assign");
    assert_eq!(task.status, TaskStatus::PendingAcceptance);

    // Dana rejects with a reason; the reason lands on the thread.
    let task = engine
        .transition(
            &project_id,
            &task_id,
            &TaskAction::Reject {
                reason: "wrong ladder".to_string(),
            },
            "Dana Reyes",
        )
        .expect("reject");
    assert_eq!(task.status, TaskStatus::Rejected);
    assert_eq!(task.assigned_to, None);
    assert_eq!(task.rejection_reason.as_deref(), Some("wrong ladder"));

    let threads = MessageThreads::new(fixture.store().clone());
    let key = ThreadKey::new(project_id.as_str(), task_id.as_str());
    let messages = threads.messages(&key).expect("thread");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, "Dana Reyes");
    assert_eq!(messages[0].text, "wrong ladder");

    // Office reassigns to Eli. The task was rejected, not live, so no
    // confirmation is needed and the stale rejection reason is cleared.
    let task = engine
        .assign(&request(&project_id, &task_id, &eli), "Office", false)
        .expect("reassign");
    assert_eq!(task.status, TaskStatus::PendingAcceptance);
    assert_eq!(task.assigned_to.as_deref(), Some(eli.as_str()));
    assert_eq!(task.rejection_reason, None);

    // Eli works it to completion.
    for action in [
        TaskAction::Accept,
        TaskAction::Start,
        TaskAction::Complete { details: None },
    ] {
        engine
            .transition(&project_id, &task_id, &action, "Eli Ward")
            .expect("worker transition");
    }
    let task = fixture
        .store()
        .read_task(&project_id, &task_id)
        .expect("read");
    assert_eq!(task.status, TaskStatus::Completed);

    // The audit trail recorded every step in order.
    let entries = engine.activity().read_all().expect("activity");
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions.len(), 6);
    assert_eq!(actions[0], "Assigned to Dana Reyes");
    assert!(actions[1].starts_with("Rejected by Dana Reyes"));
    assert_eq!(actions[2], "Assigned to Eli Ward");

    // Only office-initiated assignment notified anyone; each went to the
    // worker gaining the task.
    let dana_feed = engine.dispatcher().list_for(&dana).expect("feed");
    assert_eq!(dana_feed.len(), 1);
    assert_eq!(dana_feed[0].kind, NotificationKind::TaskAssigned);
    let eli_feed = engine.dispatcher().list_for(&eli).expect("feed");
    assert_eq!(eli_feed.len(), 1);
}

#[test]
fn completed_tasks_are_terminal() {
    let fixture = TestStore::init();
    let dana = fixture.add_worker("Dana Reyes");
    let (project_id, task_id) = fixture.add_project_with_task("2025-002", "Borealis", "Fit lock");
    let engine = fixture.engine();

    engine
        .assign(&request(&project_id, &task_id, &dana), "Office", false)
        .expect("assign");
    for action in [
        TaskAction::Accept,
        TaskAction::Start,
        TaskAction::Complete { details: None },
    ] {
        engine
            .transition(&project_id, &task_id, &action, "Dana Reyes")
            .expect("transition");
    }

    // No action leaves completed, not even a fresh assignment.
    let err = engine
        .assign(&request(&project_id, &task_id, &dana), "Office", true)
        .expect_err("assign completed");
    assert!(matches!(err, Error::InvalidTransition { .. }));
    let err = engine
        .transition(&project_id, &task_id, &TaskAction::Start, "Dana Reyes")
        .expect_err("restart completed");
    assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[test]
fn losing_the_write_race_is_stale_state() {
    let fixture = TestStore::init();
    let dana = fixture.add_worker("Dana Reyes");
    let (project_id, task_id) = fixture.add_project_with_task("2025-003", "Cobalt", "Hang doors");
    let engine = fixture.engine();

    engine
        .assign(&request(&project_id, &task_id, &dana), "Office", false)
        .expect("assign");

    // Capture the task as a slow client would, then let another client
    // accept before the slow write lands.
    let stale = fixture
        .store()
        .read_task(&project_id, &task_id)
        .expect("read");
    engine
        .transition(&project_id, &task_id, &TaskAction::Accept, "Dana Reyes")
        .expect("accept");

    let err = fixture
        .store()
        .replace_task(&project_id, stale.clone(), stale.status)
        .expect_err("stale write");
    match err {
        Error::StaleState {
            task_id: stale_id,
            expected,
            found,
        } => {
            assert_eq!(stale_id, task_id);
            assert_eq!(expected, "pending_acceptance");
            assert_eq!(found, "accepted");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The accepted state survived untouched.
    let task = fixture
        .store()
        .read_task(&project_id, &task_id)
        .expect("read");
    assert_eq!(task.status, TaskStatus::Accepted);
}

#[test]
fn bulk_assignment_spans_projects_and_reports_failures() {
    let fixture = TestStore::init();
    let dana = fixture.add_worker("Dana Reyes");
    let (project_a, task_a) = fixture.add_project_with_task("2025-004", "Acme", "Trenching");
    let (project_b, task_b) = fixture.add_project_with_task("2025-005", "Borealis", "Cabling");
    let engine = fixture.engine();

    // One target is already pending with another worker; without the
    // confirmation flag that tuple fails while the rest proceed.
    let eli = fixture.add_worker("Eli Ward");
    engine
        .assign(&request(&project_b, &task_b, &eli), "Office", false)
        .expect("pre-assign");

    let targets = vec![
        (project_a.clone(), task_a.clone()),
        (project_b.clone(), task_b.clone()),
    ];
    let requests = AssignRequest::uniform(&targets, &dana, "2025-10-09", "08:00", 6.0);
    let report = engine.assign_bulk(&requests, "Office", false);

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].task_id, task_a);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].task_id, task_b);
    assert!(report.failed[0].error.contains("confirmation"));

    // The failed tuple left its task untouched.
    let untouched = fixture
        .store()
        .read_task(&project_b, &task_b)
        .expect("read");
    assert_eq!(untouched.assigned_to.as_deref(), Some(eli.as_str()));
}
