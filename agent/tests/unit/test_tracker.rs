//! Live-set admission unit tests

use dpagent::app::state::{Admission, CommandTracker};
use dpagent::models::agent::AgentStatus;

#[test]
fn ceiling_bounds_admission_under_burst() {
    let tracker = CommandTracker::new(3);

    let mut admitted = 0;
    for i in 0..10 {
        match tracker.admit(&format!("cmd-{i}")) {
            Admission::Admitted => admitted += 1,
            Admission::Full => break,
            Admission::Duplicate => panic!("fresh ids cannot be duplicates"),
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(tracker.len(), 3);
    assert!(tracker.is_full());
}

#[test]
fn duplicates_are_rejected_before_capacity() {
    let tracker = CommandTracker::new(3);

    assert_eq!(tracker.admit("cmd-1"), Admission::Admitted);
    assert_eq!(tracker.admit("cmd-1"), Admission::Duplicate);
    assert_eq!(tracker.len(), 1);
}

#[test]
fn releases_free_slots_for_the_next_tick() {
    let tracker = CommandTracker::new(2);

    assert_eq!(tracker.admit("cmd-1"), Admission::Admitted);
    assert_eq!(tracker.admit("cmd-2"), Admission::Admitted);
    assert_eq!(tracker.admit("cmd-3"), Admission::Full);

    tracker.release("cmd-1");
    assert!(!tracker.is_full());
    assert_eq!(tracker.admit("cmd-3"), Admission::Admitted);
}

#[test]
fn status_derivation_prefers_error_over_busy() {
    let tracker = CommandTracker::new(1);
    assert_eq!(tracker.status(), AgentStatus::Online);

    assert_eq!(tracker.admit("cmd-1"), Admission::Admitted);
    assert_eq!(tracker.status(), AgentStatus::Busy);

    tracker.record_error("docker build failed");
    assert_eq!(tracker.status(), AgentStatus::Error);
    assert_eq!(tracker.last_error().as_deref(), Some("docker build failed"));

    tracker.clear_error();
    assert_eq!(tracker.status(), AgentStatus::Busy);

    tracker.release("cmd-1");
    assert_eq!(tracker.status(), AgentStatus::Online);
}
