use orc_types::WorkerState;

#[test]
fn monotonic_order_forbids_re_entry() {
    assert!(WorkerState::Pending.can_transition_to(WorkerState::Initializing));
    assert!(WorkerState::Initializing.can_transition_to(WorkerState::Ready));
    assert!(!WorkerState::Ready.can_transition_to(WorkerState::Pending));
    assert!(!WorkerState::Ready.can_transition_to(WorkerState::Ready));
}

#[test]
fn cancelling_may_fall_through_to_failed() {
    assert!(WorkerState::Cancelling.can_transition_to(WorkerState::Failed));
}

#[test]
fn cancelling_can_only_resolve_to_failed_never_completed() {
    assert!(!WorkerState::Cancelling.can_transition_to(WorkerState::Completed));
    assert!(!WorkerState::Cancelling.can_transition_to(WorkerState::Running));
    assert!(!WorkerState::Cancelling.can_transition_to(WorkerState::Cancelling));
}

#[test]
fn completed_and_failed_are_terminal() {
    assert!(WorkerState::Completed.is_terminal());
    assert!(WorkerState::Failed.is_terminal());
    assert!(!WorkerState::Running.is_terminal());
}
