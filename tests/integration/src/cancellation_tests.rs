//! Cancellation integration tests
//!
//! # Test Scenarios
//!
//! 1. A cancelled mission never dispatches another objective
//! 2. Pending actions hear about the cancellation
//! 3. End actions run on cancel only when configured
//! 4. Cancelling during an end phase still ends the mission as cancelled, and objectives
//!    left in their end phase are settled in the ledger
//! 5. Starting a mission cancels the missions it lists
//! 6. Bulk cancellation and objective-level cancellation

use crate::test_utils::*;
use questline_core::RuntimeEventKind;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_cancel_freezes_dispatch() {
    init_tracing();
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "frozen")
        .with_objective(manual_objective(10))
        .with_objective(auto_objective(11))]);
    let events = record_events(&mut orchestrator);

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.cancel_mission(mission_id(1)));

    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
    assert!(!orchestrator.is_mission_active(mission_id(1)));
    assert!(fixture
        .journal
        .contains(&format!("cancelled {}", objective_id(10))));
    assert!(!fixture
        .journal
        .contains(&format!("execute {}", objective_id(11))));

    assert_eq!(
        events.borrow().last(),
        Some(&RuntimeEventKind::MissionEnded {
            mission: mission_id(1),
            cancelled: true,
        })
    );
    assert!(events.borrow().contains(&RuntimeEventKind::ObjectiveEnded {
        mission: mission_id(1),
        objective: objective_id(10),
        cancelled: true,
    }));

    // Nothing is left to cancel.
    assert!(!orchestrator.cancel_mission(mission_id(1)));
    assert!(!orchestrator.complete_objective(mission_id(1), objective_id(10)));
}

#[test]
fn test_pending_start_action_is_notified() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "held")
        .with_start_action("manual_finish")
        .with_objective(auto_objective(10))]);

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.cancel_mission(mission_id(1)));

    assert_eq!(fixture.journal.entries(), vec!["hold", "hold cancelled"]);
    assert!(orchestrator.is_mission_cancelled(mission_id(1)));

    // A completion arriving after the end is dropped.
    assert!(!fixture.finish_next(&mut orchestrator));
    assert!(!fixture
        .journal
        .contains(&format!("execute {}", objective_id(10))));
}

#[test]
fn test_end_actions_run_on_cancel_when_configured() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "tidy")
            .with_objective(manual_objective(10).with_end_action("log_b").run_end_actions_on_cancel(true))
            .with_end_action("log_a")
            .run_end_actions_on_cancel(true),
        mission(2, "abrupt")
            .with_objective(manual_objective(20).with_end_action("log_c"))
            .with_end_action("log_a"),
    ]);

    orchestrator.start_mission(mission_id(1));
    orchestrator.cancel_mission(mission_id(1));
    assert_eq!(
        fixture.journal.entries(),
        vec![
            format!("execute {}", objective_id(10)),
            format!("cancelled {}", objective_id(10)),
            "action b".to_string(),
            "action a".to_string(),
        ]
    );
    assert!(orchestrator.is_mission_cancelled(mission_id(1)));

    fixture.journal.clear();
    orchestrator.start_mission(mission_id(2));
    orchestrator.cancel_mission(mission_id(2));
    assert!(!fixture.journal.contains("action c"));
    assert!(!fixture.journal.contains("action a"));
    assert!(orchestrator.is_mission_cancelled(mission_id(2)));
}

#[test]
fn test_cancel_while_ending_ends_cancelled() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "ending")
            .with_end_action("manual_finish")
            .with_next_mission(mission_id(2)),
        mission(2, "next").with_objective(manual_objective(20)),
    ]);
    let events = record_events(&mut orchestrator);

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.is_mission_active(mission_id(1)));
    assert!(orchestrator.cancel_mission(mission_id(1)));
    assert!(!orchestrator.cancel_mission(mission_id(1)));
    assert!(fixture.journal.contains("hold cancelled"));

    assert!(fixture.finish_next(&mut orchestrator));
    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
    assert!(!orchestrator.is_mission_active(mission_id(2)));
    assert_eq!(
        *events.borrow(),
        vec![
            RuntimeEventKind::MissionStarted {
                mission: mission_id(1),
            },
            RuntimeEventKind::MissionEnded {
                mission: mission_id(1),
                cancelled: true,
            },
        ]
    );
}

#[test]
fn test_cancel_settles_objective_with_pending_end_phase() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "interrupted").with_objective(
        manual_objective(10)
            .with_end_action("manual_finish")
            .run_end_actions_on_cancel(true),
    )]);

    let ended = Rc::new(Cell::new(None));
    let sink = Rc::clone(&ended);
    orchestrator.when_objective_ends(objective_id(10), move |_, cancelled| sink.set(Some(cancelled)));

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.cancel_mission(mission_id(1)));

    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
    assert!(!orchestrator.is_objective_active(objective_id(10)));
    assert!(orchestrator.history().is_objective_cancelled(&objective_id(10)));
    assert_eq!(ended.get(), Some(true));
    assert_eq!(
        fixture.journal.entries(),
        vec![
            format!("execute {}", objective_id(10)),
            format!("cancelled {}", objective_id(10)),
            "hold".to_string(),
            "hold cancelled".to_string(),
        ]
    );

    // The late completion has nowhere to go and changes nothing.
    assert!(!fixture.finish_next(&mut orchestrator));
    assert!(orchestrator.history().is_objective_cancelled(&objective_id(10)));

    let replayed = Rc::new(Cell::new(false));
    let sink = Rc::clone(&replayed);
    orchestrator.when_objective_starts_or_is_active(objective_id(10), move |_| sink.set(true));
    assert!(!replayed.get());
}

#[test]
fn test_cancel_settles_completed_objective_with_pending_end_phase() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "interrupted")
        .with_objective(manual_objective(10).with_end_action("manual_finish"))
        .with_objective(manual_objective(11))]);

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.complete_objective(mission_id(1), objective_id(10)));
    assert!(orchestrator.is_objective_active(objective_id(10)));

    assert!(orchestrator.cancel_mission(mission_id(1)));
    assert!(orchestrator.is_objective_complete(objective_id(10)));
    assert!(!orchestrator.history().is_objective_active(&objective_id(11)));
    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
}

#[test]
fn test_missions_to_cancel_chain_when_configured() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "side quest")
            .with_objective(manual_objective(10))
            .with_next_mission(mission_id(3))
            .chain_next_on_cancel(true),
        mission(2, "main quest")
            .with_objective(manual_objective(20))
            .with_mission_to_cancel(mission_id(1)),
        mission(3, "consolation").with_objective(manual_objective(30)),
    ]);
    let events = record_events(&mut orchestrator);

    orchestrator.start_mission(mission_id(1));
    orchestrator.start_mission(mission_id(2));

    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
    assert!(orchestrator.is_mission_active(mission_id(2)));
    assert!(orchestrator.is_mission_active(mission_id(3)));

    // Cancellation lands before the canceller starts, chained missions after it.
    let order: Vec<_> = events
        .borrow()
        .iter()
        .filter_map(|kind| match kind {
            RuntimeEventKind::MissionStarted { mission } => Some((*mission, "started")),
            RuntimeEventKind::MissionEnded { mission, .. } => Some((*mission, "ended")),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (mission_id(1), "started"),
            (mission_id(1), "ended"),
            (mission_id(2), "started"),
            (mission_id(3), "started"),
        ]
    );
}

#[test]
fn test_cancel_current_missions_does_not_chain() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "one")
            .with_objective(manual_objective(10))
            .with_next_mission(mission_id(3)),
        mission(2, "two").with_objective(manual_objective(20)),
        mission(3, "three").with_objective(manual_objective(30)),
    ]);

    orchestrator.start_mission(mission_id(1));
    orchestrator.start_mission(mission_id(2));
    orchestrator.cancel_current_missions();

    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
    assert!(orchestrator.is_mission_cancelled(mission_id(2)));
    assert!(!orchestrator.is_mission_active(mission_id(3)));
    assert!(orchestrator.active_mission_ids().is_empty());
}

#[test]
fn test_cancelled_objective_stalls_mission() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "stalled")
        .with_objective(manual_objective(10))
        .with_objective(auto_objective(11))]);

    orchestrator.start_mission(mission_id(1));
    assert!(orchestrator.cancel_objective(mission_id(1), objective_id(10)));

    assert!(orchestrator.history().is_objective_cancelled(&objective_id(10)));
    assert!(!fixture
        .journal
        .contains(&format!("execute {}", objective_id(11))));
    assert!(orchestrator.is_mission_active(mission_id(1)));
    assert!(!orchestrator.cancel_objective(mission_id(1), objective_id(10)));

    assert!(orchestrator.cancel_mission(mission_id(1)));
    assert!(orchestrator.is_mission_cancelled(mission_id(1)));
}

#[test]
fn test_cancelled_mission_is_not_restarted() {
    let fixture = Fixture::new();
    let mut orchestrator =
        fixture.orchestrator(vec![mission(1, "once").with_objective(manual_objective(10))]);

    orchestrator.start_mission(mission_id(1));
    orchestrator.cancel_mission(mission_id(1));

    assert!(!orchestrator.start_mission(mission_id(1)).is_started());
    assert!(!orchestrator.is_mission_active(mission_id(1)));
}
