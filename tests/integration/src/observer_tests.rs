//! Observer and listener integration tests
//!
//! # Test Scenarios
//!
//! 1. Listeners see lifecycle events in causal order
//! 2. Observers follow a chain of missions
//! 3. Observers registered late are replayed from the ledger
//! 4. Runtime events serialize to JSON lines

use crate::test_utils::*;
use questline_core::{RuntimeEvent, RuntimeEventKind};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_listener_sees_causal_order() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![mission(1, "observed")
        .with_objective(auto_objective(10))
        .with_objective(auto_objective(11))]);
    let events = record_events(&mut orchestrator);

    orchestrator.start_mission(mission_id(1));

    let m = mission_id(1);
    assert_eq!(
        *events.borrow(),
        vec![
            RuntimeEventKind::MissionStarted { mission: m },
            RuntimeEventKind::ObjectiveStarted {
                mission: m,
                objective: objective_id(10),
            },
            RuntimeEventKind::ObjectiveEnded {
                mission: m,
                objective: objective_id(10),
                cancelled: false,
            },
            RuntimeEventKind::ObjectiveStarted {
                mission: m,
                objective: objective_id(11),
            },
            RuntimeEventKind::ObjectiveEnded {
                mission: m,
                objective: objective_id(11),
                cancelled: false,
            },
            RuntimeEventKind::MissionEnded {
                mission: m,
                cancelled: false,
            },
        ]
    );
}

#[test]
fn test_observers_follow_mission_chain() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "first")
            .with_objective(manual_objective(10))
            .with_next_mission(mission_id(2)),
        mission(2, "second").with_objective(auto_objective(20)),
    ]);

    let journal = fixture.journal.clone();
    orchestrator.when_mission_ends(mission_id(1), move |id, cancelled| {
        journal.push(format!("observer end {} {}", id, cancelled))
    });
    let journal = fixture.journal.clone();
    orchestrator.when_mission_starts_or_is_active(mission_id(2), move |id| {
        journal.push(format!("observer start {}", id))
    });
    let journal = fixture.journal.clone();
    orchestrator.when_objective_ends(objective_id(20), move |id, _| {
        journal.push(format!("observer objective {}", id))
    });

    orchestrator.start_mission(mission_id(1));
    fixture.journal.clear();
    orchestrator.complete_objective(mission_id(1), objective_id(10));

    assert_eq!(
        fixture.journal.entries(),
        vec![
            format!("completed {}", objective_id(10)),
            format!("observer end {} false", mission_id(1)),
            format!("observer start {}", mission_id(2)),
            format!("execute {}", objective_id(20)),
            format!("completed {}", objective_id(20)),
            format!("observer objective {}", objective_id(20)),
        ]
    );
}

#[test]
fn test_late_observers_are_replayed() {
    let fixture = Fixture::new();
    let mut orchestrator = fixture.orchestrator(vec![
        mission(1, "done").with_objective(auto_objective(10)),
        mission(2, "running").with_objective(manual_objective(20)),
    ]);
    orchestrator.start_mission(mission_id(1));
    orchestrator.start_mission(mission_id(2));
    orchestrator.cancel_objective(mission_id(2), objective_id(20));

    let replayed = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&replayed);
    orchestrator.when_mission_ends(mission_id(1), move |_, cancelled| {
        sink.borrow_mut().push(format!("mission 1 ended, cancelled={}", cancelled))
    });
    let sink = Rc::clone(&replayed);
    orchestrator.when_mission_starts_or_is_active(mission_id(2), move |_| {
        sink.borrow_mut().push("mission 2 active".to_string())
    });
    let sink = Rc::clone(&replayed);
    orchestrator.when_objective_ends(objective_id(20), move |_, cancelled| {
        sink.borrow_mut().push(format!("objective 20 ended, cancelled={}", cancelled))
    });

    assert_eq!(
        *replayed.borrow(),
        vec![
            "mission 1 ended, cancelled=false",
            "mission 2 active",
            "objective 20 ended, cancelled=true",
        ]
    );

    // Replayed observers are not kept around.
    orchestrator.cancel_mission(mission_id(2));
    assert_eq!(replayed.borrow().len(), 3);
}

#[test]
fn test_events_serialize_to_json_lines() {
    let fixture = Fixture::new();
    let mut orchestrator =
        fixture.orchestrator(vec![mission(1, "logged").with_objective(manual_objective(10))]);

    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    orchestrator.add_listener(move |event: &RuntimeEvent| {
        if let Ok(line) = serde_json::to_string(event) {
            sink.borrow_mut().push(line);
        }
    });

    orchestrator.start_mission(mission_id(1));
    orchestrator.cancel_mission(mission_id(1));

    let lines = lines.borrow();
    assert_eq!(lines.len(), 4);

    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["type"], "mission_started");
    assert_eq!(first["mission"], mission_id(1).to_string());
    assert!(first["timestamp"].as_u64().is_some());

    let last: RuntimeEvent = serde_json::from_str(&lines[3]).unwrap();
    assert_eq!(
        last.kind,
        RuntimeEventKind::MissionEnded {
            mission: mission_id(1),
            cancelled: true,
        }
    );
}
