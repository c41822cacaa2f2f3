
use std::sync::Arc;

use harness::{config_in, day, spawn_state, temp_workspace, write_records, SCENARIO_CSV};
use mood_relay::dispatch::DispatchOutcome;
use mood_relay::emotion::EmotionLabel;
use mood_relay::{handle_event, ManualClock, SensorEvent, WebhookBody};
use serde_json::json;

#[test]
fn peak_measurement_decides_the_day() {
    let (_td, root) = temp_workspace();
    let config = config_in(&root, "Category,Message\nNegative,Take it easy today.\n");
    write_records(
        &config.source.path,
        json!([
            {"subject_id": "test00", "day": "2025/10/01", "time": "08:00", "valence": 0.5},
            {"subject_id": "test00", "day": "2025/10/01", "time": "12:30", "valence": -0.9},
            {"subject_id": "test00", "day": "2025/10/01", "time": "18:15", "valence": "0.1"},
            {"subject_id": "test00", "day": "2025-10-01", "time": "19:00", "valence": 0.9},
        ]),
    );
    let state = spawn_state(config, Arc::new(ManualClock::new(day(1))));

    let reports = state.decider.aggregator().aggregate_subject("test00");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].record_count, 3);
    assert_eq!(reports[0].label, EmotionLabel::Negative);

    assert_eq!(
        state.decider.decide_outcome("room-1", "test00"),
        DispatchOutcome::Delivered {
            label: EmotionLabel::Negative,
            message: "Take it easy today.".to_string(),
        }
    );
    assert_eq!(state.decider.decide("room-1", "test00"), None);
}

#[test]
fn missing_records_file_means_no_dispatch() {
    let (_td, root) = temp_workspace();
    let config = config_in(&root, SCENARIO_CSV);
    let state = spawn_state(config, Arc::new(ManualClock::new(day(1))));

    assert_eq!(state.decider.decide_outcome("room-1", "test00"), DispatchOutcome::NoData);
    assert!(state.decider.aggregator().aggregate_subject("test00").is_empty());
    assert_eq!(state.store.last_dispatch_date("room-1"), None);
}

#[test]
fn presence_webhook_routes_to_the_decider() {
    let (_td, root) = temp_workspace();
    let mut config = config_in(&root, SCENARIO_CSV);
    config.routing.location_id = Some("room-1".to_string());
    config.routing.subject_id = Some("test00".to_string());
    write_records(
        &config.source.path,
        json!([
            {"user_id": "test00", "day": "2025/10/01", "time": "09:00", "valence": 0.6},
        ]),
    );
    let clock = Arc::new(ManualClock::new(day(1)));
    let state = spawn_state(config, clock);

    let other: WebhookBody = serde_json::from_value(json!({
        "event": "door_sensor.opened",
        "data": {}
    }))
    .unwrap();
    let other = SensorEvent::from_webhook(&other, &state.config.routing).unwrap();
    assert_eq!(handle_event(&state.decider, &other), None);
    assert_eq!(state.store.last_dispatch_date("room-1"), None);

    let presence: WebhookBody = serde_json::from_value(json!({
        "event": "human_sensor.detected",
        "data": {"value": 1}
    }))
    .unwrap();
    let presence = SensorEvent::from_webhook(&presence, &state.config.routing).unwrap();
    assert_eq!(handle_event(&state.decider, &presence).as_deref(), Some("A"));
    assert_eq!(handle_event(&state.decider, &presence), None);
}
