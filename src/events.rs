//! Sensor event intake
//!
//! The webhook server that receives device events lives outside this crate.
//! It hands over the decoded body; only presence detections
//! (`human_sensor.detected`) lead to a dispatch decision.

use serde::Deserialize;
use tracing::debug;

use crate::config::RoutingConfig;
use crate::dispatch::DispatchDecider;

pub const PRESENCE_SENSOR: &str = "human_sensor";
pub const PRESENCE_DETECTED: &str = "detected";

/// Webhook body as posted by the device platform.
///
/// `event` is `"<sensor_type>.<event_type>"`. Location and subject may be
/// omitted when the deployment serves a single room / person.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, alias = "room_id", alias = "room_uuid")]
    pub location_id: Option<String>,
    #[serde(default, alias = "user_id")]
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub sensor_type: String,
    pub event_type: String,
    pub location_id: String,
    pub subject_id: String,
    pub payload: Option<f64>,
}

impl SensorEvent {
    /// Resolve a webhook body into an event, filling location and subject
    /// from `routing` when the body does not carry them. `None` when the
    /// event name or either identifier is missing.
    pub fn from_webhook(body: &WebhookBody, routing: &RoutingConfig) -> Option<Self> {
        let (sensor_type, event_type) = split_event_name(body.event.as_deref()?);
        let location_id = non_empty(body.location_id.as_deref())
            .or_else(|| non_empty(routing.location_id.as_deref()))?;
        let subject_id = non_empty(body.subject_id.as_deref())
            .or_else(|| non_empty(routing.subject_id.as_deref()))?;

        let payload = body
            .data
            .as_ref()
            .and_then(|d| d.get("value"))
            .and_then(|v| v.as_f64());

        Some(Self {
            sensor_type,
            event_type,
            location_id: location_id.to_string(),
            subject_id: subject_id.to_string(),
            payload,
        })
    }

    pub fn is_presence_detected(&self) -> bool {
        self.sensor_type == PRESENCE_SENSOR && self.event_type == PRESENCE_DETECTED
    }
}

/// `"human_sensor.detected"` -> `("human_sensor", "detected")`. A missing
/// part comes back empty.
pub fn split_event_name(name: &str) -> (String, String) {
    let mut parts = name.trim().splitn(2, '.');
    let sensor_type = parts.next().unwrap_or("").to_string();
    let event_type = parts.next().unwrap_or("").to_string();
    (sensor_type, event_type)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Message to speak for `event`, or `None` when it is not a presence
/// detection or the decider stays silent.
pub fn handle_event(decider: &DispatchDecider, event: &SensorEvent) -> Option<String> {
    if !event.is_presence_detected() {
        debug!(
            "[EVENT] Ignoring {}.{} at {}",
            event.sensor_type, event.event_type, event.location_id
        );
        return None;
    }
    decider.decide(&event.location_id, &event.subject_id)
}
