use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried through the notification fanout to SSE
/// connections.
pub struct ServerEvent {
    /// Event name placed in the SSE `event` field; `None` for bare frames.
    pub event: Option<String>,
    /// Pre-serialized JSON for the SSE `data` field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// First frame of every event stream, enumerating the event names a client
/// may observe afterwards.
pub struct InitEvent {
    /// Every event name this stream can carry.
    pub supported_events: Vec<String>,
}
