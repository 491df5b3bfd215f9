use serde::{Deserialize, Serialize};

mod codec;

pub use codec::{decode_message, encode_message, ProtocolError};

pub const MIN_SPEED: u32 = 0;
pub const MAX_SPEED: u32 = 100;
pub const DEFAULT_SPEED: u32 = 3;

/// Close code sent to a display that a newer display took over from.
pub const CLOSE_DISPLAY_REPLACED: u16 = 4000;
/// Close code sent to a display that arrived while the slot was taken.
pub const CLOSE_DISPLAY_TAKEN: u16 = 4001;

/// Which side of the relay a connection plays, selected by `?type=` on the
/// WebSocket URL. Anything other than `teleprompter` is a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Display,
    Controller,
}

impl Role {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("teleprompter") => Role::Display,
            _ => Role::Controller,
        }
    }

    pub fn as_query(self) -> &'static str {
        match self {
            Role::Display => "teleprompter",
            Role::Controller => "remote",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Play,
    Pause,
    Rewind,
    Stop,
    Speed,
    Scroll,
}

/// Partial snapshot carried by a `state` message. Absent fields leave the
/// receiver's value untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_immersive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reversing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Canonical state held by the relay and mirrored by controllers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedState {
    pub is_playing: bool,
    pub is_immersive: bool,
    pub is_reversing: bool,
    pub speed: u32,
    pub text: String,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_immersive: false,
            is_reversing: false,
            speed: DEFAULT_SPEED,
            text: String::new(),
        }
    }
}

impl SharedState {
    /// Shallow merge: only fields present in `update` are written.
    pub fn merge(&mut self, update: &StateUpdate) {
        if let Some(is_playing) = update.is_playing {
            self.is_playing = is_playing;
        }
        if let Some(is_immersive) = update.is_immersive {
            self.is_immersive = is_immersive;
        }
        if let Some(is_reversing) = update.is_reversing {
            self.is_reversing = is_reversing;
        }
        if let Some(speed) = update.speed {
            self.speed = speed;
        }
        if let Some(text) = &update.text {
            self.text = text.clone();
        }
    }

    pub fn snapshot(&self) -> StateUpdate {
        StateUpdate {
            is_playing: Some(self.is_playing),
            is_immersive: Some(self.is_immersive),
            is_reversing: Some(self.is_reversing),
            speed: Some(self.speed),
            text: Some(self.text.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "command")]
    Command {
        command: Command,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },
    #[serde(rename = "state")]
    State { data: StateUpdate },
    #[serde(rename = "text")]
    Text { data: String },
    #[serde(rename = "landscape")]
    Landscape {
        #[serde(rename = "isLandscape")]
        is_landscape: bool,
    },
}

impl Message {
    pub fn command(command: Command) -> Self {
        Message::Command {
            command,
            value: None,
        }
    }

    pub fn command_with_value(command: Command, value: f64) -> Self {
        Message::Command {
            command,
            value: Some(value),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Command { .. } => "command",
            Message::State { .. } => "state",
            Message::Text { .. } => "text",
            Message::Landscape { .. } => "landscape",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_controller() {
        assert_eq!(Role::from_query(Some("teleprompter")), Role::Display);
        assert_eq!(Role::from_query(Some("remote")), Role::Controller);
        assert_eq!(Role::from_query(Some("gesture")), Role::Controller);
        assert_eq!(Role::from_query(None), Role::Controller);
    }

    #[test]
    fn partial_update_only_touches_present_fields() {
        let mut state = SharedState {
            is_playing: true,
            is_immersive: true,
            is_reversing: false,
            speed: 3,
            text: "script".into(),
        };
        state.merge(&StateUpdate {
            speed: Some(10),
            ..StateUpdate::default()
        });
        assert_eq!(state.speed, 10);
        assert!(state.is_playing);
        assert!(state.is_immersive);
        assert_eq!(state.text, "script");
    }

    #[test]
    fn initial_state_matches_server_bootstrap() {
        let state = SharedState::default();
        assert!(!state.is_playing);
        assert!(!state.is_immersive);
        assert!(!state.is_reversing);
        assert_eq!(state.speed, 3);
        assert!(state.text.is_empty());
    }

    #[test]
    fn command_shape_on_the_wire() {
        let json = serde_json::to_value(Message::command_with_value(Command::Speed, 40.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "command", "command": "speed", "value": 40.0})
        );
        let json = serde_json::to_value(Message::command(Command::Rewind)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "command", "command": "rewind"}));
    }

    #[test]
    fn state_shape_omits_absent_fields() {
        let message = Message::State {
            data: StateUpdate {
                is_playing: Some(false),
                ..StateUpdate::default()
            },
        };
        assert_eq!(
            serde_json::to_value(message).unwrap(),
            serde_json::json!({"type": "state", "data": {"isPlaying": false}})
        );
    }

    #[test]
    fn landscape_uses_camel_case_flag() {
        let message: Message =
            serde_json::from_str(r#"{"type":"landscape","isLandscape":true}"#).unwrap();
        assert_eq!(message, Message::Landscape { is_landscape: true });
    }

    #[test]
    fn null_command_value_reads_as_absent() {
        let message: Message =
            serde_json::from_str(r#"{"type":"command","command":"pause","value":null}"#).unwrap();
        assert_eq!(message, Message::command(Command::Pause));
    }
}
