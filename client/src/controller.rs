//! Controller-side mirror of the shared state and the mapping from buttons
//! and gestures to protocol commands. Nothing here predicts playback: flags
//! change only when a `state` snapshot arrives.

use prompterlink_shared::{Command, Message, StateUpdate, DEFAULT_SPEED, MAX_SPEED};

use crate::gesture::Gesture;

pub const SPEED_STEP: u32 = 5;
pub const SCROLL_STEP: f64 = 100.0;
/// Swipe-down on the gesture surface never drops below this.
pub const GESTURE_SPEED_FLOOR: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayStatus {
    Reversing,
    Playing,
    Paused,
    Stopped,
}

impl PlayStatus {
    pub fn label(self) -> &'static str {
        match self {
            PlayStatus::Reversing => "Reversing",
            PlayStatus::Playing => "Playing",
            PlayStatus::Paused => "Paused",
            PlayStatus::Stopped => "Stopped",
        }
    }
}

/// What an incoming message changed, so the page knows what to redraw.
#[derive(Clone, Debug, PartialEq)]
pub enum Applied {
    State,
    Text(String),
    Nothing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerMirror {
    pub is_connected: bool,
    pub is_playing: bool,
    pub is_immersive: bool,
    pub is_reversing: bool,
    pub speed: u32,
    pub text: String,
    /// Set while a local edit has not been sent yet. Incoming text must not
    /// overwrite it.
    edit_pending: bool,
}

impl Default for ControllerMirror {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_playing: false,
            is_immersive: false,
            is_reversing: false,
            speed: DEFAULT_SPEED,
            text: String::new(),
            edit_pending: false,
        }
    }
}

impl ControllerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, message: Message) -> Applied {
        match message {
            Message::State { data } => {
                self.merge(&data);
                match data.text {
                    Some(text) if !self.edit_pending => {
                        self.text = text.clone();
                        Applied::Text(text)
                    }
                    _ => Applied::State,
                }
            }
            Message::Text { .. } if self.edit_pending => Applied::Nothing,
            Message::Text { data } => {
                self.text = data.clone();
                Applied::Text(data)
            }
            Message::Command { .. } | Message::Landscape { .. } => Applied::Nothing,
        }
    }

    fn merge(&mut self, update: &StateUpdate) {
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
    }

    pub fn status(&self) -> PlayStatus {
        if self.is_playing && self.is_reversing {
            PlayStatus::Reversing
        } else if self.is_playing {
            PlayStatus::Playing
        } else if self.is_immersive {
            PlayStatus::Paused
        } else {
            PlayStatus::Stopped
        }
    }

    /// Local edit in the remote's editor; shown immediately, sent later.
    pub fn edit_text(&mut self, text: String) {
        self.text = text;
        self.edit_pending = true;
    }

    /// The local edit went out; incoming text is authoritative again.
    pub fn text_sent(&mut self) {
        self.edit_pending = false;
    }

    pub fn has_pending_edit(&self) -> bool {
        self.edit_pending
    }

    /// Play button: pauses when already moving forward.
    pub fn play_button(&self) -> Message {
        if self.is_playing && !self.is_reversing {
            Message::command(Command::Pause)
        } else {
            Message::command(Command::Play)
        }
    }

    /// Rewind button: pauses when already moving backward.
    pub fn rewind_button(&self) -> Message {
        if self.is_playing && self.is_reversing {
            Message::command(Command::Pause)
        } else {
            Message::command(Command::Rewind)
        }
    }

    /// Tap on the gesture surface. Resuming keeps the last direction.
    pub fn tap(&self) -> Message {
        if self.is_playing {
            Message::command(Command::Pause)
        } else {
            self.resume()
        }
    }

    pub fn speed_up(&self) -> Message {
        let speed = self.speed.saturating_add(SPEED_STEP).min(MAX_SPEED);
        Message::command_with_value(Command::Speed, f64::from(speed))
    }

    pub fn speed_down(&self) -> Message {
        let speed = self.speed.saturating_sub(SPEED_STEP);
        Message::command_with_value(Command::Speed, f64::from(speed))
    }

    pub fn scroll(&self, up: bool) -> Message {
        let delta = if up { -SCROLL_STEP } else { SCROLL_STEP };
        Message::command_with_value(Command::Scroll, delta)
    }

    pub fn gesture(&self, gesture: Gesture) -> Vec<Message> {
        match gesture {
            Gesture::Tap => vec![self.tap()],
            Gesture::SwipeLeft => vec![Message::command(Command::Rewind)],
            Gesture::SwipeRight => vec![Message::command(Command::Play)],
            Gesture::SwipeUp => self.with_resume(self.speed_up()),
            Gesture::SwipeDown => {
                // A down swipe must never raise a speed already under the floor.
                let floor = GESTURE_SPEED_FLOOR.min(self.speed);
                let speed = self.speed.saturating_sub(SPEED_STEP).max(floor);
                self.with_resume(Message::command_with_value(Command::Speed, f64::from(speed)))
            }
        }
    }

    /// Orientation change on a remote. Landscape pauses running playback.
    pub fn orientation(&self, is_landscape: bool) -> Vec<Message> {
        let mut messages = Vec::new();
        if is_landscape && self.is_playing {
            messages.push(Message::command(Command::Pause));
        }
        messages.push(Message::Landscape { is_landscape });
        messages
    }

    fn resume(&self) -> Message {
        if self.is_reversing {
            Message::command(Command::Rewind)
        } else {
            Message::command(Command::Play)
        }
    }

    fn with_resume(&self, speed: Message) -> Vec<Message> {
        let mut messages = vec![speed];
        if !self.is_playing {
            messages.push(self.resume());
        }
        messages
    }
}
