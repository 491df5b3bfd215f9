//! Display-side playback state machine.
//!
//! The engine never touches the DOM. Every operation returns the list of
//! [`Effect`]s the host must carry out (schedule a frame, move the scroll
//! surface, publish a snapshot...). Layout is measured by the host and passed
//! in as `max_scroll`; `None` means the scroll surface is missing.

use prompterlink_shared::{Command, Message, StateUpdate, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};

pub const COUNTDOWN_FROM: u8 = 3;
pub const COUNTDOWN_INTERVAL_MS: i32 = 1000;
/// Forward playback runs this far past the end before it stops.
pub const END_OVERSHOOT: f64 = 50.0;
pub const KEY_SCROLL_STEP: f64 = 50.0;

/// Scroll speed curve: gentle at the low end, steep near the top.
pub fn pixels_per_frame(speed: u32) -> f64 {
    if speed == 0 {
        return 0.0;
    }
    let ratio = f64::from(speed.min(MAX_SPEED)) / 100.0;
    0.2 + ratio.powf(1.5) * 5.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    CountingDown,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowUp,
    ArrowDown,
    Escape,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Request one animation frame; at most one is ever outstanding.
    ScheduleFrame,
    ScrollTo(f64),
    StartCountdownTimer,
    CancelCountdownTimer,
    ShowCountdown(u8),
    HideCountdown,
    EnterFullscreen,
    ExitFullscreen,
    Publish(StateUpdate),
    /// Replace the editor contents with text that arrived remotely.
    ShowText(String),
    SetSpeedControl(u32),
    LandscapeWarning(bool),
    Render,
}

/// Local presentation settings. Never leaves the display.
#[derive(Clone, Debug, PartialEq)]
pub struct Appearance {
    pub font_size: u32,
    pub font_family: String,
    pub margin: u32,
    pub guide_height: u32,
    pub flipped: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            font_size: 48,
            font_family: "'Noto Sans TC', sans-serif".to_string(),
            margin: 5,
            guide_height: 50,
            flipped: true,
        }
    }
}

#[derive(Debug)]
pub struct PlaybackEngine {
    is_playing: bool,
    is_reversing: bool,
    is_immersive: bool,
    speed: u32,
    text: String,
    scroll_position: f64,
    countdown: Option<u8>,
    countdown_enabled: bool,
    dragging: bool,
    touch_has_moved: bool,
    last_touch_y: f64,
    frame_pending: bool,
    last_frame_time: f64,
    pub appearance: Appearance,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_reversing: false,
            is_immersive: false,
            speed: DEFAULT_SPEED,
            text: String::new(),
            scroll_position: 0.0,
            countdown: None,
            countdown_enabled: true,
            dragging: false,
            touch_has_moved: false,
            last_touch_y: 0.0,
            frame_pending: false,
            last_frame_time: 0.0,
            appearance: Appearance::default(),
        }
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if !self.is_immersive {
            Phase::Stopped
        } else if self.countdown.is_some() {
            Phase::CountingDown
        } else if self.is_playing {
            Phase::Playing
        } else {
            Phase::Paused
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_reversing(&self) -> bool {
        self.is_reversing
    }

    pub fn is_immersive(&self) -> bool {
        self.is_immersive
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn countdown(&self) -> Option<u8> {
        self.countdown
    }

    /// Accumulated position. Forward playback may run up to
    /// [`END_OVERSHOOT`] past the end; what reaches the surface is clamped.
    pub fn scroll_position(&self) -> f64 {
        self.scroll_position
    }

    pub fn last_frame_time(&self) -> f64 {
        self.last_frame_time
    }

    pub fn set_countdown_enabled(&mut self, enabled: bool) {
        self.countdown_enabled = enabled;
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

    /// The socket (re)opened: tell the relay where we are.
    pub fn connected(&self) -> Vec<Effect> {
        vec![Effect::Publish(self.snapshot())]
    }

    pub fn start_immersive(&mut self, now: f64) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.is_immersive = true;
        fx.push(Effect::EnterFullscreen);
        self.scroll_position = 0.0;
        fx.push(Effect::ScrollTo(0.0));
        fx.push(Effect::Render);
        if self.countdown_enabled {
            if self.countdown.is_some() {
                fx.push(Effect::CancelCountdownTimer);
            }
            self.countdown = Some(COUNTDOWN_FROM);
            fx.push(Effect::ShowCountdown(COUNTDOWN_FROM));
            fx.push(Effect::StartCountdownTimer);
        } else {
            self.resume(now, &mut fx);
        }
        self.publish(&mut fx);
        fx
    }

    /// One second of countdown elapsed.
    pub fn countdown_tick(&mut self, now: f64) -> Vec<Effect> {
        let Some(count) = self.countdown else {
            return Vec::new();
        };
        let next = count.saturating_sub(1);
        if next > 0 {
            self.countdown = Some(next);
            return vec![Effect::ShowCountdown(next)];
        }
        let mut fx = vec![Effect::CancelCountdownTimer, Effect::HideCountdown];
        self.countdown = None;
        if self.is_immersive {
            self.resume(now, &mut fx);
            fx.push(Effect::Render);
            self.publish(&mut fx);
        }
        fx
    }

    /// Hard reset back to the editor. Playback cannot be resumed from here.
    pub fn exit_immersive(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.countdown.take().is_some() {
            fx.push(Effect::CancelCountdownTimer);
        }
        fx.push(Effect::HideCountdown);
        self.is_immersive = false;
        self.is_playing = false;
        self.is_reversing = false;
        self.dragging = false;
        self.scroll_position = 0.0;
        fx.push(Effect::ScrollTo(0.0));
        fx.push(Effect::ExitFullscreen);
        fx.push(Effect::Render);
        self.publish(&mut fx);
        fx
    }

    /// Tap or Space while immersive. Keeps the current direction.
    pub fn toggle_pause(&mut self, now: f64) -> Vec<Effect> {
        if !self.is_immersive {
            return Vec::new();
        }
        let mut fx = Vec::new();
        if self.is_playing {
            self.is_playing = false;
        } else {
            self.resume(now, &mut fx);
        }
        fx.push(Effect::Render);
        self.publish(&mut fx);
        fx
    }

    /// One display frame. The host calls this for every `ScheduleFrame`.
    pub fn tick(&mut self, now: f64, max_scroll: Option<f64>) -> Vec<Effect> {
        self.frame_pending = false;
        let mut fx = Vec::new();
        if !self.is_playing {
            return fx;
        }
        if self.dragging {
            self.schedule_frame(&mut fx);
            return fx;
        }
        self.last_frame_time = now;

        let Some(max_scroll) = max_scroll else {
            self.is_playing = false;
            fx.push(Effect::Render);
            self.publish(&mut fx);
            return fx;
        };
        let max_scroll = max_scroll.max(0.0);

        let step = pixels_per_frame(self.speed);
        if self.is_reversing {
            self.scroll_position -= step;
        } else {
            self.scroll_position += step;
        }

        if !self.is_reversing && self.scroll_position >= max_scroll + END_OVERSHOOT {
            fx.push(Effect::ScrollTo(max_scroll));
            self.is_playing = false;
            fx.push(Effect::Render);
            self.publish(&mut fx);
            return fx;
        }
        if self.is_reversing && self.scroll_position <= 0.0 {
            self.scroll_position = 0.0;
            fx.push(Effect::ScrollTo(0.0));
            self.is_playing = false;
            self.is_reversing = false;
            fx.push(Effect::Render);
            self.publish(&mut fx);
            return fx;
        }

        fx.push(Effect::ScrollTo(self.scroll_position.clamp(0.0, max_scroll)));
        self.schedule_frame(&mut fx);
        fx
    }

    pub fn adjust_scroll(&mut self, delta: f64, max_scroll: Option<f64>) -> Vec<Effect> {
        self.scroll_position = (self.scroll_position + delta).max(0.0);
        let Some(max_scroll) = max_scroll else {
            return Vec::new();
        };
        self.scroll_position = self.scroll_position.min(max_scroll.max(0.0));
        vec![Effect::ScrollTo(self.scroll_position)]
    }

    pub fn handle_command(
        &mut self,
        command: Command,
        value: Option<f64>,
        now: f64,
        max_scroll: Option<f64>,
    ) -> Vec<Effect> {
        match command {
            Command::Play => {
                if !self.is_immersive {
                    return self.start_immersive(now);
                }
                let mut fx = Vec::new();
                if !self.is_playing {
                    self.is_reversing = false;
                    self.resume(now, &mut fx);
                } else if self.is_reversing {
                    self.is_reversing = false;
                } else {
                    return fx;
                }
                fx.push(Effect::Render);
                self.publish(&mut fx);
                fx
            }
            Command::Pause => {
                let mut fx = Vec::new();
                if self.is_immersive && self.is_playing {
                    self.is_playing = false;
                    fx.push(Effect::Render);
                    self.publish(&mut fx);
                }
                fx
            }
            Command::Rewind => {
                let mut fx = Vec::new();
                if self.is_immersive {
                    self.is_reversing = true;
                    if !self.is_playing {
                        self.resume(now, &mut fx);
                    }
                    fx.push(Effect::Render);
                    self.publish(&mut fx);
                }
                fx
            }
            Command::Stop => {
                if self.is_immersive {
                    self.exit_immersive()
                } else {
                    Vec::new()
                }
            }
            Command::Speed => match value.filter(|value| value.is_finite()) {
                Some(value) => {
                    let speed = value.trunc().clamp(f64::from(MIN_SPEED), f64::from(MAX_SPEED));
                    self.set_speed(speed as u32)
                }
                None => Vec::new(),
            },
            Command::Scroll => match value.filter(|value| value.is_finite()) {
                Some(value) => self.adjust_scroll(value.trunc(), max_scroll),
                None => Vec::new(),
            },
        }
    }

    /// Dispatches a frame from the relay.
    pub fn handle_message(
        &mut self,
        message: Message,
        now: f64,
        max_scroll: Option<f64>,
    ) -> Vec<Effect> {
        match message {
            Message::Command { command, value } => {
                self.handle_command(command, value, now, max_scroll)
            }
            Message::Text { data } => {
                self.text = data.clone();
                vec![Effect::ShowText(data), Effect::Render]
            }
            // Echo of our own snapshot; flags are written here, not read.
            Message::State { .. } => Vec::new(),
            Message::Landscape { is_landscape } => vec![Effect::LandscapeWarning(is_landscape)],
        }
    }

    /// Speed from the remote `speed` command or the local slider.
    pub fn set_speed(&mut self, speed: u32) -> Vec<Effect> {
        self.speed = speed.min(MAX_SPEED);
        let mut fx = vec![Effect::SetSpeedControl(self.speed), Effect::Render];
        self.publish(&mut fx);
        fx
    }

    /// Keystroke in the local editor. The snapshot follows on
    /// [`flush_text`](Self::flush_text) once typing pauses.
    pub fn edit_text(&mut self, text: String) -> Vec<Effect> {
        self.text = text;
        vec![Effect::Render]
    }

    pub fn flush_text(&self) -> Vec<Effect> {
        vec![Effect::Publish(self.snapshot())]
    }

    pub fn clear_text(&mut self) -> Vec<Effect> {
        self.text.clear();
        let mut fx = vec![Effect::ShowText(String::new()), Effect::Render];
        self.publish(&mut fx);
        fx
    }

    pub fn handle_key(&mut self, key: Key, now: f64, max_scroll: Option<f64>) -> Vec<Effect> {
        match key {
            Key::Space if self.is_immersive => self.toggle_pause(now),
            Key::Space => self.start_immersive(now),
            Key::ArrowUp => self.adjust_scroll(-KEY_SCROLL_STEP, max_scroll),
            Key::ArrowDown => self.adjust_scroll(KEY_SCROLL_STEP, max_scroll),
            Key::Escape if self.is_immersive => self.exit_immersive(),
            Key::Escape => Vec::new(),
        }
    }

    /// Mouse wheel scrolls by hand only while nothing is moving.
    pub fn wheel(&mut self, delta: f64, max_scroll: Option<f64>) -> Vec<Effect> {
        if self.is_playing {
            return Vec::new();
        }
        self.adjust_scroll(delta, max_scroll)
    }

    pub fn touch_start(&mut self, y: f64) {
        if self.is_immersive {
            self.dragging = true;
            self.touch_has_moved = false;
            self.last_touch_y = y;
        }
    }

    pub fn touch_move(&mut self, y: f64, max_scroll: Option<f64>) -> Vec<Effect> {
        if !(self.is_immersive && self.dragging) {
            return Vec::new();
        }
        self.touch_has_moved = true;
        let delta = self.last_touch_y - y;
        self.last_touch_y = y;
        self.adjust_scroll(delta, max_scroll)
    }

    /// Ends a drag. A touch that never moved is a tap and toggles pause.
    pub fn touch_end(&mut self, now: f64) -> Vec<Effect> {
        self.dragging = false;
        if !self.touch_has_moved && self.is_immersive {
            return self.toggle_pause(now);
        }
        Vec::new()
    }

    pub fn touch_cancel(&mut self) {
        self.dragging = false;
    }

    fn resume(&mut self, now: f64, fx: &mut Vec<Effect>) {
        if self.countdown.take().is_some() {
            fx.push(Effect::CancelCountdownTimer);
            fx.push(Effect::HideCountdown);
        }
        self.is_playing = true;
        self.last_frame_time = now;
        self.schedule_frame(fx);
    }

    fn schedule_frame(&mut self, fx: &mut Vec<Effect>) {
        if !self.frame_pending {
            self.frame_pending = true;
            fx.push(Effect::ScheduleFrame);
        }
    }

    fn publish(&self, fx: &mut Vec<Effect>) {
        fx.push(Effect::Publish(self.snapshot()));
    }
}
