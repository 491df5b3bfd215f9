use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, TouchEvent, Window};

use prompterlink_shared::{Command, Message, Role};

use crate::controller::ControllerMirror;
use crate::dom::{get_element, listen_active, now, set_class, set_status, set_timeout};
use crate::gesture::classify;
use crate::reconnect::ReconnectPolicy;
use crate::ws::{connect_ws, WsEvent, WsSender};

const PLAY_AFTER_OPEN_MS: i32 = 100;
const FEEDBACK_MS: i32 = 600;

struct Surface {
    window: Window,
    mirror: RefCell<ControllerMirror>,
    sender: RefCell<Option<Rc<WsSender>>>,
    touch_start: Cell<Option<(f64, f64, f64)>>,
    status: Element,
    status_text: Element,
    play_status: Element,
    speed_value: Element,
    feedback: Element,
}

impl Surface {
    fn send(&self, message: &Message) {
        if let Some(sender) = self.sender.borrow().as_ref() {
            sender.send(message);
        }
    }

    fn render(&self) {
        let mirror = self.mirror.borrow();
        set_status(&self.status, &self.status_text, mirror.is_connected);
        self.play_status
            .set_text_content(Some(mirror.status().label()));
        self.speed_value
            .set_text_content(Some(&mirror.speed.to_string()));
    }

    fn show_feedback(&self, text: &str) {
        self.feedback.set_text_content(Some(text));
        set_class(&self.feedback, "visible", true);
        let feedback = self.feedback.clone();
        set_timeout(&self.window, FEEDBACK_MS, move || {
            set_class(&feedback, "visible", false);
        });
    }

    fn finish_touch(&self, x: f64, y: f64) {
        let Some((start_x, start_y, started_at)) = self.touch_start.take() else {
            return;
        };
        let Some(gesture) = classify(x - start_x, y - start_y, now() - started_at) else {
            return;
        };
        let messages = self.mirror.borrow().gesture(gesture);
        for message in &messages {
            self.send(message);
        }
        self.show_feedback(gesture.feedback());
    }
}

fn touch_point(event: &TouchEvent) -> Option<(f64, f64)> {
    event
        .changed_touches()
        .get(0)
        .map(|touch| (f64::from(touch.client_x()), f64::from(touch.client_y())))
}

pub fn start(window: Window, document: Document) -> Result<(), JsValue> {
    let surface = Rc::new(Surface {
        window: window.clone(),
        mirror: RefCell::new(ControllerMirror::new()),
        sender: RefCell::new(None),
        touch_start: Cell::new(None),
        status: get_element(&document, "connectionStatus")?,
        status_text: get_element(&document, "connectionText")?,
        play_status: get_element(&document, "playStatus")?,
        speed_value: get_element(&document, "speedValue")?,
        feedback: get_element(&document, "gestureFeedback")?,
    });
    surface.render();

    let area: Element = get_element(&document, "gestureArea")?;
    {
        let s = surface.clone();
        listen_active(area.as_ref(), "touchstart", move |event: TouchEvent| {
            event.prevent_default();
            if let Some((x, y)) = touch_point(&event) {
                s.touch_start.set(Some((x, y, now())));
            }
        })?;
    }
    {
        listen_active(area.as_ref(), "touchmove", move |event: TouchEvent| {
            event.prevent_default();
        })?;
    }
    {
        let s = surface.clone();
        listen_active(area.as_ref(), "touchend", move |event: TouchEvent| {
            event.prevent_default();
            if let Some((x, y)) = touch_point(&event) {
                s.finish_touch(x, y);
            }
        })?;
    }

    let s = surface.clone();
    let sender = connect_ws(
        &window,
        Role::Controller,
        ReconnectPolicy::controller(),
        move |event| match event {
            WsEvent::Open => {
                s.mirror.borrow_mut().is_connected = true;
                s.render();
                let play = s.clone();
                set_timeout(&s.window, PLAY_AFTER_OPEN_MS, move || {
                    play.send(&Message::command(Command::Play));
                });
            }
            WsEvent::Close(_) | WsEvent::Error => {
                s.mirror.borrow_mut().is_connected = false;
                s.render();
            }
            WsEvent::Message(message) => {
                s.mirror.borrow_mut().apply(message);
                s.render();
            }
        },
    )?;
    *surface.sender.borrow_mut() = Some(sender);

    Ok(())
}
