//! Remote control panel: buttons, a mirrored text editor, orientation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, HtmlTextAreaElement, Window};

use prompterlink_shared::{Message, Role};

use crate::coalesce::{TextCoalescer, TEXT_QUIET_MS};
use crate::controller::{Applied, ControllerMirror, PlayStatus};
use crate::dom::{get_element, listen, set_class, set_status, set_timeout};
use crate::reconnect::ReconnectPolicy;
use crate::ws::{connect_ws, WsEvent, WsSender};

const LANDSCAPE_QUERY: &str = "(orientation: landscape) and (max-height: 500px)";

struct Remote {
    window: Window,
    mirror: RefCell<ControllerMirror>,
    sender: RefCell<Option<Rc<WsSender>>>,
    coalescer: RefCell<TextCoalescer>,
    landscape: Cell<bool>,
    status: Element,
    status_text: Element,
    play_status: Element,
    speed_value: Element,
    play_label: Element,
    rewind_label: Element,
    play_button: Element,
    rewind_button: Element,
    editor: HtmlTextAreaElement,
}

impl Remote {
    fn send(&self, message: &Message) {
        if let Some(sender) = self.sender.borrow().as_ref() {
            sender.send(message);
        }
    }

    fn send_all(&self, messages: &[Message]) {
        for message in messages {
            self.send(message);
        }
    }

    fn render(&self) {
        let mirror = self.mirror.borrow();
        set_status(&self.status, &self.status_text, mirror.is_connected);

        let status = mirror.status();
        self.play_status.set_text_content(Some(status.label()));
        let _ = self
            .play_status
            .set_attribute("data-status", &format!("{status:?}").to_lowercase());
        self.speed_value
            .set_text_content(Some(&mirror.speed.to_string()));

        let forward = status == PlayStatus::Playing;
        let backward = status == PlayStatus::Reversing;
        self.play_label
            .set_text_content(Some(if forward { "Pause" } else { "Play" }));
        self.rewind_label
            .set_text_content(Some(if backward { "Pause" } else { "Rewind" }));
        set_class(&self.play_button, "active", forward);
        set_class(&self.rewind_button, "active", backward);
    }

    fn on_message(&self, message: Message) {
        let applied = self.mirror.borrow_mut().apply(message);
        if let Applied::Text(text) = applied {
            // Rewriting the value moves the caret, so leave a focused editor alone.
            if !self.editor_focused() && self.editor.value() != text {
                self.editor.set_value(&text);
            }
        }
        self.render();
    }

    fn editor_focused(&self) -> bool {
        let editor: &Element = self.editor.as_ref();
        self.window
            .document()
            .and_then(|document| document.active_element())
            .is_some_and(|active| active == *editor)
    }

    fn edit_text(self: &Rc<Self>) {
        let text = self.editor.value();
        self.mirror.borrow_mut().edit_text(text.clone());
        let generation = self.coalescer.borrow_mut().push(text);
        let remote = self.clone();
        set_timeout(&self.window, TEXT_QUIET_MS, move || {
            let pending = remote.coalescer.borrow_mut().fire(generation);
            if let Some(data) = pending {
                remote.mirror.borrow_mut().text_sent();
                remote.send(&Message::Text { data });
            }
        });
    }

    /// Sync button and editor collapse: push the editor now.
    fn sync_text(&self) {
        self.coalescer.borrow_mut().flush();
        self.mirror.borrow_mut().text_sent();
        self.send(&Message::Text {
            data: self.editor.value(),
        });
    }

    fn check_orientation(&self) {
        let is_landscape = self
            .window
            .match_media(LANDSCAPE_QUERY)
            .ok()
            .flatten()
            .is_some_and(|query| query.matches());
        if self.landscape.replace(is_landscape) == is_landscape {
            return;
        }
        let messages = self.mirror.borrow().orientation(is_landscape);
        self.send_all(&messages);
    }
}

pub fn start(window: Window, document: Document) -> Result<(), JsValue> {
    let remote = Rc::new(Remote {
        window: window.clone(),
        mirror: RefCell::new(ControllerMirror::new()),
        sender: RefCell::new(None),
        coalescer: RefCell::new(TextCoalescer::new()),
        landscape: Cell::new(false),
        status: get_element(&document, "connectionStatus")?,
        status_text: get_element(&document, "connectionText")?,
        play_status: get_element(&document, "playStatus")?,
        speed_value: get_element(&document, "speedValue")?,
        play_label: get_element(&document, "playLabel")?,
        rewind_label: get_element(&document, "rewindLabel")?,
        play_button: get_element(&document, "btnPlay")?,
        rewind_button: get_element(&document, "btnRewind")?,
        editor: get_element(&document, "textEditor")?,
    });
    remote.render();

    let buttons: [(&str, fn(&ControllerMirror) -> Message); 6] = [
        ("btnPlay", ControllerMirror::play_button),
        ("btnRewind", ControllerMirror::rewind_button),
        ("btnSpeedUp", ControllerMirror::speed_up),
        ("btnSpeedDown", ControllerMirror::speed_down),
        ("btnScrollUp", |mirror| mirror.scroll(true)),
        ("btnScrollDown", |mirror| mirror.scroll(false)),
    ];
    for (id, command) in buttons {
        let button: Element = get_element(&document, id)?;
        let r = remote.clone();
        listen(button.as_ref(), "click", move |_: Event| {
            let message = command(&r.mirror.borrow());
            r.send(&message);
        })?;
    }

    {
        let r = remote.clone();
        listen(remote.editor.as_ref(), "input", move |_: Event| r.edit_text())?;
    }
    for id in ["btnSync", "btnCollapse"] {
        let button: Element = get_element(&document, id)?;
        let r = remote.clone();
        listen(button.as_ref(), "click", move |_: Event| r.sync_text())?;
    }
    {
        let r = remote.clone();
        listen(window.as_ref(), "resize", move |_: Event| r.check_orientation())?;
    }

    let r = remote.clone();
    let sender = connect_ws(
        &window,
        Role::Controller,
        ReconnectPolicy::controller(),
        move |event| match event {
            WsEvent::Open => {
                r.mirror.borrow_mut().is_connected = true;
                r.render();
                r.check_orientation();
            }
            WsEvent::Close(_) | WsEvent::Error => {
                r.mirror.borrow_mut().is_connected = false;
                r.render();
            }
            WsEvent::Message(message) => r.on_message(message),
        },
    )?;
    *remote.sender.borrow_mut() = Some(sender);

    Ok(())
}
