use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket, Window};

use prompterlink_shared::{decode_message, encode_message, Message, Role};

use crate::dom::set_timeout;
use crate::net::websocket_url;
use crate::reconnect::{is_display_eviction, ReconnectPolicy};

#[derive(Debug)]
pub enum WsEvent {
    Open,
    /// Carries the close code so pages can tell an eviction from a drop.
    Close(u16),
    Error,
    Message(Message),
}

/// Handle to the current socket. Reconnects swap the socket underneath, so
/// callers keep one `Rc<WsSender>` for the page lifetime.
#[derive(Default)]
pub struct WsSender {
    socket: RefCell<Option<WebSocket>>,
}

impl WsSender {
    /// Fire and forget. Dropped silently while disconnected.
    pub fn send(&self, message: &Message) {
        let socket = self.socket.borrow();
        let Some(socket) = socket.as_ref() else {
            return;
        };
        if socket.ready_state() != WebSocket::OPEN {
            return;
        }
        match encode_message(message) {
            Ok(payload) => {
                let _ = socket.send_with_str(&payload);
            }
            Err(error) => {
                web_sys::console::error_1(&format!("WS encode error: {error}").into());
            }
        }
    }
}

struct Connection {
    window: Window,
    url: String,
    sender: Rc<WsSender>,
    policy: RefCell<ReconnectPolicy>,
    on_event: RefCell<Box<dyn FnMut(WsEvent)>>,
}

pub fn connect_ws(
    window: &Window,
    role: Role,
    policy: ReconnectPolicy,
    on_event: impl 'static + FnMut(WsEvent),
) -> Result<Rc<WsSender>, JsValue> {
    let sender = Rc::new(WsSender::default());
    let connection = Rc::new(Connection {
        window: window.clone(),
        url: websocket_url(window, role)?,
        sender: sender.clone(),
        policy: RefCell::new(policy),
        on_event: RefCell::new(Box::new(on_event)),
    });
    open_socket(&connection)?;

    {
        let sender = sender.clone();
        let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Some(socket) = sender.socket.borrow().as_ref() {
                let _ = socket.close();
            }
        });
        window.add_event_listener_with_callback(
            "beforeunload",
            onbeforeunload.as_ref().unchecked_ref(),
        )?;
        onbeforeunload.forget();
    }

    Ok(sender)
}

fn open_socket(connection: &Rc<Connection>) -> Result<(), JsValue> {
    let socket = WebSocket::new(&connection.url)?;

    {
        let connection = connection.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            connection.policy.borrow_mut().on_open();
            web_sys::console::log_1(&format!("WS open {}", connection.url).into());
            (connection.on_event.borrow_mut())(WsEvent::Open);
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let connection = connection.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            web_sys::console::log_1(
                &format!("WS closed code={} reason={:?}", event.code(), event.reason()).into(),
            );
            let code = event.code();
            (connection.on_event.borrow_mut())(WsEvent::Close(code));
            let delay = connection.policy.borrow_mut().on_close(code);
            let Some(delay) = delay else {
                if is_display_eviction(code) {
                    web_sys::console::warn_1(
                        &"WS display slot held by another display; not reconnecting".into(),
                    );
                    return;
                }
                web_sys::console::warn_1(
                    &"WS reconnect attempts exhausted; reload to retry".into(),
                );
                return;
            };
            let attempt = connection.policy.borrow().attempts();
            web_sys::console::log_1(&format!("WS reconnect #{attempt} in {delay}ms").into());
            let retry = connection.clone();
            set_timeout(&connection.window, delay, move || {
                if let Err(error) = open_socket(&retry) {
                    web_sys::console::error_1(&error);
                }
            });
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let connection = connection.clone();
        let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
            (connection.on_event.borrow_mut())(WsEvent::Error);
        });
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    {
        let connection = connection.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                web_sys::console::error_2(
                    &"WS message data is not a string".into(),
                    &event.data(),
                );
                return;
            };
            match decode_message(&text) {
                Ok(Some(message)) => {
                    (connection.on_event.borrow_mut())(WsEvent::Message(message));
                }
                Ok(None) => {}
                Err(error) => {
                    let snippet = if text.len() <= 200 {
                        text
                    } else {
                        format!("{}...", text.chars().take(200).collect::<String>())
                    };
                    web_sys::console::error_1(
                        &format!("WS message parse error: {error} payload={snippet:?}").into(),
                    );
                }
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    *connection.sender.socket.borrow_mut() = Some(socket);
    Ok(())
}
