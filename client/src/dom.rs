use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, EventTarget, Window};

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn set_status(status_el: &Element, status_text: &Element, connected: bool) {
    if connected {
        set_status_label(status_el, status_text, "connected", "Connected");
    } else {
        set_status_label(status_el, status_text, "disconnected", "Disconnected");
    }
}

pub fn set_status_label(status_el: &Element, status_text: &Element, state: &str, text: &str) {
    let _ = status_el.set_attribute("data-state", state);
    status_text.set_text_content(Some(text));
}

pub fn set_class(element: &Element, class: &str, on: bool) {
    let _ = element.class_list().toggle_with_force(class, on);
}

pub fn now() -> f64 {
    js_sys::Date::now()
}

/// Attaches a long-lived listener. The closure lives as long as the page.
pub fn listen<E, F>(target: &EventTarget, event: &str, handler: F) -> Result<(), JsValue>
where
    E: JsCast + 'static,
    F: FnMut(E) + 'static,
{
    let mut handler = handler;
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
        if let Ok(event) = event.dyn_into::<E>() {
            handler(event);
        }
    });
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Like [`listen`] but registered non-passive so `prevent_default` works
/// for touch scrolling.
pub fn listen_active<E, F>(target: &EventTarget, event: &str, handler: F) -> Result<(), JsValue>
where
    E: JsCast + 'static,
    F: FnMut(E) + 'static,
{
    let mut handler = handler;
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
        if let Ok(event) = event.dyn_into::<E>() {
            handler(event);
        }
    });
    let options = web_sys::AddEventListenerOptions::new();
    options.set_passive(false);
    target.add_event_listener_with_callback_and_add_event_listener_options(
        event,
        closure.as_ref().unchecked_ref(),
        &options,
    )?;
    closure.forget();
    Ok(())
}

pub fn set_timeout(
    window: &Window,
    delay_ms: i32,
    callback: impl FnOnce() + 'static,
) -> Option<i32> {
    let cb = Closure::once_into_js(callback);
    window
        .set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), delay_ms)
        .ok()
}

/// A repeating timer that can be stopped from inside its own callback.
/// Stopping only clears the browser timer; the closure is dropped when the
/// slot is re-armed.
#[derive(Default)]
pub struct IntervalSlot {
    id: Option<i32>,
    closure: Option<Closure<dyn FnMut()>>,
}

impl IntervalSlot {
    pub fn start(
        slot: &Rc<RefCell<IntervalSlot>>,
        window: &Window,
        period_ms: i32,
        callback: impl FnMut() + 'static,
    ) -> Result<(), JsValue> {
        let closure = Closure::<dyn FnMut()>::new(callback);
        let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            period_ms,
        )?;
        let mut slot = slot.borrow_mut();
        if let Some(previous) = slot.id.take() {
            window.clear_interval_with_handle(previous);
        }
        slot.id = Some(id);
        slot.closure = Some(closure);
        Ok(())
    }

    pub fn stop(&mut self, window: &Window) {
        if let Some(id) = self.id.take() {
            window.clear_interval_with_handle(id);
        }
    }
}
