//! Display page: owns the scroll surface and drives [`PlaybackEngine`].

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, HtmlElement, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, KeyboardEvent, TouchEvent, WheelEvent, Window,
};

use prompterlink_shared::{Message, Role};

use crate::coalesce::{TextCoalescer, TEXT_QUIET_MS};
use crate::dom::{
    get_element, listen, listen_active, now, set_class, set_status, set_status_label, set_timeout,
    IntervalSlot,
};
use crate::engine::{Effect, Key, PlaybackEngine, COUNTDOWN_INTERVAL_MS};
use crate::net::is_served;
use crate::reconnect::{is_display_eviction, ReconnectPolicy};
use crate::ws::{connect_ws, WsEvent, WsSender};

const PLACEHOLDER: &str = "Type or paste your script on the left...";

struct Elements {
    app: Element,
    display_area: HtmlElement,
    scroll_wrapper: Element,
    scroll_content: HtmlElement,
    guide_line: HtmlElement,
    script_input: HtmlTextAreaElement,
    speed_slider: HtmlInputElement,
    speed_value: Element,
    font_size_slider: HtmlInputElement,
    font_size_value: Element,
    margin_slider: HtmlInputElement,
    margin_value: Element,
    guide_slider: HtmlInputElement,
    guide_value: Element,
    font_select: HtmlSelectElement,
    flip_toggle: HtmlInputElement,
    countdown_toggle: HtmlInputElement,
    countdown_overlay: Element,
    countdown_number: Element,
    landscape_warning: Element,
    ws_status: Element,
    ws_status_text: Element,
    qr_image: Element,
    remote_url: Element,
}

impl Elements {
    fn find(document: &Document) -> Result<Self, JsValue> {
        Ok(Self {
            app: get_element(document, "app")?,
            display_area: get_element(document, "displayArea")?,
            scroll_wrapper: get_element(document, "scrollWrapper")?,
            scroll_content: get_element(document, "scrollContent")?,
            guide_line: get_element(document, "guideLine")?,
            script_input: get_element(document, "scriptInput")?,
            speed_slider: get_element(document, "speedSlider")?,
            speed_value: get_element(document, "speedValue")?,
            font_size_slider: get_element(document, "fontSizeSlider")?,
            font_size_value: get_element(document, "fontSizeValue")?,
            margin_slider: get_element(document, "marginSlider")?,
            margin_value: get_element(document, "marginValue")?,
            guide_slider: get_element(document, "guideSlider")?,
            guide_value: get_element(document, "guideValue")?,
            font_select: get_element(document, "fontSelect")?,
            flip_toggle: get_element(document, "flipToggle")?,
            countdown_toggle: get_element(document, "countdownToggle")?,
            countdown_overlay: get_element(document, "countdownOverlay")?,
            countdown_number: get_element(document, "countdownNumber")?,
            landscape_warning: get_element(document, "landscapeWarning")?,
            ws_status: get_element(document, "wsStatus")?,
            ws_status_text: get_element(document, "wsStatusText")?,
            qr_image: get_element(document, "qrImage")?,
            remote_url: get_element(document, "remoteUrl")?,
        })
    }
}

struct Display {
    window: Window,
    document: Document,
    els: Elements,
    engine: RefCell<PlaybackEngine>,
    sender: RefCell<Option<Rc<WsSender>>>,
    coalescer: RefCell<TextCoalescer>,
    countdown: Rc<RefCell<IntervalSlot>>,
}

impl Display {
    fn max_scroll(&self) -> Option<f64> {
        let wrapper = &self.els.scroll_wrapper;
        Some(f64::from(wrapper.scroll_height() - wrapper.client_height()))
    }

    /// Runs one engine operation, then carries out its effects with the
    /// engine borrow released.
    fn run(
        self: &Rc<Self>,
        op: impl FnOnce(&mut PlaybackEngine, f64, Option<f64>) -> Vec<Effect>,
    ) {
        let max_scroll = self.max_scroll();
        let effects = {
            let mut engine = self.engine.borrow_mut();
            op(&mut engine, now(), max_scroll)
        };
        self.apply(effects);
    }

    fn apply(self: &Rc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleFrame => self.request_frame(),
                Effect::ScrollTo(position) => {
                    self.els.scroll_wrapper.set_scroll_top(position.round() as i32);
                }
                Effect::StartCountdownTimer => {
                    let display = self.clone();
                    let started = IntervalSlot::start(
                        &self.countdown,
                        &self.window,
                        COUNTDOWN_INTERVAL_MS,
                        move || display.run(|engine, now, _| engine.countdown_tick(now)),
                    );
                    if let Err(error) = started {
                        web_sys::console::error_1(&error);
                    }
                }
                Effect::CancelCountdownTimer => self.countdown.borrow_mut().stop(&self.window),
                Effect::ShowCountdown(count) => {
                    self.els
                        .countdown_number
                        .set_text_content(Some(&count.to_string()));
                    set_class(&self.els.countdown_overlay, "visible", true);
                }
                Effect::HideCountdown => set_class(&self.els.countdown_overlay, "visible", false),
                Effect::EnterFullscreen => {
                    if self.document.fullscreen_element().is_none() {
                        if let Some(root) = self.document.document_element() {
                            let _ = root.request_fullscreen();
                        }
                    }
                }
                Effect::ExitFullscreen => {
                    if self.document.fullscreen_element().is_some() {
                        self.document.exit_fullscreen();
                    }
                }
                Effect::Publish(data) => {
                    if let Some(sender) = self.sender.borrow().as_ref() {
                        sender.send(&Message::State { data });
                    }
                }
                Effect::ShowText(text) => self.els.script_input.set_value(&text),
                Effect::SetSpeedControl(speed) => {
                    self.els.speed_slider.set_value(&speed.to_string());
                }
                Effect::LandscapeWarning(on) => {
                    set_class(&self.els.landscape_warning, "visible", on);
                }
                Effect::Render => self.render(),
            }
        }
    }

    fn request_frame(self: &Rc<Self>) {
        let display = self.clone();
        let cb = Closure::once_into_js(move |timestamp: f64| {
            display.run(|engine, _, max_scroll| engine.tick(timestamp, max_scroll));
        });
        let _ = self.window.request_animation_frame(cb.unchecked_ref());
    }

    fn render(&self) {
        let engine = self.engine.borrow();
        let els = &self.els;
        let appearance = &engine.appearance;

        set_class(&els.app, "immersive", engine.is_immersive());
        set_class(&els.app, "playing", engine.is_playing());
        set_class(&els.display_area, "flipped", appearance.flipped);

        let text = engine.text();
        set_class(&els.scroll_content, "placeholder", text.is_empty());
        els.scroll_content
            .set_text_content(Some(if text.is_empty() { PLACEHOLDER } else { text }));

        let style = els.scroll_content.style();
        let _ = style.set_property("font-size", &format!("{}px", appearance.font_size));
        let _ = style.set_property("font-family", &appearance.font_family);
        let _ = style.set_property("padding-left", &format!("{}%", appearance.margin));
        let _ = style.set_property("padding-right", &format!("{}%", appearance.margin));
        let _ = els
            .guide_line
            .style()
            .set_property("top", &format!("{}%", appearance.guide_height));

        els.speed_value
            .set_text_content(Some(&engine.speed().to_string()));
        els.font_size_value
            .set_text_content(Some(&format!("{}px", appearance.font_size)));
        els.margin_value
            .set_text_content(Some(&format!("{}%", appearance.margin)));
        els.guide_value
            .set_text_content(Some(&format!("{}%", appearance.guide_height)));
    }

    fn set_connected(&self, connected: bool) {
        set_status(&self.els.ws_status, &self.els.ws_status_text, connected);
    }

    fn set_replaced(&self) {
        set_status_label(
            &self.els.ws_status,
            &self.els.ws_status_text,
            "replaced",
            "Replaced by another display",
        );
    }

    fn edit_text(self: &Rc<Self>, text: String) {
        self.run(|engine, _, _| engine.edit_text(text.clone()));
        let generation = self.coalescer.borrow_mut().push(text);
        let display = self.clone();
        set_timeout(&self.window, TEXT_QUIET_MS, move || {
            if display.coalescer.borrow_mut().fire(generation).is_some() {
                display.run(|engine, _, _| engine.flush_text());
            }
        });
    }

    fn confirm_clear(self: &Rc<Self>) {
        let confirmed = self
            .window
            .confirm_with_message("Clear the whole script?")
            .unwrap_or(false);
        if confirmed {
            self.coalescer.borrow_mut().flush();
            self.run(|engine, _, _| engine.clear_text());
        }
    }

    fn load_qrcode(&self) {
        let promise = self.window.fetch_with_str("/api/qrcode");

        let qr_image = self.els.qr_image.clone();
        let remote_url = self.els.remote_url.clone();
        let on_json = Closure::<dyn FnMut(JsValue)>::new(move |data: JsValue| {
            let field = |name: &str| {
                Reflect::get(&data, &JsValue::from_str(name))
                    .ok()
                    .and_then(|value| value.as_string())
            };
            if let Some(qrcode) = field("qrcode") {
                let _ = qr_image.set_attribute("src", &qrcode);
            }
            if let Some(url) = field("url") {
                remote_url.set_text_content(Some(&url));
            }
        });
        let on_response = Closure::<dyn FnMut(JsValue)>::new(move |response: JsValue| {
            let json = Reflect::get(&response, &JsValue::from_str("json"))
                .ok()
                .and_then(|value| value.dyn_into::<Function>().ok())
                .and_then(|json| json.call0(&response).ok())
                .and_then(|value| value.dyn_into::<Promise>().ok());
            if let Some(json) = json {
                let _ = json.then(&on_json);
            }
        });
        let on_err = Closure::<dyn FnMut(JsValue)>::new(move |error: JsValue| {
            web_sys::console::warn_2(&"QR code request failed".into(), &error);
        });
        let _ = promise.then2(&on_response, &on_err);
        on_response.forget();
        on_err.forget();
    }
}

fn slider_value(input: &HtmlInputElement) -> Option<u32> {
    input.value().parse().ok()
}

fn key_from_event(event: &KeyboardEvent) -> Option<Key> {
    match event.key().as_str() {
        " " => Some(Key::Space),
        "ArrowUp" => Some(Key::ArrowUp),
        "ArrowDown" => Some(Key::ArrowDown),
        "Escape" => Some(Key::Escape),
        _ => None,
    }
}

fn first_touch_y(event: &TouchEvent) -> Option<f64> {
    event.touches().get(0).map(|touch| f64::from(touch.client_y()))
}

pub fn start(window: Window, document: Document) -> Result<(), JsValue> {
    let els = Elements::find(&document)?;
    let display = Rc::new(Display {
        window: window.clone(),
        document: document.clone(),
        els,
        engine: RefCell::new(PlaybackEngine::new()),
        sender: RefCell::new(None),
        coalescer: RefCell::new(TextCoalescer::new()),
        countdown: Rc::new(RefCell::new(IntervalSlot::default())),
    });

    {
        let mut engine = display.engine.borrow_mut();
        engine.set_countdown_enabled(display.els.countdown_toggle.checked());
        engine.appearance.flipped = display.els.flip_toggle.checked();
    }
    display.els.speed_slider.set_value(&display.engine.borrow().speed().to_string());
    display.render();

    {
        let d = display.clone();
        listen(display.els.script_input.as_ref(), "input", move |_: Event| {
            d.edit_text(d.els.script_input.value());
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.speed_slider.as_ref(), "input", move |_: Event| {
            if let Some(speed) = slider_value(&d.els.speed_slider) {
                d.run(|engine, _, _| engine.set_speed(speed));
            }
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.font_size_slider.as_ref(), "input", move |_: Event| {
            if let Some(size) = slider_value(&d.els.font_size_slider) {
                d.engine.borrow_mut().appearance.font_size = size;
                d.render();
            }
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.margin_slider.as_ref(), "input", move |_: Event| {
            if let Some(margin) = slider_value(&d.els.margin_slider) {
                d.engine.borrow_mut().appearance.margin = margin;
                d.render();
            }
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.guide_slider.as_ref(), "input", move |_: Event| {
            if let Some(height) = slider_value(&d.els.guide_slider) {
                d.engine.borrow_mut().appearance.guide_height = height;
                d.render();
            }
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.font_select.as_ref(), "change", move |_: Event| {
            d.engine.borrow_mut().appearance.font_family = d.els.font_select.value();
            d.render();
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.flip_toggle.as_ref(), "change", move |_: Event| {
            d.engine.borrow_mut().appearance.flipped = d.els.flip_toggle.checked();
            d.render();
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.countdown_toggle.as_ref(), "change", move |_: Event| {
            d.engine
                .borrow_mut()
                .set_countdown_enabled(d.els.countdown_toggle.checked());
        })?;
    }

    let buttons: [(&str, fn(&Rc<Display>)); 3] = [
        ("btnStart", |d| d.run(|engine, now, _| engine.start_immersive(now))),
        ("btnExit", |d| d.run(|engine, _, _| engine.exit_immersive())),
        ("btnClear", Display::confirm_clear),
    ];
    for (id, action) in buttons {
        let button: Element = get_element(&document, id)?;
        let d = display.clone();
        listen(button.as_ref(), "click", move |_: Event| action(&d))?;
    }

    {
        let d = display.clone();
        listen(document.as_ref(), "keydown", move |event: KeyboardEvent| {
            let Some(key) = key_from_event(&event) else {
                return;
            };
            let typing = d
                .document
                .active_element()
                .is_some_and(|element| element.id() == "scriptInput");
            if typing && !d.engine.borrow().is_immersive() {
                return;
            }
            event.prevent_default();
            d.run(|engine, now, max_scroll| engine.handle_key(key, now, max_scroll));
        })?;
    }
    {
        let d = display.clone();
        listen_active(display.els.display_area.as_ref(), "wheel", move |event: WheelEvent| {
            if d.engine.borrow().is_immersive() {
                event.prevent_default();
            }
            d.run(|engine, _, max_scroll| engine.wheel(event.delta_y(), max_scroll));
        })?;
    }
    {
        let d = display.clone();
        listen_active(display.els.display_area.as_ref(), "touchstart", move |event: TouchEvent| {
            if let Some(y) = first_touch_y(&event) {
                d.engine.borrow_mut().touch_start(y);
            }
        })?;
    }
    {
        let d = display.clone();
        listen_active(display.els.display_area.as_ref(), "touchmove", move |event: TouchEvent| {
            if !d.engine.borrow().is_immersive() {
                return;
            }
            event.prevent_default();
            if let Some(y) = first_touch_y(&event) {
                d.run(|engine, _, max_scroll| engine.touch_move(y, max_scroll));
            }
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.display_area.as_ref(), "touchend", move |_: TouchEvent| {
            d.run(|engine, now, _| engine.touch_end(now));
        })?;
    }
    {
        let d = display.clone();
        listen(display.els.display_area.as_ref(), "touchcancel", move |_: TouchEvent| {
            d.engine.borrow_mut().touch_cancel();
        })?;
    }

    if !is_served(&window) {
        web_sys::console::warn_1(&"Opened from disk; remote control disabled".into());
        display.set_connected(false);
        return Ok(());
    }

    display.load_qrcode();

    let d = display.clone();
    let sender = connect_ws(&window, Role::Display, ReconnectPolicy::display(), move |event| {
        match event {
            WsEvent::Open => {
                d.set_connected(true);
                d.run(|engine, _, _| engine.connected());
            }
            WsEvent::Close(code) if is_display_eviction(code) => d.set_replaced(),
            WsEvent::Close(_) | WsEvent::Error => d.set_connected(false),
            WsEvent::Message(message) => {
                d.run(|engine, now, max_scroll| engine.handle_message(message, now, max_scroll));
            }
        }
    })?;
    *display.sender.borrow_mut() = Some(sender);

    Ok(())
}
