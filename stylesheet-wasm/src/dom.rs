#![cfg(target_arch = "wasm32")]

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::future::LocalBoxFuture;
use js_sys::{Function, Promise};
use stylesheet_core::{Clock, DetectionStrategy, LinkSignal, LoadError, StyleHost, StyleLink};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{console, Document, ErrorEvent, Event, HtmlLinkElement, Window};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout, catch)]
    fn set_timeout(handler: &Function, timeout: i32) -> Result<i32, JsValue>;

    #[wasm_bindgen(js_name = clearTimeout)]
    fn clear_timeout(handle: i32);
}

/// The page's live document.
pub struct DomHost {
    window: Window,
    document: Document,
}

impl DomHost {
    /// `None` when there is no window or document (workers, Node).
    pub fn from_global() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }
}

impl StyleHost for DomHost {
    type Link = DomLink;

    fn link_hrefs(&self) -> Vec<String> {
        let Some(head) = self.document.head() else {
            return Vec::new();
        };

        let links = head.get_elements_by_tag_name("link");
        (0..links.length())
            .filter_map(|index| links.item(index))
            .filter_map(|element| element.dyn_into::<HtmlLinkElement>().ok())
            .map(|link| link.href())
            .collect()
    }

    fn user_agent(&self) -> Option<String> {
        self.window.navigator().user_agent().ok()
    }

    fn attach_link(
        &self,
        address: &str,
        strategy: DetectionStrategy,
    ) -> Result<DomLink, LoadError<JsValue>> {
        let head = self
            .document
            .head()
            .ok_or_else(|| LoadError::Host("document has no <head>".to_string()))?;

        let element: HtmlLinkElement = self
            .document
            .create_element("link")
            .map_err(host_error)?
            .dyn_into()
            .map_err(|_| LoadError::Host("created element is not a <link>".to_string()))?;
        element.set_type("text/css");
        element.set_rel("stylesheet");
        element.set_href(address);

        let (sender, signals) = mpsc::unbounded();

        let on_load = strategy.listens_for_load().then(|| {
            let sender = sender.clone();
            Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                let _ = sender.unbounded_send(LinkSignal::Loaded);
            })
        });
        let on_error = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let cause = event_error(&event);
            let _ = sender.unbounded_send(LinkSignal::Failed {
                message: cause.as_ref().map(describe_js_error),
                cause,
            });
        });

        if let Some(callback) = &on_load {
            element.set_onload(Some(callback.as_ref().unchecked_ref()));
        }
        element.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let link = DomLink {
            href: element.href(),
            element,
            signals,
            on_load,
            on_error: Some(on_error),
        };
        head.append_child(&link.element).map_err(host_error)?;

        Ok(link)
    }

    fn sheet_applied(&self, href: &str) -> bool {
        let sheets = self.document.style_sheets();
        (0..sheets.length())
            .filter_map(|index| sheets.item(index))
            .any(|sheet| matches!(sheet.href(), Ok(Some(sheet_href)) if sheet_href == href))
    }
}

/// A `<link>` appended by [`DomHost`]. Dropping it detaches its handlers.
pub struct DomLink {
    element: HtmlLinkElement,
    href: String,
    signals: UnboundedReceiver<LinkSignal<JsValue>>,
    on_load: Option<Closure<dyn FnMut(Event)>>,
    on_error: Option<Closure<dyn FnMut(Event)>>,
}

impl StyleLink for DomLink {
    type Failure = JsValue;

    fn href(&self) -> &str {
        &self.href
    }

    fn signals(&mut self) -> &mut UnboundedReceiver<LinkSignal<JsValue>> {
        &mut self.signals
    }

    fn neutralize(&mut self) {
        self.element.set_onload(None);
        self.element.set_onerror(None);
        self.on_load = None;
        self.on_error = None;
    }
}

impl Drop for DomLink {
    fn drop(&mut self) {
        self.neutralize();
    }
}

/// [`Clock`] on the global `setTimeout`, usable with or without a window.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerClock;

impl Clock for TimerClock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(TimeoutSleep::start(duration))
    }
}

struct TimeoutSleep {
    handle: Option<i32>,
    fired: JsFuture,
}

impl TimeoutSleep {
    fn start(duration: Duration) -> Self {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let mut handle = None;
        let promise = Promise::new(&mut |resolve, _reject| match set_timeout(&resolve, millis) {
            Ok(id) => handle = Some(id),
            Err(err) => console::error_1(&err),
        });

        Self {
            handle,
            fired: JsFuture::from(promise),
        }
    }
}

impl Future for TimeoutSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match Pin::new(&mut this.fired).poll(cx) {
            Poll::Ready(_) => {
                this.handle = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TimeoutSleep {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            clear_timeout(handle);
        }
    }
}

/// The event's own `error` value, when the browser attached one.
fn event_error(event: &Event) -> Option<JsValue> {
    let error = event.dyn_ref::<ErrorEvent>()?.error();
    (!error.is_undefined() && !error.is_null()).then_some(error)
}

/// Readable text for a JS error value.
fn describe_js_error(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.to_string());
    }
    if let Some(text) = value.as_string() {
        return text;
    }
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|json| json.as_string())
        .unwrap_or_else(|| "non-serializable error value".to_string())
}

fn host_error(err: JsValue) -> LoadError<JsValue> {
    LoadError::Host(describe_js_error(&err))
}
