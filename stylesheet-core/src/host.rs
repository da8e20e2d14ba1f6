use std::time::Duration;

use futures::channel::mpsc::UnboundedReceiver;
use futures::future::LocalBoxFuture;

use crate::{DetectionStrategy, LoadError};

/// Signal raised by a link element while its stylesheet loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSignal<F> {
    Loaded,
    /// `message` describes the failure for logs; `cause` is the platform's
    /// own error value, handed back to the caller untouched.
    Failed {
        message: Option<String>,
        cause: Option<F>,
    },
}

/// Error payload type of the links a host creates.
pub type FailureOf<H> = <<H as StyleHost>::Link as StyleLink>::Failure;

/// The document the loader attaches stylesheets to.
pub trait StyleHost {
    type Link: StyleLink;

    /// Hrefs of the `<link>` elements currently in `<head>`.
    fn link_hrefs(&self) -> Vec<String>;

    fn user_agent(&self) -> Option<String>;

    /// Creates `<link type="text/css" rel="stylesheet" href=address>` and
    /// appends it to `<head>`. The native `load` event is only wired when
    /// the strategy listens for it; `error` is always wired.
    fn attach_link(
        &self,
        address: &str,
        strategy: DetectionStrategy,
    ) -> Result<Self::Link, LoadError<FailureOf<Self>>>;

    /// Whether the document's stylesheet list has an entry with this href.
    fn sheet_applied(&self, href: &str) -> bool;
}

/// Handle on a link element created by [`StyleHost::attach_link`].
pub trait StyleLink {
    /// Error value the platform attaches to a failed load.
    type Failure;

    /// The href as resolved by the document.
    fn href(&self) -> &str;

    fn signals(&mut self) -> &mut UnboundedReceiver<LinkSignal<Self::Failure>>;

    /// Detaches the element's handlers so later events are dropped.
    fn neutralize(&mut self);
}

/// Timer source for timeouts, polling and the grace delay.
pub trait Clock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// [`Clock`] backed by the tokio timer.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
