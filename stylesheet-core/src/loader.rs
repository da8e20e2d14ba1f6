use futures::channel::mpsc::UnboundedReceiver;
use futures::future::{self, Either};
use futures::{pin_mut, StreamExt};
use tracing::{debug, warn};

use crate::{
    Clock, DetectionStrategy, FailureOf, KnownStylesheets, LinkSignal, LoadError, LoaderConfig,
    StyleHost, StyleLink, StyleSheetRequest, GENERIC_LOAD_ERROR,
};

/// State captured once when a loader starts and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderContext {
    known: KnownStylesheets,
    strategy: DetectionStrategy,
}

impl Default for LoaderContext {
    fn default() -> Self {
        Self {
            known: KnownStylesheets::default(),
            strategy: DetectionStrategy::EventBased,
        }
    }
}

impl LoaderContext {
    pub fn new(known: KnownStylesheets, strategy: DetectionStrategy) -> Self {
        Self { known, strategy }
    }

    /// Snapshots the host's linked stylesheets and settles the strategy,
    /// honouring `config.detection` over the user agent probe.
    pub fn capture<H: StyleHost>(host: &H, config: &LoaderConfig) -> Self {
        let known = host.link_hrefs().into_iter().collect();
        let strategy = config
            .detection
            .unwrap_or_else(|| DetectionStrategy::probe(host.user_agent().as_deref()));
        Self { known, strategy }
    }

    pub fn known(&self) -> &KnownStylesheets {
        &self.known
    }

    pub fn strategy(&self) -> DetectionStrategy {
        self.strategy
    }
}

/// Loads stylesheets into a [`StyleHost`] and resolves once they apply.
///
/// A loader without a host is a no-op: every fetch succeeds immediately.
/// Concurrent fetches of the same fresh address are not merged; each one
/// attaches its own link element.
pub struct StyleSheetLoader<H, C> {
    host: Option<H>,
    context: LoaderContext,
    clock: C,
    config: LoaderConfig,
}

impl<H: StyleHost, C: Clock> StyleSheetLoader<H, C> {
    pub fn new(host: H, context: LoaderContext, clock: C, config: LoaderConfig) -> Self {
        Self {
            host: Some(host),
            context,
            clock,
            config,
        }
    }

    /// Builds a loader whose context is captured from `host` right now.
    pub fn attach(host: H, clock: C, config: LoaderConfig) -> Self {
        let context = LoaderContext::capture(&host, &config);
        Self::new(host, context, clock, config)
    }

    /// Loader for environments without a document.
    pub fn headless(clock: C, config: LoaderConfig) -> Self {
        Self {
            host: None,
            context: LoaderContext::default(),
            clock,
            config,
        }
    }

    pub fn is_headless(&self) -> bool {
        self.host.is_none()
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn context(&self) -> &LoaderContext {
        &self.context
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Whether `address` was already linked when the context was captured.
    pub fn is_known(&self, address: &str) -> bool {
        self.context.known.contains(address)
    }

    /// Ensures the stylesheet at `request.address` is linked and applied.
    ///
    /// Resolves with an empty string. Fails with [`LoadError::BrowserLoad`]
    /// carrying the host's error value when the link reports an error, and
    /// with [`LoadError::Timeout`] when nothing is observed within the
    /// configured timeout. The link element stays in the document in every
    /// case.
    pub async fn fetch(
        &self,
        request: &StyleSheetRequest,
    ) -> Result<String, LoadError<FailureOf<H>>> {
        let address = request.address.as_str();

        let Some(host) = self.host.as_ref() else {
            debug!(address, "no document available, skipping stylesheet");
            return Ok(String::new());
        };

        if self.is_known(address) {
            debug!(address, "stylesheet already linked at startup");
            return Ok(String::new());
        }

        let mut link = host.attach_link(address, self.context.strategy)?;
        debug!(
            address,
            href = link.href(),
            strategy = ?self.context.strategy,
            "stylesheet link attached"
        );

        let signal = {
            let detection = self.detect(host, &mut link);
            pin_mut!(detection);
            let outcome =
                future::select(detection, self.clock.sleep(self.config.timeout())).await;
            match outcome {
                Either::Left((signal, _)) => Some(signal),
                Either::Right(_) => None,
            }
        };

        link.neutralize();

        let Some(signal) = signal else {
            warn!(
                address,
                timeout_ms = self.config.timeout_ms,
                "stylesheet did not load before the timeout"
            );
            return Err(LoadError::Timeout);
        };

        self.clock.sleep(self.config.grace()).await;

        match signal {
            LinkSignal::Loaded => {
                debug!(address, "stylesheet applied");
                Ok(String::new())
            }
            LinkSignal::Failed { message, cause } => {
                let message = message.unwrap_or_else(|| GENERIC_LOAD_ERROR.to_string());
                warn!(address, %message, "stylesheet failed to load");
                Err(LoadError::BrowserLoad { message, cause })
            }
        }
    }

    async fn detect(&self, host: &H, link: &mut H::Link) -> LinkSignal<FailureOf<H>> {
        match self.context.strategy {
            DetectionStrategy::EventBased => next_signal(link.signals(), |_| true).await,
            DetectionStrategy::Polling => {
                let href = link.href().to_owned();
                let applied = self.poll_until_applied(host, &href);
                let failed = next_signal(link.signals(), |signal| {
                    matches!(signal, LinkSignal::Failed { .. })
                });
                pin_mut!(applied, failed);
                let outcome = future::select(applied, failed).await;
                match outcome {
                    Either::Left((signal, _)) | Either::Right((signal, _)) => signal,
                }
            }
        }
    }

    async fn poll_until_applied(&self, host: &H, href: &str) -> LinkSignal<FailureOf<H>> {
        loop {
            self.clock.sleep(self.config.poll_interval()).await;
            if host.sheet_applied(href) {
                return LinkSignal::Loaded;
            }
        }
    }
}

async fn next_signal<F>(
    signals: &mut UnboundedReceiver<LinkSignal<F>>,
    accept: impl Fn(&LinkSignal<F>) -> bool,
) -> LinkSignal<F> {
    while let Some(signal) = signals.next().await {
        if accept(&signal) {
            return signal;
        }
    }
    // The host dropped its sender; only the timeout can end the request.
    future::pending().await
}
