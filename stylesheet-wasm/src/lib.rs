//! Bridge exposing the stylesheet loader to JavaScript.

use serde::Deserialize;
use stylesheet_core::{DetectionStrategy, LoaderConfig};

#[cfg(target_arch = "wasm32")]
mod dom;

/// Loader options as passed from JavaScript. Missing fields keep defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsLoaderConfig {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub grace_ms: Option<u64>,
    #[serde(default)]
    pub detection: Option<DetectionStrategy>,
}

impl From<JsLoaderConfig> for LoaderConfig {
    fn from(cfg: JsLoaderConfig) -> Self {
        let mut base = LoaderConfig::default();
        if let Some(ms) = cfg.timeout_ms {
            base.timeout_ms = ms;
        }
        if let Some(ms) = cfg.poll_interval_ms {
            base.poll_interval_ms = ms;
        }
        if let Some(ms) = cfg.grace_ms {
            base.grace_ms = ms;
        }
        if cfg.detection.is_some() {
            base.detection = cfg.detection;
        }
        base
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_bridge {
    use std::rc::Rc;

    use js_sys::Promise;
    use serde_wasm_bindgen::from_value;
    use stylesheet_core::{
        DetectionStrategy, LoadError, LoaderConfig, StyleSheetLoader, StyleSheetRequest,
    };
    use tracing::debug;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::future_to_promise;

    use crate::dom::{DomHost, TimerClock};
    use crate::JsLoaderConfig;

    type DomLoader = StyleSheetLoader<DomHost, TimerClock>;

    thread_local! {
        static DEFAULT_LOADER: Rc<DomLoader> = Rc::new(build_loader(LoaderConfig::default()));
    }

    /// Captures the default loader's snapshot when the module is instantiated.
    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        DEFAULT_LOADER.with(|_| ());
    }

    /// Loads `{ address }` with the default loader.
    ///
    /// The promise resolves with `""`. A timeout rejects with the string
    /// `"Unable to load CSS"`, a link error with the browser's own error
    /// value, anything else with an `Error`.
    ///
    /// Exported as `loadStylesheet`: the `--target web` glue calls the
    /// global `fetch` unqualified to download the module.
    #[wasm_bindgen(js_name = loadStylesheet)]
    pub fn fetch(request: JsValue) -> Result<Promise, JsValue> {
        let request = parse_request(request)?;
        let loader = DEFAULT_LOADER.with(Rc::clone);
        Ok(spawn_fetch(loader, request))
    }

    /// Loader with its own configuration and startup snapshot.
    #[wasm_bindgen]
    pub struct CssLoader {
        inner: Rc<DomLoader>,
    }

    #[wasm_bindgen]
    impl CssLoader {
        #[wasm_bindgen(constructor)]
        pub fn new(config: Option<JsValue>) -> Result<CssLoader, JsValue> {
            console_error_panic_hook::set_once();

            let cfg = match config {
                Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
                    let cfg: JsLoaderConfig = from_value(js_cfg).map_err(|err| {
                        JsValue::from_str(&format!("Invalid loader config: {err}"))
                    })?;
                    LoaderConfig::from(cfg)
                }
                _ => LoaderConfig::default(),
            };

            Ok(CssLoader {
                inner: Rc::new(build_loader(cfg)),
            })
        }

        pub fn fetch(&self, request: JsValue) -> Result<Promise, JsValue> {
            let request = parse_request(request)?;
            Ok(spawn_fetch(Rc::clone(&self.inner), request))
        }

        #[wasm_bindgen(js_name = isKnown)]
        pub fn is_known(&self, address: &str) -> bool {
            self.inner.is_known(address)
        }

        #[wasm_bindgen(js_name = isHeadless)]
        pub fn is_headless(&self) -> bool {
            self.inner.is_headless()
        }

        pub fn strategy(&self) -> String {
            match self.inner.context().strategy() {
                DetectionStrategy::EventBased => "events".to_string(),
                DetectionStrategy::Polling => "polling".to_string(),
            }
        }
    }

    fn build_loader(config: LoaderConfig) -> DomLoader {
        match DomHost::from_global() {
            Some(host) => {
                let loader = StyleSheetLoader::attach(host, TimerClock, config);
                debug!(
                    known = loader.context().known().len(),
                    strategy = ?loader.context().strategy(),
                    "stylesheet snapshot captured"
                );
                loader
            }
            None => {
                debug!("no document available, stylesheet loader is a no-op");
                StyleSheetLoader::headless(TimerClock, config)
            }
        }
    }

    fn parse_request(request: JsValue) -> Result<StyleSheetRequest, JsValue> {
        from_value(request)
            .map_err(|err| JsValue::from_str(&format!("Invalid stylesheet request: {err}")))
    }

    fn spawn_fetch(loader: Rc<DomLoader>, request: StyleSheetRequest) -> Promise {
        future_to_promise(async move {
            loader
                .fetch(&request)
                .await
                .map(|css| JsValue::from_str(&css))
                .map_err(load_error_to_js)
        })
    }

    fn load_error_to_js(err: LoadError<JsValue>) -> JsValue {
        match err {
            timeout @ LoadError::Timeout => JsValue::from_str(&timeout.to_string()),
            LoadError::BrowserLoad {
                cause: Some(cause), ..
            } => cause,
            other => js_sys::Error::new(&other.to_string()).into(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_bridge::{fetch, CssLoader};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_js_config_keeps_defaults() {
        let cfg: JsLoaderConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(LoaderConfig::from(cfg), LoaderConfig::default());
    }

    #[test]
    fn partial_js_config_overlays_defaults() {
        let cfg: JsLoaderConfig = serde_json::from_value(json!({
            "timeoutMs": 5000,
            "detection": "polling"
        }))
        .unwrap();

        let config = LoaderConfig::from(cfg);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.grace_ms, 7);
        assert_eq!(config.detection, Some(DetectionStrategy::Polling));
    }

    #[test]
    fn unknown_detection_name_is_rejected() {
        let parsed = serde_json::from_value::<JsLoaderConfig>(json!({ "detection": "sniff" }));
        assert!(parsed.is_err());
    }
}
