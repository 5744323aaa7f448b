// Scripted in-memory session used by the resolver and executor tests.
// Nodes are keyed by locator expression; relative probes are keyed by
// (element key, probe expression). No browser, no network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::SessionError;
use crate::locator::Locator;
use crate::session::{DriverSession, ElementHandle};

#[derive(Debug, Clone)]
pub struct FakeNode {
    /// Number of elements this locator matches.
    pub count: usize,
    pub displayed: bool,
    pub enabled: bool,
    pub text: String,
    /// Number of `find`/`find_all` calls that miss before the node appears.
    pub appears_after: u32,
    /// Direct clicks bounce with "element click intercepted".
    pub intercept_clicks: bool,
    /// The forced dispatch fails too (script error).
    pub fail_dispatch: bool,
    /// Clicking removes the node from the page.
    pub vanish_on_click: bool,
    /// Clicking navigates the page to this URL.
    pub on_click_url: Option<String>,
}

impl Default for FakeNode {
    fn default() -> Self {
        Self {
            count: 1,
            displayed: true,
            enabled: true,
            text: String::new(),
            appears_after: 0,
            intercept_clicks: false,
            fail_dispatch: false,
            vanish_on_click: false,
            on_click_url: None,
        }
    }
}

impl FakeNode {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, FakeNode>,
    relative: HashMap<(String, String), String>,
    url: String,
    title: String,
    clicks: Vec<String>,
    dispatched: Vec<String>,
    typed: Vec<(String, String)>,
    cleared: Vec<String>,
    enters: Vec<String>,
    screenshots: usize,
    quit: bool,
}

#[derive(Default)]
pub struct FakeSession {
    inner: Mutex<Inner>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, expr: &str, node: FakeNode) {
        self.inner.lock().unwrap().nodes.insert(expr.to_string(), node);
    }

    pub fn remove(&self, expr: &str) {
        self.inner.lock().unwrap().nodes.remove(expr);
    }

    /// Scripts the text a relative probe resolves to under an element.
    pub fn insert_relative(&self, scope_expr: &str, probe_expr: &str, text: &str) {
        self.inner
            .lock()
            .unwrap()
            .relative
            .insert((scope_expr.to_string(), probe_expr.to_string()), text.to_string());
    }

    pub fn clicks(&self) -> Vec<String> {
        self.inner.lock().unwrap().clicks.clone()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.inner.lock().unwrap().dispatched.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().typed.clone()
    }

    pub fn enters(&self) -> Vec<String> {
        self.inner.lock().unwrap().enters.clone()
    }

    pub fn cleared(&self) -> Vec<String> {
        self.inner.lock().unwrap().cleared.clone()
    }

    pub fn screenshots_taken(&self) -> usize {
        self.inner.lock().unwrap().screenshots
    }

    pub fn quit_called(&self) -> bool {
        self.inner.lock().unwrap().quit
    }

    fn base_key(handle: &ElementHandle) -> String {
        handle.id().split('#').next().unwrap_or_default().to_string()
    }

    fn apply_click(&self, handle: &ElementHandle, forced: bool) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        let key = Self::base_key(handle);
        let node = inner.nodes.get(&key).cloned();

        if let Some(node) = &node {
            if node.intercept_clicks && !forced {
                inner.clicks.push(handle.id().to_string());
                return Err(SessionError::WebDriver {
                    error: "element click intercepted".into(),
                    message: format!("element {key} is obscured"),
                });
            }
            if node.fail_dispatch && forced {
                return Err(SessionError::WebDriver {
                    error: "javascript error".into(),
                    message: format!("script click on {key} threw"),
                });
            }
        }

        if forced {
            inner.dispatched.push(handle.id().to_string());
        } else {
            inner.clicks.push(handle.id().to_string());
        }

        if let Some(node) = node {
            if node.vanish_on_click {
                inner.nodes.remove(&key);
            }
            if let Some(url) = node.on_click_url {
                inner.url = url;
            }
        }
        Ok(())
    }

    fn lookup(&self, locator: &Locator, want: usize) -> Vec<ElementHandle> {
        let mut inner = self.inner.lock().unwrap();
        let Some(node) = inner.nodes.get_mut(&locator.expr) else {
            return Vec::new();
        };
        if node.appears_after > 0 {
            node.appears_after -= 1;
            return Vec::new();
        }
        (0..node.count.min(want))
            .map(|i| ElementHandle(format!("{}#{}", locator.expr, i)))
            .collect()
    }
}

#[async_trait]
impl DriverSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        inner.url = url.to_string();
        inner.title = "Storefront".to_string();
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>, SessionError> {
        Ok(self.lookup(locator, 1).into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        Ok(self.lookup(locator, usize::MAX))
    }

    async fn find_within(
        &self,
        scope: &ElementHandle,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, SessionError> {
        let inner = self.inner.lock().unwrap();
        let key = (Self::base_key(scope), locator.expr.clone());
        Ok(inner
            .relative
            .contains_key(&key)
            .then(|| ElementHandle(format!("{}>>{}#0", key.0, key.1))))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.apply_click(element, false)
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.apply_click(element, true)
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.inner.lock().unwrap().cleared.push(element.id().to_string());
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError> {
        self.inner
            .lock()
            .unwrap()
            .typed
            .push((element.id().to_string(), text.to_string()));
        Ok(())
    }

    async fn press_enter(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.inner.lock().unwrap().enters.push(element.id().to_string());
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, SessionError> {
        let inner = self.inner.lock().unwrap();
        if let Some((scope, rest)) = element.id().split_once(">>") {
            let probe = rest.split('#').next().unwrap_or_default();
            return inner
                .relative
                .get(&(scope.to_string(), probe.to_string()))
                .cloned()
                .ok_or_else(|| SessionError::WebDriver {
                    error: "stale element reference".into(),
                    message: format!("no probe {probe} under {scope}"),
                });
        }
        let key = element.id().split('#').next().unwrap_or_default();
        Ok(inner.nodes.get(key).map(|n| n.text.clone()).unwrap_or_default())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, SessionError> {
        let inner = self.inner.lock().unwrap();
        let key = Self::base_key(element);
        Ok(inner.nodes.get(&key).map(|n| n.displayed).unwrap_or(true))
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, SessionError> {
        let inner = self.inner.lock().unwrap();
        let key = Self::base_key(element);
        Ok(inner.nodes.get(&key).map(|n| n.enabled).unwrap_or(true))
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.inner.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self.inner.lock().unwrap().title.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.inner.lock().unwrap().screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&self) -> Result<(), SessionError> {
        self.inner.lock().unwrap().quit = true;
        Ok(())
    }
}
