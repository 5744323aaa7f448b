// Module: Session
// The injected browser capability set. The journey core only ever talks to
// this trait; it never constructs or configures a browser process.

pub mod webdriver;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::errors::SessionError;
use crate::locator::Locator;

/// Opaque reference to a live DOM element held by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Capability set the journey core is given for the duration of one run.
///
/// `find`/`find_all` answer "what matches right now" and never wait; all
/// waiting lives in the resolver. `dispatch_click` bypasses hit-testing and
/// exists solely as the one-shot fallback for intercepted clicks.
#[async_trait]
pub trait DriverSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// First element matching the locator, or `None` if nothing matches.
    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>, SessionError>;

    /// All elements matching the locator, in document order.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError>;

    /// First element matching the locator relative to `scope`.
    async fn find_within(
        &self,
        scope: &ElementHandle,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, SessionError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), SessionError>;

    /// Forced click dispatched straight to the target, bypassing hit-testing.
    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), SessionError>;

    async fn clear(&self, element: &ElementHandle) -> Result<(), SessionError>;

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError>;

    /// Sends the Enter key to the element.
    async fn press_enter(&self, element: &ElementHandle) -> Result<(), SessionError>;

    /// Visible text of the element, untrimmed.
    async fn text(&self, element: &ElementHandle) -> Result<String, SessionError>;

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, SessionError>;

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    async fn title(&self) -> Result<String, SessionError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;

    /// Ends the session. Called exactly once, after operator acknowledgement.
    async fn quit(&self) -> Result<(), SessionError>;
}
