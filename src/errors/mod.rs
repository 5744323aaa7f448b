// Module: Errors
// Error taxonomy for the journey core and the session collaborator.

use thiserror::Error;

/// Failures surfaced by the browser-session collaborator.
///
/// These are wire-level: the core only inspects them far enough to decide
/// whether a click was intercepted (and is worth one forced dispatch).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failure talking to the WebDriver endpoint.
    #[error("webdriver transport error: {0}")]
    Http(String),

    /// The remote end answered with a WebDriver error payload.
    #[error("webdriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    /// The remote end answered with something we could not interpret.
    #[error("invalid webdriver response: {0}")]
    InvalidResponse(String),
}

impl SessionError {
    /// True when a click bounced off an element rendered on top of the
    /// target. The resolver retries exactly once with a forced dispatch.
    pub fn is_click_intercepted(&self) -> bool {
        matches!(self, Self::WebDriver { error, .. } if error == "element click intercepted")
    }

    /// True when the failure only means "no element matched right now",
    /// which the resolver treats as a poll miss rather than an error.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Self::WebDriver { error, .. }
            if error == "no such element" || error == "stale element reference")
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Errors produced while executing the journey.
#[derive(Debug, Error)]
pub enum JourneyError {
    /// A required configuration value is absent. Fatal before the run
    /// starts; no browser session is created.
    #[error("required configuration '{0}' is missing")]
    ConfigurationMissing(&'static str),

    /// Every locator candidate exhausted its share of the step timeout.
    #[error("no element found within {timeout_ms}ms, tried: {tried:?}")]
    ElementNotFound { tried: Vec<String>, timeout_ms: u64 },

    /// An element resolved but acting on it failed, including the case
    /// where the forced-dispatch fallback also failed.
    #[error("interaction failed: {0}")]
    InteractionFailed(String),

    /// A soft URL check did not hold. Logged, never escalated.
    #[error("navigation unconfirmed: url '{url}' matched none of {patterns:?}")]
    NavigationUnconfirmed { url: String, patterns: Vec<String> },

    #[error(transparent)]
    Session(#[from] SessionError),
}
