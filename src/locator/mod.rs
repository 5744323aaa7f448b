// Module: Locator
// Candidate locator expressions and the polling resolver that turns an
// ordered fallback chain into one element within a bounded time budget.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::errors::{JourneyError, SessionError};
use crate::session::{DriverSession, ElementHandle};

/// Query language a candidate expression is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum By {
    XPath,
    Css,
    Name,
    TagName,
}

/// One expression identifying zero-or-more DOM elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub by: By,
    pub expr: String,
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self { by: By::XPath, expr: expr.into() }
    }

    pub fn css(expr: impl Into<String>) -> Self {
        Self { by: By::Css, expr: expr.into() }
    }

    pub fn name(expr: impl Into<String>) -> Self {
        Self { by: By::Name, expr: expr.into() }
    }

    pub fn tag(expr: impl Into<String>) -> Self {
        Self { by: By::TagName, expr: expr.into() }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = match self.by {
            By::XPath => "xpath",
            By::Css => "css",
            By::Name => "name",
            By::TagName => "tag",
        };
        write!(f, "{}:{}", by, self.expr)
    }
}

/// What "usable" means for a candidate: merely present in the document, or
/// present, visible and accepting input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Presence,
    Actionable,
}

/// A locator plus the intent it must satisfy. Candidates are tried in
/// declared order; the first to resolve wins.
#[derive(Debug, Clone)]
pub struct LocatorCandidate {
    pub locator: Locator,
    pub intent: Intent,
}

impl LocatorCandidate {
    pub fn presence(locator: Locator) -> Self {
        Self { locator, intent: Intent::Presence }
    }

    pub fn actionable(locator: Locator) -> Self {
        Self { locator, intent: Intent::Actionable }
    }
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls the live page until a candidate resolves or the budget runs out.
///
/// The step's total timeout is divided evenly across the remaining untried
/// candidates, so an early candidate's failure cannot starve later ones,
/// and the total wall-clock never exceeds the timeout plus one poll
/// interval of slack.
pub struct Resolver {
    poll_interval: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Resolver {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Resolves the first candidate in `candidates` that satisfies its
    /// intent within its share of `timeout`. First match wins.
    pub async fn resolve(
        &self,
        session: &dyn DriverSession,
        candidates: &[LocatorCandidate],
        timeout: Duration,
    ) -> Result<ElementHandle, JourneyError> {
        let deadline = Instant::now() + timeout;
        for (idx, candidate) in candidates.iter().enumerate() {
            let share = Self::share(deadline, candidates.len() - idx);
            let candidate_deadline = Instant::now() + share;
            trace!(candidate = %candidate.locator, budget_ms = share.as_millis() as u64, "trying candidate");

            loop {
                if let Some(element) = self.check(session, candidate).await? {
                    debug!(candidate = %candidate.locator, "candidate resolved");
                    return Ok(element);
                }
                if Instant::now() + self.poll_interval >= candidate_deadline {
                    break;
                }
                sleep(self.poll_interval).await;
            }
        }

        Err(Self::not_found(candidates, timeout))
    }

    /// Companion to [`Resolver::resolve`] for steps acting on the Nth match
    /// among many structurally-similar elements: polls one candidate source
    /// until at least `min_count` elements match.
    pub async fn resolve_all(
        &self,
        session: &dyn DriverSession,
        candidate: &LocatorCandidate,
        min_count: usize,
        timeout: Duration,
    ) -> Result<Vec<ElementHandle>, JourneyError> {
        let deadline = Instant::now() + timeout;
        loop {
            let matches = match session.find_all(&candidate.locator).await {
                Ok(matches) => matches,
                Err(err) if err.is_no_such_element() => Vec::new(),
                Err(err) => return Err(err.into()),
            };
            if matches.len() >= min_count {
                return Ok(matches);
            }
            if Instant::now() + self.poll_interval >= deadline {
                return Err(Self::not_found(std::slice::from_ref(candidate), timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Resolves the `index`-th match of the first candidate source that
    /// produces more than `index` matches, slicing the timeout across
    /// sources the same way `resolve` does.
    pub async fn resolve_nth(
        &self,
        session: &dyn DriverSession,
        candidates: &[LocatorCandidate],
        index: usize,
        timeout: Duration,
    ) -> Result<ElementHandle, JourneyError> {
        let deadline = Instant::now() + timeout;
        for (idx, candidate) in candidates.iter().enumerate() {
            let share = Self::share(deadline, candidates.len() - idx);
            match self.resolve_all(session, candidate, index + 1, share).await {
                Ok(mut matches) => return Ok(matches.swap_remove(index)),
                Err(JourneyError::ElementNotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Self::not_found(candidates, timeout))
    }

    /// Polls until no candidate matches any element. Used for "this prompt
    /// is no longer on screen" confirmations. Returns whether absence was
    /// observed within the timeout.
    pub async fn wait_for_absence(
        &self,
        session: &dyn DriverSession,
        candidates: &[LocatorCandidate],
        timeout: Duration,
    ) -> Result<bool, JourneyError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut any_present = false;
            for candidate in candidates {
                if self.check(session, candidate).await?.is_some() {
                    any_present = true;
                    break;
                }
            }
            if !any_present {
                return Ok(true);
            }
            if Instant::now() + self.poll_interval >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// One non-waiting probe of a candidate against the live page.
    async fn check(
        &self,
        session: &dyn DriverSession,
        candidate: &LocatorCandidate,
    ) -> Result<Option<ElementHandle>, JourneyError> {
        let found = match session.find(&candidate.locator).await {
            Ok(found) => found,
            Err(err) if err.is_no_such_element() => None,
            Err(err) => return Err(err.into()),
        };
        let Some(element) = found else {
            return Ok(None);
        };
        match candidate.intent {
            Intent::Presence => Ok(Some(element)),
            Intent::Actionable => {
                match self.is_actionable(session, &element).await {
                    Ok(true) => Ok(Some(element)),
                    Ok(false) => Ok(None),
                    // The element went away between find and check.
                    Err(err) if err.is_no_such_element() => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn is_actionable(
        &self,
        session: &dyn DriverSession,
        element: &ElementHandle,
    ) -> Result<bool, SessionError> {
        Ok(session.is_displayed(element).await? && session.is_enabled(element).await?)
    }

    fn share(deadline: Instant, remaining_candidates: usize) -> Duration {
        let remaining = deadline.saturating_duration_since(Instant::now());
        remaining / remaining_candidates.max(1) as u32
    }

    fn not_found(candidates: &[LocatorCandidate], timeout: Duration) -> JourneyError {
        JourneyError::ElementNotFound {
            tried: candidates.iter().map(|c| c.locator.to_string()).collect(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

/// Clicks an element, retrying exactly once with a forced hit-test-bypassing
/// dispatch if the direct click was intercepted by an overlaying element.
pub async fn click_with_fallback(
    session: &dyn DriverSession,
    element: &ElementHandle,
) -> Result<(), JourneyError> {
    match session.click(element).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_click_intercepted() => {
            debug!(element = element.id(), "click intercepted, forcing dispatch");
            session
                .dispatch_click(element)
                .await
                .map_err(|err| JourneyError::InteractionFailed(err.to_string()))
        }
        Err(err) => Err(JourneyError::InteractionFailed(err.to_string())),
    }
}
