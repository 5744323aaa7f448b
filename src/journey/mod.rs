// Module: Journey
// The ordered step table's execution engine. Control flows strictly forward;
// values captured early are carried to the final summary in JourneyState.

pub mod steps;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::checkpoints::Checkpointer;
use crate::errors::JourneyError;
use crate::locator::{click_with_fallback, Locator, LocatorCandidate, Resolver};
use crate::session::DriverSession;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Collapses runs of whitespace and trims, so captured UI text is stable.
fn normalize(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Whether a step's failure aborts the run or is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Unresolved locator or interaction error stops the run.
    Abort,
    /// The failure is logged and the journey proceeds, leaving any
    /// captured value unset.
    Soft,
}

/// Which JourneyState field a captured value lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSlot {
    Restaurant,
    Item,
    CartTotal,
}

/// The interaction a step performs once its locator resolves.
#[derive(Debug, Clone)]
pub enum Interaction {
    /// Navigate the session to a URL and wait briefly for a title.
    Navigate { url: String },
    /// Resolve only; the wait itself is the point (e.g. menu rendered).
    Await,
    /// Click the resolved element, forcing a dispatch if intercepted.
    Click,
    /// Click the resolved element, or press Enter on a fallback field when
    /// no clickable candidate resolves.
    ClickOrEnter { fallback_field: Vec<LocatorCandidate> },
    /// Click the resolved element, or type the keys into a fallback target
    /// when no clickable candidate resolves (e.g. the "/" search shortcut
    /// sent to the page body).
    ClickOrType {
        fallback_field: Vec<LocatorCandidate>,
        keys: String,
    },
    /// Clear the resolved field and type the payload.
    TypeText { text: String, then_enter: bool },
    /// Type, then click the first matching suggestion, falling back to
    /// Enter when no suggestion appears in time.
    TypeAndPick {
        text: String,
        suggestion: Vec<LocatorCandidate>,
        pick_within: Duration,
    },
    /// Click the resolved element, first capturing text from the first
    /// descendant probe that matches.
    ClickCapturing {
        probes: Vec<Locator>,
        slot: CaptureSlot,
        fallback: Option<String>,
    },
    /// Resolve all matches of the step candidates and click the `index`-th,
    /// capturing a name from a probe relative to it.
    ClickNth {
        index: usize,
        probes: Vec<Locator>,
        slot: CaptureSlot,
        fallback: Option<String>,
    },
    /// Read the resolved element's trimmed text into a capture slot.
    ReadText { slot: CaptureSlot },
    /// Confirm the step candidates no longer match anything on the page.
    ExpectGone,
    /// Fixed, non-polled pause for an out-of-band human action. There is no
    /// observable completion condition, so it is never polled.
    HumanPause { duration: Duration, prompt: String },
    /// Confirm the current URL matches one of the patterns. Soft-only.
    ConfirmUrl { patterns: Vec<String> },
}

/// One ordered unit of the journey, defined once at startup and immutable
/// for the run.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: &'static str,
    pub candidates: Vec<LocatorCandidate>,
    pub interaction: Interaction,
    pub timeout: Duration,
    pub policy: FailurePolicy,
    /// Persist a visual checkpoint after this step succeeds.
    pub checkpoint_after: bool,
}

/// Mutable accumulator carried across steps. Fields are write-once for the
/// run: later steps never overwrite an already-captured value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JourneyState {
    pub restaurant_name: Option<String>,
    pub item_name: Option<String>,
    pub cart_total: Option<String>,
    pub checkpoints: u32,
}

impl JourneyState {
    pub fn capture(&mut self, slot: CaptureSlot, value: &str) {
        let value = normalize(value);
        if value.is_empty() {
            return;
        }
        let field = match slot {
            CaptureSlot::Restaurant => &mut self.restaurant_name,
            CaptureSlot::Item => &mut self.item_name,
            CaptureSlot::CartTotal => &mut self.cart_total,
        };
        if field.is_none() {
            *field = Some(value);
        } else {
            debug!(?slot, "value already captured, keeping first");
        }
    }
}

/// Terminal record of one journey run, produced exactly once.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub success: bool,
    pub failed_step: Option<String>,
    pub cause: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub state: JourneyState,
}

const NAVIGATION_TITLE_WAIT: Duration = Duration::from_secs(5);
const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Executes the step table against an injected session, applying each
/// step's failure policy. Owns the session exclusively for the run.
pub struct JourneyExecutor {
    session: Arc<dyn DriverSession>,
    resolver: Resolver,
    checkpoints: Arc<dyn Checkpointer>,
}

impl JourneyExecutor {
    pub fn new(
        session: Arc<dyn DriverSession>,
        resolver: Resolver,
        checkpoints: Arc<dyn Checkpointer>,
    ) -> Self {
        Self { session, resolver, checkpoints }
    }

    /// Runs the steps strictly in order. An `Abort` step's failure is
    /// terminal; `Soft` failures are logged and skipped over.
    pub async fn run(&self, steps: &[Step]) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = JourneyState::default();
        let mut failure: Option<(String, JourneyError)> = None;

        for step in steps {
            info!(step = step.id, "running step");
            match self.execute_step(step, &mut state).await {
                Ok(()) => {
                    if step.checkpoint_after {
                        self.checkpoint(step.id, &mut state).await;
                    }
                }
                Err(err) => match step.policy {
                    FailurePolicy::Abort => {
                        error!(step = step.id, error = %err, "abort-policy step failed, stopping run");
                        failure = Some((step.id.to_string(), err));
                        break;
                    }
                    FailurePolicy::Soft => {
                        warn!(step = step.id, error = %err, "soft-policy step failed, continuing");
                    }
                },
            }
        }

        let (failed_step, cause) = match failure {
            Some((step, err)) => (Some(step), Some(err.to_string())),
            None => (None, None),
        };
        RunResult {
            run_id,
            success: failed_step.is_none(),
            failed_step,
            cause,
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            state,
        }
    }

    #[instrument(skip_all, fields(step = step.id))]
    async fn execute_step(
        &self,
        step: &Step,
        state: &mut JourneyState,
    ) -> Result<(), JourneyError> {
        let session = self.session.as_ref();
        match &step.interaction {
            Interaction::Navigate { url } => {
                session
                    .navigate(url)
                    .await
                    .map_err(|e| JourneyError::InteractionFailed(e.to_string()))?;
                self.await_title().await;
                Ok(())
            }

            Interaction::Await => {
                self.resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                Ok(())
            }

            Interaction::Click => {
                let element = self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                click_with_fallback(session, &element).await
            }

            Interaction::ClickOrEnter { fallback_field } => {
                match self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await
                {
                    Ok(element) => click_with_fallback(session, &element).await,
                    Err(JourneyError::ElementNotFound { .. }) => {
                        debug!(step = step.id, "no clickable candidate, sending Enter instead");
                        let field = self
                            .resolver
                            .resolve(session, fallback_field, step.timeout)
                            .await?;
                        session
                            .press_enter(&field)
                            .await
                            .map_err(|e| JourneyError::InteractionFailed(e.to_string()))
                    }
                    Err(err) => Err(err),
                }
            }

            Interaction::ClickOrType { fallback_field, keys } => {
                match self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await
                {
                    Ok(element) => click_with_fallback(session, &element).await,
                    Err(JourneyError::ElementNotFound { .. }) => {
                        debug!(step = step.id, keys, "no clickable candidate, typing shortcut");
                        let target = self
                            .resolver
                            .resolve(session, fallback_field, step.timeout)
                            .await?;
                        session
                            .type_text(&target, keys)
                            .await
                            .map_err(|e| JourneyError::InteractionFailed(e.to_string()))
                    }
                    Err(err) => Err(err),
                }
            }

            Interaction::TypeText { text, then_enter } => {
                let element = self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                self.fill(&element, text).await?;
                if *then_enter {
                    session
                        .press_enter(&element)
                        .await
                        .map_err(|e| JourneyError::InteractionFailed(e.to_string()))?;
                }
                Ok(())
            }

            Interaction::TypeAndPick { text, suggestion, pick_within } => {
                let element = self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                self.fill(&element, text).await?;
                match self.resolver.resolve(session, suggestion, *pick_within).await {
                    Ok(picked) => click_with_fallback(session, &picked).await,
                    Err(JourneyError::ElementNotFound { .. }) => {
                        debug!(step = step.id, "no suggestion appeared, submitting literally");
                        session
                            .press_enter(&element)
                            .await
                            .map_err(|e| JourneyError::InteractionFailed(e.to_string()))
                    }
                    Err(err) => Err(err),
                }
            }

            Interaction::ClickCapturing { probes, slot, fallback } => {
                let element = self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                self.capture_from(&element, probes, *slot, fallback.as_deref(), state)
                    .await;
                click_with_fallback(session, &element).await
            }

            Interaction::ClickNth { index, probes, slot, fallback } => {
                let element = self
                    .resolver
                    .resolve_nth(session, &step.candidates, *index, step.timeout)
                    .await?;
                self.capture_from(&element, probes, *slot, fallback.as_deref(), state)
                    .await;
                click_with_fallback(session, &element).await
            }

            Interaction::ReadText { slot } => {
                let element = self
                    .resolver
                    .resolve(session, &step.candidates, step.timeout)
                    .await?;
                let text = session
                    .text(&element)
                    .await
                    .map_err(|e| JourneyError::InteractionFailed(e.to_string()))?;
                state.capture(*slot, &text);
                Ok(())
            }

            Interaction::ExpectGone => {
                let gone = self
                    .resolver
                    .wait_for_absence(session, &step.candidates, step.timeout)
                    .await?;
                if gone {
                    Ok(())
                } else {
                    Err(JourneyError::InteractionFailed(
                        "element still present after timeout".into(),
                    ))
                }
            }

            Interaction::HumanPause { duration, prompt } => {
                info!(
                    step = step.id,
                    wait_secs = duration.as_secs(),
                    "{prompt}"
                );
                sleep(*duration).await;
                Ok(())
            }

            Interaction::ConfirmUrl { patterns } => {
                let re = Regex::new(&format!("(?i)({})", patterns.join("|")))
                    .map_err(|e| JourneyError::InteractionFailed(e.to_string()))?;
                let deadline = Instant::now() + step.timeout;
                loop {
                    let url = session.current_url().await?;
                    if re.is_match(&url) {
                        info!(step = step.id, %url, "navigation confirmed");
                        return Ok(());
                    }
                    if Instant::now() + URL_POLL_INTERVAL >= deadline {
                        return Err(JourneyError::NavigationUnconfirmed {
                            url,
                            patterns: patterns.clone(),
                        });
                    }
                    sleep(URL_POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Clear-then-type, the only way text ever enters a field.
    async fn fill(
        &self,
        element: &crate::session::ElementHandle,
        text: &str,
    ) -> Result<(), JourneyError> {
        let session = self.session.as_ref();
        session
            .clear(element)
            .await
            .map_err(|e| JourneyError::InteractionFailed(e.to_string()))?;
        session
            .type_text(element, text)
            .await
            .map_err(|e| JourneyError::InteractionFailed(e.to_string()))
    }

    /// Best-effort capture from the first probe that matches under
    /// `element`. Never fails the step; an absent probe falls back to the
    /// given default, if any.
    async fn capture_from(
        &self,
        element: &crate::session::ElementHandle,
        probes: &[Locator],
        slot: CaptureSlot,
        fallback: Option<&str>,
        state: &mut JourneyState,
    ) {
        let session = self.session.as_ref();
        for probe in probes {
            match session.find_within(element, probe).await {
                Ok(Some(found)) => match session.text(&found).await {
                    Ok(text) => {
                        state.capture(slot, &text);
                        return;
                    }
                    Err(err) => debug!(probe = %probe, error = %err, "probe text unreadable"),
                },
                Ok(None) => {}
                Err(err) => debug!(probe = %probe, error = %err, "probe lookup failed"),
            }
        }
        if let Some(fallback) = fallback {
            state.capture(slot, fallback);
        }
    }

    /// Waits a short bounded time for the page to report a non-empty title
    /// after navigation. Tolerated if it never does.
    async fn await_title(&self) {
        let deadline = Instant::now() + NAVIGATION_TITLE_WAIT;
        loop {
            match self.session.title().await {
                Ok(title) if !title.is_empty() => {
                    let url = self.session.current_url().await.unwrap_or_default();
                    info!(%title, %url, "page loaded");
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "title not readable yet");
                }
            }
            if Instant::now() + URL_POLL_INTERVAL >= deadline {
                warn!("page title never appeared, proceeding anyway");
                return;
            }
            sleep(URL_POLL_INTERVAL).await;
        }
    }

    /// Fire-and-forget visual checkpoint. Failures are logged, never
    /// propagated, and the artifact is never read back.
    async fn checkpoint(&self, step_id: &str, state: &mut JourneyState) {
        match self.session.screenshot().await {
            Ok(png) => {
                state.checkpoints += 1;
                if let Err(err) = self.checkpoints.record(step_id, Utc::now(), &png).await {
                    warn!(step = step_id, error = %err, "failed to store checkpoint");
                }
            }
            Err(err) => warn!(step = step_id, error = %err, "failed to capture checkpoint"),
        }
    }
}
