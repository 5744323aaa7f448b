// W3C WebDriver wire-protocol implementation of the session capability set.
// Talks JSON over HTTP to a driver endpoint (e.g. chromedriver); the journey
// core never sees any of this.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::errors::SessionError;
use crate::locator::{By, Locator};
use crate::session::{DriverSession, ElementHandle};

/// W3C element identifier key in wire payloads.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const ENTER_KEY: &str = "\u{e007}";

pub struct WebDriverSession {
    client: Client,
    session_url: String,
}

impl WebDriverSession {
    /// Creates one browser session against a running WebDriver endpoint.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn connect(endpoint: &str) -> Result<Self, SessionError> {
        let client = Client::new();
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--start-maximized", "--disable-notifications"],
                        "excludeSwitches": ["enable-automation", "enable-logging"],
                    }
                }
            }
        });

        let endpoint = endpoint.trim_end_matches('/');
        let value = Self::unwrap_value(
            client
                .post(format!("{endpoint}/session"))
                .json(&capabilities)
                .send()
                .await?
                .json()
                .await?,
        )?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::InvalidResponse("missing sessionId".into()))?;
        debug!(session_id, "webdriver session created");

        Ok(Self {
            client,
            session_url: format!("{endpoint}/session/{session_id}"),
        })
    }

    /// Maps a locator onto a W3C location strategy. `Name` has no W3C
    /// strategy of its own and is expressed as a CSS attribute match.
    fn strategy(locator: &Locator) -> (&'static str, String) {
        match locator.by {
            By::XPath => ("xpath", locator.expr.clone()),
            By::Css => ("css selector", locator.expr.clone()),
            By::Name => ("css selector", format!("[name=\"{}\"]", locator.expr)),
            By::TagName => ("tag name", locator.expr.clone()),
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, SessionError> {
        let url = format!("{}{}", self.session_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            // Some drivers reject POSTs without a JSON object body.
            request = request.json(&json!({}));
        }
        let response = request.send().await?.json().await?;
        Self::unwrap_value(response)
    }

    /// Unwraps the `{"value": ...}` envelope, converting WebDriver error
    /// payloads into `SessionError::WebDriver`.
    fn unwrap_value(response: Value) -> Result<Value, SessionError> {
        let value = response
            .get("value")
            .cloned()
            .ok_or_else(|| SessionError::InvalidResponse(response.to_string()))?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(SessionError::WebDriver {
                error: error.to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(value)
    }

    fn element_from(value: &Value) -> Result<ElementHandle, SessionError> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementHandle(id.to_string()))
            .ok_or_else(|| SessionError::InvalidResponse(format!("not an element: {value}")))
    }

    fn as_string(value: Value) -> Result<String, SessionError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::InvalidResponse(format!("expected string: {value}")))
    }

    fn as_bool(value: Value) -> Result<bool, SessionError> {
        value
            .as_bool()
            .ok_or_else(|| SessionError::InvalidResponse(format!("expected bool: {value}")))
    }

    async fn find_endpoint(
        &self,
        path: &str,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, SessionError> {
        let (using, value) = Self::strategy(locator);
        let result = self
            .execute(Method::POST, path, Some(json!({ "using": using, "value": value })))
            .await;
        match result {
            Ok(found) => Ok(Some(Self::element_from(&found)?)),
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl DriverSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.execute(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>, SessionError> {
        self.find_endpoint("/element", locator).await
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        let (using, value) = Self::strategy(locator);
        let found = self
            .execute(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        found
            .as_array()
            .ok_or_else(|| SessionError::InvalidResponse(format!("expected array: {found}")))?
            .iter()
            .map(Self::element_from)
            .collect()
    }

    async fn find_within(
        &self,
        scope: &ElementHandle,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, SessionError> {
        self.find_endpoint(&format!("/element/{}/element", scope.id()), locator)
            .await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.execute(Method::POST, &format!("/element/{}/click", element.id()), None)
            .await
            .map(|_| ())
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.execute(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": "arguments[0].click();",
                "args": [{ ELEMENT_KEY: element.id() }],
            })),
        )
        .await
        .map(|_| ())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.execute(Method::POST, &format!("/element/{}/clear", element.id()), None)
            .await
            .map(|_| ())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError> {
        self.execute(
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn press_enter(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.execute(
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": ENTER_KEY })),
        )
        .await
        .map(|_| ())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, SessionError> {
        self.execute(Method::GET, &format!("/element/{}/text", element.id()), None)
            .await
            .and_then(Self::as_string)
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, SessionError> {
        self.execute(Method::GET, &format!("/element/{}/displayed", element.id()), None)
            .await
            .and_then(Self::as_bool)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, SessionError> {
        self.execute(Method::GET, &format!("/element/{}/enabled", element.id()), None)
            .await
            .and_then(Self::as_bool)
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        self.execute(Method::GET, "/url", None).await.and_then(Self::as_string)
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.execute(Method::GET, "/title", None).await.and_then(Self::as_string)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        let encoded = self
            .execute(Method::GET, "/screenshot", None)
            .await
            .and_then(Self::as_string)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| SessionError::InvalidResponse(format!("bad screenshot payload: {e}")))
    }

    async fn quit(&self) -> Result<(), SessionError> {
        self.client
            .delete(&self.session_url)
            .send()
            .await?
            .error_for_status()
            .map_err(SessionError::from)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_locator_becomes_css_attribute_match() {
        let (using, value) = WebDriverSession::strategy(&Locator::name("mobile"));
        assert_eq!(using, "css selector");
        assert_eq!(value, "[name=\"mobile\"]");
    }

    #[test]
    fn xpath_locator_passes_through() {
        let (using, value) = WebDriverSession::strategy(&Locator::xpath("//button"));
        assert_eq!(using, "xpath");
        assert_eq!(value, "//button");
    }

    #[test]
    fn css_and_tag_locators_use_their_native_strategies() {
        let (using, value) = WebDriverSession::strategy(&Locator::css("input[type='tel']"));
        assert_eq!(using, "css selector");
        assert_eq!(value, "input[type='tel']");

        let (using, value) = WebDriverSession::strategy(&Locator::tag("body"));
        assert_eq!(using, "tag name");
        assert_eq!(value, "body");
    }

    #[test]
    fn error_envelope_is_surfaced_as_webdriver_error() {
        let response = json!({
            "value": {
                "error": "no such element",
                "message": "Unable to locate element",
            }
        });
        let err = WebDriverSession::unwrap_value(response).unwrap_err();
        assert!(err.is_no_such_element());
    }

    #[test]
    fn success_envelope_is_unwrapped() {
        let response = json!({ "value": { ELEMENT_KEY: "abc-123" } });
        let value = WebDriverSession::unwrap_value(response).unwrap();
        let element = WebDriverSession::element_from(&value).unwrap();
        assert_eq!(element.id(), "abc-123");
    }
}
