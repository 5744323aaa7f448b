// Module: Config
// Journey inputs, read once at startup. Everything except the phone number
// has a default; the phone number missing is fatal before any session exists.

use std::time::Duration;

use crate::errors::JourneyError;

pub const ENV_PHONE: &str = "SWIGGY_PHONE";
pub const ENV_CITY: &str = "SWIGGY_CITY";
pub const ENV_RESTAURANT: &str = "SWIGGY_RESTAURANT";
pub const ENV_DOOR: &str = "SWIGGY_DOOR";
pub const ENV_LANDMARK: &str = "SWIGGY_LANDMARK";

const DEFAULT_CITY: &str = "Bengaluru";
const DEFAULT_RESTAURANT: &str = "Domino's Pizza";
const DEFAULT_DOOR: &str = "12A";
const DEFAULT_LANDMARK: &str = "Near Park";
const DEFAULT_STOREFRONT_URL: &str = "https://www.swiggy.com/";

/// Plain values handed to the journey core. The core never reads the
/// environment itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub phone: String,
    pub city: String,
    pub restaurant_query: String,
    pub door: String,
    pub landmark: String,
    pub storefront_url: String,
    pub otp_wait: Duration,
}

impl Config {
    /// Reads the journey inputs from the process environment.
    pub fn from_env() -> Result<Self, JourneyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but with an injectable lookup, so the
    /// missing-value path is testable without mutating the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, JourneyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let phone = lookup(ENV_PHONE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(JourneyError::ConfigurationMissing(ENV_PHONE))?;

        Ok(Self {
            phone,
            city: value_or(&lookup, ENV_CITY, DEFAULT_CITY),
            restaurant_query: value_or(&lookup, ENV_RESTAURANT, DEFAULT_RESTAURANT),
            door: value_or(&lookup, ENV_DOOR, DEFAULT_DOOR),
            landmark: value_or(&lookup, ENV_LANDMARK, DEFAULT_LANDMARK),
            storefront_url: DEFAULT_STOREFRONT_URL.to_string(),
            otp_wait: Duration::from_secs(35),
        })
    }
}

fn value_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_phone_is_fatal() {
        let result = Config::from_lookup(|_| None);
        assert!(matches!(
            result,
            Err(JourneyError::ConfigurationMissing(ENV_PHONE))
        ));
    }

    #[test]
    fn blank_phone_counts_as_missing() {
        let result = Config::from_lookup(|key| {
            (key == ENV_PHONE).then(|| "   ".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(|key| {
            (key == ENV_PHONE).then(|| "9876543210".to_string())
        })
        .unwrap();

        assert_eq!(config.phone, "9876543210");
        assert_eq!(config.city, "Bengaluru");
        assert_eq!(config.restaurant_query, "Domino's Pizza");
        assert_eq!(config.door, "12A");
        assert_eq!(config.landmark, "Near Park");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(|key| match key {
            ENV_PHONE => Some("9876543210".into()),
            ENV_CITY => Some("Mumbai".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.city, "Mumbai");
    }
}
