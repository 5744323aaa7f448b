// The fixed storefront journey. Locator expressions target the live
// swiggy.com DOM; order is the journey, candidates are the fallbacks.

use std::time::Duration;

use crate::config::Config;
use crate::journey::{CaptureSlot, FailurePolicy, Interaction, Step};
use crate::locator::{Locator, LocatorCandidate};

const STEP_TIMEOUT: Duration = Duration::from_secs(20);
const LONG_TIMEOUT: Duration = Duration::from_secs(25);
const DIALOG_TIMEOUT: Duration = Duration::from_secs(8);

const SIGN_IN_PROMPT: &str = "//span[contains(text(),'Sign In') or contains(text(),'Login')]";

fn actionable(expr: impl Into<String>) -> LocatorCandidate {
    LocatorCandidate::actionable(Locator::xpath(expr))
}

fn present(expr: impl Into<String>) -> LocatorCandidate {
    LocatorCandidate::presence(Locator::xpath(expr))
}

/// Builds the ordered, immutable step table for one run. Every step after
/// the initial navigation is soft except phone entry and the final
/// restaurant/item resolutions, without which no coherent summary exists.
pub fn storefront_journey(config: &Config) -> Vec<Step> {
    let city_hint = config
        .city
        .split_whitespace()
        .next()
        .unwrap_or(&config.city)
        .to_string();

    vec![
        Step {
            id: "open-storefront",
            candidates: vec![],
            interaction: Interaction::Navigate { url: config.storefront_url.clone() },
            timeout: LONG_TIMEOUT,
            policy: FailurePolicy::Abort,
            checkpoint_after: false,
        },
        Step {
            id: "open-sign-in",
            candidates: vec![
                actionable(SIGN_IN_PROMPT),
                actionable("//a[contains(@href,'login') or contains(text(),'Sign In') or contains(text(),'Login')]"),
            ],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "enter-phone",
            candidates: vec![
                LocatorCandidate::actionable(Locator::name("mobile")),
                LocatorCandidate::actionable(Locator::css(
                    "input[type='tel'], input[name='mobile']",
                )),
            ],
            interaction: Interaction::TypeText {
                text: config.phone.clone(),
                then_enter: false,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Abort,
            checkpoint_after: false,
        },
        Step {
            id: "submit-phone",
            candidates: vec![actionable(
                "//span[contains(text(),'CONTINUE')]/ancestor::button | //button[.//span[contains(text(),'Continue')]] | //button[contains(.,'Continue')]",
            )],
            interaction: Interaction::ClickOrEnter {
                fallback_field: vec![
                    LocatorCandidate::actionable(Locator::name("mobile")),
                    LocatorCandidate::actionable(Locator::css(
                        "input[type='tel'], input[name='mobile']",
                    )),
                ],
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "await-otp",
            candidates: vec![],
            interaction: Interaction::HumanPause {
                duration: config.otp_wait,
                prompt: "waiting for manual OTP entry".into(),
            },
            timeout: config.otp_wait,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "confirm-signed-in",
            candidates: vec![present(SIGN_IN_PROMPT)],
            interaction: Interaction::ExpectGone,
            timeout: LONG_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "set-location",
            candidates: vec![
                actionable("//input[contains(@placeholder,'delivery location') or contains(@aria-label,'location') or contains(@placeholder,'Enter your delivery location')]"),
                actionable("//input[@type='text' and (contains(@placeholder,'location') or contains(@aria-label,'location'))]"),
            ],
            interaction: Interaction::TypeAndPick {
                text: config.city.clone(),
                suggestion: vec![actionable(format!(
                    "//div[contains(@role,'option') or contains(@class,'_3lmRa') or contains(@class,'_2dS-v')][.//span[contains(.,'{city_hint}')] or contains(.,'{city_hint}')]"
                ))],
                pick_within: STEP_TIMEOUT,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "open-search",
            candidates: vec![
                actionable("//input[contains(@placeholder,'Search') and @type='text']"),
                actionable("//span[contains(text(),'Search')]/ancestor::button | //button[contains(.,'Search')] | //div[@role='button' and contains(.,'Search')] | //img[contains(@alt,'search')]/ancestor::button"),
            ],
            // Last resort: the storefront's "/" keyboard shortcut opens
            // search even when no entry point is clickable.
            interaction: Interaction::ClickOrType {
                fallback_field: vec![LocatorCandidate::presence(Locator::tag("body"))],
                keys: "/".into(),
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "search-restaurant",
            candidates: vec![actionable(
                "//input[contains(@placeholder,'Search') and @type='text']",
            )],
            interaction: Interaction::TypeText {
                text: config.restaurant_query.clone(),
                then_enter: true,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "open-first-result",
            candidates: vec![
                actionable("(//a[contains(@href,'restaurant') or contains(@href,'restaurants')][.//h3 or .//h4 or .//div])[1]"),
                actionable("(//a[contains(@href,'restaurant')])[1]"),
            ],
            interaction: Interaction::ClickCapturing {
                probes: vec![Locator::xpath(
                    ".//h3 | .//h4 | .//div[contains(@class,'restaurant-name')]",
                )],
                slot: CaptureSlot::Restaurant,
                fallback: None,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Abort,
            checkpoint_after: false,
        },
        Step {
            id: "await-menu",
            candidates: vec![present(
                "//div[contains(@class,'_1RPOp') or contains(@class,'_2wg_t') or contains(@data-testid,'menu-item')]",
            )],
            interaction: Interaction::Await,
            timeout: LONG_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            // Which menu item the second add control belongs to is a UI
            // accident, not a choice of dish; kept as-is.
            id: "add-second-item",
            candidates: vec![
                present("//button[.//span[contains(text(),'Add')] or contains(.,'Add')]"),
                present("//div[contains(@class,'styles_itemAddButton') or contains(@class,'_1RPOp')]//button"),
            ],
            interaction: Interaction::ClickNth {
                index: 1,
                probes: vec![Locator::xpath(
                    "ancestor::div[contains(@class,'styles_item') or contains(@data-testid,'menu-item')][1]//h3 | ancestor::div[contains(@class,'styles_item') or contains(@data-testid,'menu-item')][1]//h4 | ancestor::div[contains(@class,'styles_item') or contains(@data-testid,'menu-item')][1]//*[contains(@class,'name')]",
                )],
                slot: CaptureSlot::Item,
                fallback: Some("Unknown Item".into()),
            },
            timeout: LONG_TIMEOUT,
            policy: FailurePolicy::Abort,
            checkpoint_after: false,
        },
        Step {
            id: "dismiss-customization",
            candidates: vec![actionable(
                "//button[contains(.,'Add Item') or contains(.,'Add to Cart') or .//span[contains(.,'Add')]]",
            )],
            interaction: Interaction::Click,
            timeout: DIALOG_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "open-cart",
            candidates: vec![
                actionable("//a[contains(@href,'cart') and (contains(.,'View Cart') or .//span[contains(.,'View Cart')])] | //button[contains(.,'View Cart')]"),
                actionable("//a[contains(@href,'cart')] | //div[@role='button' and contains(.,'Cart')]"),
            ],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: true,
        },
        Step {
            id: "increase-quantity",
            candidates: vec![
                actionable("//button[contains(@aria-label,'increase') or contains(.,'+') or contains(@data-testid,'quantity-increase')]"),
                actionable("(//button[contains(.,'+')])[1]"),
            ],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "read-cart-total",
            candidates: vec![present(
                "//*[contains(.,'To Pay') or contains(.,'Total')]/following::div[1] | //*[contains(@class,'total') and contains(.,'\u{20b9}')] | //div[contains(@data-testid,'total-amount')]",
            )],
            interaction: Interaction::ReadText { slot: CaptureSlot::CartTotal },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: true,
        },
        Step {
            id: "add-address",
            candidates: vec![actionable(
                "//button[contains(.,'Add new address') or contains(.,'Add New Address') or contains(.,'Add Address')]",
            )],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "address-door",
            candidates: vec![actionable(
                "//input[contains(@placeholder,'Door') or contains(@placeholder,'Flat') or contains(@name,'door')]",
            )],
            interaction: Interaction::TypeText {
                text: config.door.clone(),
                then_enter: false,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "address-landmark",
            candidates: vec![actionable(
                "//input[contains(@placeholder,'Landmark') or contains(@name,'landmark')]",
            )],
            interaction: Interaction::TypeText {
                text: config.landmark.clone(),
                then_enter: false,
            },
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "address-tag-home",
            candidates: vec![actionable(
                "//button[contains(.,'Home')] | //span[contains(.,'Home')]/ancestor::button",
            )],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "save-address",
            candidates: vec![
                actionable("//button[contains(.,'Save Address & Proceed') or contains(.,'Save and Proceed') or contains(.,'Save')]"),
                actionable("(//button[not(@disabled) and (contains(.,'Proceed') or contains(.,'Save'))])[1]"),
            ],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: true,
        },
        Step {
            id: "proceed-to-pay",
            candidates: vec![
                actionable("//button[contains(.,'Proceed to Pay') or contains(.,'Proceed to pay') or contains(.,'Proceed to payment')]"),
                actionable("//button[contains(.,'Checkout') or contains(.,'Pay')]"),
            ],
            interaction: Interaction::Click,
            timeout: STEP_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: false,
        },
        Step {
            id: "confirm-payment-page",
            candidates: vec![],
            interaction: Interaction::ConfirmUrl {
                patterns: vec!["checkout".into(), "payment".into(), "pay".into()],
            },
            timeout: LONG_TIMEOUT,
            policy: FailurePolicy::Soft,
            checkpoint_after: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<Step> {
        let config = Config::from_lookup(|key| {
            (key == crate::config::ENV_PHONE).then(|| "9876543210".to_string())
        })
        .unwrap();
        storefront_journey(&config)
    }

    #[test]
    fn abort_steps_are_exactly_the_required_ones() {
        let aborting: Vec<&str> = table()
            .iter()
            .filter(|s| s.policy == FailurePolicy::Abort)
            .map(|s| s.id)
            .collect();
        assert_eq!(
            aborting,
            vec!["open-storefront", "enter-phone", "open-first-result", "add-second-item"]
        );
    }

    #[test]
    fn step_ids_are_unique_and_ordered_fixed() {
        let steps = table();
        let mut ids: Vec<&str> = steps.iter().map(|s| s.id).collect();
        assert_eq!(ids.first(), Some(&"open-storefront"));
        assert_eq!(ids.last(), Some(&"confirm-payment-page"));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), steps.len());
    }

    #[test]
    fn four_visual_checkpoints_are_declared() {
        let count = table().iter().filter(|s| s.checkpoint_after).count();
        assert_eq!(count, 4);
    }

    #[test]
    fn phone_payload_comes_from_configuration() {
        let steps = table();
        let phone_step = steps.iter().find(|s| s.id == "enter-phone").unwrap();
        match &phone_step.interaction {
            Interaction::TypeText { text, .. } => assert_eq!(text, "9876543210"),
            other => panic!("unexpected interaction: {other:?}"),
        }
    }

    #[test]
    fn search_opener_carries_the_slash_shortcut_fallback() {
        let steps = table();
        let search = steps.iter().find(|s| s.id == "open-search").unwrap();
        match &search.interaction {
            Interaction::ClickOrType { fallback_field, keys } => {
                assert_eq!(keys, "/");
                assert_eq!(fallback_field.len(), 1);
                assert_eq!(fallback_field[0].locator, Locator::tag("body"));
            }
            other => panic!("unexpected interaction: {other:?}"),
        }
    }

    #[test]
    fn location_suggestion_uses_first_word_of_city() {
        let steps = table();
        let location = steps.iter().find(|s| s.id == "set-location").unwrap();
        match &location.interaction {
            Interaction::TypeAndPick { suggestion, .. } => {
                assert!(suggestion[0].locator.expr.contains("Bengaluru"));
            }
            other => panic!("unexpected interaction: {other:?}"),
        }
    }
}
