//! # Subscription Gate Module
//!
//! Premium-only buttons lead non-entitled users to the button's fallback
//! state instead of its declared target.

use serde::{Deserialize, Serialize};

use crate::state_store::{Button, StateMap};

/// Marker prepended to the label of a button the user is not entitled to
pub const LOCK_MARKER: &str = "🔒 ";

/// A button after the gate has been applied: what the user sees and where
/// pressing it leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveButton {
    pub label: String,
    pub target: String,
    /// True when the target was replaced by the fallback
    pub locked: bool,
}

/// Apply the gate to one button
pub fn resolve(button: &Button, is_premium: bool) -> EffectiveButton {
    if button.requires_premium && !is_premium {
        EffectiveButton {
            label: format!("{LOCK_MARKER}{}", button.label),
            target: button.fallback_state.clone(),
            locked: true,
        }
    } else {
        EffectiveButton {
            label: button.label.clone(),
            target: button.next_state.clone(),
            locked: false,
        }
    }
}

/// Apply the gate to a button list, preserving order
pub fn resolve_all(buttons: &[Button], is_premium: bool) -> Vec<EffectiveButton> {
    buttons.iter().map(|b| resolve(b, is_premium)).collect()
}

/// Result of re-checking an inline button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackGate {
    /// Proceed to the pressed target
    Allowed { target: String },
    /// The target is premium-only; go to the fallback instead
    Redirected { requested: String, target: String },
}

impl CallbackGate {
    pub fn target(&self) -> &str {
        match self {
            CallbackGate::Allowed { target } | CallbackGate::Redirected { target, .. } => target,
        }
    }
}

/// Re-apply the gate to a callback payload.
///
/// The keyboard being pressed may predate an entitlement change, so the
/// payload is checked against every premium button in the catalogue. The
/// first premium button targeting `payload` (ascending state id, then button
/// order) decides the fallback.
pub fn gate_callback(states: &StateMap, payload: &str, is_premium: bool) -> CallbackGate {
    if !is_premium {
        let premium_button = states
            .values()
            .flat_map(|state| state.buttons.iter())
            .find(|b| b.requires_premium && b.next_state == payload);

        if let Some(button) = premium_button {
            return CallbackGate::Redirected {
                requested: payload.to_string(),
                target: button.fallback_state.clone(),
            };
        }
    }

    CallbackGate::Allowed {
        target: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::State;

    fn catalogue() -> StateMap {
        let mut menu = State::new("menu");
        menu.buttons = vec![
            Button::new("Free", "free_area"),
            Button::new("Meditations", "meditations").premium("paywall"),
        ];
        [(menu.id.clone(), menu)].into_iter().collect()
    }

    #[test]
    fn test_free_button_unchanged() {
        let button = Button::new("Free", "free_area");
        for premium in [false, true] {
            let effective = resolve(&button, premium);
            assert_eq!(effective.target, "free_area");
            assert_eq!(effective.label, "Free");
            assert!(!effective.locked);
        }
    }

    #[test]
    fn test_premium_button_falls_back_for_free_user() {
        let button = Button::new("Deep dive", "deep_dive").premium("paywall");
        let effective = resolve(&button, false);
        assert_eq!(effective.target, "paywall");
        assert_eq!(effective.label, "🔒 Deep dive");
        assert!(effective.locked);
    }

    #[test]
    fn test_premium_user_keeps_target() {
        let button = Button::new("Deep dive", "deep_dive").premium("paywall");
        let effective = resolve(&button, true);
        assert_eq!(effective.target, "deep_dive");
        assert!(!effective.locked);
    }

    #[test]
    fn test_resolve_all_preserves_order() {
        let buttons = catalogue()["menu"].buttons.clone();
        let targets: Vec<_> = resolve_all(&buttons, false)
            .into_iter()
            .map(|b| b.target)
            .collect();
        assert_eq!(targets, vec!["free_area", "paywall"]);
    }

    #[test]
    fn test_callback_redirected_without_premium() {
        let gate = gate_callback(&catalogue(), "meditations", false);
        assert_eq!(
            gate,
            CallbackGate::Redirected {
                requested: "meditations".to_string(),
                target: "paywall".to_string()
            }
        );
        assert_eq!(gate.target(), "paywall");
    }

    #[test]
    fn test_callback_allowed_with_premium_or_free_target() {
        assert_eq!(gate_callback(&catalogue(), "meditations", true).target(), "meditations");
        assert_eq!(gate_callback(&catalogue(), "free_area", false).target(), "free_area");
        assert_eq!(gate_callback(&catalogue(), "ghost_state", false).target(), "ghost_state");
    }
}
