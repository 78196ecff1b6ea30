//! # Case Studies
//!
//! Small features built on Reflux, each exercising a different part of the
//! effect system:
//!
//! - [`effects_basics`]: a counter with a cancellable delayed response and a
//!   fallible number-fact request
//! - [`animations`]: a key-framed colour cycle that a confirmation alert can
//!   cancel mid-flight
//! - [`web_socket`]: a connection lifecycle with a receive loop, a ping loop
//!   and error surfacing, all torn down by one cancellation identity
//!
//! Every environment has an `unimplemented()` constructor whose schedulers
//! and clients fail loudly, so tests only stub what they exercise.

pub mod animations;
pub mod effects_basics;
pub mod web_socket;

/// What a button in an alert does when tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRole {
    /// A plain button
    Default,
    /// Dismisses without doing anything
    Cancel,
    /// Performs something irreversible
    Destructive,
}

/// A button in an [`AlertState`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlertButton<Action> {
    /// Visual role
    pub role: ButtonRole,
    /// Button label
    pub label: String,
    /// Action sent when tapped, if any
    pub action: Option<Action>,
}

impl<Action> AlertButton<Action> {
    /// A plain button.
    #[must_use]
    pub fn plain(label: impl Into<String>, action: Option<Action>) -> Self {
        Self {
            role: ButtonRole::Default,
            label: label.into(),
            action,
        }
    }

    /// A cancel button that sends nothing.
    #[must_use]
    pub fn cancel(label: impl Into<String>) -> Self {
        Self {
            role: ButtonRole::Cancel,
            label: label.into(),
            action: None,
        }
    }

    /// A destructive button.
    #[must_use]
    pub fn destructive(label: impl Into<String>, action: Action) -> Self {
        Self {
            role: ButtonRole::Destructive,
            label: label.into(),
            action: Some(action),
        }
    }
}

/// An alert described as data.
///
/// Reducers put one in state to ask the view layer to present it; the view
/// sends the tapped button's action back. Equality makes alerts assertable
/// in tests like any other field.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertState<Action> {
    /// Headline
    pub title: String,
    /// Optional body text
    pub message: Option<String>,
    /// First button
    pub primary_button: Option<AlertButton<Action>>,
    /// Second button
    pub secondary_button: Option<AlertButton<Action>>,
}

impl<Action> AlertState<Action> {
    /// An alert with only a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            primary_button: None,
            secondary_button: None,
        }
    }

    /// Add body text.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set both buttons.
    #[must_use]
    pub fn with_buttons(mut self, primary: AlertButton<Action>, secondary: AlertButton<Action>) -> Self {
        self.primary_button = Some(primary);
        self.secondary_button = Some(secondary);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_builders() {
        let alert: AlertState<u8> = AlertState::new("Reset state?")
            .with_message("This can't be undone.")
            .with_buttons(AlertButton::destructive("Reset", 1), AlertButton::cancel("Cancel"));

        assert_eq!(alert.title, "Reset state?");
        assert_eq!(alert.message.as_deref(), Some("This can't be undone."));
        assert_eq!(alert.primary_button.map(|b| (b.role, b.action)), Some((ButtonRole::Destructive, Some(1))));
        assert_eq!(
            alert.secondary_button.map(|b| (b.role, b.action)),
            Some((ButtonRole::Cancel, None))
        );
    }

    #[test]
    fn plain_button_keeps_its_action() {
        let button = AlertButton::plain("OK", Some("ok"));
        assert_eq!(button.role, ButtonRole::Default);
        assert_eq!(button.action, Some("ok"));
    }
}
