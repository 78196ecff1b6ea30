//! Animations: state changes driven by timed effects.
//!
//! The rainbow button plays a sequence of colour key frames one second
//! apart. The whole sequence runs under one identity, so confirming a reset
//! stops it wherever it is.

use crate::{AlertButton, AlertState};
use reflux_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Identity of the running rainbow.
pub const RAINBOW: EffectId = EffectId::from_static("animations.rainbow");

/// Time between rainbow key frames.
pub const KEY_FRAME_DURATION: Duration = Duration::from_secs(1);

/// Circle colours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Color {
    /// Resting colour
    #[default]
    Black,
    /// Red
    Red,
    /// Blue
    Blue,
    /// Green
    Green,
    /// Orange
    Orange,
    /// Pink
    Pink,
    /// Purple
    Purple,
    /// Yellow
    Yellow,
}

impl Color {
    /// Rainbow order, ending back at black.
    pub const RAINBOW: [Self; 8] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Orange,
        Self::Pink,
        Self::Purple,
        Self::Yellow,
        Self::Black,
    ];
}

/// A point in view coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
}

/// Animation screen state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationsState {
    /// Alert being presented, if any
    pub alert: Option<AlertState<AnimationsAction>>,
    /// Where the circle sits; `None` means centred
    pub circle_center: Option<Point>,
    /// Current circle colour
    pub circle_color: Color,
    /// Whether the circle is drawn enlarged
    pub is_circle_scaled: bool,
}

/// Animation screen actions
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationsAction {
    /// The alert was dismissed
    AlertDismissed,
    /// The scale toggle changed
    CircleScaleToggleChanged(bool),
    /// User tapped "Rainbow"
    RainbowButtonTapped,
    /// User tapped "Reset"
    ResetButtonTapped,
    /// User confirmed the reset alert
    ResetConfirmationButtonTapped,
    /// A key frame arrived
    SetColor(Color),
    /// User tapped somewhere on the canvas
    Tapped(Point),
}

/// Animation screen dependencies
#[derive(Clone)]
pub struct AnimationsEnvironment {
    /// Clock for key frames
    pub main_queue: AnyScheduler,
}

impl AnimationsEnvironment {
    /// Build an environment.
    #[must_use]
    pub fn new(main_queue: AnyScheduler) -> Self {
        Self { main_queue }
    }

    /// Every dependency fails loudly; tests replace what they use.
    #[must_use]
    pub fn unimplemented() -> Self {
        Self::new(UnimplementedScheduler::shared("main_queue"))
    }
}

/// Emit each value, then wait its duration before the next one.
///
/// The first value is sent as soon as the effect starts; the sequence
/// completes once the last value has been sent.
pub fn key_frames<Action: Send + 'static>(
    scheduler: &AnyScheduler,
    frames: impl IntoIterator<Item = (Action, Duration)>,
) -> Effect<Action> {
    let mut effects = Vec::new();
    let mut wait = Duration::ZERO;
    for (action, duration) in frames {
        effects.push(if wait.is_zero() {
            Effect::send(action)
        } else {
            Effect::delay(Arc::clone(scheduler), wait, action)
        });
        wait = duration;
    }
    Effect::concatenate(effects)
}

/// Animation screen reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationsReducer;

impl Reducer for AnimationsReducer {
    type State = AnimationsState;
    type Action = AnimationsAction;
    type Environment = AnimationsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match action {
            AnimationsAction::AlertDismissed => {
                state.alert = None;
                Effect::none()
            },

            AnimationsAction::CircleScaleToggleChanged(is_scaled) => {
                state.is_circle_scaled = is_scaled;
                Effect::none()
            },

            AnimationsAction::RainbowButtonTapped => key_frames(
                &env.main_queue,
                Color::RAINBOW
                    .into_iter()
                    .map(|color| (AnimationsAction::SetColor(color), KEY_FRAME_DURATION)),
            )
            .cancellable(RAINBOW),

            AnimationsAction::ResetButtonTapped => {
                state.alert = Some(reset_alert());
                Effect::none()
            },

            AnimationsAction::ResetConfirmationButtonTapped => {
                *state = AnimationsState::default();
                Effect::cancel(RAINBOW)
            },

            AnimationsAction::SetColor(color) => {
                state.circle_color = color;
                Effect::none()
            },

            AnimationsAction::Tapped(point) => {
                state.circle_center = Some(point);
                Effect::none()
            },
        }
    }
}

/// The confirmation shown by the reset button.
#[must_use]
pub fn reset_alert() -> AlertState<AnimationsAction> {
    AlertState::new("Reset state?").with_buttons(
        AlertButton::destructive("Reset", AnimationsAction::ResetConfirmationButtonTapped),
        AlertButton::cancel("Cancel"),
    )
}
