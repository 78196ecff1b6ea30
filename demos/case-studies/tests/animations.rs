//! Exhaustive tests for the animations case study

use case_studies::animations::{
    AnimationsAction, AnimationsEnvironment, AnimationsReducer, AnimationsState, Color, Point, reset_alert,
};
use case_studies::{AlertButton, AlertState};
use reflux_testing::{TestScheduler, TestStore, init_test_tracing};
use std::time::Duration;

fn store(
    main_queue: &TestScheduler,
) -> TestStore<AnimationsState, AnimationsAction, AnimationsEnvironment, AnimationsReducer> {
    init_test_tracing();
    TestStore::new(
        AnimationsState::default(),
        AnimationsReducer,
        AnimationsEnvironment::new(main_queue.shared()),
    )
}

#[test]
fn rainbow() {
    let main_queue = TestScheduler::new();
    let mut store = store(&main_queue);

    store.send(AnimationsAction::RainbowButtonTapped, |_| {});
    store.receive(AnimationsAction::SetColor(Color::Red), |state| {
        state.circle_color = Color::Red;
    });

    for color in &Color::RAINBOW[1..] {
        main_queue.advance(Duration::from_secs(1));
        store.receive(AnimationsAction::SetColor(*color), |state| state.circle_color = *color);
    }

    main_queue.run();
    store.finish();
}

#[test]
fn reset_cancels_the_rainbow() {
    let main_queue = TestScheduler::new();
    let mut store = store(&main_queue);

    store.send(AnimationsAction::RainbowButtonTapped, |_| {});
    store.receive(AnimationsAction::SetColor(Color::Red), |state| {
        state.circle_color = Color::Red;
    });

    main_queue.advance(Duration::from_secs(1));
    store.receive(AnimationsAction::SetColor(Color::Blue), |state| {
        state.circle_color = Color::Blue;
    });

    store.send(AnimationsAction::ResetButtonTapped, |state| {
        state.alert = Some(AlertState::new("Reset state?").with_buttons(
            AlertButton::destructive("Reset", AnimationsAction::ResetConfirmationButtonTapped),
            AlertButton::cancel("Cancel"),
        ));
    });
    store.send(AnimationsAction::ResetConfirmationButtonTapped, |state| {
        *state = AnimationsState::default();
    });

    main_queue.run();
    assert_eq!(main_queue.pending(), 0);
    store.finish();
}

#[test]
fn tapping_the_canvas_and_dismissing_the_alert() {
    let main_queue = TestScheduler::new();
    let mut store = store(&main_queue);

    store.send(AnimationsAction::Tapped(Point { x: 12.0, y: 34.0 }), |state| {
        state.circle_center = Some(Point { x: 12.0, y: 34.0 });
    });
    store.send(AnimationsAction::CircleScaleToggleChanged(true), |state| {
        state.is_circle_scaled = true;
    });
    store.send(AnimationsAction::ResetButtonTapped, |state| state.alert = Some(reset_alert()));
    store.send(AnimationsAction::AlertDismissed, |state| state.alert = None);

    store.finish();
}

#[test]
fn tapping_rainbow_again_restarts_the_sequence() {
    let main_queue = TestScheduler::new();
    let mut store = store(&main_queue);

    store.send(AnimationsAction::RainbowButtonTapped, |_| {});
    store.receive(AnimationsAction::SetColor(Color::Red), |state| {
        state.circle_color = Color::Red;
    });

    main_queue.advance(Duration::from_millis(500));
    store.send(AnimationsAction::RainbowButtonTapped, |_| {});
    store.receive(AnimationsAction::SetColor(Color::Red), |_| {});

    // The first sequence would have turned blue at 1s.
    main_queue.advance(Duration::from_millis(500));
    assert_eq!(store.received_count(), 0);

    main_queue.advance(Duration::from_millis(500));
    store.receive(AnimationsAction::SetColor(Color::Blue), |state| {
        state.circle_color = Color::Blue;
    });

    store.send(AnimationsAction::ResetConfirmationButtonTapped, |state| {
        *state = AnimationsState::default();
    });
    store.finish();
}
