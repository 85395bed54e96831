//! Property tests for the snapshot history and the mutator identity rule.
//!
//! Random non-decreasing time sequences are pushed into a
//! [`GameStateHistory`] and every lookup is checked against a linear scan.

use std::sync::Arc;

use proptest::prelude::*;
use tavern_state::prelude::*;

/// Build one snapshot per gap, each `gap` seconds after the previous one.
/// Gaps of zero produce repeated times.
fn timeline(gaps: &[u8]) -> Vec<Arc<GameState>> {
    let mut state = IncrementTime::default().apply_to(&Arc::new(GameState::new()));
    let mut out = vec![Arc::clone(&state)];
    for (i, gap) in gaps.iter().enumerate() {
        // SetChoices always yields a new instance, so equal times still give
        // distinct snapshots.
        state = SetChoices {
            player: PlayerId(1),
            choices: Choices {
                kind: ChoiceKind::General,
                source: None,
                entities: vec![EntityId(i as u32 + 2)],
                min: 1,
                max: 1,
            },
        }
        .apply_to(&state);
        state = IncrementTime::new(f64::from(*gap)).apply_to(&state);
        out.push(Arc::clone(&state));
    }
    out
}

/// Reference lookup: last snapshot with time <= query, else the first one.
fn linear_latest(states: &[Arc<GameState>], query: f64) -> Option<&Arc<GameState>> {
    states
        .iter()
        .rev()
        .find(|s| s.time().is_some_and(|t| t <= query))
        .or_else(|| states.first())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn latest_matches_linear_scan(
        gaps in prop::collection::vec(0u8..5, 0..40),
        queries in prop::collection::vec(-5.0f64..200.0, 1..20),
    ) {
        let states = timeline(&gaps);
        let mut history = GameStateHistory::new();
        for state in &states {
            prop_assert!(history.push(Arc::clone(state)));
        }

        for query in queries {
            let expected = linear_latest(&states, query).unwrap();
            let actual = history.latest(query).unwrap();
            prop_assert!(
                Arc::ptr_eq(expected, actual),
                "query {query}: expected time {:?}, got {:?}",
                expected.time(),
                actual.time()
            );
        }
    }

    #[test]
    fn latest_only_sees_what_was_pushed(
        gaps in prop::collection::vec(0u8..5, 1..30),
        cut in 0usize..30,
    ) {
        let states = timeline(&gaps);
        let cut = cut.min(states.len());
        let mut history = GameStateHistory::new();
        for state in &states[..cut] {
            history.push(Arc::clone(state));
        }

        match linear_latest(&states[..cut], f64::MAX) {
            None => prop_assert!(history.latest(f64::MAX).is_none()),
            Some(expected) => prop_assert!(Arc::ptr_eq(expected, history.latest(f64::MAX).unwrap())),
        }
    }

    #[test]
    fn zero_increment_is_identity_once_timed(start in 0.0f64..1000.0) {
        let timed = IncrementTime::new(start)
            .apply_to(&IncrementTime::default().apply_to(&Arc::new(GameState::new())));
        let same = IncrementTime::new(0.0).apply_to(&timed);
        prop_assert!(Arc::ptr_eq(&timed, &same));
    }

    #[test]
    fn clear_choices_is_idempotent(player in 1u32..8) {
        let state = SetChoices {
            player: PlayerId(player),
            choices: Choices {
                kind: ChoiceKind::Mulligan,
                source: None,
                entities: vec![EntityId(5)],
                min: 0,
                max: 1,
            },
        }
        .apply_to(&Arc::new(GameState::new()));
        let clear = ClearChoices { player: PlayerId(player) };
        let once = clear.apply_to(&state);
        let twice = clear.apply_to(&once);
        prop_assert!(!Arc::ptr_eq(&state, &once));
        prop_assert!(Arc::ptr_eq(&once, &twice));
    }
}
