// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context state machine.
//!
//! A session's working context is either `ACTIVE` or `RESET`. It moves to
//! `RESET` when the user changes topic, the session id changes, or the
//! context has been active for `max_active_turns` turns. A reset clears the
//! context flags and the last intent; the lifetime turn count and the stored
//! conversation memory are untouched. The next processed message returns the
//! context to `ACTIVE`.

use lectern_config::model::ContextConfig;
use lectern_core::types::{ContextFlag, ContextPhase, ConversationState, IntentLabel};
use lectern_core::SessionId;
use strum::Display;
use tracing::debug;

/// Why a turn reset the working context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResetReason {
    NewTopic,
    SessionChanged,
    TurnLimit,
}

/// Outcome of applying one classified message to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ContextPhase,
    pub to: ContextPhase,
    pub reset: Option<ResetReason>,
}

/// Applies classified messages to a [`ConversationState`].
#[derive(Debug, Clone)]
pub struct ContextManager {
    max_active_turns: u64,
}

impl ContextManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_active_turns: config.max_active_turns.max(1),
        }
    }

    /// Advance `state` for a message in `session_id` classified as `intent`.
    pub fn apply(
        &self,
        state: &mut ConversationState,
        session_id: &SessionId,
        intent: IntentLabel,
    ) -> Transition {
        let from = state.phase;
        state.turn_count += 1;
        state.context_flags.remove(&ContextFlag::Degraded);

        let reset = if &state.session_id != session_id {
            state.session_id = session_id.clone();
            Some(ResetReason::SessionChanged)
        } else if intent == IntentLabel::NewTopic {
            Some(ResetReason::NewTopic)
        } else if state.turns_since_reset >= self.max_active_turns {
            Some(ResetReason::TurnLimit)
        } else {
            None
        };

        if let Some(reason) = reset {
            state.phase = ContextPhase::Reset;
            state.context_flags.clear();
            state.last_intent = None;
            state.turns_since_reset = 0;
            debug!(
                user_id = %state.user_id,
                session_id = %state.session_id,
                reason = %reason,
                turn_count = state.turn_count,
                "context reset"
            );
            return Transition {
                from,
                to: ContextPhase::Reset,
                reset: Some(reason),
            };
        }

        state.phase = ContextPhase::Active;
        state.turns_since_reset += 1;
        state.last_intent = Some(intent);
        match intent {
            IntentLabel::DocumentQuestion | IntentLabel::DocumentList => {
                state.context_flags.insert(ContextFlag::DocumentScoped);
                state.context_flags.remove(&ContextFlag::FollowUp);
            }
            IntentLabel::Clarification => {
                state.context_flags.insert(ContextFlag::FollowUp);
            }
            IntentLabel::GeneralChat | IntentLabel::NewTopic => {
                state.context_flags.remove(&ContextFlag::FollowUp);
            }
        }

        Transition {
            from,
            to: ContextPhase::Active,
            reset: None,
        }
    }

    /// Record that at least one branch of the current turn ran degraded.
    pub fn mark_degraded(&self, state: &mut ConversationState) {
        state.context_flags.insert(ContextFlag::Degraded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::UserId;
    use proptest::prelude::*;

    fn manager(max: u64) -> ContextManager {
        ContextManager::new(&ContextConfig {
            max_active_turns: max,
        })
    }

    fn state() -> ConversationState {
        ConversationState::new(UserId::new("u1"), SessionId("s1".into()))
    }

    fn s1() -> SessionId {
        SessionId("s1".into())
    }

    #[test]
    fn document_question_scopes_context() {
        let m = manager(10);
        let mut st = state();
        let t = m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        assert_eq!(t.to, ContextPhase::Active);
        assert!(st.has_flag(ContextFlag::DocumentScoped));
        assert_eq!(st.last_intent, Some(IntentLabel::DocumentQuestion));
        assert_eq!(st.turn_count, 1);
    }

    #[test]
    fn clarification_sets_follow_up() {
        let m = manager(10);
        let mut st = state();
        m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        m.apply(&mut st, &s1(), IntentLabel::Clarification);
        assert!(st.has_flag(ContextFlag::FollowUp));
        assert!(st.has_flag(ContextFlag::DocumentScoped));
    }

    #[test]
    fn new_topic_resets_then_next_message_reactivates() {
        let m = manager(10);
        let mut st = state();
        m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        m.mark_degraded(&mut st);

        let t = m.apply(&mut st, &s1(), IntentLabel::NewTopic);
        assert_eq!(t.reset, Some(ResetReason::NewTopic));
        assert_eq!(st.phase, ContextPhase::Reset);
        assert!(st.context_flags.is_empty());
        assert!(st.last_intent.is_none());
        assert_eq!(st.turn_count, 2);

        let t = m.apply(&mut st, &s1(), IntentLabel::GeneralChat);
        assert_eq!(t.from, ContextPhase::Reset);
        assert_eq!(st.phase, ContextPhase::Active);
        assert_eq!(st.turn_count, 3);
    }

    #[test]
    fn session_change_resets() {
        let m = manager(10);
        let mut st = state();
        m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        let t = m.apply(&mut st, &SessionId("s2".into()), IntentLabel::DocumentQuestion);
        assert_eq!(t.reset, Some(ResetReason::SessionChanged));
        assert_eq!(st.session_id, SessionId("s2".into()));
        assert!(st.last_intent.is_none());
    }

    #[test]
    fn long_runs_reset_after_limit() {
        let m = manager(3);
        let mut st = state();
        for _ in 0..3 {
            assert!(m.apply(&mut st, &s1(), IntentLabel::GeneralChat).reset.is_none());
        }
        let t = m.apply(&mut st, &s1(), IntentLabel::GeneralChat);
        assert_eq!(t.reset, Some(ResetReason::TurnLimit));
        assert!(m.apply(&mut st, &s1(), IntentLabel::GeneralChat).reset.is_none());
    }

    #[test]
    fn degraded_flag_lasts_one_turn() {
        let m = manager(10);
        let mut st = state();
        m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        m.mark_degraded(&mut st);
        assert!(st.has_flag(ContextFlag::Degraded));
        m.apply(&mut st, &s1(), IntentLabel::DocumentQuestion);
        assert!(!st.has_flag(ContextFlag::Degraded));
    }

    fn any_intent() -> impl Strategy<Value = IntentLabel> {
        prop_oneof![
            Just(IntentLabel::DocumentQuestion),
            Just(IntentLabel::DocumentList),
            Just(IntentLabel::Clarification),
            Just(IntentLabel::NewTopic),
            Just(IntentLabel::GeneralChat),
        ]
    }

    proptest! {
        #[test]
        fn turn_count_only_grows_and_resets_clear_context(
            intents in proptest::collection::vec(any_intent(), 1..60),
        ) {
            let m = manager(10);
            let mut st = state();
            for (i, intent) in intents.into_iter().enumerate() {
                let t = m.apply(&mut st, &s1(), intent);
                prop_assert_eq!(st.turn_count, i as u64 + 1);
                prop_assert!(st.turns_since_reset <= 10);
                if t.reset.is_some() {
                    prop_assert!(st.context_flags.is_empty());
                    prop_assert!(st.last_intent.is_none());
                } else {
                    prop_assert_eq!(st.last_intent, Some(intent));
                }
            }
        }
    }
}
