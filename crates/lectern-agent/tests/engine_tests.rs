// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the engine over mock adapters.
//!
//! Each test builds an isolated TestHarness; tests are independent and
//! order-insensitive.

use std::time::Duration;

use lectern_core::types::{ContextFlag, ContextPhase, IntentLabel};
use lectern_core::{CollectionId, CollectionKind, LecternError, UserId, VectorStoreAdapter};
use lectern_test_utils::TestHarness;

const B1: [&str; 3] = [
    "Chapter one introduces the lighthouse keeper and his daughter.",
    "Chapter two describes the storm that wrecked the harbour.",
    "Chapter three tells of the rescue of the fishing fleet.",
];

// ---- Uploads and isolation ----

#[tokio::test]
async fn retrieval_stays_inside_the_users_documents() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Chapter two is about a storm.".to_string()])
        .build();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    harness
        .upload_book("u2", "b9", &["Chapter two of the secret diary of u2."])
        .await
        .unwrap();

    let (answer, state) = harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    assert_eq!(answer, "Chapter two is about a storm.");
    assert_eq!(state.last_intent, Some(IntentLabel::DocumentQuestion));

    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("b1/p2"));
    assert!(!prompt.contains("b9"));
    assert!(!prompt.contains("secret diary"));

    let names = harness.store.collection_names();
    assert!(names.contains(&"u1_chat".to_string()));
    assert!(!names.contains(&"u2_chat".to_string()));
}

#[tokio::test]
async fn upload_stamps_source_collection_and_rejects_foreign_chunks() {
    let harness = TestHarness::new();
    assert_eq!(harness.upload_book("u1", "b1", &B1).await.unwrap(), 3);

    let foreign = vec![lectern_core::types::DocumentChunk {
        book_id: "b2".into(),
        page_key: "p1".into(),
        text: "smuggled".into(),
        source_collection: "u2_documents".into(),
        page_order: 1,
    }];
    let err = harness
        .engine
        .upload_document_chunks(&UserId::new("u1"), foreign)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(!harness.store.collection_names().contains(&"u2_documents".to_string()));
}

#[tokio::test]
async fn new_uploads_are_visible_to_the_next_question() {
    let harness = TestHarness::new();
    harness.upload_book("u1", "b1", &B1[..1]).await.unwrap();
    harness.send("u1", "s1", "explain chapter 1").await.unwrap();

    harness
        .upload_book("u1", "b2", &["The harbour master kept a logbook of every storm."])
        .await
        .unwrap();
    harness.send("u1", "s1", "what does the harbour master keep?").await.unwrap();
    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("b2/p1"));
}

#[tokio::test]
async fn reuploading_the_same_text_hits_the_embedding_cache() {
    let harness = TestHarness::new();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    let calls = harness.embedder.calls();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    assert_eq!(harness.embedder.calls(), calls);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let harness = TestHarness::new();
    assert!(matches!(
        harness.send("", "s1", "hello").await,
        Err(LecternError::InvalidInput(_))
    ));
    assert!(matches!(
        harness.send("u1", "s1", "   ").await,
        Err(LecternError::InvalidInput(_))
    ));
    assert!(harness.store.collection_names().is_empty());
}

// ---- Degradation ----

#[tokio::test]
async fn unreachable_vector_store_still_answers() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["I could not search your books, but here goes.".to_string()])
        .with_failing_store()
        .build();

    let (answer, state) = harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    assert!(!answer.is_empty());
    assert!(state.has_flag(ContextFlag::Degraded));
    assert!(harness.failing.calls() > 0);

    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("No matching passages"));
}

#[tokio::test(start_paused = true)]
async fn stalled_vector_store_times_out_into_a_degraded_answer() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Answered without the index.".to_string()])
        .with_slow_store(Duration::from_secs(30))
        .with_config(|c| {
            c.vector_store.timeout_ms = 120_000;
            c.retrieval.timeout_ms = 200;
            c.memory.timeout_ms = 200;
        })
        .build();

    let started = tokio::time::Instant::now();
    let (answer, state) = harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(answer, "Answered without the index.");
    assert!(state.has_flag(ContextFlag::Degraded));

    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("No matching passages"));

    // The write landed before the stalled retention check; both halves are kept.
    let chat = CollectionId::new(&UserId::new("u1"), CollectionKind::Chat).unwrap();
    assert_eq!(harness.store.count(&chat).await.unwrap(), 2);
}

#[tokio::test]
async fn exhausted_model_failures_surface_and_leave_state_untouched() {
    let harness = TestHarness::new();
    for _ in 0..3 {
        harness.provider.add_error(LecternError::provider("503")).await;
    }
    let err = harness.send("u1", "s1", "hello there").await.unwrap_err();
    assert!(matches!(err, LecternError::Provider { .. }));
    assert!(harness.engine.conversation_state(&UserId::new("u1")).await.is_none());
    assert_eq!(harness.engine.memory().turn_count(&UserId::new("u1")).await.unwrap(), 0);
}

#[tokio::test]
async fn answers_are_requested_in_the_language_of_the_question() {
    let harness = TestHarness::new();
    harness.send("u1", "s1", "2장을 설명해 주세요").await.unwrap();
    harness.send("u1", "s1", "explain chapter 2").await.unwrap();

    let systems: Vec<String> = harness
        .provider
        .requests()
        .await
        .into_iter()
        .filter_map(|r| r.system_prompt)
        .collect();
    assert!(systems.iter().any(|s| s.contains("Respond only in Korean")));
    assert!(systems.last().unwrap().contains("Respond only in English"));
}

// ---- Memory ----

#[tokio::test]
async fn memory_keeps_only_the_most_recent_turns() {
    let harness = TestHarness::new();
    let user = UserId::new("u1");
    for i in 0..25 {
        harness.send("u1", "s1", &format!("message {i}")).await.unwrap();
    }
    let memory = harness.engine.memory();
    assert_eq!(memory.turn_count(&user).await.unwrap(), 20);
    let kept = memory.recent(&user, 100).await.unwrap();
    assert_eq!(kept.first().map(|t| t.text.as_str()), Some("message 15"));
    assert_eq!(kept[kept.len() - 2].text, "message 24");
}

#[tokio::test]
async fn recalled_memory_reaches_the_prompt() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "Lighthouses guide ships.".to_string(),
            "Yes.".to_string(),
        ])
        .build();
    harness.send("u1", "s1", "tell me about lighthouses").await.unwrap();
    harness.send("u1", "s1", "lighthouses again please").await.unwrap();
    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("Q: tell me about lighthouses"));
}

// ---- Context ----

#[tokio::test]
async fn topic_change_resets_context_but_keeps_memory() {
    let harness = TestHarness::new();
    harness.upload_book("u1", "b1", &B1).await.unwrap();

    let (_, state) = harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    assert!(state.has_flag(ContextFlag::DocumentScoped));

    let (_, state) = harness
        .send("u1", "s1", "let's talk about something else")
        .await
        .unwrap();
    assert_eq!(state.phase, ContextPhase::Reset);
    assert!(state.context_flags.is_empty());
    assert!(state.last_intent.is_none());
    assert_eq!(state.turn_count, 2);
    assert_eq!(
        harness.engine.memory().turn_count(&UserId::new("u1")).await.unwrap(),
        4
    );

    let (_, state) = harness.send("u1", "s1", "hello").await.unwrap();
    assert_eq!(state.phase, ContextPhase::Active);
    assert_eq!(state.turn_count, 3);
}

#[tokio::test]
async fn new_session_resets_context() {
    let harness = TestHarness::new();
    harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    let (_, state) = harness.send("u1", "s2", "explain chapter 3").await.unwrap();
    assert_eq!(state.phase, ContextPhase::Reset);
    assert_eq!(state.session_id.0, "s2");
}

#[tokio::test]
async fn follow_up_includes_previous_exchange() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["The storm wrecks the harbour.".to_string()])
        .build();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    harness.send("u1", "s1", "explain chapter 2").await.unwrap();

    let (_, state) = harness.send("u1", "s1", "what about chapter 3?").await.unwrap();
    assert_eq!(state.last_intent, Some(IntentLabel::Clarification));
    assert!(state.has_flag(ContextFlag::FollowUp));

    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("## Previous exchange"));
    assert!(prompt.contains("Assistant: The storm wrecks the harbour."));
}

#[tokio::test]
async fn follow_up_can_point_at_an_earlier_exchange() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "Chapter one meets the keeper.".to_string(),
            "Chapter two brings the storm.".to_string(),
            "Chapter three saves the fleet.".to_string(),
        ])
        .build();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    for chapter in 1..=3 {
        harness
            .send("u1", "s1", &format!("explain chapter {chapter}"))
            .await
            .unwrap();
    }

    let (_, state) = harness.send("u1", "s1", "what about your first answer?").await.unwrap();
    assert_eq!(state.last_intent, Some(IntentLabel::Clarification));
    let prompt = harness.provider.last_prompt().await.unwrap();
    assert!(prompt.contains("User: explain chapter 1"));
    assert!(prompt.contains("Assistant: Chapter one meets the keeper."));
    assert!(!prompt.contains("Assistant: Chapter three saves the fleet."));
}

#[tokio::test]
async fn answered_message_is_recorded_as_a_pair() {
    let harness = TestHarness::new();
    harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    let turns = harness.engine.memory().recent(&UserId::new("u1"), 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert!(turns[0].timestamp < turns[1].timestamp);
    assert_eq!(turns[0].text, "explain chapter 2");
    assert_eq!(turns[1].text, "mock response");
}

#[tokio::test]
async fn library_questions_list_uploaded_books() {
    let harness = TestHarness::new();
    harness.upload_book("u1", "b1", &B1).await.unwrap();
    harness.upload_book("u1", "a0", &["A short preface."]).await.unwrap();

    let (_, state) = harness.send("u1", "s1", "which books did I upload?").await.unwrap();
    assert_eq!(state.last_intent, Some(IntentLabel::DocumentList));

    let prompt = harness.provider.last_prompt().await.unwrap();
    let a0 = prompt.find("- a0 (1 chunks)").unwrap();
    let b1 = prompt.find("- b1 (3 chunks): Chapter one introduces").unwrap();
    assert!(a0 < b1);

    let library = harness.engine.list_library(&UserId::new("u1")).await.unwrap();
    assert_eq!(library.len(), 2);
}

#[tokio::test]
async fn forgetting_a_user_drops_state_but_keeps_stored_turns() {
    let harness = TestHarness::new();
    let user = UserId::new("u1");
    harness.send("u1", "s1", "explain chapter 2").await.unwrap();
    assert!(harness.engine.conversation_state(&user).await.is_some());

    assert!(harness.engine.forget_user(&user));
    assert!(harness.engine.conversation_state(&user).await.is_none());
    assert_eq!(harness.engine.memory().turn_count(&user).await.unwrap(), 2);

    let (_, state) = harness.send("u1", "s1", "hello").await.unwrap();
    assert_eq!(state.turn_count, 1);
    assert_eq!(harness.engine.memory().turn_count(&user).await.unwrap(), 4);
}

// ---- Concurrency ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn users_are_served_concurrently_and_independently() {
    let harness = std::sync::Arc::new(TestHarness::new());
    let mut tasks = Vec::new();
    for user in ["alice", "bob", "carol"] {
        let harness = std::sync::Arc::clone(&harness);
        tasks.push(tokio::spawn(async move {
            for i in 0..3 {
                harness
                    .send(user, "s1", &format!("{user} says hello {i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    for user in ["alice", "bob", "carol"] {
        let id = UserId::new(user);
        let state = harness.engine.conversation_state(&id).await.unwrap();
        assert_eq!(state.turn_count, 3);
        let turns = harness.engine.memory().recent(&id, 10).await.unwrap();
        assert!(turns.iter().all(|t| t.user_id == id));
    }
}
