// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message workflow.
//!
//! Every message walks the same fixed sequence of stages:
//! `Classify -> ManageContext -> RetrieveAndRecall -> Generate -> Record -> Done`.
//! Retrieval and memory recall run concurrently inside their stage. A failure
//! or timeout in retrieval, recall or recording degrades that branch to an
//! empty result and sets [`ContextFlag::Degraded`]; isolation violations and
//! exhausted answer generation abort the turn.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lectern_context::ContextManager;
use lectern_core::types::{
    ContextFlag, ConversationState, ConversationTurn, IntentLabel, RetrievalCandidate, Role,
};
use lectern_core::{LecternError, SessionId, UserId};
use lectern_memory::ConversationMemoryStore;
use lectern_resilience::with_timeout;
use lectern_retrieval::{HybridRetriever, VectorIndex};
use lectern_router::{IntentClassification, IntentRouter};
use strum::Display;
use tracing::{debug, warn};

use crate::follow_up;
use crate::generator::AnswerGenerator;
use crate::library::{self, BookSummary};
use crate::prompt::PromptInputs;
use crate::recording;

/// Turns loaded for a clarification that names no particular exchange.
const FOLLOW_UP_TURNS: usize = 2;

/// A step of the per-message workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Classify,
    ManageContext,
    RetrieveAndRecall,
    Generate,
    Record,
    Done,
}

impl Stage {
    /// The stage that always follows this one.
    pub fn next(self) -> Stage {
        match self {
            Stage::Classify => Stage::ManageContext,
            Stage::ManageContext => Stage::RetrieveAndRecall,
            Stage::RetrieveAndRecall => Stage::Generate,
            Stage::Generate => Stage::Record,
            Stage::Record | Stage::Done => Stage::Done,
        }
    }
}

/// Per-branch time limits.
#[derive(Debug, Clone, Copy)]
pub struct BranchTimeouts {
    pub retrieval: Duration,
    pub memory: Duration,
}

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub state: ConversationState,
    pub classification: IntentClassification,
    /// Stages in the order they ran.
    pub stages: Vec<Stage>,
    /// Branches that fell back to an empty result.
    pub degraded: Vec<&'static str>,
}

/// Data accumulated while a message moves through the stages.
struct Turn<'a> {
    user_id: &'a UserId,
    session_id: &'a SessionId,
    message: &'a str,
    state: ConversationState,
    classification: Option<IntentClassification>,
    documents: Vec<RetrievalCandidate>,
    memory: Vec<ConversationTurn>,
    follow_up: Vec<ConversationTurn>,
    library: Option<Vec<BookSummary>>,
    answer: Option<String>,
    degraded: Vec<&'static str>,
}

impl Turn<'_> {
    fn intent(&self) -> IntentLabel {
        self.classification
            .as_ref()
            .map(|c| c.label)
            .unwrap_or(IntentLabel::GeneralChat)
    }
}

/// The components one turn runs through.
pub struct Workflow {
    router: IntentRouter,
    context: ContextManager,
    retriever: Arc<HybridRetriever>,
    memory: Arc<ConversationMemoryStore>,
    generator: AnswerGenerator,
    index: Arc<VectorIndex>,
    timeouts: BranchTimeouts,
}

impl Workflow {
    pub fn new(
        router: IntentRouter,
        context: ContextManager,
        retriever: Arc<HybridRetriever>,
        memory: Arc<ConversationMemoryStore>,
        generator: AnswerGenerator,
        index: Arc<VectorIndex>,
        timeouts: BranchTimeouts,
    ) -> Self {
        Self {
            router,
            context,
            retriever,
            memory,
            generator,
            index,
            timeouts,
        }
    }

    /// Run one message through every stage, starting from `state`.
    pub async fn run(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        message: &str,
        state: ConversationState,
    ) -> Result<TurnOutcome, LecternError> {
        let mut turn = Turn {
            user_id,
            session_id,
            message,
            state,
            classification: None,
            documents: Vec::new(),
            memory: Vec::new(),
            follow_up: Vec::new(),
            library: None,
            answer: None,
            degraded: Vec::new(),
        };

        let mut stages = Vec::with_capacity(6);
        let mut stage = Stage::Classify;
        loop {
            stages.push(stage);
            debug!(stage = %stage, "workflow stage");
            match stage {
                Stage::Classify => self.classify(&mut turn).await,
                Stage::ManageContext => self.manage_context(&mut turn),
                Stage::RetrieveAndRecall => self.retrieve_and_recall(&mut turn).await?,
                Stage::Generate => self.generate(&mut turn).await?,
                Stage::Record => self.record(&mut turn).await?,
                Stage::Done => break,
            }
            stage = stage.next();
        }

        let classification = turn
            .classification
            .ok_or_else(|| LecternError::Internal("turn finished unclassified".into()))?;
        let answer = turn
            .answer
            .ok_or_else(|| LecternError::Internal("turn finished without an answer".into()))?;
        Ok(TurnOutcome {
            answer,
            state: turn.state,
            classification,
            stages,
            degraded: turn.degraded,
        })
    }

    async fn classify(&self, turn: &mut Turn<'_>) {
        let classification = self.router.classify(turn.message, &turn.state).await;
        debug!(
            intent = %classification.label,
            confidence = classification.confidence,
            reason = classification.reason,
            "message classified"
        );
        turn.classification = Some(classification);
    }

    fn manage_context(&self, turn: &mut Turn<'_>) {
        let intent = turn.intent();
        let transition = self.context.apply(&mut turn.state, turn.session_id, intent);
        if let Some(reason) = transition.reset {
            recording::record_reset(&reason.to_string());
        }
    }

    async fn retrieve_and_recall(&self, turn: &mut Turn<'_>) -> Result<(), LecternError> {
        let user_id = turn.user_id;
        let message = turn.message;
        let intent = turn.intent();
        let recall_k = self.memory.config().recall_k;

        let (documents, memory, follow_up, library) = tokio::join!(
            with_timeout(self.timeouts.retrieval, self.retriever.retrieve(user_id, message)),
            with_timeout(self.timeouts.memory, self.memory.recall(user_id, message, recall_k)),
            optional(intent == IntentLabel::Clarification, || {
                with_timeout(self.timeouts.memory, self.referenced_exchange(user_id, message))
            }),
            optional(intent == IntentLabel::DocumentList, || {
                with_timeout(self.timeouts.retrieval, library::list_library(&self.index, user_id))
            }),
        );

        turn.documents = self.degrade(turn, "retrieval", documents)?;
        turn.memory = self.degrade(turn, "recall", memory)?;
        turn.follow_up = self.degrade(turn, "follow_up", follow_up)?.unwrap_or_default();
        turn.library = self.degrade(turn, "library", library)?;
        Ok(())
    }

    async fn generate(&self, turn: &mut Turn<'_>) -> Result<(), LecternError> {
        let mut inputs =
            PromptInputs::new(turn.message, turn.intent(), &turn.documents, &turn.memory)
                .with_follow_up(&turn.follow_up);
        if let Some(library) = turn.library.as_deref() {
            inputs = inputs.with_library(library);
        }
        let answer = self.generator.generate_from(&inputs).await?;
        turn.answer = Some(answer);
        Ok(())
    }

    /// The exchange a clarification refers to, oldest turn first.
    async fn referenced_exchange(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<Vec<ConversationTurn>, LecternError> {
        let reference = follow_up::parse_reference(message);
        let window = if reference.is_some() {
            self.memory.config().retention_turns
        } else {
            FOLLOW_UP_TURNS
        };
        let turns = self.memory.recent(user_id, window).await?;
        debug!(user_id = %user_id, ?reference, loaded = turns.len(), "resolving follow-up");
        Ok(follow_up::select_exchange(&turns, reference))
    }

    /// Store the question and its answer in a single upsert so they are kept
    /// or lost together.
    async fn record(&self, turn: &mut Turn<'_>) -> Result<(), LecternError> {
        let user_id = turn.user_id;
        let exchange = vec![
            ConversationTurn::new(user_id.clone(), Role::User, turn.message),
            ConversationTurn::new(
                user_id.clone(),
                Role::Assistant,
                turn.answer.clone().unwrap_or_default(),
            ),
        ];
        let result = with_timeout(
            self.timeouts.memory,
            self.memory.record_exchange(user_id, exchange),
        )
        .await
        .map(|_| ());
        self.degrade(turn, "record", result)?;
        Ok(())
    }

    /// Keep `result` if it succeeded; otherwise fall back to the empty value,
    /// unless the error must abort the turn.
    fn degrade<T: Default>(
        &self,
        turn: &mut Turn<'_>,
        branch: &'static str,
        result: Result<T, LecternError>,
    ) -> Result<T, LecternError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(user_id = %turn.user_id, branch, error = %err, "branch degraded");
                recording::record_degraded(branch);
                self.context.mark_degraded(&mut turn.state);
                turn.degraded.push(branch);
                Ok(T::default())
            }
        }
    }
}

/// Run `make()` only when `wanted`; otherwise resolve to `None` immediately.
async fn optional<T, F, Fut>(wanted: bool, make: F) -> Result<Option<T>, LecternError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, LecternError>>,
{
    if wanted { make().await.map(Some) } else { Ok(None) }
}

/// Whether `state` reports a degraded branch on its last turn.
pub fn was_degraded(state: &ConversationState) -> bool {
    state.has_flag(ContextFlag::Degraded)
}
