use std::path::{Path, PathBuf};
use std::sync::Arc;

use sunwell_types::{Constraint, Decision, FailedApproach, Goal, Learning, MemoryContext, Pattern, TeamDecision};

use crate::db::{ConversationStore, ConversationTurn};
use crate::response_cache::ResponseCache;
use crate::store::JsonlStore;
use crate::MemoryError;

/// Cache entries survive a day by default; callers that want a shorter-lived
/// cache (or none) construct a `ResponseCache` directly instead of going
/// through `for_workspace`.
const DEFAULT_RESPONSE_CACHE_TTL_MINUTES: u32 = 24 * 60;
const DEFAULT_RESPONSE_CACHE_MAX_ENTRIES: usize = 500;

fn memory_root(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".sunwell").join("memory")
}

/// High-level facade over the workspace's intelligence logs: the four
/// append-only JSONL stores, plus a SQLite conversation DAG and response
/// cache. One instance per workspace; cheap to clone, every store is an
/// `Arc`. The SQLite-backed pieces degrade gracefully rather than failing
/// construction: a workspace whose `.sunwell/memory` directory can't hold a
/// SQLite file (read-only mount, disk full) still gets the JSONL stores,
/// just without conversation history or response caching.
#[derive(Clone)]
pub struct MemoryManager {
    decisions: Arc<JsonlStore<Decision>>,
    failures: Arc<JsonlStore<FailedApproach>>,
    learnings: Arc<JsonlStore<Learning>>,
    patterns: Arc<JsonlStore<Pattern>>,
    team_decisions: Arc<JsonlStore<TeamDecision>>,
    conversation: Option<Arc<ConversationStore>>,
    response_cache: Option<Arc<ResponseCache>>,
}

impl MemoryManager {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        let root = memory_root(workspace_root);

        let conversation = match ConversationStore::new(&root) {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                tracing::warn!(error = %err, "conversation store unavailable for this workspace");
                None
            }
        };
        let response_cache = match ResponseCache::new(
            &root,
            DEFAULT_RESPONSE_CACHE_TTL_MINUTES,
            DEFAULT_RESPONSE_CACHE_MAX_ENTRIES,
        ) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(err) => {
                tracing::warn!(error = %err, "response cache unavailable for this workspace");
                None
            }
        };

        Self {
            decisions: Arc::new(JsonlStore::new(root.join("decisions.jsonl"))),
            failures: Arc::new(JsonlStore::new(root.join("failures.jsonl"))),
            learnings: Arc::new(JsonlStore::new(root.join("learnings.jsonl"))),
            patterns: Arc::new(JsonlStore::new(root.join("patterns.jsonl"))),
            team_decisions: Arc::new(JsonlStore::new(root.join("team").join("shared.jsonl"))),
            conversation,
            response_cache,
        }
    }

    /// Records one conversation turn and returns its id for use as a later
    /// turn's `parent_turn_id`.
    pub async fn record_turn(
        &self,
        session_id: &str,
        parent_turn_id: Option<&str>,
        role: &str,
        content: &str,
    ) -> Result<String, MemoryError> {
        let store = self.conversation.as_ref().ok_or(MemoryError::StoreUnavailable("conversation"))?;
        store.record_turn(session_id, parent_turn_id, role, content)
    }

    /// A session's full conversation, oldest first.
    pub async fn turns_for_session(&self, session_id: &str) -> Result<Vec<ConversationTurn>, MemoryError> {
        let store = self.conversation.as_ref().ok_or(MemoryError::StoreUnavailable("conversation"))?;
        store.turns_for_session(session_id)
    }

    /// Looks up a cached response for `(model, system_prompt, user_prompt)`.
    /// Returns `Ok(None)` both on a genuine cache miss and when the cache is
    /// unavailable — a caller falls back to calling the provider either way.
    pub async fn cached_response(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<Option<String>, MemoryError> {
        let Some(cache) = &self.response_cache else { return Ok(None) };
        cache.get(&ResponseCache::cache_key(model, system_prompt, user_prompt))
    }

    /// Stores a response for later `cached_response` lookups. A no-op when
    /// the cache is unavailable.
    pub async fn cache_response(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_prompt: &str,
        response: &str,
        token_count: u32,
    ) -> Result<(), MemoryError> {
        let Some(cache) = &self.response_cache else { return Ok(()) };
        let key = ResponseCache::cache_key(model, system_prompt, user_prompt);
        cache.put(&key, model, response, token_count)
    }

    pub async fn record_decision(&self, decision: Decision) -> Result<(), MemoryError> {
        self.decisions.append(&decision).await
    }

    pub async fn record_failure(&self, failure: FailedApproach) -> Result<(), MemoryError> {
        self.failures.append(&failure).await
    }

    pub async fn record_learning(&self, learning: Learning) -> Result<(), MemoryError> {
        self.learnings.append(&learning).await
    }

    pub async fn record_pattern(&self, pattern: Pattern) -> Result<(), MemoryError> {
        self.patterns.append(&pattern).await
    }

    pub async fn record_team_decision(&self, decision: TeamDecision) -> Result<(), MemoryError> {
        self.team_decisions.append(&decision).await
    }

    /// Every decision recorded so far, for callers that need to check for
    /// conflicts before appending more (e.g. merging a specialist's staged
    /// memory back into the parent's).
    pub async fn load_decisions(&self) -> Result<Vec<Decision>, MemoryError> {
        self.decisions.load_all().await
    }

    /// Builds the context injected into planner/specialist prompts: every
    /// decision's rejected options become "DO NOT" constraints, every
    /// failure becomes a dead end to steer around, every learning and
    /// pattern is surfaced as-is. Scoping by goal category is left to the
    /// caller — this loads the full logs, since a workspace's history is
    /// small enough that filtering in the prompt layer is cheap and keeps
    /// this facade from duplicating relevance judgment.
    pub async fn context_for_goal(&self, _goal: &Goal) -> Result<MemoryContext, MemoryError> {
        let decisions = self.decisions.load_all().await?;
        let dead_ends = self.failures.load_all().await?;
        let team_decisions = self.team_decisions.load_all().await?;
        let learnings = self.learnings.load_all().await?;
        let patterns = self.patterns.load_all().await?;

        let constraints = decisions
            .iter()
            .flat_map(|d| {
                d.rejected_options.iter().map(|r| Constraint {
                    subject: r.option.clone(),
                    reason: r.reason.clone(),
                })
            })
            .collect();

        Ok(MemoryContext {
            constraints,
            dead_ends,
            team_decisions,
            learnings,
            patterns,
        })
    }
}

/// Scratch memory collected while a specialist runs. Nothing here is
/// durable until `commit` runs, which only happens on the specialist's
/// success path — a failed specialist's observations never pollute the
/// parent's intelligence log.
#[derive(Debug, Default)]
pub struct StagedMemory {
    decisions: Vec<Decision>,
    failures: Vec<FailedApproach>,
    learnings: Vec<Learning>,
}

impl StagedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_decision(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    pub fn stage_failure(&mut self, failure: FailedApproach) {
        self.failures.push(failure);
    }

    pub fn stage_learning(&mut self, learning: Learning) {
        self.learnings.push(learning);
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.failures.is_empty() && self.learnings.is_empty()
    }

    /// Splits the staged buffer into its parts for callers that need
    /// custom merge logic instead of a plain `commit`.
    pub fn into_parts(self) -> (Vec<Decision>, Vec<FailedApproach>, Vec<Learning>) {
        (self.decisions, self.failures, self.learnings)
    }

    pub async fn commit(self, manager: &MemoryManager) -> Result<(), MemoryError> {
        for decision in self.decisions {
            manager.record_decision(decision).await?;
        }
        for failure in self.failures {
            manager.record_failure(failure).await?;
        }
        for learning in self.learnings {
            manager.record_learning(learning).await?;
        }
        Ok(())
    }
}
