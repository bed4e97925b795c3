use sunwell_memory::{MemoryError, MemoryManager, StagedMemory};

/// Merges a specialist's staged observations into the parent's memory
/// log. Open question resolved as: parent-first on conflict, child
/// records appended with a later timestamp. Since decisions are the only
/// record kind with a natural conflict key (category + question), a
/// staged decision that collides with one the parent already recorded is
/// dropped in favor of the parent's; everything else staged is appended
/// as-is (its `created_at` is already later than the parent's, since the
/// child started after the parent did).
///
/// On failure, only the failure record merges — decisions and learnings
/// from an unsuccessful specialist never reach the parent's log.
pub async fn merge_pending_memory(
    manager: &MemoryManager,
    staged: StagedMemory,
    succeeded: bool,
) -> Result<(), MemoryError> {
    let (decisions, failures, learnings) = staged.into_parts();

    if !succeeded {
        for failure in failures {
            manager.record_failure(failure).await?;
        }
        return Ok(());
    }

    let existing = manager.load_decisions().await?;
    for decision in decisions {
        let conflicts = existing
            .iter()
            .any(|d| d.category == decision.category && d.question == decision.question);
        if conflicts {
            tracing::debug!(
                category = %decision.category,
                question = %decision.question,
                "dropping specialist decision that conflicts with an existing parent decision"
            );
            continue;
        }
        manager.record_decision(decision).await?;
    }

    for failure in failures {
        manager.record_failure(failure).await?;
    }
    for learning in learnings {
        manager.record_learning(learning).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::{Decision, FailedApproach, Learning, LearningConfidence};

    #[tokio::test]
    async fn parent_decision_wins_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let manager = MemoryManager::for_workspace(dir.path());
        manager
            .record_decision(Decision::new("auth", "how to authenticate", "OAuth", "team standard"))
            .await
            .unwrap();

        let mut staged = StagedMemory::new();
        staged.stage_decision(Decision::new("auth", "how to authenticate", "JWT", "specialist preference"));
        merge_pending_memory(&manager, staged, true).await.unwrap();

        let decisions = manager.load_decisions().await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].chosen_option, "OAuth");
    }

    #[tokio::test]
    async fn failed_specialist_only_merges_the_failure_record() {
        let dir = tempfile::tempdir().unwrap();
        let manager = MemoryManager::for_workspace(dir.path());

        let mut staged = StagedMemory::new();
        staged.stage_decision(Decision::new("x", "y", "z", "r"));
        staged.stage_failure(FailedApproach::new("tried X", "timeout", "slow network", "ctx"));
        staged.stage_learning(Learning::new("fact", "cat", LearningConfidence::Low));

        merge_pending_memory(&manager, staged, false).await.unwrap();

        assert!(manager.load_decisions().await.unwrap().is_empty());
        let context = manager
            .context_for_goal(&sunwell_types::Goal::new(
                "g",
                sunwell_types::GoalCategory::Fix,
                sunwell_types::GoalComplexity::Simple,
            ))
            .await
            .unwrap();
        assert_eq!(context.dead_ends.len(), 1);
        assert!(context.learnings.is_empty());
    }
}
