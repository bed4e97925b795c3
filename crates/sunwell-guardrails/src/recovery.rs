use std::path::Path;

use git2::{build::CheckoutBuilder, ErrorCode, ObjectType, Oid, Repository, ResetType, StatusOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("workspace has uncommitted changes, refusing to start a recoverable session")]
    WorkspaceDirty,

    #[error("no commit found for goal {0}")]
    UnknownGoal(String),

    #[error("no session tag found for session {0}, nothing to roll back to")]
    MissingSessionTag(String),

    #[error("revert of goal {goal_id} produced merge conflicts")]
    RevertConflict { goal_id: String },

    #[error(transparent)]
    Git(#[from] git2::Error),
}

const SIGNATURE_NAME: &str = "sunwell";
const SIGNATURE_EMAIL: &str = "sunwell@localhost";
const GOAL_TRAILER: &str = "Goal-Id: ";

fn session_tag_name(session_id: &str) -> String {
    format!("sunwell-session-{session_id}")
}

/// Looks up the commit that embedded `Goal-Id: {goal_id}` in its message,
/// newest first. Goal identity lives in the commit message rather than
/// an in-memory table, since `RecoveryManager` is reconstructed fresh in
/// every CLI invocation and can't carry state from the run that made the
/// commit.
fn find_goal_commit(repo: &Repository, goal_id: &str) -> Result<Oid, RecoveryError> {
    let trailer = format!("{GOAL_TRAILER}{goal_id}");
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    for oid in walk {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        if commit.message().is_some_and(|msg| msg.lines().any(|line| line == trailer)) {
            return Ok(oid);
        }
    }
    Err(RecoveryError::UnknownGoal(goal_id.to_string()))
}

/// Checkpoints a workspace's git history around a session's goals: tags
/// the starting commit, commits each goal's changes individually so a
/// single goal can be reverted without disturbing the others, and can
/// hard-reset the whole workspace back to the session's start.
pub struct RecoveryManager {
    repo: Repository,
}

impl RecoveryManager {
    /// Opens the repo at `workspace`, fails if it has uncommitted changes
    /// (tracked or untracked), and tags `HEAD` as the session's recovery
    /// point.
    pub fn start_session(workspace: &Path, session_id: &str) -> Result<Self, RecoveryError> {
        let repo = Repository::open(workspace)?;

        let mut status_opts = StatusOptions::new();
        status_opts.include_untracked(true);
        if !repo.statuses(Some(&mut status_opts))?.is_empty() {
            return Err(RecoveryError::WorkspaceDirty);
        }

        let head = repo.head()?.peel_to_commit()?;
        let tag_name = session_tag_name(session_id);
        repo.tag_lightweight(&tag_name, head.as_object(), false)?;

        Ok(Self { repo })
    }

    /// Opens the repo for goal/session rollback without tagging or a
    /// clean-workspace check — used by the CLI, which only ever reads
    /// history back, never starts a new session.
    pub fn open(workspace: &Path) -> Result<Self, RecoveryError> {
        Ok(Self { repo: Repository::open(workspace)? })
    }

    /// Stages every change in the workspace and commits it under the
    /// given goal, with a `Goal-Id` trailer `rollback_goal` can find
    /// later. A no-op (empty tree diff against HEAD) still returns the
    /// current `HEAD` commit rather than creating an empty one.
    pub fn commit_goal(&self, goal_id: &str, summary: &str) -> Result<Oid, RecoveryError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let parent = self.repo.head()?.peel_to_commit()?;
        let signature = git2::Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?;
        let message = format!("{summary}\n\n{GOAL_TRAILER}{goal_id}");

        if tree_oid == parent.tree_id() {
            return Ok(parent.id());
        }
        let oid = self.repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&parent])?;
        Ok(oid)
    }

    /// Reverts a single goal's commit, leaving every other goal's commit
    /// in place. Fails with `RevertConflict` if the revert can't be
    /// applied cleanly (e.g. a later goal touched the same lines).
    pub fn rollback_goal(&self, goal_id: &str) -> Result<(), RecoveryError> {
        let oid = find_goal_commit(&self.repo, goal_id)?;
        let commit = self.repo.find_commit(oid)?;

        let mut revert_index = self.repo.revert_commit(&commit, &self.repo.head()?.peel_to_commit()?, 0, None)?;
        if revert_index.has_conflicts() {
            return Err(RecoveryError::RevertConflict { goal_id: goal_id.to_string() });
        }

        let tree_oid = revert_index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_oid)?;
        let parent = self.repo.head()?.peel_to_commit()?;
        let signature = git2::Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?;
        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("Revert goal {goal_id}"),
            &tree,
            &[&parent],
        )?;
        self.repo.cleanup_state()?;
        Ok(())
    }

    /// Hard-resets the workspace to the session's start tag and removes
    /// any untracked files left behind, discarding every goal's changes.
    pub fn rollback_session(&self, session_id: &str) -> Result<(), RecoveryError> {
        let tag_name = session_tag_name(session_id);
        let tag_ref = self
            .repo
            .find_reference(&format!("refs/tags/{tag_name}"))
            .map_err(|err| {
                if err.code() == ErrorCode::NotFound {
                    RecoveryError::MissingSessionTag(session_id.to_string())
                } else {
                    RecoveryError::Git(err)
                }
            })?;
        let target = tag_ref.peel(ObjectType::Commit)?;

        self.repo.reset(&target, ResetType::Hard, None)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.remove_untracked(true).force();
        self.repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let signature = git2::Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL).unwrap();
        repo.commit(Some("HEAD"), &signature, &signature, "initial commit", &tree, &[])
            .unwrap();
        repo
    }

    #[test]
    fn starting_a_session_on_a_dirty_workspace_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("scratch.txt"), "uncommitted\n").unwrap();

        let result = RecoveryManager::start_session(dir.path(), "s1");
        assert!(matches!(result, Err(RecoveryError::WorkspaceDirty)));
    }

    #[test]
    fn committing_a_goal_returns_the_new_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head_before = repo.head().unwrap().peel_to_commit().unwrap().id();
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();

        fs::write(dir.path().join("src.rs"), "fn main() {}\n").unwrap();
        let oid = manager.commit_goal("goal-1", "add main").unwrap();

        assert_ne!(oid, head_before);
    }

    #[test]
    fn rolling_back_a_goal_reverts_its_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();

        fs::write(dir.path().join("src.rs"), "fn main() {}\n").unwrap();
        manager.commit_goal("goal-1", "add main").unwrap();
        assert!(dir.path().join("src.rs").exists());

        manager.rollback_goal("goal-1").unwrap();
        assert!(!dir.path().join("src.rs").exists());
    }

    #[test]
    fn rollback_survives_a_fresh_process_reopening_the_repo() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();
        fs::write(dir.path().join("src.rs"), "fn main() {}\n").unwrap();
        manager.commit_goal("goal-1", "add main").unwrap();
        drop(manager);

        let reopened = RecoveryManager::open(dir.path()).unwrap();
        reopened.rollback_goal("goal-1").unwrap();
        assert!(!dir.path().join("src.rs").exists());
    }

    #[test]
    fn rolling_back_an_unknown_goal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();
        let result = manager.rollback_goal("never-ran");
        assert!(matches!(result, Err(RecoveryError::UnknownGoal(_))));
    }

    #[test]
    fn rolling_back_the_session_restores_the_starting_tree() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();

        fs::write(dir.path().join("src.rs"), "fn main() {}\n").unwrap();
        manager.commit_goal("goal-1", "add main").unwrap();
        fs::write(dir.path().join("scratch.txt"), "untracked\n").unwrap();

        manager.rollback_session("s1").unwrap();

        assert!(!dir.path().join("src.rs").exists());
        assert!(!dir.path().join("scratch.txt").exists());
    }

    #[test]
    fn rolling_back_an_unknown_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = RecoveryManager::start_session(dir.path(), "s1").unwrap();
        let result = manager.rollback_session("no-such-session");
        assert!(matches!(result, Err(RecoveryError::MissingSessionTag(_))));
    }
}
