use std::time::{Duration, Instant};

use sunwell_types::{Goal, ScopeCheckResult};

use crate::classifier::wildcard_matches;

/// Hard per-goal caps. Fixed by policy, not derived from the goal's own
/// hints — a goal that under-scopes its file hints doesn't get a wider
/// budget, it just trips `out_of_scope_path` sooner.
const MAX_FILES_PER_GOAL: usize = 10;
const MAX_LINES_PER_GOAL: usize = 500;
pub const MAX_GOAL_DURATION: Duration = Duration::from_secs(30 * 60);

/// Hard per-session caps, cumulative across every goal the session runs.
const MAX_FILES_PER_SESSION: usize = 50;
const MAX_LINES_PER_SESSION: usize = 2_000;
const MAX_GOALS_PER_SESSION: u32 = 20;
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(8 * 60 * 60);

/// Limits a single goal is held to. `allowed_globs` (derived from the
/// goal's planned file hints) is the one goal-specific piece; the file
/// and line caps themselves are fixed policy, never widened mid-run
/// without an escalation.
#[derive(Debug, Clone)]
pub struct ScopeLimits {
    pub max_files_touched: usize,
    pub max_total_lines_changed: usize,
    pub allowed_globs: Vec<String>,
    pub require_test_change: bool,
}

impl ScopeLimits {
    /// Derives the allowed-glob set from the goal's planned file hints;
    /// touching a directory none of them named counts as scope drift.
    /// The file/line caps are the fixed per-goal defaults.
    pub fn from_goal(goal: &Goal) -> Self {
        let allowed_globs = goal
            .planned_file_hints
            .iter()
            .filter_map(|hint| {
                hint.path
                    .rsplit_once('/')
                    .map(|(dir, _)| format!("{dir}/*"))
            })
            .collect();

        Self {
            max_files_touched: MAX_FILES_PER_GOAL,
            max_total_lines_changed: MAX_LINES_PER_GOAL,
            allowed_globs,
            require_test_change: true,
        }
    }

    /// Same as `from_goal`, but with the source-requires-test-change rule
    /// (§4.5.2) turned off.
    pub fn from_goal_without_test_rule(goal: &Goal) -> Self {
        Self { require_test_change: false, ..Self::from_goal(goal) }
    }
}

pub struct ScopeTracker {
    limits: ScopeLimits,
    files_touched: Vec<String>,
    total_lines_changed: usize,
    started_at: Instant,
}

fn looks_like_test_path(path: &str) -> bool {
    let lowered = path.to_lowercase();
    lowered.contains("/tests/")
        || lowered.starts_with("tests/")
        || lowered.contains("_test.")
        || lowered.contains("test_")
        || lowered.contains(".test.")
}

impl ScopeTracker {
    pub fn new(limits: ScopeLimits) -> Self {
        Self {
            limits,
            files_touched: Vec::new(),
            total_lines_changed: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_file_touch(&mut self, path: &str) {
        if !self.files_touched.contains(&path.to_string()) {
            self.files_touched.push(path.to_string());
        }
    }

    pub fn record_lines_changed(&mut self, lines: usize) {
        self.total_lines_changed += lines;
    }

    pub fn files_touched(&self) -> &[String] {
        &self.files_touched
    }

    pub fn total_lines_changed(&self) -> usize {
        self.total_lines_changed
    }

    pub fn check(&self) -> ScopeCheckResult {
        if self.files_touched.len() > self.limits.max_files_touched {
            return ScopeCheckResult::violated(
                "file_count",
                format!(
                    "{} files touched, limit is {}",
                    self.files_touched.len(),
                    self.limits.max_files_touched
                ),
            );
        }

        if self.total_lines_changed > self.limits.max_total_lines_changed {
            return ScopeCheckResult::violated(
                "line_count",
                format!(
                    "{} lines changed, limit is {}",
                    self.total_lines_changed, self.limits.max_total_lines_changed
                ),
            );
        }

        if self.started_at.elapsed() > MAX_GOAL_DURATION {
            return ScopeCheckResult::violated(
                "goal_duration",
                format!("goal has run for {:?}, limit is {:?}", self.started_at.elapsed(), MAX_GOAL_DURATION),
            );
        }

        if !self.limits.allowed_globs.is_empty() {
            for path in &self.files_touched {
                let in_scope = self
                    .limits
                    .allowed_globs
                    .iter()
                    .any(|glob| wildcard_matches(glob, path));
                if !in_scope {
                    return ScopeCheckResult::violated(
                        "out_of_scope_path",
                        format!("{path} is outside the planned file hints"),
                    );
                }
            }
        }

        if self.limits.require_test_change {
            let touches_source = self.files_touched.iter().any(|p| !looks_like_test_path(p));
            let touches_test = self.files_touched.iter().any(|p| looks_like_test_path(p));
            if touches_source && !touches_test {
                return ScopeCheckResult::violated(
                    "missing_test_change",
                    "source files changed with no corresponding test change",
                );
            }
        }

        ScopeCheckResult::ok()
    }
}

/// Cumulative counters for an entire session, spanning every goal the
/// session runs. Constructed once per session and never reset mid-session
/// — unlike `ScopeTracker`, which is fresh per goal, this is the one
/// instance that makes session-scope monotonicity meaningful.
pub struct SessionScopeTracker {
    files_touched: Vec<String>,
    total_lines_changed: usize,
    goals_completed: u32,
    started_at: Instant,
}

impl Default for SessionScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionScopeTracker {
    pub fn new() -> Self {
        Self {
            files_touched: Vec::new(),
            total_lines_changed: 0,
            goals_completed: 0,
            started_at: Instant::now(),
        }
    }

    /// Folds one goal's result into the session's running totals. Call
    /// once per completed goal, after that goal's own `ScopeTracker` has
    /// finished checking.
    pub fn record_goal(&mut self, files_touched: &[String], lines_changed: usize) {
        for path in files_touched {
            if !self.files_touched.contains(path) {
                self.files_touched.push(path.clone());
            }
        }
        self.total_lines_changed += lines_changed;
        self.goals_completed += 1;
    }

    pub fn check(&self) -> ScopeCheckResult {
        if self.files_touched.len() > MAX_FILES_PER_SESSION {
            return ScopeCheckResult::violated(
                "session_file_count",
                format!("{} files touched this session, limit is {}", self.files_touched.len(), MAX_FILES_PER_SESSION),
            );
        }
        if self.total_lines_changed > MAX_LINES_PER_SESSION {
            return ScopeCheckResult::violated(
                "session_line_count",
                format!(
                    "{} lines changed this session, limit is {}",
                    self.total_lines_changed, MAX_LINES_PER_SESSION
                ),
            );
        }
        if self.goals_completed > MAX_GOALS_PER_SESSION {
            return ScopeCheckResult::violated(
                "session_goal_count",
                format!("{} goals completed this session, limit is {}", self.goals_completed, MAX_GOALS_PER_SESSION),
            );
        }
        if self.started_at.elapsed() > MAX_SESSION_DURATION {
            return ScopeCheckResult::violated(
                "session_duration",
                format!("session has run for {:?}, limit is {:?}", self.started_at.elapsed(), MAX_SESSION_DURATION),
            );
        }
        ScopeCheckResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::{FileChangeHint, GoalCategory, GoalComplexity};

    fn goal_with_hints() -> Goal {
        let mut goal = Goal::new("Add retry logic", GoalCategory::Feature, GoalComplexity::Moderate);
        goal.planned_file_hints.push(FileChangeHint {
            path: "src/retry.rs".to_string(),
            reason: "new retry helper".to_string(),
        });
        goal
    }

    #[test]
    fn exceeding_file_limit_is_a_violation() {
        let limits = ScopeLimits::from_goal(&goal_with_hints());
        let mut tracker = ScopeTracker::new(limits);
        for i in 0..11 {
            tracker.record_file_touch(&format!("src/file_{i}.rs"));
        }
        let result = tracker.check();
        assert!(!result.passed);
        assert_eq!(result.limit_type.as_deref(), Some("file_count"));
    }

    #[test]
    fn touching_hinted_directory_stays_in_scope() {
        let limits = ScopeLimits::from_goal(&goal_with_hints());
        let mut tracker = ScopeTracker::new(limits);
        tracker.record_file_touch("src/retry.rs");
        tracker.record_file_touch("src/retry_test.rs");
        assert!(tracker.check().passed);
    }

    #[test]
    fn straying_outside_hinted_directory_is_flagged() {
        let limits = ScopeLimits::from_goal(&goal_with_hints());
        let mut tracker = ScopeTracker::new(limits);
        tracker.record_file_touch("docs/readme.md");
        let result = tracker.check();
        assert!(!result.passed);
        assert_eq!(result.limit_type.as_deref(), Some("out_of_scope_path"));
    }

    #[test]
    fn source_change_without_test_change_is_flagged() {
        let mut goal = goal_with_hints();
        goal.planned_file_hints.push(FileChangeHint {
            path: "src/other.rs".to_string(),
            reason: "unrelated change".to_string(),
        });
        let limits = ScopeLimits::from_goal(&goal);
        let mut tracker = ScopeTracker::new(limits);
        tracker.record_file_touch("src/retry.rs");
        let result = tracker.check();
        assert!(!result.passed);
        assert_eq!(result.limit_type.as_deref(), Some("missing_test_change"));
    }

    #[test]
    fn disabling_the_test_rule_allows_source_only_changes() {
        let limits = ScopeLimits::from_goal_without_test_rule(&goal_with_hints());
        let mut tracker = ScopeTracker::new(limits);
        tracker.record_file_touch("src/retry.rs");
        assert!(tracker.check().passed);
    }

    #[test]
    fn session_tracker_accumulates_across_goals() {
        let mut session = SessionScopeTracker::new();
        session.record_goal(&["src/a.rs".to_string()], 100);
        session.record_goal(&["src/b.rs".to_string()], 100);
        assert!(session.check().passed);
        assert_eq!(session.goals_completed, 2);
        assert_eq!(session.files_touched.len(), 2);
    }

    #[test]
    fn session_tracker_flags_goal_count_overrun() {
        let mut session = SessionScopeTracker::new();
        for i in 0..21 {
            session.record_goal(&[format!("src/file_{i}.rs")], 1);
        }
        let result = session.check();
        assert!(!result.passed);
        assert_eq!(result.limit_type.as_deref(), Some("session_goal_count"));
    }
}
