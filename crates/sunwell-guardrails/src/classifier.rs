use sunwell_types::{ActionClassification, CandidateAction, Risk, TrustZone};

/// Classifies a candidate action against the configured trust zones,
/// falling back to a built-in base risk per action kind when nothing
/// matches. Trust zones are checked in order; the first matching glob
/// wins, mirroring how permission rules are matched last-registered-first
/// in a wildcard rule table.
pub struct ActionClassifier {
    trust_zones: Vec<TrustZone>,
}

impl ActionClassifier {
    pub fn new(trust_zones: Vec<TrustZone>) -> Self {
        Self { trust_zones }
    }

    pub fn classify(&self, action: &CandidateAction) -> ActionClassification {
        let base_risk = base_risk_for(action);
        let action_type = action_type_name(action);
        let path = action.path().map(ToString::to_string);

        // Forbidden always wins: no trust zone, however permissive, can
        // downgrade a hard-coded forbidden pattern.
        if base_risk == Risk::Forbidden {
            return ActionClassification {
                action_type,
                risk: Risk::Forbidden,
                path,
                reason: default_reason(action),
                escalation_required: true,
                blocking_rule: None,
            };
        }

        if let Some(path) = path.as_deref() {
            if let Some(zone) = self
                .trust_zones
                .iter()
                .find(|zone| wildcard_matches(&zone.glob, path))
            {
                return ActionClassification {
                    action_type,
                    risk: zone.risk_override,
                    path: Some(path.to_string()),
                    reason: zone.reason.clone(),
                    escalation_required: zone.risk_override >= Risk::Dangerous,
                    blocking_rule: Some(zone.glob.clone()),
                };
            }
        }

        ActionClassification {
            action_type,
            risk: base_risk,
            path,
            reason: default_reason(action),
            escalation_required: base_risk >= Risk::Dangerous,
            blocking_rule: None,
        }
    }
}

fn action_type_name(action: &CandidateAction) -> String {
    match action {
        CandidateAction::WriteFile { .. } => "write_file",
        CandidateAction::EditFile { .. } => "edit_file",
        CandidateAction::ReadFile { .. } => "read_file",
        CandidateAction::RunShell { .. } => "run_shell",
        CandidateAction::DbSchema { .. } => "db_schema",
        CandidateAction::NetworkCall { .. } => "network_call",
    }
    .to_string()
}

/// Path fragments that mark a file as secret material or a system path no
/// goal should ever touch. Matched as a plain substring against the
/// action's path, independent of any user-configured trust zone — these
/// are the one pattern set a trust zone can never override.
const FORBIDDEN_PATH_FRAGMENTS: &[&str] = &[
    ".ssh/",
    "id_rsa",
    "id_ed25519",
    ".pem",
    ".pfx",
    ".env",
    ".aws/credentials",
    ".netrc",
    ".npmrc",
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    ".git/config",
    "credentials.json",
];

const FORBIDDEN_SCHEMA_FRAGMENTS: &[&str] = &["drop database", "drop schema", "truncate "];

const FORBIDDEN_NETWORK_FRAGMENTS: &[&str] = &["169.254.169.254", "metadata.google.internal"];

fn base_risk_for(action: &CandidateAction) -> Risk {
    match action {
        CandidateAction::ReadFile { .. } => Risk::Safe,
        CandidateAction::WriteFile { path } | CandidateAction::EditFile { path } => {
            if forbidden_path(path) {
                Risk::Forbidden
            } else {
                Risk::Moderate
            }
        }
        CandidateAction::RunShell { command } => shell_risk(command),
        CandidateAction::DbSchema { description } => {
            let lowered = description.to_lowercase();
            if FORBIDDEN_SCHEMA_FRAGMENTS.iter().any(|p| lowered.contains(p)) {
                Risk::Forbidden
            } else {
                Risk::Dangerous
            }
        }
        CandidateAction::NetworkCall { target } => {
            let lowered = target.to_lowercase();
            if FORBIDDEN_NETWORK_FRAGMENTS.iter().any(|p| lowered.contains(p)) {
                Risk::Forbidden
            } else {
                Risk::Moderate
            }
        }
    }
}

fn forbidden_path(path: &str) -> bool {
    let lowered = path.to_lowercase();
    FORBIDDEN_PATH_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment))
}

fn shell_risk(command: &str) -> Risk {
    const FORBIDDEN: &[&str] = &["rm -rf /", ":(){ :|:& };:", "mkfs", "dd if=/dev/zero"];
    const DANGEROUS: &[&str] = &["rm -rf", "git push --force", "git reset --hard", "sudo"];

    let trimmed = command.trim();
    if FORBIDDEN.iter().any(|p| trimmed.contains(p)) {
        return Risk::Forbidden;
    }
    if DANGEROUS.iter().any(|p| trimmed.contains(p)) {
        return Risk::Dangerous;
    }
    Risk::Moderate
}

fn default_reason(action: &CandidateAction) -> String {
    match action {
        CandidateAction::ReadFile { path } => format!("reading {path} carries no side effects"),
        CandidateAction::WriteFile { path } => format!("writing {path} is reversible via version control"),
        CandidateAction::EditFile { path } => format!("editing {path} is reversible via version control"),
        CandidateAction::RunShell { command } => format!("shell command classified by base risk: {command}"),
        CandidateAction::DbSchema { description } => format!("schema change: {description}"),
        CandidateAction::NetworkCall { target } => format!("outbound call to {target}"),
    }
}

/// Same semantics as a permission-rule glob: `*` matches any run,
/// segments between `*` must appear in order.
pub fn wildcard_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == value;
    }
    let mut remaining = value;
    let mut is_first = true;
    for part in pattern.split('*') {
        if part.is_empty() {
            continue;
        }
        if is_first {
            if let Some(stripped) = remaining.strip_prefix(part) {
                remaining = stripped;
            } else {
                return false;
            }
            is_first = false;
            continue;
        }
        if let Some(index) = remaining.find(part) {
            remaining = &remaining[index + part.len()..];
        } else {
            return false;
        }
    }
    pattern.ends_with('*') || remaining.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_shell_pattern_outranks_trust_zone_absence() {
        let classifier = ActionClassifier::new(Vec::new());
        let classification = classifier.classify(&CandidateAction::RunShell {
            command: "rm -rf /".to_string(),
        });
        assert_eq!(classification.risk, Risk::Forbidden);
        assert!(classification.escalation_required);
    }

    #[test]
    fn writing_a_credential_path_is_forbidden_regardless_of_trust_zones() {
        let zones = vec![TrustZone {
            glob: "secrets/*".to_string(),
            risk_override: Risk::Safe,
            allowed_in_autonomous: true,
            reason: "this zone should never matter".to_string(),
        }];
        let classifier = ActionClassifier::new(zones);
        let classification = classifier.classify(&CandidateAction::WriteFile {
            path: "secrets/id_rsa".to_string(),
        });
        assert_eq!(classification.risk, Risk::Forbidden);
        assert!(classification.escalation_required);
    }

    #[test]
    fn dropping_a_database_is_forbidden() {
        let classifier = ActionClassifier::new(Vec::new());
        let classification = classifier.classify(&CandidateAction::DbSchema {
            description: "DROP DATABASE production".to_string(),
        });
        assert_eq!(classification.risk, Risk::Forbidden);
    }

    #[test]
    fn calling_the_cloud_metadata_endpoint_is_forbidden() {
        let classifier = ActionClassifier::new(Vec::new());
        let classification = classifier.classify(&CandidateAction::NetworkCall {
            target: "http://169.254.169.254/latest/meta-data/".to_string(),
        });
        assert_eq!(classification.risk, Risk::Forbidden);
    }

    #[test]
    fn trust_zone_override_wins_over_base_risk() {
        let zones = vec![TrustZone {
            glob: "tests/*".to_string(),
            risk_override: Risk::Safe,
            allowed_in_autonomous: true,
            reason: "test fixtures are low stakes".to_string(),
        }];
        let classifier = ActionClassifier::new(zones);
        let classification = classifier.classify(&CandidateAction::WriteFile {
            path: "tests/fixture.json".to_string(),
        });
        assert_eq!(classification.risk, Risk::Safe);
        assert!(!classification.escalation_required);
    }

    #[test]
    fn wildcard_matches_prefix_and_suffix() {
        assert!(wildcard_matches("src/*.rs", "src/lib.rs"));
        assert!(!wildcard_matches("src/*.rs", "tests/lib.rs"));
        assert!(wildcard_matches("*", "anything"));
    }
}
