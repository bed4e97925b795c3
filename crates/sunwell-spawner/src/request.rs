use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub parent_id: String,
    pub role: String,
    pub focus: String,
    pub reason: String,
    #[serde(default)]
    pub tool_whitelist: Vec<String>,
    #[serde(default)]
    pub context_keys: Vec<String>,
    #[serde(default = "default_token_budget")]
    pub token_budget: u64,
}

fn default_token_budget() -> u64 {
    5_000
}

impl SpawnRequest {
    pub fn new(parent_id: impl Into<String>, role: impl Into<String>, focus: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            role: role.into(),
            focus: focus.into(),
            reason: reason.into(),
            tool_whitelist: Vec::new(),
            context_keys: Vec::new(),
            token_budget: default_token_budget(),
        }
    }

    /// The budget handed to a child: 20% of whatever the parent has left,
    /// capped at the request's own `token_budget`.
    pub fn allocate_from(&self, parent_remaining_tokens: u64) -> u64 {
        (parent_remaining_tokens / 5).min(self.token_budget)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("spawn depth {attempted} exceeds max_spawn_depth {max}")]
    SpawnDepthExceeded { attempted: u32, max: u32 },
    #[error("parent {parent_id} already has {active} children, at lens cap {max}")]
    ChildCapExceeded { parent_id: String, active: u32, max: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_one_fifth_of_parent_remaining_capped_by_request() {
        let request = SpawnRequest::new("p1", "worker", "narrow thing", "focused subtask");
        assert_eq!(request.allocate_from(100_000), 5_000);
        assert_eq!(request.allocate_from(10_000), 2_000);
    }
}
