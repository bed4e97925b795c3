use std::path::PathBuf;

use sunwell_convergence::{lint_gate, test_gate, type_gate, Gate};

/// Fixed, non-user-composed shell commands used to build the gate set
/// for a run's convergence pass. Resolved once at startup from
/// workspace configuration; never assembled from task or goal text.
#[derive(Debug, Clone, Default)]
pub struct GateCommands {
    pub lint: Option<String>,
    pub type_check: Option<String>,
    pub test: Option<String>,
}

impl GateCommands {
    pub fn build(&self, workspace_root: &PathBuf) -> Vec<Box<dyn Gate>> {
        let mut gates: Vec<Box<dyn Gate>> = Vec::new();
        if let Some(command) = &self.lint {
            gates.push(lint_gate(workspace_root.clone(), command.clone()));
        }
        if let Some(command) = &self.type_check {
            gates.push(type_gate(workspace_root.clone(), command.clone()));
        }
        if let Some(command) = &self.test {
            gates.push(test_gate(workspace_root.clone(), command.clone()));
        }
        gates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_gates_are_built() {
        let commands = GateCommands { lint: Some("true".to_string()), type_check: None, test: None };
        let gates = commands.build(&PathBuf::from("/tmp"));
        assert_eq!(gates.len(), 1);
    }
}
