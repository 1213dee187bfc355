// src/exec/resolver.rs

//! Mapping from a changed file to the command that should run for it.

/// One `[command."<suffix>"]` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRule {
    suffix: String,
    command: String,
}

impl CommandRule {
    pub fn new(suffix: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            command: command.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn matches(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }
}

/// Stateless suffix lookup: the first rule (in declaration order) whose
/// suffix ends `name` wins, otherwise the default command.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    default_command: String,
    rules: Vec<CommandRule>,
}

impl CommandResolver {
    pub fn new(default_command: impl Into<String>, rules: Vec<CommandRule>) -> Self {
        Self {
            default_command: default_command.into(),
            rules,
        }
    }

    pub fn default_command(&self) -> &str {
        &self.default_command
    }

    pub fn rules(&self) -> &[CommandRule] {
        &self.rules
    }

    pub fn resolve(&self, name: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(CommandRule::command)
            .unwrap_or(&self.default_command)
    }
}
