/// Operator confirmation at the façade boundary
use crate::error::TimelockError;
use console::{style, Term};

/// Asks a human (or a stand-in) to approve an irreversible step.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> Result<bool, TimelockError>;
}

/// Prompts on the controlling terminal and reads a y/N answer.
pub struct TerminalPrompt {
    term: Term,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        TerminalPrompt { term: Term::stderr() }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmPrompt for TerminalPrompt {
    fn confirm(&self, message: &str) -> Result<bool, TimelockError> {
        self.term
            .write_str(&format!("{} {} ", style("?").cyan().bold(), style(message).bold()))?;
        self.term.write_str("[y/N] ")?;
        let answer = self.term.read_line()?;
        Ok(is_yes(&answer))
    }
}

/// Answers every prompt the same way. For tests and unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmPrompt for AutoConfirm {
    fn confirm(&self, message: &str) -> Result<bool, TimelockError> {
        tracing::debug!("Auto-answering '{}' with {}", message, self.0);
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_auto_confirm() {
        assert!(AutoConfirm(true).confirm("Deposit?").unwrap());
        assert!(!AutoConfirm(false).confirm("Deposit?").unwrap());
    }
}
