use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

/// Text-input capability handed to the controller. Dismissal is `None`.
pub trait InputPrompt {
    fn request_text(&mut self, message: &str, initial: &str) -> Option<String>;
    fn confirm(&mut self, message: &str) -> bool;
    fn alert(&mut self, message: &str);
}

/// Answers from prepared queues; an exhausted queue behaves like a dismissed
/// dialog.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompt {
    answers: VecDeque<Option<String>>,
    confirmations: VecDeque<bool>,
    pub asked: Vec<String>,
    pub alerts: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, text: impl Into<String>) -> Self {
        self.answers.push_back(Some(text.into()));
        self
    }

    pub fn dismiss(mut self) -> Self {
        self.answers.push_back(None);
        self
    }

    pub fn confirm_with(mut self, yes: bool) -> Self {
        self.confirmations.push_back(yes);
        self
    }
}

impl InputPrompt for ScriptedPrompt {
    fn request_text(&mut self, message: &str, _initial: &str) -> Option<String> {
        self.asked.push(message.to_string());
        self.answers.pop_front().flatten()
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.asked.push(message.to_string());
        self.confirmations.pop_front().unwrap_or(false)
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

/// Line-oriented prompt over a reader/writer pair. End of input dismisses.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Reads one line without its terminator, `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
            Err(err) => {
                warn!(error = %err, "failed reading prompt input");
                None
            }
        }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    fn show(&mut self, text: &str) {
        if let Err(err) = write!(self.output, "{text}").and_then(|_| self.output.flush()) {
            debug!(error = %err, "failed writing prompt");
        }
    }
}

impl<R: BufRead, W: Write> InputPrompt for TerminalPrompt<R, W> {
    fn request_text(&mut self, message: &str, initial: &str) -> Option<String> {
        if initial.is_empty() {
            self.show(&format!("{message} "));
        } else {
            self.show(&format!("{message} [current: {initial}] "));
        }
        self.read_line()
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.show(&format!("{message} (yes/no) "));
        self.read_line()
            .map(|answer| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    fn alert(&mut self, message: &str) {
        self.show(&format!("{message}\n"));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{InputPrompt, ScriptedPrompt, TerminalPrompt};

    #[test]
    fn terminal_prompt_distinguishes_empty_answer_from_eof() {
        let mut prompt = TerminalPrompt::new(Cursor::new("\n"), Vec::new());
        assert_eq!(prompt.request_text("Task?", "Gym"), Some(String::new()));
        assert_eq!(prompt.request_text("Task?", ""), None);

        let shown = String::from_utf8(prompt.output().clone()).expect("utf8");
        assert!(shown.contains("[current: Gym]"));
    }

    #[test]
    fn terminal_confirm_requires_yes() {
        let mut prompt = TerminalPrompt::new(Cursor::new("YES\nnah\n"), Vec::new());
        assert!(prompt.confirm("Reset?"));
        assert!(!prompt.confirm("Reset?"));
        assert!(!prompt.confirm("Reset?"));
    }

    #[test]
    fn scripted_prompt_runs_out_as_dismissal() {
        let mut prompt = ScriptedPrompt::new().answer("Gym").dismiss();
        assert_eq!(prompt.request_text("a", ""), Some("Gym".to_string()));
        assert_eq!(prompt.request_text("b", ""), None);
        assert_eq!(prompt.request_text("c", ""), None);
        assert!(!prompt.confirm("d"));
        assert_eq!(prompt.asked.len(), 4);
    }
}
