//! Interactive confirmation collaborator and parsers for its answers.
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::VecDeque;

use crate::error::{Result, SweepError};

/// Source of human answers. The sweep never deletes without one.
pub trait Prompter {
    /// Ask a question and return the raw line typed in reply.
    fn ask(&mut self, question: &str) -> Result<String>;

    /// Show a line of output to the operator.
    fn say(&mut self, line: &str);
}

pub struct TerminalPrompter {
    editor: DefaultEditor,
}

impl TerminalPrompter {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| SweepError::Prompt(e.to_string()))?;
        Ok(Self { editor })
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        match self.editor.readline(question) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                Err(SweepError::Aborted("input closed".into()))
            }
            Err(err) => Err(SweepError::Prompt(err.to_string())),
        }
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Replays canned answers; used to drive a sweep without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub output: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| SweepError::Aborted(format!("no scripted answer for {question:?}")))
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

/// Chats picked from a numbered menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The trailing "all groups" option.
    All,
    /// Zero-based indices into the menu, in the order typed.
    Chosen(Vec<usize>),
}

/// Parse comma-separated 1-based options. Option `option_count + 1` selects everything.
pub fn parse_selection(input: &str, option_count: usize) -> Result<Selection> {
    let mut picked = Vec::new();
    for part in input.split(',') {
        let n: usize = part
            .trim()
            .parse()
            .map_err(|_| SweepError::InvalidInput(format!("{:?} is not an option number", part.trim())))?;
        if n == 0 || n > option_count + 1 {
            return Err(SweepError::InvalidInput(format!(
                "option {n} is out of range 1..={}",
                option_count + 1
            )));
        }
        if n == option_count + 1 {
            return Ok(Selection::All);
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    Ok(Selection::Chosen(picked))
}

/// Day count for the cutoff; an empty answer takes `default`.
pub fn parse_days(input: &str, default: u32) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed
        .parse()
        .map_err(|_| SweepError::InvalidInput(format!("{trimmed:?} is not a number of days")))
}

pub fn parse_message_id(input: &str) -> Result<i32> {
    let trimmed = input.trim();
    trimmed
        .parse()
        .map_err(|_| SweepError::InvalidInput(format!("{trimmed:?} is not a message id")))
}

pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

pub fn acknowledges(answer: &str) -> bool {
    answer.trim().to_uppercase() == "I UNDERSTAND"
}
