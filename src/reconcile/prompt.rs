//! Interactive decision strategies.

use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::TagValue;
use crate::error::{Error, Result};

/// Decides conflicts the engine cannot settle on its own.
pub trait Prompter {
    /// Index of the candidate to keep, or `None` to leave the field alone.
    fn choose(&self, question: &str, candidates: &[TagValue]) -> Result<Option<usize>>;

    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Batch-mode strategy: never decides anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipPrompter;

impl Prompter for SkipPrompter {
    fn choose(&self, _question: &str, _candidates: &[TagValue]) -> Result<Option<usize>> {
        Ok(None)
    }

    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn choose(&self, question: &str, candidates: &[TagValue]) -> Result<Option<usize>> {
        let mut items: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        items.push("(leave unchanged)".to_string());
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(0)
            .items(&items)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))?;
        Ok((selection < candidates.len()).then_some(selection))
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}

#[derive(Debug, Clone)]
enum Answer {
    Choice(Option<usize>),
    Confirm(bool),
}

/// Remembers answers for one file so repeated convergence passes ask once.
pub struct RememberingPrompter<'a> {
    inner: &'a dyn Prompter,
    answers: RefCell<HashMap<String, Answer>>,
}

impl<'a> RememberingPrompter<'a> {
    pub fn new(inner: &'a dyn Prompter) -> Self {
        Self { inner, answers: RefCell::new(HashMap::new()) }
    }
}

impl Prompter for RememberingPrompter<'_> {
    fn choose(&self, question: &str, candidates: &[TagValue]) -> Result<Option<usize>> {
        let key = format!("{question}\u{1f}{candidates:?}");
        if let Some(Answer::Choice(choice)) = self.answers.borrow().get(&key) {
            return Ok(*choice);
        }
        let choice = self.inner.choose(question, candidates)?;
        self.answers.borrow_mut().insert(key, Answer::Choice(choice));
        Ok(choice)
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        if let Some(Answer::Confirm(answer)) = self.answers.borrow().get(question) {
            return Ok(*answer);
        }
        let answer = self.inner.confirm(question)?;
        self.answers.borrow_mut().insert(question.to_string(), Answer::Confirm(answer));
        Ok(answer)
    }
}
