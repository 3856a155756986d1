use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::{ProvisionError, Result};
use crate::prompt::Prompter;

/// A queued answer to the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Choice(String),
    Choices(Vec<String>),
    /// Accept whatever the prompt pre-fills.
    Default,
}

/// Answers prompts from a queue and records every question asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, answer: Answer) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    pub fn text(self, value: &str) -> Self {
        self.answer(Answer::Text(value.to_string()))
    }

    pub fn choice(self, value: &str) -> Self {
        self.answer(Answer::Choice(value.to_string()))
    }

    pub fn choices(self, values: &[&str]) -> Self {
        self.answer(Answer::Choices(values.iter().map(|v| v.to_string()).collect()))
    }

    pub fn accept_default(self) -> Self {
        self.answer(Answer::Default)
    }

    /// Messages of every prompt shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, message: &str) -> Result<Answer> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        self.answers
            .lock()
            .map_err(|_| ProvisionError::Prompt("prompter poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| ProvisionError::Prompt(format!("no scripted answer for {:?}", message)))
    }
}

fn unexpected(message: &str, answer: &Answer) -> ProvisionError {
    ProvisionError::Prompt(format!("answer {:?} does not fit prompt {:?}", answer, message))
}

impl Prompter for ScriptedPrompter {
    fn get(&self, message: &str, _help: &str, default: Option<&str>) -> Result<String> {
        match self.next(message)? {
            Answer::Text(v) => Ok(v),
            Answer::Default => default
                .map(str::to_string)
                .ok_or_else(|| ProvisionError::Prompt(format!("{:?} has no default", message))),
            other => Err(unexpected(message, &other)),
        }
    }

    fn select_one(&self, message: &str, _help: &str, options: &[String]) -> Result<String> {
        match self.next(message)? {
            Answer::Choice(v) if options.contains(&v) => Ok(v),
            Answer::Choice(v) => {
                let matched = options.iter().find(|o| o.starts_with(&v)).cloned();
                matched.ok_or_else(|| unexpected(message, &Answer::Choice(v)))
            }
            Answer::Default => options
                .first()
                .cloned()
                .ok_or_else(|| ProvisionError::Prompt(format!("{:?} has no options", message))),
            other => Err(unexpected(message, &other)),
        }
    }

    fn multi_select(
        &self,
        message: &str,
        _help: &str,
        options: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>> {
        match self.next(message)? {
            Answer::Choices(values) => values
                .into_iter()
                .map(|v| {
                    options
                        .iter()
                        .find(|o| **o == v || o.starts_with(&format!("{} ", v)))
                        .cloned()
                        .ok_or_else(|| unexpected(message, &Answer::Choice(v)))
                })
                .collect(),
            Answer::Default => Ok(defaults.to_vec()),
            other => Err(unexpected(message, &other)),
        }
    }
}
