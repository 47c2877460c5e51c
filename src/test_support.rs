//! In-memory fakes for the console, input, and dialog host.

use crate::core::capability::{classify_line, InputSource, OutputSink, UserInput};
use crate::core::dialog::{DialogFault, DialogHost, HostWindow};
use crate::core::error::EngineError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Console that records every printed line.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    lines: Rc<RefCell<Vec<String>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(needle))
    }
}

impl OutputSink for MemoryConsole {
    fn print(&self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }
}

/// Input that replays canned answers and records the prompts shown.
/// Running out of answers behaves like end of input.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.clone()
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<UserInput, EngineError> {
        self.prompts.push(prompt.to_string());
        let answer = self.answers.pop_front().ok_or(EngineError::InputClosed)?;
        Ok(classify_line(&answer, "!skip"))
    }
}

/// Dialog host that logs `create N` / `raise N` / `destroy N`.
#[derive(Debug, Clone, Default)]
pub struct SpyHost {
    log: Rc<RefCell<Vec<String>>>,
    next: Rc<RefCell<u64>>,
    fail_create: bool,
}

impl SpyHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose window creation always fails.
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn count(&self, verb: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|l| l.starts_with(verb))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count("create ")
    }

    pub fn destroyed(&self) -> usize {
        self.count("destroy ")
    }
}

impl DialogHost for SpyHost {
    fn create(&self) -> Result<HostWindow, DialogFault> {
        if self.fail_create {
            return Err(DialogFault("no display".to_string()));
        }
        let mut next = self.next.borrow_mut();
        *next += 1;
        self.log.borrow_mut().push(format!("create {}", *next));
        Ok(HostWindow(*next))
    }

    fn raise(&self, window: HostWindow) {
        self.log.borrow_mut().push(format!("raise {}", window.0));
    }

    fn destroy(&self, window: HostWindow) {
        self.log.borrow_mut().push(format!("destroy {}", window.0));
    }
}
