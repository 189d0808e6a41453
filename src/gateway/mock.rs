//! Scripted [`CommandRunner`] for tests
//!
//! Replies are consumed in order, one per command. A reply is either a fixed
//! [`CommandOutput`] or a handler closure, which lets a test play the part of
//! `pcs -f <file>` by writing a CIB to the file named in argv.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use super::{CommandOutput, CommandRunner};

type Handler = Box<dyn FnMut(&[String]) -> CommandOutput>;

/// Exit code returned once the script runs out
pub const UNSCRIPTED_EXIT_CODE: i32 = 127;

pub struct MockRunner {
    script: RefCell<VecDeque<Handler>>,
    commands: RefCell<Vec<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Queue a fixed reply.
    pub fn reply(self, output: CommandOutput) -> Self {
        self.handle(move |_| output.clone())
    }

    /// Queue a handler that computes the reply from argv.
    pub fn handle<F>(self, handler: F) -> Self
    where
        F: FnMut(&[String]) -> CommandOutput + 'static,
    {
        self.script.borrow_mut().push_back(Box::new(handler));
        self
    }

    /// Every argv seen so far, in order
    pub fn executed_commands(&self) -> Vec<Vec<String>> {
        self.commands.borrow().clone()
    }

    /// Replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.borrow().len()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        self.commands.borrow_mut().push(argv.to_vec());
        let next = self.script.borrow_mut().pop_front();
        Ok(match next {
            Some(mut handler) => handler(argv),
            None => CommandOutput::failure(
                UNSCRIPTED_EXIT_CODE,
                format!("no scripted reply for '{}'", argv.join(" ")),
            ),
        })
    }
}

/// Value following `flag` in argv, e.g. the file after `-f`
pub fn arg_after<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    argv.iter()
        .position(|arg| arg == flag)
        .and_then(|index| argv.get(index + 1))
        .map(String::as_str)
}
