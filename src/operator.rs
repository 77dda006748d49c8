//! The operator boundary: questions asked of, and notices shown to, the
//! person driving the robot.
//!
//! Interpretation blocks on every [`Operator::prompt`]. An operator that can
//! no longer answer returns [`Error::OperatorClosed`], which ends the
//! interpretation.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};

use crate::{Error, Result};

/// Why a whole command line is asked for again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Compliance,
    MissingLocation,
}

/// A question that needs an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// The last phrase was unusable.
    NewPhrase,
    /// An element ended the phrase without a tag.
    TagOrPreposition { element: String },
    /// `tag` is not a tag-number of `element`; pick one of `candidates` (1-based).
    TagSelection { element: String, tag: String, candidates: Vec<String> },
    /// Start over with a complete command line.
    CommandLine { reason: Recovery },
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::NewPhrase => write!(f, "INPUT NEW PHRASE ▶ "),
            Prompt::TagOrPreposition { .. } => write!(f, "PROVIDE ID (TAG-NUMBER) OR PREPOSITION ▶ "),
            Prompt::TagSelection { candidates, .. } => {
                write!(f, "PROVIDE CORRECT TAG-NUMBER FROM THE LIST (1 - {}) ▶ ", candidates.len())
            }
            Prompt::CommandLine { reason: Recovery::Compliance } => {
                write!(f, "PLEASE ENTER A VALID COMMAND LINE ▶ ")
            }
            Prompt::CommandLine { reason: Recovery::MissingLocation } => {
                write!(f, "MISSING LOCATION - PLEASE ENTER A COMPLETE COMMAND LINE ▶ ")
            }
        }
    }
}

/// Something the operator should know; needs no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    UnknownToken { token: String },
    TagNotFound { element: String, tag: String },
    NoTagCandidates { element: String },
    MissingTag { element: String },
    NotANumber { input: String },
    OutOfRange { input: usize, max: usize },
    TrivialIntent { phrase: String },
    MissingCommand,
    NonCompliant { command: String, element: String },
    Unlocated { detail: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UnknownToken { token } => write!(f, "ATTENTION ! > ({token}) IS NOT PART OF THE WORLD MODEL"),
            Notice::TagNotFound { tag, .. } => write!(f, "ATTENTION ! > TAG NUMBER ({tag}) IS INCORRECT !"),
            Notice::NoTagCandidates { element } => write!(f, "ATTENTION ! > NO TAG NUMBERS AVAILABLE FOR ({element})"),
            Notice::MissingTag { element } => write!(f, "ATTENTION ! > ELEMENT ({element}) ID NOT FOUND"),
            Notice::NotANumber { input } => write!(f, "MUST BE A NUMBER ({input})"),
            Notice::OutOfRange { input, max } => write!(f, "SELECTION {input} IS OUT OF RANGE (1 - {max})"),
            Notice::TrivialIntent { phrase } => write!(f, "ATTENTION ! > ({phrase}) IS NOT A COMMAND LINE"),
            Notice::MissingCommand => write!(f, "INPUT A COMMAND"),
            Notice::NonCompliant { command, element } => write!(f, "NO ▶ Cannot {command} {element} !"),
            Notice::Unlocated { detail } => write!(f, "ATTENTION ! > {detail}"),
        }
    }
}

pub trait Operator {
    /// Ask and wait for a (trimmed) answer.
    fn prompt(&mut self, prompt: &Prompt) -> Result<String>;

    fn notify(&mut self, notice: &Notice) -> Result<()>;
}

// ============================================================================
// ConsoleOperator
// ============================================================================

/// Line-oriented operator over any reader/writer pair.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl ConsoleOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn prompt(&mut self, prompt: &Prompt) -> Result<String> {
        if let Prompt::TagSelection { candidates, .. } = prompt {
            writeln!(self.output, "\t\t▶ LIST OF AVAILABLE TAG-NUMBERS:")?;
            for (i, tag) in candidates.iter().enumerate() {
                writeln!(self.output, "\t\t  {}. {tag}", i + 1)?;
            }
        }
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::OperatorClosed);
        }
        Ok(line.trim().to_owned())
    }

    fn notify(&mut self, notice: &Notice) -> Result<()> {
        writeln!(self.output, "{notice}")?;
        Ok(())
    }
}

// ============================================================================
// ScriptedOperator
// ============================================================================

/// Answers from a queue and records everything it was asked or told.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    pub prompts: Vec<Prompt>,
    pub notices: Vec<Notice>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Operator for ScriptedOperator {
    fn prompt(&mut self, prompt: &Prompt) -> Result<String> {
        self.prompts.push(prompt.clone());
        let answer = self.answers.pop_front().ok_or(Error::OperatorClosed)?;
        Ok(answer.trim().to_owned())
    }

    fn notify(&mut self, notice: &Notice) -> Result<()> {
        self.notices.push(notice.clone());
        Ok(())
    }
}
