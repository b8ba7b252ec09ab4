use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::{bail, Result};
use log::{info, warn};

/// Requests the experimenter can make while trials are playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause,
    Abort,
}

impl OperatorCommand {
    /// `p` or a digit 1-4 pauses; `q` aborts.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "1" | "2" | "3" | "4" => Some(Self::Pause),
            "q" | "quit" | "esc" | "escape" => Some(Self::Abort),
            _ => None,
        }
    }
}

/// The experimenter's side of the session.
pub trait Operator {
    /// Shows `message` and blocks until the experimenter confirms.
    fn wait_for_continue(&mut self, message: &str) -> Result<()>;
    /// Non-blocking check for a pending command.
    fn poll(&mut self) -> Option<OperatorCommand>;
}

impl<O: Operator + ?Sized> Operator for Box<O> {
    fn wait_for_continue(&mut self, message: &str) -> Result<()> {
        (**self).wait_for_continue(message)
    }
    fn poll(&mut self) -> Option<OperatorCommand> {
        (**self).poll()
    }
}

/// Operator on the controlling terminal.
///
/// Stdin is read on a background thread so `poll` never blocks the trial loop.
pub struct ConsoleOperator {
    lines: Receiver<String>,
}

impl ConsoleOperator {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

impl Operator for ConsoleOperator {
    fn wait_for_continue(&mut self, message: &str) -> Result<()> {
        while self.lines.try_recv().is_ok() {}
        println!("{message}");
        println!("[press Enter to continue]");
        match self.lines.recv() {
            Ok(_) => Ok(()),
            Err(_) => bail!("operator input closed"),
        }
    }

    fn poll(&mut self) -> Option<OperatorCommand> {
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    if let Some(command) = OperatorCommand::parse(&line) {
                        return Some(command);
                    }
                    warn!("ignoring operator input '{}'", line.trim());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}

/// Confirms every prompt immediately; for unattended simulated sessions.
#[derive(Debug, Default)]
pub struct AutoOperator {
    pub prompts: Vec<String>,
}

impl Operator for AutoOperator {
    fn wait_for_continue(&mut self, message: &str) -> Result<()> {
        info!("{}", message.replace('\n', " "));
        self.prompts.push(message.to_string());
        Ok(())
    }
    fn poll(&mut self) -> Option<OperatorCommand> {
        None
    }
}
