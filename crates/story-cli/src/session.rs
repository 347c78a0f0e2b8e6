//! Interactive wizard session over a line-oriented input.
//!
//! Each input line is one command. Field edits go through the wizard, so the
//! autosave coordinator sees every change; `save` writes the draft at once
//! and leaving the session discards anything not yet written.

use std::{io::IsTerminal, str::FromStr};

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use story_core::{
    display::{FieldErrorList, ReviewSummary, StepFields, StepRail},
    models::Field,
    SubmissionSink, UploadedFile, ValidatedSubmission, Wizard, WizardError, WizardStep,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::renderer::TerminalRenderer;

const HELP: &str = "\
## Commands

- `show`: current step and its fields
- `steps`: progress through all steps
- `set <field> <value>`: set a field (e.g. `set category legal`)
- `unset <field>`: clear a field
- `attach <name> <size> [mime]`: add an attachment
- `detach <id>`: remove an attachment
- `next`, `back`, `goto <n>`: navigate
- `check`: validate the current step
- `review`: the whole submission
- `status`: draft save status
- `save`: write the draft now
- `reset`: start over and delete the draft
- `submit`: submit the story
- `quit`: leave the session
";

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Show,
    Steps,
    Set(Field, String),
    Unset(Field),
    Attach {
        name: String,
        size: u64,
        mime_type: String,
    },
    Detach(String),
    Next,
    Back,
    Goto(u8),
    Check,
    Review,
    Status,
    Save,
    Reset,
    Submit,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));

        let field = |raw: &str| -> std::result::Result<Field, String> {
            if raw.is_empty() {
                Err(format!("`{word}` needs a field name"))
            } else {
                raw.parse()
            }
        };

        let command = match word.to_lowercase().as_str() {
            "show" => SessionCommand::Show,
            "steps" => SessionCommand::Steps,
            "set" => {
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                SessionCommand::Set(field(name)?, value.trim().to_string())
            }
            "unset" => SessionCommand::Unset(field(rest)?),
            "attach" => {
                let mut parts = rest.split_whitespace();
                let (Some(name), Some(size)) = (parts.next(), parts.next()) else {
                    return Err("usage: attach <name> <size> [mime]".to_string());
                };
                let size = size
                    .parse()
                    .map_err(|_| format!("'{size}' is not a size in bytes"))?;
                SessionCommand::Attach {
                    name: name.to_string(),
                    size,
                    mime_type: parts
                        .next()
                        .unwrap_or("application/octet-stream")
                        .to_string(),
                }
            }
            "detach" if !rest.is_empty() => SessionCommand::Detach(rest.to_string()),
            "detach" => return Err("usage: detach <id>".to_string()),
            "next" => SessionCommand::Next,
            "back" | "prev" => SessionCommand::Back,
            "goto" => SessionCommand::Goto(
                rest.parse()
                    .map_err(|_| format!("'{rest}' is not a step number"))?,
            ),
            "check" => SessionCommand::Check,
            "review" => SessionCommand::Review,
            "status" => SessionCommand::Status,
            "save" => SessionCommand::Save,
            "reset" => SessionCommand::Reset,
            "submit" => SessionCommand::Submit,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" => SessionCommand::Quit,
            _ => return Err(format!("Unknown command '{word}'. Type `help` for a list.")),
        };
        Ok(command)
    }
}

/// Prints the validated submission as JSON on stdout.
pub struct JsonPrinter;

impl JsonPrinter {
    fn encode<T: Serialize>(value: &T) -> story_core::Result<String> {
        serde_json::to_string_pretty(value).map_err(|e| WizardError::Submission {
            message: format!("could not encode submission: {e}"),
        })
    }
}

impl SubmissionSink for JsonPrinter {
    fn submit(&self, submission: &ValidatedSubmission) -> story_core::Result<()> {
        let json = Self::encode(submission)?;
        println!("{json}");
        Ok(())
    }
}

/// Interactive session driving one wizard.
pub struct Session {
    wizard: Wizard,
    renderer: TerminalRenderer,
}

impl Session {
    pub fn new(wizard: Wizard, renderer: TerminalRenderer) -> Self {
        Self { wizard, renderer }
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R>(mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let interactive = std::io::stdin().is_terminal();
        let mut lines = input.lines();

        self.renderer.render(&StepFields::current(&self.wizard).to_string())?;

        loop {
            if interactive {
                print!("story> ");
                std::io::Write::flush(&mut std::io::stdout())?;
            }

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<SessionCommand>() {
                Ok(SessionCommand::Quit) => break,
                Ok(command) => {
                    debug!("Session command: {command:?}");
                    let output = self.execute(command);
                    self.renderer.render(&output)?;
                }
                Err(message) => self.renderer.render(&message)?,
            }
        }

        self.wizard.shutdown();
        Ok(())
    }

    /// Applies one command and returns the markdown to show.
    pub fn execute(&mut self, command: SessionCommand) -> String {
        let wizard = &mut self.wizard;
        match command {
            SessionCommand::Show => StepFields::current(wizard).to_string(),
            SessionCommand::Steps => StepRail::new(wizard).to_string(),
            SessionCommand::Review => ReviewSummary::new(wizard.data()).to_string(),
            SessionCommand::Set(field, value) => match wizard.set_field(field, &value) {
                Ok(()) => format!("Set `{field}`."),
                Err(e) => e.to_string(),
            },
            SessionCommand::Unset(field) => {
                wizard.clear_field(field);
                format!("Cleared `{field}`.")
            }
            SessionCommand::Attach {
                name,
                size,
                mime_type,
            } => {
                let file = UploadedFile::new(name, size, mime_type);
                let id = file.id.clone();
                match wizard.add_file(file) {
                    Ok(()) => format!("Attached file `{id}`."),
                    Err(e) => e.to_string(),
                }
            }
            SessionCommand::Detach(id) => {
                if wizard.remove_file(&id) {
                    format!("Removed file `{id}`.")
                } else {
                    format!("No attachment with id `{id}`.")
                }
            }
            SessionCommand::Next => {
                let target = wizard.current_step().saturating_add(1);
                Self::navigate(wizard, target)
            }
            SessionCommand::Goto(target) => Self::navigate(wizard, target),
            SessionCommand::Back => {
                wizard.prev_step();
                StepFields::current(wizard).to_string()
            }
            SessionCommand::Check => {
                if wizard.validate_current_step() {
                    format!("Step {} is complete.", wizard.current_step())
                } else {
                    FieldErrorList::new(wizard.field_errors()).to_string()
                }
            }
            SessionCommand::Status => wizard.auto_save_state().to_string(),
            SessionCommand::Save => {
                if wizard.save_now() {
                    "Draft saved.".to_string()
                } else {
                    "Nothing new to save.".to_string()
                }
            }
            SessionCommand::Reset => {
                wizard.reset_form();
                format!(
                    "Form reset and draft deleted.\n\n{}",
                    StepFields::current(wizard)
                )
            }
            SessionCommand::Submit => match wizard.submit(&JsonPrinter) {
                Ok(true) => "Story submitted. Thank you!".to_string(),
                Ok(false) => FieldErrorList::new(wizard.field_errors()).to_string(),
                Err(e) => e.to_string(),
            },
            SessionCommand::Help => HELP.to_string(),
            SessionCommand::Quit => String::new(),
        }
    }

    fn navigate(wizard: &mut Wizard, target: u8) -> String {
        let from = wizard.current_step();
        if wizard.go_to_step(target) {
            StepFields::current(wizard).to_string()
        } else if WizardStep::get(target).is_none() {
            format!("There is no step {target}.")
        } else {
            format!(
                "Step {from} is incomplete.\n\n{}",
                FieldErrorList::new(wizard.field_errors())
            )
        }
    }
}
