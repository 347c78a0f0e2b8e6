//! One-shot commands operating on the stored draft.

use anyhow::{bail, Result};
use story_core::{
    display::{FieldErrorList, ReviewSummary},
    Wizard,
};

use crate::{
    args::{DraftCommands, ValidateArgs},
    renderer::TerminalRenderer,
};

pub struct Cli {
    wizard: Wizard,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(wizard: Wizard, renderer: TerminalRenderer) -> Self {
        Self { wizard, renderer }
    }

    pub fn handle_draft_command(mut self, command: DraftCommands) -> Result<()> {
        match command {
            DraftCommands::Show => match self.wizard.autosave().load_draft() {
                Some(draft) => self.renderer.render(&ReviewSummary::new(&draft).to_string()),
                None => self.renderer.render("No draft saved."),
            },
            DraftCommands::Clear => {
                self.wizard.reset_form();
                self.renderer.render("Draft cleared.")
            }
        }
    }

    /// Validates the recovered draft; fails when any rule fails.
    pub fn validate(&self, args: &ValidateArgs) -> Result<()> {
        let rules = self.wizard.rules();
        let data = self.wizard.data();

        let result = match args.step {
            Some(step) => rules.validate_step(step, data),
            None => rules.validate_all(data).map(|_| ()),
        };

        match result {
            Ok(()) => {
                let scope = args
                    .step
                    .map_or("The draft".to_string(), |step| format!("Step {step}"));
                self.renderer.render(&format!("{scope} is complete."))
            }
            Err(errors) => {
                self.renderer
                    .render(&FieldErrorList::new(&errors.by_field()).to_string())?;
                bail!("Draft failed validation: {errors}")
            }
        }
    }
}
