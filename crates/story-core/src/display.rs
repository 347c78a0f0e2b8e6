//! Display wrapper types for wizard output.
//!
//! Wrappers hold references and format markdown, so the same data renders
//! through termimad in a terminal or as plain text when color is off.
//!
//! - [`StepRail`]: progress rail with one line per step
//! - [`StepFields`]: the current values and errors of one step's fields
//! - [`FieldErrorList`]: field-scoped validation feedback
//! - [`ReviewSummary`]: the whole submission, as shown on the review step
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use story_core::{display::FieldErrorList, models::Field};
//!
//! let mut errors = BTreeMap::new();
//! errors.insert(Field::Title, "Title must be at least 10 characters".to_string());
//! let output = FieldErrorList::new(&errors).to_string();
//! assert!(output.contains("`title`"));
//! ```

use std::{collections::BTreeMap, fmt};

use crate::{
    models::{AutoSaveState, Field, LocalDateTime, SubmissionData, STEPS},
    rules::step_fields,
    wizard::Wizard,
};

/// Progress rail: completed steps are checked, the current one is marked.
pub struct StepRail<'a> {
    wizard: &'a Wizard,
}

impl<'a> StepRail<'a> {
    pub fn new(wizard: &'a Wizard) -> Self {
        Self { wizard }
    }
}

impl<'a> fmt::Display for StepRail<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Progress")?;
        writeln!(f)?;
        for step in &STEPS {
            let icon = if step.id == self.wizard.current_step() {
                "➤"
            } else if self.wizard.is_step_complete(step.id) {
                "✓"
            } else {
                "○"
            };
            writeln!(f, "- {icon} {}. {}", step.id, step.name)?;
        }
        Ok(())
    }
}

/// The fields of one step with their values and any recorded errors.
pub struct StepFields<'a> {
    data: &'a SubmissionData,
    step: u8,
    errors: &'a BTreeMap<Field, String>,
}

impl<'a> StepFields<'a> {
    pub fn new(data: &'a SubmissionData, step: u8, errors: &'a BTreeMap<Field, String>) -> Self {
        Self { data, step, errors }
    }

    /// Shortcut for the wizard's current step.
    pub fn current(wizard: &'a Wizard) -> Self {
        Self::new(wizard.data(), wizard.current_step(), wizard.field_errors())
    }
}

impl<'a> fmt::Display for StepFields<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(step) = STEPS.iter().find(|s| s.id == self.step) else {
            return writeln!(f, "Unknown step {}.", self.step);
        };

        writeln!(f, "# Step {} of {}: {}", step.id, STEPS.len(), step.name)?;
        writeln!(f)?;
        for field in step_fields(step.id) {
            writeln!(f, "- **{field}**: {}", FieldValue(self.data, *field))?;
            if let Some(message) = self.errors.get(field) {
                writeln!(f, "  - ✗ {message}")?;
            }
        }
        Ok(())
    }
}

/// Field-scoped validation feedback.
pub struct FieldErrorList<'a> {
    errors: &'a BTreeMap<Field, String>,
}

impl<'a> FieldErrorList<'a> {
    pub fn new(errors: &'a BTreeMap<Field, String>) -> Self {
        Self { errors }
    }
}

impl<'a> fmt::Display for FieldErrorList<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return writeln!(f, "No problems found.");
        }

        writeln!(f, "**Please fix the following:**")?;
        writeln!(f)?;
        for (field, message) in self.errors {
            writeln!(f, "- `{field}`: {message}")?;
        }
        Ok(())
    }
}

/// Full submission summary for the review step.
pub struct ReviewSummary<'a> {
    data: &'a SubmissionData,
}

impl<'a> ReviewSummary<'a> {
    pub fn new(data: &'a SubmissionData) -> Self {
        Self { data }
    }
}

impl<'a> fmt::Display for ReviewSummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.data.title.is_empty() {
            "(untitled story)"
        } else {
            self.data.title.as_str()
        };
        writeln!(f, "# {title}")?;
        writeln!(f)?;

        for step in &STEPS {
            writeln!(f, "## {}", step.name)?;
            writeln!(f)?;
            for field in step_fields(step.id) {
                writeln!(f, "- **{field}**: {}", FieldValue(self.data, *field))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for AutoSaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_saving, &self.last_saved) {
            (true, _) => write!(f, "Saving draft…"),
            (false, Some(saved)) => write!(f, "Draft saved at {}", LocalDateTime::new(saved)),
            (false, None) => write!(f, "Draft not saved yet"),
        }
    }
}

struct FieldValue<'a>(&'a SubmissionData, Field);

impl<'a> fmt::Display for FieldValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0;
        let text = |value: &str| {
            if value.is_empty() {
                "_empty_".to_string()
            } else {
                value.to_string()
            }
        };
        let optional = |value: &Option<String>| value.as_deref().map_or("_empty_".to_string(), text);
        let checkbox = |checked: bool| if checked { "☑ yes" } else { "☐ no" }.to_string();

        let rendered = match self.1 {
            Field::Category => data.category.map_or("_not selected_".to_string(), |c| c.to_string()),
            Field::AiTool => data.ai_tool.map_or("_not selected_".to_string(), |t| t.to_string()),
            Field::Title => text(&data.title),
            Field::Problem => text(&data.problem),
            Field::HowAiHelped => text(&data.how_ai_helped),
            Field::Outcome => text(&data.outcome),
            Field::MoneySaved => optional(&data.money_saved),
            Field::TimeSaved => optional(&data.time_saved),
            Field::OtherMetric => optional(&data.other_metric),
            Field::ChatUrl => optional(&data.chat_url),
            Field::ChatExcerpt => optional(&data.chat_excerpt),
            Field::Files if data.files.is_empty() => "_none_".to_string(),
            Field::Files => data
                .files
                .iter()
                .map(|file| format!("{} ({} bytes, {}, id `{}`)", file.name, file.size, file.mime_type, file.id))
                .collect::<Vec<_>>()
                .join("; "),
            Field::TermsAccepted => checkbox(data.terms_accepted),
            Field::PrivacyAccepted => checkbox(data.privacy_accepted),
        };
        f.write_str(&rendered)
    }
}
