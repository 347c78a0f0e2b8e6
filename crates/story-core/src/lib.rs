//! Core library for the story submission wizard.
//!
//! A story is collected over five steps. Each step validates its own subset
//! of fields before the user may move forward, while every edit is autosaved
//! as a recoverable draft after a short quiet period.
//!
//! - [`rules`]: the field rule registry and per-step field groupings
//! - [`store`]: the draft storage port and its SQLite and memory backends
//! - [`autosave`]: debounced draft writes with a flicker-free saving flag
//! - [`wizard`]: the step state machine and its builder
//! - [`display`]: markdown display wrappers for terminal output
//!
//! # Quick Start
//!
//! ```rust
//! use story_core::{models::Field, WizardBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut wizard = WizardBuilder::new().in_memory().build().await?;
//!
//! wizard.set_field(Field::Category, "Legal")?;
//! assert!(!wizard.next_step()); // the AI tool is still missing
//!
//! wizard.set_field(Field::AiTool, "Claude")?;
//! assert!(wizard.next_step());
//! assert_eq!(wizard.current_step(), 2);
//! # Ok(())
//! # }
//! ```

pub mod autosave;
pub mod display;
pub mod error;
pub mod models;
pub mod rules;
pub mod store;
pub mod wizard;

// Re-export commonly used types
pub use autosave::{AutoSave, AutosaveDelays, ChangeObserver};
pub use display::{FieldErrorList, ReviewSummary, StepFields, StepRail};
pub use error::{Result, WizardError};
pub use models::{
    AiTool, AutoSaveState, Category, Field, SubmissionData, UploadedFile, WizardStep, STEPS,
};
pub use rules::{FieldError, FieldRules, ValidatedSubmission, ValidationErrors};
pub use store::{DraftBackend, DraftStore, MemoryBackend, SqliteBackend};
pub use wizard::{SubmissionSink, Wizard, WizardBuilder};
