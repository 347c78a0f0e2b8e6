//! Wizard controller and its builder.
//!
//! The [`Wizard`] owns the current step, the submission data and the
//! field-error map. Forward navigation is gated on validating the current
//! step; backward navigation never validates. Every data mutation goes
//! through the wizard so the autosave coordinator sees it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info};
use tokio::{runtime::Handle, task};

use crate::{
    autosave::{AutoSave, AutosaveDelays, ChangeObserver},
    error::{Result, WizardError},
    models::{
        AutoSaveState, Field, SubmissionData, UploadedFile, WizardStep, DEFAULT_MAX_FILES,
        FIRST_STEP, LAST_STEP, STEPS,
    },
    rules::{step_fields, FieldRules, ValidatedSubmission, ValidationErrors},
    store::{DraftBackend, DraftStore, MemoryBackend, SqliteBackend, DEFAULT_DRAFT_KEY},
};

/// Boundary that receives a fully validated submission.
pub trait SubmissionSink {
    fn submit(&self, submission: &ValidatedSubmission) -> Result<()>;
}

/// Step state machine over a single [`SubmissionData`] record.
pub struct Wizard {
    data: SubmissionData,
    current_step: u8,
    field_errors: BTreeMap<Field, String>,
    rules: FieldRules,
    autosave: AutoSave,
    max_files: usize,
}

impl Wizard {
    /// Creates a wizard with default data on the first step.
    ///
    /// No draft is read; call [`Wizard::recover_draft`] for that.
    pub fn new(rules: FieldRules, autosave: AutoSave, max_files: usize) -> Self {
        Self {
            data: SubmissionData::default(),
            current_step: FIRST_STEP,
            field_errors: BTreeMap::new(),
            rules,
            autosave,
            max_files,
        }
    }

    /// Replaces the data with the stored draft, if one can be read.
    pub fn recover_draft(&mut self) -> bool {
        match self.autosave.load_draft() {
            Some(draft) => {
                debug!("Recovered draft '{}'", draft.title);
                self.data = draft;
                true
            }
            None => false,
        }
    }

    pub fn data(&self) -> &SubmissionData {
        &self.data
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    /// Catalog entry for the current step.
    pub fn current(&self) -> &'static WizardStep {
        &STEPS[usize::from(self.current_step - FIRST_STEP)]
    }

    pub fn steps(&self) -> &'static [WizardStep] {
        &STEPS
    }

    pub fn is_first_step(&self) -> bool {
        self.current_step == FIRST_STEP
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step == LAST_STEP
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Moves to `target`.
    ///
    /// Moving forward (by one step or more) requires the current step to
    /// validate; on failure its field errors are populated and the step does
    /// not change. Moving backward or staying never validates. Targets
    /// outside the catalog are rejected without any state change, so
    /// `next_step` on the last step validates nothing; use [`Self::submit`]
    /// or [`Self::validate_current_step`] to surface errors there.
    pub fn go_to_step(&mut self, target: u8) -> bool {
        if !(FIRST_STEP..=LAST_STEP).contains(&target) {
            debug!("Rejected navigation to unknown step {target}");
            return false;
        }

        if target > self.current_step && !self.validate_current_step() {
            debug!(
                "Step {} blocks navigation to step {target}",
                self.current_step
            );
            return false;
        }

        debug!("Step {} -> {target}", self.current_step);
        self.current_step = target;
        true
    }

    pub fn next_step(&mut self) -> bool {
        self.go_to_step(self.current_step.saturating_add(1))
    }

    /// Moves one step back without validating; stays on the first step.
    pub fn prev_step(&mut self) {
        self.current_step = self.current_step.saturating_sub(1).max(FIRST_STEP);
    }

    /// Validates the current step and refreshes its field errors.
    pub fn validate_current_step(&mut self) -> bool {
        let fields = step_fields(self.current_step);
        self.field_errors.retain(|field, _| !fields.contains(field));

        match self.rules.validate_step(self.current_step, &self.data) {
            Ok(()) => true,
            Err(errors) => {
                self.record_errors(errors);
                false
            }
        }
    }

    /// Pure completeness query; never touches the field errors.
    pub fn is_step_complete(&self, step: u8) -> bool {
        self.rules.is_step_complete(step, &self.data)
    }

    pub fn field_errors(&self) -> &BTreeMap<Field, String> {
        &self.field_errors
    }

    pub fn field_error(&self, field: Field) -> Option<&str> {
        self.field_errors.get(&field).map(String::as_str)
    }

    pub fn auto_save_state(&self) -> AutoSaveState {
        self.autosave.state()
    }

    pub fn autosave(&self) -> &AutoSave {
        &self.autosave
    }

    /// Applies an arbitrary mutation and notifies the autosave coordinator.
    pub fn edit<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut SubmissionData),
    {
        mutate(&mut self.data);
        self.notify();
    }

    /// Sets one field from its textual form and clears its error.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
        self.data.set_from_str(field, value)?;
        self.field_errors.remove(&field);
        self.notify();
        Ok(())
    }

    /// Resets one field to its default and clears its error.
    pub fn clear_field(&mut self, field: Field) {
        self.data.clear(field);
        self.field_errors.remove(&field);
        self.notify();
    }

    /// Adds an attachment, enforcing the collection-time cap.
    ///
    /// File size is not checked here; oversized files are reported when the
    /// attachments step is validated.
    pub fn add_file(&mut self, file: UploadedFile) -> Result<()> {
        if self.data.files.len() >= self.max_files {
            return Err(WizardError::FileLimit {
                max: self.max_files,
            });
        }
        self.data.files.push(file);
        self.field_errors.remove(&Field::Files);
        self.notify();
        Ok(())
    }

    /// Removes the attachment with `id`; returns whether one was removed.
    pub fn remove_file(&mut self, id: &str) -> bool {
        let before = self.data.files.len();
        self.data.files.retain(|file| file.id != id);
        let removed = self.data.files.len() != before;
        if removed {
            self.field_errors.remove(&Field::Files);
            self.notify();
        }
        removed
    }

    /// Writes the pending draft immediately.
    pub fn save_now(&self) -> bool {
        self.autosave.flush()
    }

    /// Restores defaults, clears the stored draft and returns to step one.
    pub fn reset_form(&mut self) {
        self.data = SubmissionData::default();
        self.field_errors.clear();
        self.autosave.clear_draft();
        self.current_step = FIRST_STEP;
        info!("Submission form reset");
    }

    /// Validates the full record and hands it to `sink`.
    ///
    /// Returns `Ok(false)` with field errors populated when validation fails.
    /// After the sink accepts the submission the form is reset. Sink errors
    /// propagate and leave the data untouched.
    pub fn submit(&mut self, sink: &dyn SubmissionSink) -> Result<bool> {
        let submission = match self.rules.validate_all(&self.data) {
            Ok(submission) => submission,
            Err(errors) => {
                self.field_errors.clear();
                self.record_errors(errors);
                return Ok(false);
            }
        };

        sink.submit(&submission)?;
        info!("Submitted story '{}'", submission.data().title);
        self.reset_form();
        Ok(true)
    }

    /// Cancels pending autosave work. Also done on drop.
    pub fn shutdown(&self) {
        self.autosave.shutdown();
    }

    fn record_errors(&mut self, errors: ValidationErrors) {
        for error in errors.into_errors() {
            self.field_errors.entry(error.field).or_insert(error.message);
        }
    }

    fn notify(&self) {
        self.autosave.data_changed(&self.data);
    }
}

impl Drop for Wizard {
    fn drop(&mut self) {
        self.autosave.shutdown();
    }
}

/// Builder for configuring and creating [`Wizard`] instances.
///
/// ```rust,no_run
/// # use story_core::WizardBuilder;
/// # async {
/// let wizard = WizardBuilder::new()
///     .with_database_path("drafts.db")
///     .with_max_files(3)
///     .build()
///     .await?;
/// assert_eq!(wizard.current_step(), 1);
/// # Result::<(), story_core::WizardError>::Ok(())
/// # };
/// ```
pub struct WizardBuilder {
    database_path: Option<PathBuf>,
    backend: Option<Arc<dyn DraftBackend>>,
    in_memory: bool,
    draft_key: String,
    delays: AutosaveDelays,
    max_files: usize,
    rules: FieldRules,
    recover_draft: bool,
}

impl WizardBuilder {
    pub fn new() -> Self {
        Self {
            database_path: None,
            backend: None,
            in_memory: false,
            draft_key: DEFAULT_DRAFT_KEY.to_string(),
            delays: AutosaveDelays::default(),
            max_files: DEFAULT_MAX_FILES,
            rules: FieldRules::default(),
            recover_draft: true,
        }
    }

    /// Sets the SQLite file that holds drafts.
    ///
    /// If not specified, uses `$XDG_DATA_HOME/story-wizard/drafts.db`.
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keeps drafts in process memory only.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Uses the given backend; takes precedence over the other storage options.
    pub fn with_backend(mut self, backend: Arc<dyn DraftBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_draft_key(mut self, key: impl Into<String>) -> Self {
        self.draft_key = key.into();
        self
    }

    pub fn with_autosave_delays(mut self, delays: AutosaveDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_rules(mut self, rules: FieldRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_chat_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = self.rules.with_chat_domains(domains);
        self
    }

    /// Skips reading the stored draft on build.
    pub fn without_recovery(mut self) -> Self {
        self.recover_draft = false;
        self
    }

    /// Builds the wizard and recovers any stored draft.
    ///
    /// Must be called from within a tokio runtime; autosave timers run on it.
    ///
    /// # Errors
    ///
    /// Returns `WizardError::FileSystem` if the database directory cannot be
    /// created and `WizardError::Database` if the database cannot be opened.
    pub async fn build(self) -> Result<Wizard> {
        let backend: Arc<dyn DraftBackend> = match (self.backend, self.in_memory) {
            (Some(backend), _) => backend,
            (None, true) => Arc::new(MemoryBackend::new()),
            (None, false) => {
                let db_path = match self.database_path {
                    Some(path) => path,
                    None => Self::default_database_path()?,
                };

                if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| WizardError::FileSystem {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
                }

                let backend = task::spawn_blocking(move || SqliteBackend::open(&db_path))
                    .await
                    .map_err(WizardError::task_join)??;
                Arc::new(backend)
            }
        };

        let store = DraftStore::new(backend, self.draft_key);
        let autosave = AutoSave::new(store, self.delays, Handle::current());
        let mut wizard = Wizard::new(self.rules, autosave, self.max_files);

        if self.recover_draft {
            wizard.recover_draft();
        }

        Ok(wizard)
    }

    /// Returns the default database path following the XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("story-wizard")
            .place_data_file("drafts.db")
            .map_err(|e| WizardError::XdgDirectory(e.to_string()))
    }
}

impl Default for WizardBuilder {
    fn default() -> Self {
        Self::new()
    }
}
