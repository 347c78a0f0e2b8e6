use std::path::{Path, PathBuf};

use story_core::{Wizard, WizardBuilder};
use tempfile::TempDir;

/// Helper function to create a wizard backed by a fresh SQLite file
pub async fn create_test_wizard() -> (TempDir, PathBuf, Wizard) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("drafts.db");
    let wizard = open_wizard(&db_path).await;
    (temp_dir, db_path, wizard)
}

/// Helper function to open another wizard on an existing database file
pub async fn open_wizard(db_path: &Path) -> Wizard {
    WizardBuilder::new()
        .with_database_path(db_path)
        .build()
        .await
        .expect("Failed to create wizard")
}

/// A narrative long enough for the story step
pub fn narrative(subject: &str) -> String {
    format!("{subject}: a description that is comfortably longer than fifty characters.")
}
