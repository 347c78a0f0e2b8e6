//! Data models for the story submission wizard.
//!
//! [`SubmissionData`] is the single record edited across all wizard steps.
//! Its serde representation is the persisted draft format, so field names
//! are kept in camelCase (`aiTool`, `howAIHelped`, ...) and every field has
//! a default, letting an older draft load with missing fields left empty.
//!
//! # Examples
//!
//! ```rust
//! use story_core::models::{AiTool, Category, Field, SubmissionData};
//!
//! let mut data = SubmissionData::default();
//! data.set_from_str(Field::Category, "legal").unwrap();
//! data.ai_tool = Some(AiTool::Claude);
//!
//! assert_eq!(data.category, Some(Category::Legal));
//! assert!(data.files.is_empty());
//! ```

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use jiff::{tz::TimeZone, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};

/// Largest accepted attachment, in bytes (10 MB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default collection-time cap on the number of attachments.
pub const DEFAULT_MAX_FILES: usize = 5;

/// First navigable wizard step.
pub const FIRST_STEP: u8 = 1;

/// Last navigable wizard step (review).
pub const LAST_STEP: u8 = 5;

/// Area of life the story is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Legal,
    Medical,
    Financial,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Legal,
        Category::Medical,
        Category::Financial,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Legal => "Legal",
            Category::Medical => "Medical",
            Category::Financial => "Financial",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid category: {s}"))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI assistant the story is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AiTool {
    Claude,
    ChatGPT,
    Gemini,
    Other,
}

impl AiTool {
    pub const ALL: [AiTool; 4] = [AiTool::Claude, AiTool::ChatGPT, AiTool::Gemini, AiTool::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTool::Claude => "Claude",
            AiTool::ChatGPT => "ChatGPT",
            AiTool::Gemini => "Gemini",
            AiTool::Other => "Other",
        }
    }
}

impl FromStr for AiTool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AiTool::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid AI tool: {s}"))
    }
}

impl fmt::Display for AiTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attachment owned by [`SubmissionData::files`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    /// Opaque identifier, unique within one submission
    pub id: String,

    /// Original file name
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// MIME type reported at collection time
    #[serde(rename = "type")]
    pub mime_type: String,

    /// Transient local reference; not stable across reloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

static FILE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl UploadedFile {
    /// Creates a file entry with a freshly generated id.
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        let seq = FILE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("file-{}-{seq}", Timestamp::now().as_millisecond()),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            preview: None,
        }
    }
}

/// The record edited across all wizard steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_tool: Option<AiTool>,

    pub title: String,

    pub problem: String,

    #[serde(rename = "howAIHelped")]
    pub how_ai_helped: String,

    pub outcome: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub money_saved: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_saved: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_metric: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_excerpt: Option<String>,

    pub files: Vec<UploadedFile>,

    pub terms_accepted: bool,

    pub privacy_accepted: bool,
}

impl SubmissionData {
    /// Sets a single field from its textual form.
    ///
    /// Enums parse case-insensitively; checkboxes accept `true/false`,
    /// `yes/no` and `1/0`. Attachments cannot be set this way.
    pub fn set_from_str(&mut self, field: Field, value: &str) -> Result<()> {
        let invalid = |reason: String| WizardError::invalid_input(field.as_str()).with_reason(reason);

        match field {
            Field::Category => self.category = Some(value.parse().map_err(invalid)?),
            Field::AiTool => self.ai_tool = Some(value.parse().map_err(invalid)?),
            Field::Title => self.title = value.to_string(),
            Field::Problem => self.problem = value.to_string(),
            Field::HowAiHelped => self.how_ai_helped = value.to_string(),
            Field::Outcome => self.outcome = value.to_string(),
            Field::MoneySaved => self.money_saved = Some(value.to_string()),
            Field::TimeSaved => self.time_saved = Some(value.to_string()),
            Field::OtherMetric => self.other_metric = Some(value.to_string()),
            Field::ChatUrl => self.chat_url = Some(value.to_string()),
            Field::ChatExcerpt => self.chat_excerpt = Some(value.to_string()),
            Field::TermsAccepted => self.terms_accepted = parse_checkbox(value).map_err(invalid)?,
            Field::PrivacyAccepted => {
                self.privacy_accepted = parse_checkbox(value).map_err(invalid)?
            }
            Field::Files => {
                return Err(invalid(
                    "attachments are added one at a time, not set".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Resets a single field to its default.
    pub fn clear(&mut self, field: Field) {
        match field {
            Field::Category => self.category = None,
            Field::AiTool => self.ai_tool = None,
            Field::Title => self.title.clear(),
            Field::Problem => self.problem.clear(),
            Field::HowAiHelped => self.how_ai_helped.clear(),
            Field::Outcome => self.outcome.clear(),
            Field::MoneySaved => self.money_saved = None,
            Field::TimeSaved => self.time_saved = None,
            Field::OtherMetric => self.other_metric = None,
            Field::ChatUrl => self.chat_url = None,
            Field::ChatExcerpt => self.chat_excerpt = None,
            Field::Files => self.files.clear(),
            Field::TermsAccepted => self.terms_accepted = false,
            Field::PrivacyAccepted => self.privacy_accepted = false,
        }
    }
}

fn parse_checkbox(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{value}'")),
    }
}

/// Names of the fields of [`SubmissionData`], used to key validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Category,
    AiTool,
    Title,
    Problem,
    #[serde(rename = "howAIHelped")]
    HowAiHelped,
    Outcome,
    MoneySaved,
    TimeSaved,
    OtherMetric,
    ChatUrl,
    ChatExcerpt,
    Files,
    TermsAccepted,
    PrivacyAccepted,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Category,
        Field::AiTool,
        Field::Title,
        Field::Problem,
        Field::HowAiHelped,
        Field::Outcome,
        Field::MoneySaved,
        Field::TimeSaved,
        Field::OtherMetric,
        Field::ChatUrl,
        Field::ChatExcerpt,
        Field::Files,
        Field::TermsAccepted,
        Field::PrivacyAccepted,
    ];

    /// The field's name as it appears in the persisted draft.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Category => "category",
            Field::AiTool => "aiTool",
            Field::Title => "title",
            Field::Problem => "problem",
            Field::HowAiHelped => "howAIHelped",
            Field::Outcome => "outcome",
            Field::MoneySaved => "moneySaved",
            Field::TimeSaved => "timeSaved",
            Field::OtherMetric => "otherMetric",
            Field::ChatUrl => "chatUrl",
            Field::ChatExcerpt => "chatExcerpt",
            Field::Files => "files",
            Field::TermsAccepted => "termsAccepted",
            Field::PrivacyAccepted => "privacyAccepted",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    /// Accepts the camelCase name as well as snake/kebab case spellings.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().to_lowercase() == wanted)
            .ok_or_else(|| format!("Unknown field: {s}"))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the static step catalog.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WizardStep {
    /// 1-based position
    pub id: u8,
    /// Display label
    pub name: &'static str,
    /// Short identifier
    pub key: &'static str,
}

/// The ordered, fixed list of wizard steps.
pub const STEPS: [WizardStep; 5] = [
    WizardStep {
        id: 1,
        name: "Category & Tool",
        key: "basics",
    },
    WizardStep {
        id: 2,
        name: "Your Story",
        key: "story",
    },
    WizardStep {
        id: 3,
        name: "Chat Evidence",
        key: "evidence",
    },
    WizardStep {
        id: 4,
        name: "Attachments",
        key: "files",
    },
    WizardStep {
        id: 5,
        name: "Review & Consent",
        key: "review",
    },
];

impl WizardStep {
    /// Looks up a step by its 1-based id.
    pub fn get(id: u8) -> Option<&'static WizardStep> {
        STEPS.iter().find(|s| s.id == id)
    }
}

/// Observable autosave status for a "draft saved" indicator.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveState {
    /// When the last draft write completed
    pub last_saved: Option<Timestamp>,
    /// Whether the "saving" indicator is currently shown
    pub is_saving: bool,
}

/// A wrapper around `Timestamp` that formats it in the system timezone.
///
/// The display format is `YYYY-MM-DD HH:MM:SS TZ`.
///
/// ```rust
/// use story_core::models::LocalDateTime;
/// use jiff::Timestamp;
///
/// let now = Timestamp::now();
/// println!("Draft saved at {}", LocalDateTime::new(&now));
/// ```
pub struct LocalDateTime<'a>(&'a Timestamp);

impl<'a> LocalDateTime<'a> {
    pub fn new(timestamp: &'a Timestamp) -> Self {
        Self(timestamp)
    }
}

impl<'a> fmt::Display for LocalDateTime<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.to_zoned(TimeZone::system()).strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}
