//! Field rule registry.
//!
//! Every rule is registered once, keyed by the field its error is reported
//! against. Steps are named groupings of fields: validating a step runs only
//! the rules whose field belongs to that step, and validating the full record
//! runs all of them. Cross-field rules (at least one metric, link or excerpt)
//! are keyed to a field inside the step whose fields they read, so step
//! validation never reports on a field outside the step.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::models::{Field, SubmissionData, WizardStep, MAX_FILE_SIZE};

/// Minimum title length, inclusive.
pub const TITLE_MIN_LEN: usize = 10;

/// Maximum title length, inclusive.
pub const TITLE_MAX_LEN: usize = 100;

/// Minimum length of the problem, how-AI-helped and outcome narratives.
pub const NARRATIVE_MIN_LEN: usize = 50;

/// Hosts accepted for a pasted chat link; subdomains also match.
pub const DEFAULT_CHAT_DOMAINS: [&str; 4] =
    ["claude.ai", "chatgpt.com", "chat.openai.com", "gemini.google.com"];

const STEP_FIELDS: [&[Field]; 5] = [
    &[Field::Category, Field::AiTool],
    &[
        Field::Title,
        Field::Problem,
        Field::HowAiHelped,
        Field::Outcome,
        Field::MoneySaved,
        Field::TimeSaved,
        Field::OtherMetric,
    ],
    &[Field::ChatUrl, Field::ChatExcerpt],
    &[Field::Files],
    &[Field::TermsAccepted, Field::PrivacyAccepted],
];

/// Returns the fields validated by the given step, empty for unknown steps.
pub fn step_fields(step: u8) -> &'static [Field] {
    match step {
        1..=5 => STEP_FIELDS[usize::from(step) - 1],
        _ => &[],
    }
}

/// A validation failure attributed to exactly one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more field-scoped validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{count} field(s) failed validation", count = .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    /// First message per field, as shown next to form inputs.
    pub fn by_field(&self) -> BTreeMap<Field, String> {
        let mut map = BTreeMap::new();
        for error in &self.0 {
            map.entry(error.field).or_insert_with(|| error.message.clone());
        }
        map
    }

    /// Fields with at least one error, in rule order, without duplicates.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = Vec::new();
        for error in &self.0 {
            if !fields.contains(&error.field) {
                fields.push(error.field);
            }
        }
        fields
    }
}

/// A record that passed every rule; the only shape handed to a submission
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSubmission(SubmissionData);

impl ValidatedSubmission {
    pub fn data(&self) -> &SubmissionData {
        &self.0
    }

    pub fn into_inner(self) -> SubmissionData {
        self.0
    }
}

type Check = fn(&FieldRules, &SubmissionData) -> Vec<String>;

struct Rule {
    field: Field,
    check: Check,
}

const RULES: &[Rule] = &[
    Rule {
        field: Field::Category,
        check: |_, data| required(data.category.is_some(), "Please select a category"),
    },
    Rule {
        field: Field::AiTool,
        check: |_, data| required(data.ai_tool.is_some(), "Please select the AI tool you used"),
    },
    Rule {
        field: Field::Title,
        check: |_, data| {
            let len = data.title.chars().count();
            if len < TITLE_MIN_LEN {
                vec![format!("Title must be at least {TITLE_MIN_LEN} characters")]
            } else if len > TITLE_MAX_LEN {
                vec![format!("Title must be at most {TITLE_MAX_LEN} characters")]
            } else {
                Vec::new()
            }
        },
    },
    Rule {
        field: Field::Problem,
        check: |_, data| narrative(&data.problem, "the problem you faced"),
    },
    Rule {
        field: Field::HowAiHelped,
        check: |_, data| narrative(&data.how_ai_helped, "how AI helped"),
    },
    Rule {
        field: Field::Outcome,
        check: |_, data| narrative(&data.outcome, "the outcome"),
    },
    Rule {
        field: Field::MoneySaved,
        check: |_, data| {
            let any_metric = [&data.money_saved, &data.time_saved, &data.other_metric]
                .into_iter()
                .any(|metric| present(metric.as_deref()));
            required(
                any_metric,
                "Please provide at least one metric: money saved, time saved, or another outcome",
            )
        },
    },
    Rule {
        field: Field::ChatUrl,
        check: |rules, data| match data.chat_url.as_deref() {
            Some(raw) if !raw.is_empty() => rules.check_chat_url(raw).err().into_iter().collect(),
            _ => Vec::new(),
        },
    },
    Rule {
        field: Field::ChatUrl,
        check: |_, data| {
            required(
                present(data.chat_url.as_deref()) || present(data.chat_excerpt.as_deref()),
                "Please provide a chat link or paste an excerpt of the conversation",
            )
        },
    },
    Rule {
        field: Field::Files,
        check: |rules, data| {
            data.files
                .iter()
                .filter(|file| file.size > rules.max_file_size)
                .map(|file| {
                    format!(
                        "'{}' exceeds the maximum file size of {}",
                        file.name,
                        human_size(rules.max_file_size)
                    )
                })
                .collect()
        },
    },
    Rule {
        field: Field::TermsAccepted,
        check: |_, data| required(data.terms_accepted, "You must accept the submission terms"),
    },
    Rule {
        field: Field::PrivacyAccepted,
        check: |_, data| required(data.privacy_accepted, "You must accept the privacy policy"),
    },
];

/// Presence means a non-empty string; whitespace is not trimmed.
fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

fn required(ok: bool, message: &str) -> Vec<String> {
    if ok {
        Vec::new()
    } else {
        vec![message.to_string()]
    }
}

fn narrative(value: &str, subject: &str) -> Vec<String> {
    required(
        value.chars().count() >= NARRATIVE_MIN_LEN,
        &format!("Please describe {subject} in at least {NARRATIVE_MIN_LEN} characters"),
    )
}

fn human_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{bytes} bytes")
    }
}

/// The registry of field rules, with its configurable parameters.
#[derive(Debug, Clone)]
pub struct FieldRules {
    chat_domains: Vec<String>,
    max_file_size: u64,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            chat_domains: DEFAULT_CHAT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the chat-link domain allow-list.
    pub fn with_chat_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat_domains = domains
            .into_iter()
            .map(|d| d.into().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Overrides the per-file size limit in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn chat_domains(&self) -> &[String] {
        &self.chat_domains
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validates only the fields belonging to `step`.
    ///
    /// Unknown steps have no fields and therefore always pass.
    pub fn validate_step(
        &self,
        step: u8,
        data: &SubmissionData,
    ) -> Result<(), ValidationErrors> {
        let errors = self.run(step_fields(step), data);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Side-effect-free completeness query for progress indicators.
    pub fn is_step_complete(&self, step: u8, data: &SubmissionData) -> bool {
        WizardStep::get(step).is_some() && self.validate_step(step, data).is_ok()
    }

    /// Runs every rule against the full record.
    pub fn validate_all(
        &self,
        data: &SubmissionData,
    ) -> Result<ValidatedSubmission, ValidationErrors> {
        let errors = self.run(&Field::ALL, data);
        if errors.is_empty() {
            Ok(ValidatedSubmission(data.clone()))
        } else {
            Err(ValidationErrors(errors))
        }
    }

    fn run(&self, fields: &[Field], data: &SubmissionData) -> Vec<FieldError> {
        RULES
            .iter()
            .filter(|rule| fields.contains(&rule.field))
            .flat_map(|rule| {
                (rule.check)(self, data)
                    .into_iter()
                    .map(move |message| FieldError::new(rule.field, message))
            })
            .collect()
    }

    /// Checks that `raw` parses as a URL whose host is an allow-listed
    /// domain or one of its subdomains.
    pub fn check_chat_url(&self, raw: &str) -> Result<(), String> {
        let url = Url::parse(raw).map_err(|_| "Please enter a valid URL".to_string())?;
        let host = url
            .host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| "Please enter a valid URL".to_string())?;

        let allowed = self
            .chat_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(format!(
                "Chat link must be from a supported provider ({})",
                self.chat_domains.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiTool, Category, UploadedFile};

    fn long_text() -> String {
        "x".repeat(NARRATIVE_MIN_LEN)
    }

    fn story_step_data() -> SubmissionData {
        SubmissionData {
            title: "A perfectly fine title".to_string(),
            problem: long_text(),
            how_ai_helped: long_text(),
            outcome: long_text(),
            money_saved: Some("$1,200".to_string()),
            ..Default::default()
        }
    }

    fn complete_data() -> SubmissionData {
        SubmissionData {
            category: Some(Category::Legal),
            ai_tool: Some(AiTool::Claude),
            chat_url: Some("https://claude.ai/chat/123".to_string()),
            terms_accepted: true,
            privacy_accepted: true,
            ..story_step_data()
        }
    }

    fn file_of_size(size: u64) -> UploadedFile {
        UploadedFile {
            id: "f1".to_string(),
            name: "scan.pdf".to_string(),
            size,
            mime_type: "application/pdf".to_string(),
            preview: None,
        }
    }

    fn error_fields(result: Result<(), ValidationErrors>) -> Vec<Field> {
        result.err().map(|e| e.fields()).unwrap_or_default()
    }

    #[test]
    fn test_step_one_requires_category_and_tool() {
        let rules = FieldRules::new();
        let data = SubmissionData::default();

        assert_eq!(
            error_fields(rules.validate_step(1, &data)),
            vec![Field::Category, Field::AiTool]
        );

        let data = SubmissionData {
            category: Some(Category::Legal),
            ai_tool: Some(AiTool::Claude),
            ..Default::default()
        };
        assert!(rules.validate_step(1, &data).is_ok());
    }

    #[test]
    fn test_title_length_boundaries() {
        let rules = FieldRules::new();
        let with_title = |len: usize| SubmissionData {
            title: "t".repeat(len),
            ..story_step_data()
        };

        assert_eq!(error_fields(rules.validate_step(2, &with_title(9))), vec![Field::Title]);
        assert!(rules.validate_step(2, &with_title(10)).is_ok());
        assert!(rules.validate_step(2, &with_title(100)).is_ok());
        assert_eq!(error_fields(rules.validate_step(2, &with_title(101))), vec![Field::Title]);
    }

    #[test]
    fn test_title_length_counts_characters() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            title: "é".repeat(10),
            ..story_step_data()
        };
        assert!(rules.validate_step(2, &data).is_ok());
    }

    #[test]
    fn test_narratives_need_fifty_characters() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            problem: "x".repeat(49),
            outcome: String::new(),
            ..story_step_data()
        };

        let errors = rules.validate_step(2, &data).unwrap_err();
        assert_eq!(errors.fields(), vec![Field::Problem, Field::Outcome]);
    }

    #[test]
    fn test_at_least_one_metric() {
        let rules = FieldRules::new();
        let none = SubmissionData {
            money_saved: None,
            time_saved: Some(String::new()),
            other_metric: None,
            ..story_step_data()
        };
        assert_eq!(error_fields(rules.validate_step(2, &none)), vec![Field::MoneySaved]);

        let one = SubmissionData {
            money_saved: None,
            time_saved: Some("3 weeks".to_string()),
            ..story_step_data()
        };
        assert!(rules.validate_step(2, &one).is_ok());
    }

    #[test]
    fn test_whitespace_metric_counts_as_present() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            money_saved: None,
            other_metric: Some(" ".to_string()),
            ..story_step_data()
        };
        assert!(rules.validate_step(2, &data).is_ok());
    }

    #[test]
    fn test_chat_url_domains() {
        let rules = FieldRules::new();
        let with_url = |url: &str| SubmissionData {
            chat_url: Some(url.to_string()),
            ..Default::default()
        };

        assert!(rules.validate_step(3, &with_url("https://claude.ai/chat/123")).is_ok());
        assert!(rules.validate_step(3, &with_url("https://beta.claude.ai/chat/1")).is_ok());
        assert!(rules.validate_step(3, &with_url("https://chatgpt.com/share/abc")).is_ok());

        let errors = rules
            .validate_step(3, &with_url("https://example.com/chat/123"))
            .unwrap_err();
        assert_eq!(errors.fields(), vec![Field::ChatUrl]);
        assert!(errors.errors()[0].message.contains("supported provider"));

        assert!(rules.validate_step(3, &with_url("https://notclaude.ai/chat/1")).is_err());
    }

    #[test]
    fn test_chat_url_must_parse() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            chat_url: Some("claude.ai/chat/123".to_string()),
            chat_excerpt: Some("excerpt".to_string()),
            ..Default::default()
        };

        let errors = rules.validate_step(3, &data).unwrap_err();
        assert_eq!(errors.errors()[0].message, "Please enter a valid URL");
    }

    #[test]
    fn test_excerpt_alone_is_enough() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            chat_excerpt: Some("some text".to_string()),
            ..Default::default()
        };
        assert!(rules.validate_step(3, &data).is_ok());

        let empty_url = SubmissionData {
            chat_url: Some(String::new()),
            chat_excerpt: Some("some text".to_string()),
            ..Default::default()
        };
        assert!(rules.validate_step(3, &empty_url).is_ok());
    }

    #[test]
    fn test_link_or_excerpt_required() {
        let rules = FieldRules::new();
        assert_eq!(
            error_fields(rules.validate_step(3, &SubmissionData::default())),
            vec![Field::ChatUrl]
        );
    }

    #[test]
    fn test_custom_chat_domains() {
        let rules = FieldRules::new().with_chat_domains([".Poe.com"]);
        assert!(rules.check_chat_url("https://poe.com/s/abc").is_ok());
        assert!(rules.check_chat_url("https://claude.ai/chat/1").is_err());
    }

    #[test]
    fn test_file_size_limit() {
        let rules = FieldRules::new();
        let with_file = |size: u64| SubmissionData {
            files: vec![file_of_size(size)],
            ..complete_data()
        };

        assert!(rules.validate_step(4, &with_file(MAX_FILE_SIZE)).is_ok());
        assert!(rules.validate_all(&with_file(MAX_FILE_SIZE)).is_ok());

        let step_errors = rules.validate_step(4, &with_file(MAX_FILE_SIZE + 1)).unwrap_err();
        assert_eq!(step_errors.fields(), vec![Field::Files]);
        assert!(step_errors.errors()[0].message.contains("10MB"));

        let all_errors = rules.validate_all(&with_file(MAX_FILE_SIZE + 1)).unwrap_err();
        assert_eq!(all_errors.fields(), vec![Field::Files]);
    }

    #[test]
    fn test_every_oversized_file_is_reported() {
        let rules = FieldRules::new().with_max_file_size(100);
        let data = SubmissionData {
            files: vec![file_of_size(101), file_of_size(50), file_of_size(500)],
            ..Default::default()
        };
        let errors = rules.validate_step(4, &data).unwrap_err();
        assert_eq!(errors.errors().len(), 2);
        assert!(errors.errors()[0].message.contains("100 bytes"));
    }

    #[test]
    fn test_by_field_keeps_first_message() {
        let rules = FieldRules::new().with_max_file_size(10);
        let data = SubmissionData {
            files: vec![file_of_size(11), file_of_size(12)],
            ..Default::default()
        };
        let errors = rules.validate_step(4, &data).unwrap_err();
        let by_field = errors.by_field();
        assert_eq!(by_field.len(), 1);
        assert_eq!(by_field.get(&Field::Files), Some(&errors.errors()[0].message));
    }

    #[test]
    fn test_no_files_passes_step_four() {
        assert!(FieldRules::new().validate_step(4, &SubmissionData::default()).is_ok());
    }

    #[test]
    fn test_consent_checkboxes() {
        let rules = FieldRules::new();
        let data = SubmissionData {
            terms_accepted: true,
            ..Default::default()
        };
        assert_eq!(error_fields(rules.validate_step(5, &data)), vec![Field::PrivacyAccepted]);

        let data = SubmissionData {
            terms_accepted: true,
            privacy_accepted: true,
            ..Default::default()
        };
        assert!(rules.validate_step(5, &data).is_ok());
    }

    #[test]
    fn test_step_errors_stay_inside_step() {
        let rules = FieldRules::new();
        let bad = SubmissionData {
            title: "short".to_string(),
            chat_url: Some("not a url".to_string()),
            files: vec![file_of_size(MAX_FILE_SIZE * 2)],
            ..Default::default()
        };

        for step in 1..=5 {
            if let Err(errors) = rules.validate_step(step, &bad) {
                for error in errors.errors() {
                    assert!(
                        step_fields(step).contains(&error.field),
                        "step {step} reported {}",
                        error.field
                    );
                }
            }
        }
    }

    #[test]
    fn test_is_step_complete_is_stable() {
        let rules = FieldRules::new();
        let data = story_step_data();
        for step in 1..=5 {
            assert_eq!(
                rules.is_step_complete(step, &data),
                rules.is_step_complete(step, &data)
            );
        }
        assert!(!rules.is_step_complete(1, &data));
        assert!(rules.is_step_complete(2, &data));
    }

    #[test]
    fn test_unknown_steps() {
        let rules = FieldRules::new();
        assert!(step_fields(0).is_empty());
        assert!(step_fields(6).is_empty());
        assert!(rules.validate_step(6, &SubmissionData::default()).is_ok());
        assert!(!rules.is_step_complete(6, &SubmissionData::default()));
    }

    #[test]
    fn test_validate_all() {
        let rules = FieldRules::new();
        let data = complete_data();
        let validated = rules.validate_all(&data).unwrap();
        assert_eq!(validated.data(), &data);

        let errors = rules.validate_all(&SubmissionData::default()).unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![
                Field::Category,
                Field::AiTool,
                Field::Title,
                Field::Problem,
                Field::HowAiHelped,
                Field::Outcome,
                Field::MoneySaved,
                Field::ChatUrl,
                Field::TermsAccepted,
                Field::PrivacyAccepted,
            ]
        );
    }

    #[test]
    fn test_every_field_belongs_to_one_step() {
        for field in Field::ALL {
            let owners = (1..=5).filter(|s| step_fields(*s).contains(&field)).count();
            assert_eq!(owners, 1, "{field} should belong to exactly one step");
        }
    }
}
