//! Questionnaire outline handed to the document builder.
//!
//! Forms cannot be exported by the source provider. Their structure is
//! fetched instead, normalized into a [`FormOutline`], and turned into a
//! word-processor document by a host-supplied [`DocumentBuilder`].

use bridge_traits::storage::{FormDocument, FormQuestion};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::error::Result;

pub const UNTITLED_FORM: &str = "Untitled form";
pub const LONG_ANSWER_PLACEHOLDER: &str = "[Long answer text]";
pub const SHORT_ANSWER_PLACEHOLDER: &str = "[Short answer text]";

/// Turns an outline into a finished document.
///
/// Implementations must be pure: same outline, same bytes, no side effects
/// on the transfer.
pub trait DocumentBuilder: Send + Sync {
    fn build(&self, outline: &FormOutline) -> Result<Bytes>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOutline {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<OutlineQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineQuestion {
    /// 1-based position in the form
    pub number: usize,
    pub title: String,
    pub answer: AnswerLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerLayout {
    Choices(Vec<OutlineOption>),
    LongText,
    ShortText,
    /// Section header or other item without an answer area
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineOption {
    /// `A`..`Z`, then `27`, `28`, ...
    pub label: String,
    pub text: String,
}

impl FormOutline {
    pub fn from_document(document: &FormDocument) -> Self {
        let title = document
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED_FORM)
            .to_string();

        let description = document
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);

        let questions = document
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let number = index + 1;
                let title = item
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .unwrap_or_else(|| format!("Question {}", number));

                let answer = match &item.question {
                    FormQuestion::Choice { options } => AnswerLayout::Choices(
                        options
                            .iter()
                            .enumerate()
                            .map(|(i, text)| OutlineOption {
                                label: option_label(i),
                                text: text.clone(),
                            })
                            .collect(),
                    ),
                    FormQuestion::Text { paragraph: true } => AnswerLayout::LongText,
                    FormQuestion::Text { paragraph: false } => AnswerLayout::ShortText,
                    FormQuestion::Other => AnswerLayout::None,
                };

                OutlineQuestion {
                    number,
                    title,
                    answer,
                }
            })
            .collect();

        Self {
            title,
            description,
            questions,
        }
    }

    /// Plain-text rendering, used for previews and by simple builders.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        if let Some(description) = &self.description {
            let _ = writeln!(out, "\n{}", description);
        }

        for question in &self.questions {
            let _ = writeln!(out, "\n{}. {}", question.number, question.title);
            match &question.answer {
                AnswerLayout::Choices(options) => {
                    for option in options {
                        let _ = writeln!(out, "   {}) {}", option.label, option.text);
                    }
                }
                AnswerLayout::LongText => {
                    let _ = writeln!(out, "   {}", LONG_ANSWER_PLACEHOLDER);
                }
                AnswerLayout::ShortText => {
                    let _ = writeln!(out, "   {}", SHORT_ANSWER_PLACEHOLDER);
                }
                AnswerLayout::None => {}
            }
        }

        out
    }
}

fn option_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        (index + 1).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::storage::FormItem;

    fn item(title: Option<&str>, question: FormQuestion) -> FormItem {
        FormItem {
            title: title.map(String::from),
            question,
        }
    }

    #[test]
    fn test_defaults_for_missing_titles() {
        let document = FormDocument {
            title: Some("  ".to_string()),
            description: None,
            items: vec![item(None, FormQuestion::Text { paragraph: false })],
        };

        let outline = FormOutline::from_document(&document);
        assert_eq!(outline.title, UNTITLED_FORM);
        assert_eq!(outline.questions[0].title, "Question 1");
        assert_eq!(outline.questions[0].answer, AnswerLayout::ShortText);
    }

    #[test]
    fn test_choice_labels() {
        let options: Vec<String> = (0..28).map(|i| format!("opt{}", i)).collect();
        let document = FormDocument {
            title: Some("Survey".to_string()),
            description: Some("Tell us".to_string()),
            items: vec![item(Some("Pick"), FormQuestion::Choice { options })],
        };

        let outline = FormOutline::from_document(&document);
        let AnswerLayout::Choices(options) = &outline.questions[0].answer else {
            panic!("expected choices");
        };
        assert_eq!(options[0].label, "A");
        assert_eq!(options[25].label, "Z");
        assert_eq!(options[26].label, "27");
        assert_eq!(options[27].label, "28");
    }

    #[test]
    fn test_plain_text_rendering() {
        let document = FormDocument {
            title: Some("Feedback".to_string()),
            description: Some("Quarterly".to_string()),
            items: vec![
                item(
                    Some("Rating"),
                    FormQuestion::Choice {
                        options: vec!["Good".to_string(), "Bad".to_string()],
                    },
                ),
                item(Some("Comments"), FormQuestion::Text { paragraph: true }),
                item(Some("Section"), FormQuestion::Other),
            ],
        };

        let text = FormOutline::from_document(&document).to_plain_text();
        assert!(text.starts_with("Feedback\n\nQuarterly\n"));
        assert!(text.contains("1. Rating\n   A) Good\n   B) Bad\n"));
        assert!(text.contains("2. Comments\n   [Long answer text]\n"));
        assert!(text.ends_with("3. Section\n"));
    }
}
