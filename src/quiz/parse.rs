use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::quiz::{Letter, QuizParameters, Question};

pub const PLACEHOLDER_QUESTION: &str = "No question";
pub const PLACEHOLDER_OPTION: &str = "Dummy option";

#[derive(Error, Debug)]
enum ParseError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply is JSON but not a list of questions")]
    NotAList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Every question came from the model's reply.
    Parsed,
    /// The reply had fewer questions than requested; the rest are fallbacks.
    Padded { missing: usize },
    /// The reply could not be read at all.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuiz {
    pub questions: Vec<Question>,
    pub outcome: ParseOutcome,
}

/// Strips code fences and stray `$` signs, then keeps only the text between
/// the first `[` and the last `]`.
pub fn sanitize_and_extract(raw: &str) -> String {
    let cleaned = raw
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .replace('$', "");
    let cleaned = cleaned.trim();

    match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
    }
}

pub fn normalize_options(options: Vec<String>) -> [String; 4] {
    let mut options = options.into_iter();
    Letter::ALL.map(|letter| match options.next() {
        Some(option) => {
            let option = strip_label(&option, letter);
            if option.is_empty() {
                PLACEHOLDER_OPTION.to_string()
            } else {
                option.to_string()
            }
        }
        None => PLACEHOLDER_OPTION.to_string(),
    })
}

// "B) Paris", "B. Paris" or "B: Paris" in position B becomes "Paris"; the bot
// adds its own labels.
fn strip_label(option: &str, letter: Letter) -> &str {
    let option = option.trim();
    let mut chars = option.char_indices();
    match (chars.next(), chars.next()) {
        (Some((_, c)), Some((i, ')' | '.' | ':')))
            if Letter::parse_choice(&c.to_string()) == Some(letter) =>
        {
            option[i + 1..].trim_start()
        }
        _ => option,
    }
}

pub fn normalize_correct(value: Option<&Value>, options: &[String; 4]) -> Letter {
    match value {
        Some(Value::String(text)) => {
            let text = text.trim();
            if let Some(letter) = Letter::parse_choice(&text.to_uppercase()) {
                return letter;
            }
            options
                .iter()
                .position(|option| option.eq_ignore_ascii_case(text))
                .and_then(Letter::from_index)
                .unwrap_or(Letter::A)
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|i| Letter::from_index(i as usize))
            .unwrap_or(Letter::A),
        _ => Letter::A,
    }
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalize_question(value: &Value) -> Question {
    let prompt = value
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER_QUESTION)
        .to_string();

    let options = match value.get("options") {
        Some(Value::Array(items)) => items.iter().map(option_text).collect(),
        _ => Vec::new(),
    };
    let options = normalize_options(options);
    let correct = normalize_correct(value.get("correct"), &options);

    let explanation = value
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    Question {
        prompt,
        options,
        correct,
        explanation,
    }
}

pub fn fallback_question(params: &QuizParameters) -> Question {
    Question {
        prompt: format!("What is {} in {}?", params.topic(), params.subject()),
        options: [
            "Basic idea".to_string(),
            "Hard theorem".to_string(),
            "History".to_string(),
            "Formula".to_string(),
        ],
        correct: Letter::A,
        explanation: "You should first know the basic idea.".to_string(),
    }
}

pub fn fallback_questions(params: &QuizParameters) -> Vec<Question> {
    vec![fallback_question(params); params.count()]
}

fn extract_items(raw: &str) -> Result<Vec<Value>, ParseError> {
    let text = sanitize_and_extract(raw);
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => Ok(items),
        _ => Err(ParseError::NotAList),
    }
}

/// Turns a model reply into exactly `params.count()` questions.
pub fn parse_questions(raw: &str, params: &QuizParameters) -> ParsedQuiz {
    let items = match extract_items(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("Falling back to the canned quiz: {}", e);
            return ParsedQuiz {
                questions: fallback_questions(params),
                outcome: ParseOutcome::Fallback,
            };
        }
    };

    let mut questions: Vec<Question> = items
        .iter()
        .take(params.count())
        .map(normalize_question)
        .collect();

    if questions.is_empty() {
        warn!("Model returned an empty list, falling back to the canned quiz");
        return ParsedQuiz {
            questions: fallback_questions(params),
            outcome: ParseOutcome::Fallback,
        };
    }

    let missing = params.count() - questions.len();
    if missing > 0 {
        debug!(
            "Model returned {} of {} questions, padding",
            questions.len(),
            params.count()
        );
        questions.extend(std::iter::repeat(fallback_question(params)).take(missing));
        return ParsedQuiz {
            questions,
            outcome: ParseOutcome::Padded { missing },
        };
    }

    ParsedQuiz {
        questions,
        outcome: ParseOutcome::Parsed,
    }
}
