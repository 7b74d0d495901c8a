use std::error::Error;

use crate::quiz::session::QuestionResult;
use crate::quiz::{Letter, Question};

/// Telegram rejects messages longer than 4096 characters.
pub const MESSAGE_LIMIT: usize = 4000;
const BUTTON_TEXT_LIMIT: usize = 48;

pub fn question_text(index: usize, question: &Question) -> String {
    let options = Letter::ALL
        .iter()
        .map(|letter| format!("{}) {}", letter, question.option(*letter)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Q{}. {}\n\n{}", index + 1, question.prompt, options)
}

/// Button labels start with the letter so `Letter::parse_choice` can read
/// them back.
pub fn answer_labels(question: &Question) -> Vec<String> {
    Letter::ALL
        .iter()
        .map(|letter| {
            let text = question.option(*letter);
            if text.chars().count() > BUTTON_TEXT_LIMIT {
                let short: String = text.chars().take(BUTTON_TEXT_LIMIT).collect();
                format!("{}) {}…", letter, short.trim_end())
            } else {
                format!("{}) {}", letter, text)
            }
        })
        .collect()
}

pub fn summary(score: usize, total: usize) -> String {
    format!("Results\nScore: {} / {}", score, total)
}

pub fn question_feedback(result: &QuestionResult) -> String {
    let question = result.question;
    let mut lines = vec![format!("Q{}. {}", result.index + 1, question.prompt)];

    match result.given {
        Some(given) if given == question.correct => {
            lines.push(format!("✅ You chose {}, which is correct.", given));
            if !question.explanation.is_empty() {
                lines.push(format!("Reason: {}", question.explanation));
            }
        }
        given => {
            let given = given
                .map(|letter| letter.to_string())
                .unwrap_or_else(|| "No answer".to_string());
            lines.push(format!(
                "❌ Your answer: {} | Correct: {}) {}",
                given,
                question.correct,
                question.option(question.correct)
            ));
            if !question.explanation.is_empty() {
                lines.push(format!(
                    "Why the correct option is right: {}",
                    question.explanation
                ));
                if result.given.is_some() {
                    lines.push(
                        "Why your option is wrong: It does not match the key idea explained above."
                            .to_string(),
                    );
                }
            }
        }
    }

    lines.join("\n")
}

/// Error text for the chat, including the underlying cause.
pub fn describe_error(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Splits text into chunks of at most `limit` characters, preferring line
/// breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuizError;

    fn question() -> Question {
        Question {
            prompt: "What is 2 + 2?".to_string(),
            options: [
                "3".to_string(),
                "4".to_string(),
                "5".to_string(),
                "a very long option text that will never fit on a keyboard button".to_string(),
            ],
            correct: Letter::B,
            explanation: "Two plus two is four.".to_string(),
        }
    }

    #[test]
    fn question_text_lists_labeled_options() {
        let text = question_text(0, &question());
        assert!(text.starts_with("Q1. What is 2 + 2?\n\nA) 3\nB) 4\nC) 5\nD) a very long"));
    }

    #[test]
    fn button_labels_are_short_and_parseable() {
        let labels = answer_labels(&question());
        assert_eq!(labels[1], "B) 4");
        assert!(labels[3].ends_with('…'));
        for (label, letter) in labels.iter().zip(Letter::ALL) {
            assert_eq!(Letter::parse_choice(label), Some(letter));
        }
    }

    #[test]
    fn feedback_for_correct_answer() {
        let q = question();
        let result = QuestionResult { index: 2, question: &q, given: Some(Letter::B) };
        assert_eq!(
            question_feedback(&result),
            "Q3. What is 2 + 2?\n✅ You chose B, which is correct.\nReason: Two plus two is four."
        );
    }

    #[test]
    fn feedback_for_wrong_and_missing_answers() {
        let q = question();
        let wrong = question_feedback(&QuestionResult { index: 0, question: &q, given: Some(Letter::C) });
        assert!(wrong.contains("❌ Your answer: C | Correct: B) 4"));
        assert!(wrong.contains("Why the correct option is right: Two plus two is four."));
        assert!(wrong.contains("Why your option is wrong"));

        let missing = question_feedback(&QuestionResult { index: 0, question: &q, given: None });
        assert!(missing.contains("❌ Your answer: No answer | Correct: B) 4"));
        assert!(!missing.contains("Why your option is wrong"));
    }

    #[test]
    fn error_description_includes_cause() {
        let err = QuizError::GenerationCall { source: "connection refused".into() };
        assert_eq!(
            describe_error(&err),
            "the model call failed while generating questions: connection refused"
        );
    }

    #[test]
    fn short_text_stays_whole() {
        assert_eq!(split_message("hello\nworld", 100), vec!["hello\nworld"]);
        assert!(split_message("  \n", 100).is_empty());
    }

    #[test]
    fn long_text_is_split_on_lines_and_chars() {
        let text = format!("{}\n{}\n{}", "a".repeat(6), "b".repeat(3), "c".repeat(12));
        let chunks = split_message(&text, 10);
        assert_eq!(chunks, vec!["aaaaaa", "bbb", "cccccccccc", "cc"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }
}
