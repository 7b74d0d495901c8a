pub mod ai_helper;
pub mod parse;
pub mod session;

use std::fmt;
use std::str::FromStr;

use crate::error::QuizError;

pub const MIN_QUESTIONS: usize = 3;
pub const MAX_QUESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuizError::InvalidParameters(format!(
                "unknown difficulty {:?}",
                other
            ))),
        }
    }
}

/// Option label of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    pub const ALL: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

    pub fn index(&self) -> usize {
        match self {
            Letter::A => 0,
            Letter::B => 1,
            Letter::C => 2,
            Letter::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            _ => None,
        }
    }

    /// Reads a user's selection: a bare letter (`"b"`) or an answer button
    /// label such as `"B) Paris"`.
    pub fn parse_choice(text: &str) -> Option<Self> {
        let text = text.trim();
        let mut chars = text.chars();
        let letter = Self::from_char(chars.next()?.to_ascii_uppercase())?;
        match chars.next() {
            None => Some(letter),
            Some(c) if !c.is_alphanumeric() => Some(letter),
            Some(_) => None,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
        };
        f.write_str(c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizParameters {
    subject: String,
    topic: String,
    difficulty: Difficulty,
    count: usize,
}

impl QuizParameters {
    pub fn new(
        subject: &str,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Self, QuizError> {
        let subject = subject.trim();
        let topic = topic.trim();
        if subject.is_empty() {
            return Err(QuizError::InvalidParameters("subject is empty".to_string()));
        }
        if topic.is_empty() {
            return Err(QuizError::InvalidParameters("topic is empty".to_string()));
        }
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
            return Err(QuizError::InvalidParameters(format!(
                "question count must be between {} and {}, got {}",
                MIN_QUESTIONS, MAX_QUESTIONS, count
            )));
        }

        Ok(Self {
            subject: subject.to_string(),
            topic: topic.to_string(),
            difficulty,
            count,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub prompt: String,
    pub options: [String; 4],
    pub correct: Letter,
    pub explanation: String,
}

impl Question {
    pub fn option(&self, letter: Letter) -> &str {
        &self.options[letter.index()]
    }
}
