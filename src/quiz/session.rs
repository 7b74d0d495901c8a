use std::collections::BTreeMap;

use crate::error::SessionError;
use crate::quiz::{Letter, Question};

/// Number of questions whose recorded answer matches the key. Unanswered
/// questions and answers for indices past the end simply don't count.
pub fn score(questions: &[Question], answers: &BTreeMap<usize, Letter>) -> usize {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(i) == Some(&q.correct))
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionResult<'a> {
    pub index: usize,
    pub question: &'a Question,
    pub given: Option<Letter>,
}

impl QuestionResult<'_> {
    pub fn is_correct(&self) -> bool {
        self.given == Some(self.question.correct)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizSession {
    questions: Vec<Question>,
    answers: BTreeMap<usize, Letter>,
    score: Option<usize>,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            answers: BTreeMap::new(),
            score: None,
        }
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Index of the first question without an answer, or `len()` when every
    /// question has one.
    pub fn first_unanswered(&self) -> usize {
        (0..self.questions.len())
            .find(|i| !self.answers.contains_key(i))
            .unwrap_or(self.questions.len())
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn score(&self) -> Option<usize> {
        self.score
    }

    pub fn is_submitted(&self) -> bool {
        self.score.is_some()
    }

    /// Records (or replaces) the answer for one question.
    pub fn select(&mut self, index: usize, letter: Letter) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.answers.insert(index, letter);
        Ok(())
    }

    /// Scores the answers. Only the first call computes; later calls return
    /// the stored score.
    pub fn submit(&mut self) -> usize {
        *self
            .score
            .get_or_insert_with(|| score(&self.questions, &self.answers))
    }

    pub fn results(&self) -> Vec<QuestionResult<'_>> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionResult {
                index,
                question,
                given: self.answers.get(&index).copied(),
            })
            .collect()
    }

    pub fn mistakes(&self) -> Vec<QuestionResult<'_>> {
        self.results()
            .into_iter()
            .filter(|result| !result.is_correct())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(prompt: &str, correct: Letter) -> Question {
        Question {
            prompt: prompt.to_string(),
            options: [
                "one".to_string(),
                "two".to_string(),
                "three".to_string(),
                "four".to_string(),
            ],
            correct,
            explanation: String::new(),
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            question("Q1", Letter::A),
            question("Q2", Letter::C),
            question("Q3", Letter::D),
        ]
    }

    #[test]
    fn empty_answers_score_zero() {
        assert_eq!(score(&questions(), &BTreeMap::new()), 0);
        assert_eq!(score(&[], &BTreeMap::new()), 0);
    }

    #[test]
    fn score_counts_exact_matches_only() {
        let answers = BTreeMap::from([(0, Letter::A), (1, Letter::B), (2, Letter::D)]);
        assert_eq!(score(&questions(), &answers), 2);
    }

    #[test]
    fn answers_past_the_end_are_ignored() {
        let answers = BTreeMap::from([(0, Letter::A), (7, Letter::A)]);
        assert_eq!(score(&questions(), &answers), 1);
    }

    #[test]
    fn score_is_bounded_for_every_answer_combination() {
        let qs = questions();
        for a in Letter::ALL {
            for b in Letter::ALL {
                for c in Letter::ALL {
                    let answers = BTreeMap::from([(0, a), (1, b), (2, c)]);
                    let expected = [a, b, c]
                        .iter()
                        .zip(&qs)
                        .filter(|(given, q)| **given == q.correct)
                        .count();
                    let got = score(&qs, &answers);
                    assert_eq!(got, expected);
                    assert!(got <= qs.len());
                }
            }
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = QuizSession::new(questions());
        forward.select(0, Letter::A).unwrap();
        forward.select(1, Letter::C).unwrap();
        forward.select(2, Letter::B).unwrap();

        let mut backward = QuizSession::new(questions());
        backward.select(2, Letter::B).unwrap();
        backward.select(1, Letter::C).unwrap();
        backward.select(0, Letter::A).unwrap();

        assert_eq!(forward.submit(), backward.submit());
        assert_eq!(forward.score(), Some(2));
    }

    #[test]
    fn later_selection_replaces_earlier_one() {
        let mut session = QuizSession::new(questions());
        session.select(1, Letter::A).unwrap();
        session.select(1, Letter::C).unwrap();
        assert_eq!(session.answered(), 1);
        assert_eq!(session.submit(), 1);
    }

    #[test]
    fn select_rejects_unknown_index_and_submitted_session() {
        let mut session = QuizSession::new(questions());
        assert_eq!(
            session.select(3, Letter::A),
            Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
        );

        session.submit();
        assert_eq!(
            session.select(0, Letter::A),
            Err(SessionError::AlreadySubmitted)
        );
    }

    #[test]
    fn submit_is_computed_once() {
        let mut session = QuizSession::new(questions());
        session.select(0, Letter::A).unwrap();
        assert_eq!(session.submit(), 1);
        assert!(session.select(1, Letter::C).is_err());
        assert_eq!(session.submit(), 1);
    }

    #[test]
    fn zero_answers_submit_to_zero() {
        let mut session = QuizSession::new(questions());
        assert_eq!(session.submit(), 0);
        assert_eq!(session.mistakes().len(), 3);
    }

    #[test]
    fn mistakes_include_unanswered_questions() {
        let mut session = QuizSession::new(questions());
        session.select(0, Letter::A).unwrap();
        session.select(1, Letter::D).unwrap();

        let mistakes = session.mistakes();
        assert_eq!(mistakes.len(), 2);
        assert_eq!(mistakes[0].index, 1);
        assert_eq!(mistakes[0].given, Some(Letter::D));
        assert_eq!(mistakes[1].index, 2);
        assert_eq!(mistakes[1].given, None);
    }

    #[test]
    fn first_unanswered_skips_answered_questions() {
        let mut session = QuizSession::new(questions());
        assert_eq!(session.first_unanswered(), 0);
        session.select(0, Letter::A).unwrap();
        session.select(2, Letter::A).unwrap();
        assert_eq!(session.first_unanswered(), 1);
        session.select(1, Letter::A).unwrap();
        assert_eq!(session.first_unanswered(), 3);
    }

    #[test]
    fn default_session_is_empty() {
        let session = QuizSession::default();
        assert!(session.is_empty());
        assert!(!session.is_submitted());
        assert!(session.results().is_empty());
    }
}
