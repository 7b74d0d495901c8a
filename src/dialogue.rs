use log::warn;
use teloxide::utils::command::BotCommands;

use crate::config::{ApiKey, Config};
use crate::error::{QuizError, SessionError};
use crate::quiz::ai_helper::{generate_quiz, CompletionModel};
use crate::quiz::parse::ParseOutcome;
use crate::quiz::session::QuizSession;
use crate::quiz::{Difficulty, Letter, QuizParameters};

pub const NEW_QUIZ_BUTTON: &str = "New quiz";
pub const SUBMIT_BUTTON: &str = "Submit answers";
pub const SKIP_BUTTON: &str = "Skip";
pub const FEEDBACK_BUTTON: &str = "Get AI feedback";
pub const RESULTS_BUTTON: &str = "Show results";
pub const CONTINUE_BUTTON: &str = "Continue quiz";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show this text.")]
    Help,
    #[command(description = "say hello.")]
    Start,
    #[command(description = "set your OpenAI API key: /key sk-...")]
    Key(String),
    #[command(description = "create a new quiz.")]
    Quiz,
    #[command(description = "score your answers now.")]
    Submit,
    #[command(description = "show the results of the last quiz.")]
    Results,
    #[command(description = "ask the AI for feedback on your mistakes.")]
    Feedback,
    #[command(description = "stop the current step.")]
    Cancel,
}

/// Everything the bot remembers about one chat. Lives in memory only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSession {
    pub credential: Option<ApiKey>,
    pub parameters: Option<QuizParameters>,
    pub quiz: QuizSession,
}

impl ChatSession {
    /// The chat's own key, else the configured default.
    pub fn api_key<'a>(&'a self, config: &'a Config) -> Result<&'a ApiKey, QuizError> {
        self.credential
            .as_ref()
            .or(config.default_api_key.as_ref())
            .ok_or(QuizError::MissingCredential)
    }

    /// Generates a quiz and, only if the call succeeds, replaces the current
    /// one with it.
    pub async fn generate<M: CompletionModel>(
        &mut self,
        model: &M,
        params: QuizParameters,
    ) -> Result<ParseOutcome, QuizError> {
        let parsed = generate_quiz(model, &params).await?;
        self.parameters = Some(params);
        self.quiz = QuizSession::new(parsed.questions);
        Ok(parsed.outcome)
    }

    /// Where an unfinished quiz picks up again. `None` when there is no quiz
    /// or it was already submitted.
    pub fn resume_index(&self) -> Option<usize> {
        if self.quiz.is_empty() || self.quiz.is_submitted() {
            None
        } else {
            Some(self.quiz.first_unanswered())
        }
    }

    pub fn answer(&mut self, current: usize, text: &str) -> AnswerStep {
        let text = text.trim();
        if text != SKIP_BUTTON {
            let Some(letter) = Letter::parse_choice(text) else {
                return AnswerStep::Unreadable;
            };
            if let Err(e) = self.quiz.select(current, letter) {
                warn!("Answer for question {} rejected: {}", current, e);
                return AnswerStep::Rejected(e);
            }
        }

        let next = current + 1;
        if next < self.quiz.len() {
            AnswerStep::Next(next)
        } else {
            AnswerStep::Finished
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AnswerStep {
    Next(usize),
    Finished,
    Unreadable,
    Rejected(SessionError),
}

#[derive(Clone, Default, Debug)]
pub enum State {
    #[default]
    Start,
    Idle {
        session: ChatSession,
    },
    ReceiveSubject {
        session: ChatSession,
    },
    ReceiveTopic {
        session: ChatSession,
        subject: String,
    },
    ReceiveDifficulty {
        session: ChatSession,
        subject: String,
        topic: String,
    },
    ReceiveCount {
        session: ChatSession,
        subject: String,
        topic: String,
        difficulty: Difficulty,
    },
    Answering {
        session: ChatSession,
        current: usize,
    },
}

impl State {
    pub fn session(&self) -> ChatSession {
        match self {
            State::Start => ChatSession::default(),
            State::Idle { session }
            | State::ReceiveSubject { session }
            | State::ReceiveTopic { session, .. }
            | State::ReceiveDifficulty { session, .. }
            | State::ReceiveCount { session, .. }
            | State::Answering { session, .. } => session.clone(),
        }
    }

    /// Same step, different session. `Start` moves to `Idle`.
    pub fn with_session(self, session: ChatSession) -> State {
        match self {
            State::Start | State::Idle { .. } => State::Idle { session },
            State::ReceiveSubject { .. } => State::ReceiveSubject { session },
            State::ReceiveTopic { subject, .. } => State::ReceiveTopic { session, subject },
            State::ReceiveDifficulty { subject, topic, .. } => State::ReceiveDifficulty {
                session,
                subject,
                topic,
            },
            State::ReceiveCount {
                subject,
                topic,
                difficulty,
                ..
            } => State::ReceiveCount {
                session,
                subject,
                topic,
                difficulty,
            },
            State::Answering { current, .. } => State::Answering { session, current },
        }
    }
}
