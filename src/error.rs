use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("no API key set, send /key <your OpenAI API key> first")]
    MissingCredential,

    #[error("invalid quiz parameters: {0}")]
    InvalidParameters(String),

    #[error("the model call failed while generating questions")]
    GenerationCall {
        #[source]
        source: BoxError,
    },

    #[error("the model call failed while generating feedback")]
    FeedbackCall {
        #[source]
        source: BoxError,
    },

    #[error("answers have not been submitted yet")]
    NotSubmitted,

    #[error("unable to set up the model client")]
    Client {
        #[source]
        source: BoxError,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("question {index} does not exist, the quiz has {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("answers were already submitted")]
    AlreadySubmitted,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown model engine {0:?}, expected gpt-3.5-turbo, gpt-4 or gpt-4-32k")]
    UnknownEngine(String),

    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}
