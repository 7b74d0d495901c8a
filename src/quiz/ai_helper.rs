use std::future::Future;

use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;
use log::{debug, info};

use crate::config::{ApiKey, ModelConfig};
use crate::error::{BoxError, QuizError};
use crate::quiz::parse::{parse_questions, ParsedQuiz};
use crate::quiz::session::QuizSession;
use crate::quiz::QuizParameters;

/// A hosted text-completion service: a prompt goes in, free text comes out.
pub trait CompletionModel {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, BoxError>> + Send;
}

pub struct ChatGptModel {
    chat_gpt: ChatGPT,
}

impl ChatGptModel {
    pub fn new(api_key: &ApiKey, config: &ModelConfig) -> Result<Self, QuizError> {
        let mut chat_gpt = ChatGPT::new(api_key.expose())
            .map_err(|e| QuizError::Client { source: Box::new(e) })?;

        chat_gpt.config.engine = config.engine.to_chatgpt();
        chat_gpt.config.timeout = config.timeout;

        Ok(Self { chat_gpt })
    }
}

impl CompletionModel for ChatGptModel {
    async fn complete(&self, prompt: &str) -> Result<String, BoxError> {
        let response: CompletionResponse = self.chat_gpt.send_message(prompt).await?;
        Ok(response.message().clone().content)
    }
}

pub fn quiz_prompt(params: &QuizParameters) -> String {
    format!(
        "Create exactly {count} multiple-choice questions for {subject} on \"{topic}\" ({difficulty} level).

Each question must have:
- EXACTLY 4 options: A), B), C), D)
- 'correct' as the correct option letter (A/B/C/D)
- 'explanation' explaining why the correct answer is right in 1-2 sentences.

Return ONLY valid JSON, with no text, headings or code fences around it, like this:
[
  {{\"question\": \"Question text\", \"options\": [\"Option A text\", \"Option B text\", \"Option C text\", \"Option D text\"], \"correct\": \"A\", \"explanation\": \"Reason here\"}},
  ...
]",
        count = params.count(),
        subject = params.subject(),
        topic = params.topic(),
        difficulty = params.difficulty(),
    )
}

/// Asks the model for a quiz. A single attempt: a failed call is returned
/// as is, an unreadable reply becomes the fallback quiz.
pub async fn generate_quiz<M: CompletionModel>(
    model: &M,
    params: &QuizParameters,
) -> Result<ParsedQuiz, QuizError> {
    info!(
        "Generating {} {} questions on {} / {}",
        params.count(),
        params.difficulty(),
        params.subject(),
        params.topic()
    );
    let prompt = quiz_prompt(params);
    debug!("Quiz prompt: {:?}", prompt);

    let reply = model
        .complete(&prompt)
        .await
        .map_err(|source| QuizError::GenerationCall { source })?;
    debug!("Completion: {:?}", reply);

    let parsed = parse_questions(&reply, params);
    info!("Quiz ready: {:?}", parsed.outcome);
    Ok(parsed)
}

pub fn feedback_prompt(params: &QuizParameters, session: &QuizSession) -> String {
    let score = session.score().unwrap_or_default();
    let mistakes = session
        .mistakes()
        .iter()
        .map(|m| {
            let given = m
                .given
                .map(|letter| format!("{}) {}", letter, m.question.option(letter)))
                .unwrap_or_else(|| "No answer".to_string());
            format!(
                "- {} | {} | {}) {}",
                m.question.prompt,
                given,
                m.question.correct,
                m.question.option(m.question.correct)
            )
        })
        .collect::<Vec<_>>();
    let mistakes = if mistakes.is_empty() {
        "None, every answer was correct.".to_string()
    } else {
        mistakes.join("\n")
    };

    format!(
        "You are a friendly tutor helping a student revise for an exam.
Subject: {subject}
Topic: {topic}
Score: {score} / {total}

Questions the student got wrong (question text | your answer | correct answer):
{mistakes}

Reply in plain text with:
1. A short encouragement.
2. An analysis of the weak areas these mistakes point to.
3. Three concrete study tips for this topic.",
        subject = params.subject(),
        topic = params.topic(),
        score = score,
        total = session.len(),
        mistakes = mistakes,
    )
}

/// Asks the model to comment on a submitted quiz. A single attempt.
pub async fn generate_feedback<M: CompletionModel>(
    model: &M,
    params: &QuizParameters,
    session: &QuizSession,
) -> Result<String, QuizError> {
    if !session.is_submitted() {
        return Err(QuizError::NotSubmitted);
    }
    let prompt = feedback_prompt(params, session);
    debug!("Feedback prompt: {:?}", prompt);

    let reply = model
        .complete(&prompt)
        .await
        .map_err(|source| QuizError::FeedbackCall { source })?;
    debug!("Completion: {:?}", reply);

    Ok(reply.trim().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::quiz::parse::ParseOutcome;
    use crate::quiz::{Difficulty, Letter};

    /// Replays canned replies and remembers the prompts it was given.
    pub(crate) struct ScriptedModel {
        replies: Mutex<Vec<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl CompletionModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, BoxError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no scripted reply left".to_string()));
            reply.map_err(BoxError::from)
        }
    }

    fn maths(count: usize) -> QuizParameters {
        QuizParameters::new("Maths", "Algebra", Difficulty::Easy, count).unwrap()
    }

    const THREE_QUESTIONS: &str = r#"Here is your quiz:
```json
[
  {"question": "Solve x + 2 = 5", "options": ["A) 1", "B) 2", "C) 3", "D) 4"], "correct": "C", "explanation": "5 - 2 = 3."},
  {"question": "Expand 2(x + 1)", "options": ["2x + 1", "2x + 2", "x + 2", "2x"], "correct": "B", "explanation": "Distribute the 2."},
  {"question": "What is x if 3x = 9?", "options": ["3", "6", "9", "27"], "correct": "a", "explanation": "9 / 3 = 3."}
]
```
Good luck!"#;

    #[test]
    fn quiz_prompt_names_every_parameter() {
        let prompt = quiz_prompt(&QuizParameters::new("Physics", "Optics", Difficulty::Hard, 7).unwrap());
        assert!(prompt.contains("exactly 7 multiple-choice questions"));
        assert!(prompt.contains("for Physics on \"Optics\" (hard level)"));
        assert!(prompt.contains("Return ONLY valid JSON"));
        assert!(prompt.contains("\"correct\": \"A\""));
    }

    #[tokio::test]
    async fn generates_and_scores_a_whole_quiz() {
        let model = ScriptedModel::new(vec![Ok(THREE_QUESTIONS)]);
        let params = maths(3);

        let parsed = generate_quiz(&model, &params).await.unwrap();
        assert_eq!(parsed.outcome, ParseOutcome::Parsed);
        assert_eq!(parsed.questions.len(), 3);
        assert_eq!(parsed.questions[0].options[2], "3");

        let mut session = QuizSession::new(parsed.questions);
        session.select(0, Letter::C).unwrap();
        session.select(1, Letter::B).unwrap();
        session.select(2, Letter::A).unwrap();
        assert_eq!(session.submit(), 3);
        assert_eq!(session.len(), 3);
        assert_eq!(model.calls(), 1);
        assert!(model.prompts.lock().unwrap()[0].contains("exactly 3 multiple-choice questions"));
    }

    #[tokio::test]
    async fn unreadable_reply_becomes_fallback_quiz() {
        let model = ScriptedModel::new(vec![Ok("Sorry, I can't do that.")]);
        let parsed = generate_quiz(&model, &maths(4)).await.unwrap();
        assert_eq!(parsed.outcome, ParseOutcome::Fallback);
        assert_eq!(parsed.questions.len(), 4);
    }

    #[tokio::test]
    async fn failed_call_is_not_retried() {
        let model = ScriptedModel::new(vec![Err("connection reset"), Ok(THREE_QUESTIONS)]);
        let err = generate_quiz(&model, &maths(3)).await.unwrap_err();
        assert!(matches!(err, QuizError::GenerationCall { .. }));
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn feedback_prompt_lists_mistakes() {
        let mut session = QuizSession::new(parse_questions(THREE_QUESTIONS, &maths(3)).questions);
        session.select(0, Letter::A).unwrap();
        session.select(1, Letter::B).unwrap();
        session.submit();

        let prompt = feedback_prompt(&maths(3), &session);
        assert!(prompt.contains("Subject: Maths"));
        assert!(prompt.contains("Topic: Algebra"));
        assert!(prompt.contains("Score: 1 / 3"));
        assert!(prompt.contains("- Solve x + 2 = 5 | A) 1 | C) 3"));
        assert!(prompt.contains("- What is x if 3x = 9? | No answer | A) 3"));
        assert!(!prompt.contains("Expand 2(x + 1)"));
    }

    #[tokio::test]
    async fn feedback_requires_submitted_answers() {
        let model = ScriptedModel::new(vec![Ok("Well done")]);
        let session = QuizSession::new(parse_questions(THREE_QUESTIONS, &maths(3)).questions);
        let err = generate_feedback(&model, &maths(3), &session).await.unwrap_err();
        assert!(matches!(err, QuizError::NotSubmitted));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn feedback_is_returned_verbatim_and_failures_surface_once() {
        let mut session = QuizSession::new(parse_questions(THREE_QUESTIONS, &maths(3)).questions);
        session.submit();

        let model = ScriptedModel::new(vec![Ok("  Keep going!\nRevise linear equations.  ")]);
        let feedback = generate_feedback(&model, &maths(3), &session).await.unwrap();
        assert_eq!(feedback, "Keep going!\nRevise linear equations.");

        let failing = ScriptedModel::new(vec![Err("timeout"), Ok("unused")]);
        let err = generate_feedback(&failing, &maths(3), &session).await.unwrap_err();
        assert!(matches!(err, QuizError::FeedbackCall { .. }));
        assert_eq!(failing.calls(), 1);
    }
}
