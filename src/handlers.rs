use std::sync::Arc;

use log::{info, warn};
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove},
    utils::command::BotCommands,
};

use crate::config::{ApiKey, Config};
use crate::dialogue::{
    AnswerStep, ChatSession, Command, State, CONTINUE_BUTTON, FEEDBACK_BUTTON, NEW_QUIZ_BUTTON,
    RESULTS_BUTTON, SKIP_BUTTON, SUBMIT_BUTTON,
};
use crate::quiz::ai_helper::{generate_feedback, ChatGptModel};
use crate::quiz::parse::ParseOutcome;
use crate::quiz::{Difficulty, QuizParameters, MAX_QUESTIONS, MIN_QUESTIONS};
use crate::render;

pub type QuizDialogue = Dialogue<State, InMemStorage<State>>;
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const GREETING_TEXT: &str = "Hi! I'm an exam revision bot. Tell me a subject and a topic, \
and I'll ask an AI to write a multiple-choice quiz for you, score your answers and explain \
the mistakes.\n\nFirst send your OpenAI API key with /key <key> (unless the bot already has one), \
then press \"New quiz\".";

const DEFAULT_SUBJECT: &str = "Maths";
const DEFAULT_TOPIC: &str = "Algebra";

fn menu_keyboard(session: &ChatSession) -> KeyboardMarkup {
    let mut row = vec![KeyboardButton::new(NEW_QUIZ_BUTTON)];
    if session.resume_index().is_some() {
        row.push(KeyboardButton::new(CONTINUE_BUTTON));
    }
    if session.quiz.is_submitted() {
        row.push(KeyboardButton::new(RESULTS_BUTTON));
        row.push(KeyboardButton::new(FEEDBACK_BUTTON));
    }
    KeyboardMarkup::new(vec![row])
}

async fn send_long(bot: &Bot, chat_id: ChatId, text: &str) -> HandlerResult {
    for chunk in render::split_message(text, render::MESSAGE_LIMIT) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

pub async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let session = ChatSession::default();
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(menu_keyboard(&session))
        .await?;

    dialogue.update(State::Idle { session }).await?;
    Ok(())
}

pub async fn command(
    bot: Bot,
    dialogue: QuizDialogue,
    state: State,
    cmd: Command,
    msg: Message,
    config: Arc<Config>,
) -> HandlerResult {
    let mut session = state.session();
    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Start => {
            bot.send_message(msg.chat.id, GREETING_TEXT)
                .reply_markup(menu_keyboard(&session))
                .await?;
            if let State::Start = state {
                dialogue.update(State::Idle { session }).await?;
            }
        }
        Command::Key(key) => {
            // The key should not stay visible in the chat history.
            if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
                warn!("Could not delete the message with the API key: {}", e);
            }
            match ApiKey::new(&key) {
                Some(key) => {
                    session.credential = Some(key);
                    bot.send_message(
                        msg.chat.id,
                        "API key saved for this chat. I deleted your message so the key doesn't stay in the history.",
                    )
                    .await?;
                    dialogue.update(state.with_session(session)).await?;
                }
                None => {
                    bot.send_message(msg.chat.id, "Usage: /key <your OpenAI API key>")
                        .await?;
                }
            }
        }
        Command::Quiz => ask_subject(&bot, &dialogue, session, msg.chat.id, &config).await?,
        Command::Submit => submit(&bot, &dialogue, session, msg.chat.id).await?,
        Command::Results => {
            if session.quiz.is_submitted() {
                send_results(&bot, msg.chat.id, &session).await?;
            } else {
                bot.send_message(msg.chat.id, "No results yet. Finish a quiz and /submit it first.")
                    .await?;
            }
        }
        Command::Feedback => feedback(&bot, &session, msg.chat.id, &config).await?,
        Command::Cancel => {
            let text = if session.resume_index().is_some() {
                "Cancelled. Press \"Continue quiz\" to pick up where you left off."
            } else {
                "Cancelled."
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(menu_keyboard(&session))
                .await?;
            dialogue.update(State::Idle { session }).await?;
        }
    }
    Ok(())
}

pub async fn idle(
    bot: Bot,
    dialogue: QuizDialogue,
    session: ChatSession,
    msg: Message,
    config: Arc<Config>,
) -> HandlerResult {
    match msg.text().map(str::trim) {
        Some(NEW_QUIZ_BUTTON) => ask_subject(&bot, &dialogue, session, msg.chat.id, &config).await?,
        Some(CONTINUE_BUTTON) => match session.resume_index() {
            Some(current) => resume(&bot, &dialogue, session, current, msg.chat.id).await?,
            None => {
                bot.send_message(msg.chat.id, "There is no unfinished quiz.")
                    .reply_markup(menu_keyboard(&session))
                    .await?;
            }
        },
        Some(FEEDBACK_BUTTON) => feedback(&bot, &session, msg.chat.id, &config).await?,
        Some(RESULTS_BUTTON) if session.quiz.is_submitted() => {
            send_results(&bot, msg.chat.id, &session).await?
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options, or see /help")
                .reply_markup(menu_keyboard(&session))
                .await?;
        }
    }
    Ok(())
}

async fn ask_subject(
    bot: &Bot,
    dialogue: &QuizDialogue,
    session: ChatSession,
    chat_id: ChatId,
    config: &Config,
) -> HandlerResult {
    // Checked again before generating, since the key could be set by then.
    if let Err(e) = session.api_key(config) {
        bot.send_message(chat_id, render::describe_error(&e)).await?;
        return Ok(());
    }

    let suggestion = session
        .parameters
        .as_ref()
        .map(|p| p.subject().to_string())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
    bot.send_message(chat_id, "Which subject should the quiz be about?")
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(suggestion)]]))
        .await?;

    dialogue.update(State::ReceiveSubject { session }).await?;
    Ok(())
}

pub async fn receive_subject(
    bot: Bot,
    dialogue: QuizDialogue,
    session: ChatSession,
    msg: Message,
) -> HandlerResult {
    let subject = match msg.text().map(str::trim) {
        Some(subject) if !subject.is_empty() => subject.to_string(),
        _ => {
            bot.send_message(msg.chat.id, "Please send the subject as text")
                .await?;
            return Ok(());
        }
    };

    let suggestion = session
        .parameters
        .as_ref()
        .filter(|p| p.subject() == subject)
        .map(|p| p.topic().to_string())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    bot.send_message(msg.chat.id, format!("Which topic in {}?", subject))
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(suggestion)]]))
        .await?;

    dialogue
        .update(State::ReceiveTopic { session, subject })
        .await?;
    Ok(())
}

pub async fn receive_topic(
    bot: Bot,
    dialogue: QuizDialogue,
    (session, subject): (ChatSession, String),
    msg: Message,
) -> HandlerResult {
    let topic = match msg.text().map(str::trim) {
        Some(topic) if !topic.is_empty() => topic.to_string(),
        _ => {
            bot.send_message(msg.chat.id, "Please send the topic as text")
                .await?;
            return Ok(());
        }
    };

    let keyboard = KeyboardMarkup::new(vec![Difficulty::ALL
        .iter()
        .map(|d| KeyboardButton::new(d.as_str()))
        .collect::<Vec<_>>()]);
    bot.send_message(msg.chat.id, "How hard should it be?")
        .reply_markup(keyboard)
        .await?;

    dialogue
        .update(State::ReceiveDifficulty {
            session,
            subject,
            topic,
        })
        .await?;
    Ok(())
}

pub async fn receive_difficulty(
    bot: Bot,
    dialogue: QuizDialogue,
    (session, subject, topic): (ChatSession, String, String),
    msg: Message,
) -> HandlerResult {
    let difficulty = match msg.text().map(str::parse::<Difficulty>) {
        Some(Ok(difficulty)) => difficulty,
        _ => {
            bot.send_message(msg.chat.id, "Please choose easy, medium or hard")
                .await?;
            return Ok(());
        }
    };

    let keyboard = KeyboardMarkup::new(
        (MIN_QUESTIONS..=MAX_QUESTIONS)
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|row| {
                row.iter()
                    .map(|n| KeyboardButton::new(n.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>(),
    );
    bot.send_message(msg.chat.id, "How many questions?")
        .reply_markup(keyboard)
        .await?;

    dialogue
        .update(State::ReceiveCount {
            session,
            subject,
            topic,
            difficulty,
        })
        .await?;
    Ok(())
}

pub async fn receive_count(
    bot: Bot,
    dialogue: QuizDialogue,
    (session, subject, topic, difficulty): (ChatSession, String, String, Difficulty),
    msg: Message,
    config: Arc<Config>,
) -> HandlerResult {
    let count = match msg.text().map(|t| t.trim().parse::<usize>()) {
        Some(Ok(count)) => count,
        _ => {
            bot.send_message(msg.chat.id, "Please enter a number")
                .await?;
            return Ok(());
        }
    };

    let params = match QuizParameters::new(&subject, &topic, difficulty, count) {
        Ok(params) => params,
        Err(e) => {
            bot.send_message(msg.chat.id, render::describe_error(&e))
                .await?;
            return Ok(());
        }
    };

    // Without a key the step is kept, so the number can be sent again after /key.
    let api_key = match session.api_key(&config) {
        Ok(key) => key.clone(),
        Err(e) => {
            bot.send_message(msg.chat.id, render::describe_error(&e))
                .await?;
            return Ok(());
        }
    };

    generate(&bot, &dialogue, session, params, &api_key, msg.chat.id, &config).await
}

async fn generate(
    bot: &Bot,
    dialogue: &QuizDialogue,
    mut session: ChatSession,
    params: QuizParameters,
    api_key: &ApiKey,
    chat_id: ChatId,
    config: &Config,
) -> HandlerResult {
    bot.send_message(chat_id, "Writing your quiz, this can take a few seconds...")
        .reply_markup(KeyboardRemove::new())
        .await?;
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let result = match ChatGptModel::new(api_key, &config.model) {
        Ok(model) => session.generate(&model, params).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            info!("Chat {} started a quiz of {} questions", chat_id.0, session.quiz.len());
            match outcome {
                ParseOutcome::Parsed => {}
                ParseOutcome::Padded { missing } => {
                    bot.send_message(
                        chat_id,
                        format!("The AI wrote fewer questions than asked, so {} simple ones were added.", missing),
                    )
                    .await?;
                }
                ParseOutcome::Fallback => {
                    bot.send_message(
                        chat_id,
                        "The AI's reply could not be read, so here is a simple fallback quiz.",
                    )
                    .await?;
                }
            }
            send_question(bot, &session, 0, chat_id).await?;
            dialogue
                .update(State::Answering {
                    session,
                    current: 0,
                })
                .await?;
        }
        Err(e) => {
            warn!("Quiz generation failed for chat {}: {}", chat_id.0, e);
            let text = format!("Could not generate a quiz: {}.", render::describe_error(&e));
            match session.resume_index() {
                Some(current) => {
                    bot.send_message(
                        chat_id,
                        format!("{} Back to your unfinished quiz.", text),
                    )
                    .await?;
                    resume(bot, dialogue, session, current, chat_id).await?;
                }
                None => {
                    let note = if session.quiz.is_empty() {
                        ""
                    } else {
                        " Your previous quiz is unchanged."
                    };
                    bot.send_message(chat_id, format!("{}{}", text, note))
                        .reply_markup(menu_keyboard(&session))
                        .await?;
                    dialogue.update(State::Idle { session }).await?;
                }
            }
        }
    }
    Ok(())
}

/// Puts the chat back into an unsubmitted quiz at `current`.
async fn resume(
    bot: &Bot,
    dialogue: &QuizDialogue,
    session: ChatSession,
    current: usize,
    chat_id: ChatId,
) -> HandlerResult {
    if current < session.quiz.len() {
        send_question(bot, &session, current, chat_id).await?;
    } else {
        send_submit_prompt(bot, &session, chat_id).await?;
    }
    dialogue.update(State::Answering { session, current }).await?;
    Ok(())
}

async fn send_submit_prompt(bot: &Bot, session: &ChatSession, chat_id: ChatId) -> HandlerResult {
    bot.send_message(
        chat_id,
        format!(
            "That was the last question. You answered {} of {}.",
            session.quiz.answered(),
            session.quiz.len()
        ),
    )
    .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(SUBMIT_BUTTON)]]))
    .await?;
    Ok(())
}

async fn send_question(
    bot: &Bot,
    session: &ChatSession,
    index: usize,
    chat_id: ChatId,
) -> HandlerResult {
    let Some(question) = session.quiz.question(index) else {
        return Ok(());
    };

    let mut rows = render::answer_labels(question)
        .into_iter()
        .map(|label| vec![KeyboardButton::new(label)])
        .collect::<Vec<_>>();
    rows.push(vec![
        KeyboardButton::new(SKIP_BUTTON),
        KeyboardButton::new(SUBMIT_BUTTON),
    ]);

    bot.send_message(chat_id, render::question_text(index, question))
        .reply_markup(KeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

pub async fn answering(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut session, current): (ChatSession, usize),
    msg: Message,
) -> HandlerResult {
    let text = msg.text().map(str::trim).unwrap_or_default();
    if text == SUBMIT_BUTTON {
        return submit(&bot, &dialogue, session, msg.chat.id).await;
    }
    if current >= session.quiz.len() {
        bot.send_message(msg.chat.id, "That was the last question.")
            .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(SUBMIT_BUTTON)]]))
            .await?;
        return Ok(());
    }

    match session.answer(current, text) {
        AnswerStep::Next(next) => {
            send_question(&bot, &session, next, msg.chat.id).await?;
            dialogue
                .update(State::Answering {
                    session,
                    current: next,
                })
                .await?;
        }
        AnswerStep::Finished => {
            let len = session.quiz.len();
            send_submit_prompt(&bot, &session, msg.chat.id).await?;
            dialogue
                .update(State::Answering {
                    session,
                    current: len,
                })
                .await?;
        }
        AnswerStep::Unreadable => {
            bot.send_message(msg.chat.id, "Please pick one of A, B, C or D")
                .await?;
        }
        AnswerStep::Rejected(e) => {
            bot.send_message(msg.chat.id, format!("{}. See /results", e))
                .await?;
            dialogue.update(State::Idle { session }).await?;
        }
    }
    Ok(())
}

async fn submit(
    bot: &Bot,
    dialogue: &QuizDialogue,
    mut session: ChatSession,
    chat_id: ChatId,
) -> HandlerResult {
    if session.quiz.is_empty() {
        bot.send_message(chat_id, "There is no quiz to submit yet. Start one with /quiz")
            .await?;
        return Ok(());
    }

    let score = session.quiz.submit();
    info!("Chat {} scored {} / {}", chat_id.0, score, session.quiz.len());

    send_results(bot, chat_id, &session).await?;
    bot.send_message(chat_id, "What next?")
        .reply_markup(menu_keyboard(&session))
        .await?;

    dialogue.update(State::Idle { session }).await?;
    Ok(())
}

async fn send_results(bot: &Bot, chat_id: ChatId, session: &ChatSession) -> HandlerResult {
    let score = session.quiz.score().unwrap_or_default();
    let mut parts = vec![render::summary(score, session.quiz.len())];
    parts.extend(
        session
            .quiz
            .results()
            .iter()
            .map(render::question_feedback),
    );
    send_long(bot, chat_id, &parts.join("\n\n")).await
}

async fn feedback(
    bot: &Bot,
    session: &ChatSession,
    chat_id: ChatId,
    config: &Config,
) -> HandlerResult {
    let params = match &session.parameters {
        Some(params) if session.quiz.is_submitted() => params,
        _ => {
            bot.send_message(chat_id, "Submit a quiz first, then I can comment on it.")
                .await?;
            return Ok(());
        }
    };

    let api_key = match session.api_key(config) {
        Ok(key) => key,
        Err(e) => {
            bot.send_message(chat_id, render::describe_error(&e)).await?;
            return Ok(());
        }
    };

    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    let result = match ChatGptModel::new(api_key, &config.model) {
        Ok(model) => generate_feedback(&model, params, &session.quiz).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => send_long(bot, chat_id, &text).await?,
        Err(e) => {
            warn!("Feedback failed for chat {}: {}", chat_id.0, e);
            bot.send_message(
                chat_id,
                format!(
                    "Could not get feedback: {}. Your score above is still valid.",
                    render::describe_error(&e)
                ),
            )
            .await?;
        }
    }
    Ok(())
}
