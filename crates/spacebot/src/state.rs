use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use spacebot_llm::{ChatMessage, ChatRequest, GenerationClient};
use spacebot_throttle::{KeyedActionScheduler, SubjectKey};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;
use crate::console::{Command, Incoming};

/// Output produced for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Piece of a streamed model reply
    Delta { user: SubjectKey, text: String },
    /// Streamed model reply finished
    Done { user: SubjectKey },
    /// Complete standalone message
    Message { user: SubjectKey, text: String },
}

/// Shared bot state handed to every message handler
///
/// Cheap to clone; all clones share scheduler state.
#[derive(Clone)]
pub struct Bot {
    scheduler: KeyedActionScheduler,
    client: Arc<dyn GenerationClient>,
    system_prompt: Arc<str>,
    replies: UnboundedSender<Reply>,
}

impl Bot {
    pub fn new(
        config: &Config,
        client: Arc<dyn GenerationClient>,
        replies: UnboundedSender<Reply>,
    ) -> Result<Self> {
        let scheduler = KeyedActionScheduler::with_current_runtime(&config.scheduler)?;
        Ok(Self {
            scheduler,
            client,
            system_prompt: Arc::from(config.bot.system_prompt.as_str()),
            replies,
        })
    }

    pub fn scheduler(&self) -> &KeyedActionScheduler {
        &self.scheduler
    }

    pub async fn handle(&self, incoming: Incoming) {
        let user = incoming.user;
        match incoming.command {
            Command::Ask(prompt) => {
                let answered = self
                    .scheduler
                    .throttle(user, || self.ask(user, prompt))
                    .await;
                if answered.is_none() {
                    let wait = self
                        .scheduler
                        .throttler()
                        .remaining(&user)
                        .map(|d| d.as_secs() + 1)
                        .unwrap_or(1);
                    self.send(Reply::Message {
                        user,
                        text: format!("Please wait {}s before asking again.", wait),
                    });
                }
            }
            Command::Status => {
                self.scheduler
                    .limit(user, || async { self.status(user) })
                    .await;
            }
            Command::Say(text) => {
                let replies = self.replies.clone();
                self.scheduler.debounce(user, move || async move {
                    replies.send(Reply::Message {
                        user,
                        text: format!("heard: {}", text),
                    })
                });
            }
        }
    }

    async fn ask(&self, user: SubjectKey, prompt: String) {
        let request = ChatRequest::new(vec![
            ChatMessage::system(&*self.system_prompt),
            ChatMessage::user(prompt),
        ]);

        let mut stream = match self.client.stream_chat(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "failed to open generation stream");
                self.send(Reply::Message {
                    user,
                    text: format!("The model is unavailable right now ({}).", e),
                });
                return;
            }
        };

        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let Some(text) = event.content {
                        self.send(Reply::Delta { user, text });
                    }
                    if event.terminal {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "generation stream failed");
                    self.send(Reply::Message {
                        user,
                        text: format!("The reply was cut off ({}).", e),
                    });
                    break;
                }
            }
        }

        self.send(Reply::Done { user });
    }

    fn status(&self, user: SubjectKey) {
        let throttler = self.scheduler.throttler();
        let text = match throttler.remaining(&user) {
            Some(left) => format!("/ask available again in {}s", left.as_secs() + 1),
            None => "/ask available now".to_string(),
        };
        let text = if self.scheduler.debouncer().is_pending(&user) {
            format!("{}; a message of yours is still pending", text)
        } else {
            text
        };
        self.send(Reply::Message { user, text });
    }

    fn send(&self, reply: Reply) {
        if self.replies.send(reply).is_err() {
            tracing::debug!("reply receiver dropped");
        }
    }
}
