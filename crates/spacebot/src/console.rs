use spacebot_throttle::SubjectKey;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::state::Reply;

/// What a user asked the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/ask <prompt>`: stream a model reply
    Ask(String),
    /// `/status`: report the user's scheduler state
    Status,
    /// Any other text, answered after the user stops typing
    Say(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub user: SubjectKey,
    pub command: Command,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty line")]
    Empty,

    #[error("Invalid user id: {0}")]
    InvalidUser(String),

    #[error("Missing message text")]
    MissingText,

    #[error("/ask needs a prompt")]
    EmptyPrompt,
}

/// Parse a console line of the form `<user-id> <text>`.
pub fn parse_line(line: &str) -> Result<Incoming, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let (user, text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let user = user
        .parse::<i64>()
        .map(SubjectKey)
        .map_err(|_| ParseError::InvalidUser(user.to_string()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::MissingText);
    }

    let command = if text == "/status" {
        Command::Status
    } else if let Some(prompt) = text.strip_prefix("/ask") {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ParseError::EmptyPrompt);
        }
        Command::Ask(prompt.to_string())
    } else {
        Command::Say(text.to_string())
    };

    Ok(Incoming { user, command })
}

/// Console text for one reply
pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Delta { text, .. } => text.clone(),
        Reply::Done { .. } => "\n".to_string(),
        Reply::Message { user, text } => format!("[{}] {}\n", user, text),
    }
}

/// Write replies to `out` until every sender is gone.
///
/// Replies still queued when the last sender drops are written too.
pub async fn print_replies<W>(
    mut replies: UnboundedReceiver<Reply>,
    out: &mut W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        out.write_all(render(&reply).as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}
