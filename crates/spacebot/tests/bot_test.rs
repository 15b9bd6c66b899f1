use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use spacebot::llm::{decode_ndjson, ChatRequest, DeltaStream, GenerationClient, StreamError};
use spacebot::throttle::SubjectKey;
use spacebot::{parse_line, print_replies, Bot, Config, Reply};

/// Replays a fixed NDJSON body for every request
struct ScriptedClient {
    body: Vec<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(body: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            body,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaStream, StreamError> {
        assert_eq!(request.messages.len(), 2);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Result<&'static [u8], StreamError>> =
            self.body.iter().map(|&line| Ok(line.as_bytes())).collect();
        Ok(decode_ndjson(stream::iter(chunks), None))
    }
}

struct DownClient;

#[async_trait]
impl GenerationClient for DownClient {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<DeltaStream, StreamError> {
        Err(StreamError::Status {
            status: 503,
            body: "maintenance".to_string(),
        })
    }
}

fn config() -> Config {
    toml::from_str(
        r#"
        [scheduler]
        debounce_ms = 100
        limit_ms = 1000
        throttle_ms = 5000

        [upstream]
        base_url = "http://localhost:1337/v1"
        model = "test-model"
        "#,
    )
    .unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Reply>) -> Vec<Reply> {
    let mut replies = Vec::new();
    while let Ok(reply) = rx.try_recv() {
        replies.push(reply);
    }
    replies
}

#[tokio::test(start_paused = true)]
async fn test_ask_streams_reply_then_throttles() {
    let client = ScriptedClient::new(vec![
        "{\"content\":\"Space \",\"terminal\":false}\n",
        "{\"content\":\"is open\",\"terminal\":true}\n",
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config(), client.clone(), tx).unwrap();
    let user = SubjectKey(1);

    bot.handle(parse_line("1 /ask is the space open?").unwrap()).await;
    assert_eq!(
        drain(&mut rx),
        vec![
            Reply::Delta { user, text: "Space ".to_string() },
            Reply::Delta { user, text: "is open".to_string() },
            Reply::Done { user },
        ]
    );

    bot.handle(parse_line("1 /ask again?").unwrap()).await;
    let replies = drain(&mut rx);
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], Reply::Message { text, .. } if text.starts_with("Please wait")));
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    // Another user is not throttled
    bot.handle(parse_line("2 /ask hello").unwrap()).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(5001)).await;
    bot.handle(parse_line("1 /ask and now?").unwrap()).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_upstream_failure_becomes_message() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config(), Arc::new(DownClient), tx).unwrap();

    bot.handle(parse_line("5 /ask anyone there?").unwrap()).await;

    let replies = drain(&mut rx);
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], Reply::Message { text, .. } if text.contains("503")));
}

#[tokio::test(start_paused = true)]
async fn test_plain_text_is_debounced() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config(), ScriptedClient::new(vec![]), tx).unwrap();
    let user = SubjectKey(3);

    for line in ["3 who", "3 who has", "3 who has the key?"] {
        bot.handle(parse_line(line).unwrap()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(drain(&mut rx).is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        drain(&mut rx),
        vec![Reply::Message {
            user,
            text: "heard: who has the key?".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_is_limited() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config(), ScriptedClient::new(vec![]), tx).unwrap();

    bot.handle(parse_line("4 /status").unwrap()).await;
    bot.handle(parse_line("4 /status").unwrap()).await;

    let replies = drain(&mut rx);
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], Reply::Message { text, .. } if text == "/ask available now"));
    assert!(bot.scheduler().limiter().is_pending(&SubjectKey(4)));
}

#[tokio::test(start_paused = true)]
async fn test_pending_message_is_printed_after_bot_is_dropped() {
    let (tx, rx) = mpsc::unbounded_channel();
    let bot = Bot::new(&config(), ScriptedClient::new(vec![]), tx).unwrap();

    bot.handle(parse_line("8 see you tomorrow").unwrap()).await;
    drop(bot);

    let mut out = Vec::new();
    print_replies(rx, &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "[8] heard: see you tomorrow\n");
}
