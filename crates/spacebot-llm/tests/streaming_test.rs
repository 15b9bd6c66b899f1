use futures::{stream, Stream, StreamExt};
use spacebot_llm::{
    collect_reply, decode_ndjson, decode_sse, DeltaEvent, DeltaStream, StreamError,
};
use std::time::Duration;

fn upstream(
    chunks: Vec<&'static str>,
) -> impl Stream<Item = Result<&'static [u8], StreamError>> + Send + 'static {
    stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes())).collect::<Vec<_>>())
}

async fn events(stream: DeltaStream) -> Vec<Result<DeltaEvent, StreamError>> {
    stream.collect().await
}

async fn ok_events(stream: DeltaStream) -> Vec<DeltaEvent> {
    events(stream)
        .await
        .into_iter()
        .map(|e| e.expect("unexpected stream error"))
        .collect()
}

#[tokio::test]
async fn test_sse_content_then_done() {
    let body = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: [DONE]\n\n",
    ];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(
        events,
        vec![DeltaEvent::fragment("Hi"), DeltaEvent::finished()]
    );
}

#[tokio::test]
async fn test_sse_chunk_boundaries_do_not_matter() {
    let body = vec![
        "data: {\"choices\":[{\"del",
        "ta\":{\"content\":\"The space \"}}]}\n",
        "\ndata: {\"choices\":[{\"delta\":{\"content\":\"is open\"}}]}\nda",
        "ta: [DONE]",
    ];

    let reply = collect_reply(decode_sse(upstream(body), None)).await.unwrap();
    assert_eq!(reply, "The space is open");
}

#[tokio::test]
async fn test_sse_not_found_stops_everything() {
    let body = vec![
        "Not Found\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        "data: [DONE]\n",
    ];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(events, vec![DeltaEvent::finished_with("Model not found")]);
}

#[tokio::test]
async fn test_sse_model_notice_does_not_terminate() {
    let body = vec![
        "data: {\"model\":\"mixtral-8x7b\"}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: [DONE]\n\n",
    ];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(
        events,
        vec![DeltaEvent::fragment("Hello"), DeltaEvent::finished()]
    );
}

#[tokio::test]
async fn test_sse_error_detail_is_terminal_content() {
    let body = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"Par\"}}]}\n",
        "data: {\"detail\":\"Provider quota exhausted\"}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"tial\"}}]}\n",
    ];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(
        events,
        vec![
            DeltaEvent::fragment("Par"),
            DeltaEvent::finished_with("Provider quota exhausted"),
        ]
    );
}

#[tokio::test]
async fn test_sse_finish_chunk_without_content_is_terminal() {
    let body = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        "data: [DONE]\n",
    ];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(events, vec![DeltaEvent::fragment("ok"), DeltaEvent::finished()]);
}

#[tokio::test]
async fn test_sse_malformed_json_is_hard_error() {
    let body = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
        "data: {\"choices\":[{\"delta\":\n",
        "data: [DONE]\n",
    ];

    let events = events(decode_sse(upstream(body), None)).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_ref().unwrap(), &DeltaEvent::fragment("a"));
    let err = events[1].as_ref().unwrap_err();
    assert!(err.is_decode());
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_sse_upstream_closing_early_ends_sequence() {
    let body = vec!["data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}\n"];

    let events = ok_events(decode_sse(upstream(body), None)).await;

    assert_eq!(events, vec![DeltaEvent::fragment("cut")]);
}

#[tokio::test]
async fn test_ndjson_lines_map_one_to_one() {
    let body = vec![
        "{\"content\":\"Door \",\"terminal\":false}\n",
        "{\"content\":\"\",\"terminal\":false}\n",
        "{\"content\":\"unlocked\",\"terminal\":false}\n{\"content\":null,\"terminal\":true}\n",
    ];

    let events = ok_events(decode_ndjson(upstream(body), None)).await;

    assert_eq!(
        events,
        vec![
            DeltaEvent::fragment("Door "),
            DeltaEvent::fragment(""),
            DeltaEvent::fragment("unlocked"),
            DeltaEvent::finished(),
        ]
    );
}

#[tokio::test]
async fn test_ndjson_nothing_after_terminal() {
    let body = vec![
        "{\"content\":\"bye\",\"terminal\":true}\n",
        "{\"content\":\"late\",\"terminal\":false}\n",
    ];

    let events = ok_events(decode_ndjson(upstream(body), None)).await;

    assert_eq!(events, vec![DeltaEvent::finished_with("bye")]);
}

#[tokio::test]
async fn test_ndjson_parse_failure_is_fatal() {
    let body = vec![
        "{\"content\":\"a\",\"terminal\":false}\n",
        "data: not json\n",
        "{\"content\":\"b\",\"terminal\":false}\n",
    ];

    let events = events(decode_ndjson(upstream(body), None)).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], Err(StreamError::MalformedFrame { .. })));
}

#[tokio::test]
async fn test_collect_reply_propagates_hard_errors() {
    let body = vec!["{\"content\":\"a\"}\n", "{oops}\n"];

    let result = collect_reply(decode_ndjson(upstream(body), None)).await;

    assert!(result.unwrap_err().is_decode());
}

#[tokio::test]
async fn test_collect_reply_includes_terminal_content() {
    let body = vec!["data: {\"detail\":\"Upstream overloaded\"}\n"];

    let reply = collect_reply(decode_sse(upstream(body), None)).await.unwrap();

    assert_eq!(reply, "Upstream overloaded");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_upstream_times_out() {
    let stalled = upstream(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"slow\"}}]}\n"])
        .chain(stream::pending());

    let events = events(decode_sse(stalled, Some(Duration::from_secs(30)))).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_ref().unwrap(), &DeltaEvent::fragment("slow"));
    let err = events[1].as_ref().unwrap_err();
    assert!(matches!(err, StreamError::Timeout(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_transport_error_distinct_from_terminal_event() {
    let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![
        Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n".as_slice()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset")),
    ];

    let events = events(decode_sse(stream::iter(chunks), None)).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], Err(StreamError::Transport(_))));
}
