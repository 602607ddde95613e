use std::time::Duration;

use futures::StreamExt;
use mockito::{Matcher, Server};
use serde_json::json;

use llamachat_services::{
    ChatRequest, GenerationConfig, Message, OllamaApi, OllamaClient, OllamaError, Transcript,
};

fn client(server: &Server) -> OllamaClient {
    OllamaClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap()
}

fn request(model: &str) -> ChatRequest {
    let mut transcript = Transcript::new();
    transcript.push(Message::user("Why is the sky blue?"));
    ChatRequest::build(model, &transcript, &GenerationConfig::default())
}

#[tokio::test]
async fn list_accepts_wrapped_inventory() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"models": [
                {"name": "llama3.2:latest", "size": 2019393189u64, "modified_at": "2024-10-01T10:00:00Z",
                 "digest": "sha256:a80c4f17acd5", "details": {"parameter_size": "3.2B"}},
                {"name": "nomic-embed-text:latest", "size": 274302450u64}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let models = client(&server).list().await.unwrap();

    mock.assert_async().await;
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "llama3.2:latest");
    assert_eq!(models[0].parameter_size.as_deref(), Some("3.2B"));
    assert_eq!(models[1].size, "261.6 MB");
}

#[tokio::test]
async fn list_accepts_bare_inventory() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(json!([{"model": "phi3:latest", "size": 0}]).to_string())
        .create_async()
        .await;

    let models = client(&server).list().await.unwrap();
    assert_eq!(models[0].name, "phi3:latest");
    assert_eq!(models[0].size, "0 B");
}

#[tokio::test]
async fn chat_streams_ndjson_chunks() {
    let mut server = Server::new_async().await;
    let body = [
        json!({"message": {"role": "assistant", "content": "Ray"}, "done": false}),
        json!({"message": {"role": "assistant", "content": "leigh"}, "done": false}),
        json!({"message": {"role": "assistant", "content": ""}, "done": true, "eval_count": 2}),
    ]
    .iter()
    .map(|v| format!("{}\n", v))
    .collect::<String>();

    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2:latest",
            "stream": true,
            "messages": [{"role": "user", "content": "Why is the sky blue?"}],
            "options": {"num_predict": 512, "num_ctx": 2048}
        })))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let stream = client(&server).chat(&request("llama3.2:latest")).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;

    mock.assert_async().await;
    let chunks: Vec<_> = chunks.into_iter().map(Result::unwrap).collect();
    let text: String = chunks.iter().map(|c| c.content()).collect();
    assert_eq!(text, "Rayleigh");
    assert!(chunks.last().unwrap().done);
}

#[tokio::test]
async fn chat_surfaces_inline_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("{\"message\":{\"content\":\"par\"},\"done\":false}\n{\"error\":\"model runner crashed\"}\n")
        .create_async()
        .await;

    let stream = client(&server).chat(&request("llama3.2:latest")).await.unwrap();
    let items: Vec<_> = stream.collect().await;

    assert!(items[0].is_ok());
    assert!(matches!(&items[1], Err(OllamaError::Server(msg)) if msg == "model runner crashed"));
}

#[tokio::test]
async fn non_success_status_carries_server_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(json!({"error": "model 'ghost' not found"}).to_string())
        .create_async()
        .await;

    let result = client(&server).chat(&request("ghost")).await;

    match result {
        Err(OllamaError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "model 'ghost' not found");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn pull_reports_sparse_progress() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/pull")
        .match_body(Matcher::Json(json!({"model": "gemma3:1b", "stream": true})))
        .with_status(200)
        .with_body(concat!(
            "{\"status\":\"pulling manifest\"}\n",
            "{\"status\":\"pulling 7cd4618c1faf\",\"digest\":\"sha256:7cd4618c1faf\",\"total\":815310432,\"completed\":1048576}\n",
            "{\"status\":\"success\"}"
        ))
        .create_async()
        .await;

    let stream = client(&server).pull("gemma3:1b").await.unwrap();
    let updates: Vec<_> = stream.map(Result::unwrap).collect().await;

    mock.assert_async().await;
    assert_eq!(updates.len(), 3);
    assert_eq!(updates[1].total, Some(815310432));
    assert_eq!(updates[1].completed, Some(1048576));
    assert_eq!(updates[2].status, "success");
}

#[tokio::test]
async fn unreachable_server_is_connection_refused() {
    let client = OllamaClient::with_base_url("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    let err = client.list().await.unwrap_err();
    assert!(matches!(err, OllamaError::ConnectionRefused(url) if url == "http://127.0.0.1:9"));
}
