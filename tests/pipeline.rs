//! End-to-end pipeline against local mock HTTP servers: web pages for URL
//! ingestion and an OpenAI-compatible `/chat/completions` endpoint.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use ragchat::config::Config;
use ragchat::error::RagError;
use ragchat::llm::{ApiKey, MISSING_KEY_ADVISORY};
use ragchat::progress::NoProgress;
use ragchat::session::{Session, SUMMARY_PREFIX};

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<Value>>>,
    page_hits: Arc<AtomicUsize>,
}

impl MockState {
    fn last_prompt(&self) -> String {
        let requests = self.requests.lock().unwrap();
        let last = requests.last().expect("no completion request received");
        last["messages"][1]["content"].as_str().unwrap().to_string()
    }
}

async fn completions(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer test-key" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let n = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(body.clone());
        requests.len()
    };
    Ok(Json(json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": format!("answer {} from {}", n, body["model"].as_str().unwrap_or("?")) },
            "finish_reason": "stop"
        }]
    })))
}

async fn france(State(state): State<MockState>) -> Html<&'static str> {
    state.page_hits.fetch_add(1, Ordering::SeqCst);
    Html(
        "<html><head><title>Ignored title</title><style>p { color: red }</style></head>\
         <body><p>Paris is the capital of France.</p><script>var x = 1;</script></body></html>",
    )
}

async fn japan() -> Html<&'static str> {
    Html("<html><body><div>Tokyo is the capital of Japan.</div></body></html>")
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_mock() -> (SocketAddr, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/france", get(france))
        .route("/japan", get(japan))
        .route("/broken", get(broken))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::minimal();
    config.llm.api_base = format!("http://{}/v1", addr);
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(384);
    config.retrieval.top_k = 1;
    config
}

#[tokio::test]
async fn url_ingest_retrieve_and_answer() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), ApiKey::new("test-key")).unwrap();

    session
        .ingest(&format!("http://{}/france", addr))
        .await
        .unwrap();
    session
        .ingest(&format!("http://{}/japan", addr))
        .await
        .unwrap();
    assert_eq!(
        session.documents()[0].text,
        "Paris is the capital of France."
    );

    session.generate_embeddings(&NoProgress).await.unwrap();
    session.build_index().unwrap();

    let answer = session.ask("capital of France").await.unwrap();
    assert_eq!(answer, "answer 1 from mixtral-8x7b-32768");
    assert_eq!(
        mock.last_prompt(),
        "Previous conversation:\n\nNew question: Based on the following context:\n\n\
         Paris is the capital of France.\n\nAnswer the following question: capital of France\n\n\
         Please provide a response that takes into account the previous conversation."
    );

    session.select_model("gemma-7b-it").unwrap();
    let answer = session.ask("capital of Japan").await.unwrap();
    assert_eq!(answer, "answer 2 from gemma-7b-it");
    let prompt = mock.last_prompt();
    assert!(prompt.starts_with(
        "Previous conversation:\nUser: capital of France\nAssistant: answer 1 from mixtral-8x7b-32768\n"
    ));
    assert!(prompt.contains("Tokyo is the capital of Japan."));
    assert!(!prompt.contains("Paris"));

    assert_eq!(session.history().len(), 4);
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn system_message_and_settings_are_sent() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), ApiKey::new("test-key")).unwrap();
    session.ask("hello").await.unwrap();

    let requests = mock.requests.lock().unwrap();
    let body = &requests[0];
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "You are a helpful assistant.");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["max_tokens"], 1000);
    assert!((body["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn repeated_url_is_served_from_cache() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), None).unwrap();
    let url = format!("http://{}/france", addr);
    session.ingest(&url).await.unwrap();
    session.ingest(&url).await.unwrap();
    assert_eq!(mock.page_hits.load(Ordering::SeqCst), 1);
    assert_eq!(session.documents().len(), 2);
    assert_eq!(session.processed_urls(), vec![url.as_str(), url.as_str()]);
}

#[tokio::test]
async fn http_error_status_is_fetch_error() {
    let (addr, _mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), None).unwrap();
    let err = session
        .ingest(&format!("http://{}/broken", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Fetch { .. }), "{:?}", err);
    assert!(err.to_string().contains("500"), "{}", err);
    assert!(session.documents().is_empty());
}

#[tokio::test]
async fn rejected_key_becomes_error_answer() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), ApiKey::new("wrong-key")).unwrap();
    let answer = session.ask("hello").await.unwrap();
    assert!(
        answer.starts_with("An error occurred while querying the LLM: "),
        "{}",
        answer
    );
    assert!(answer.contains("401"), "{}", answer);
    assert!(mock.requests.lock().unwrap().is_empty());
    assert_eq!(session.transcript()[1].message, answer);
}

#[tokio::test]
async fn missing_key_never_contacts_server() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), None).unwrap();
    assert_eq!(session.ask("hello").await.unwrap(), MISSING_KEY_ADVISORY);
    assert!(mock.requests.lock().unwrap().is_empty());

    assert!(session.history().is_empty());
    assert!(session.transcript().is_empty());

    session.set_api_key(ApiKey::new("test-key"));
    assert_eq!(session.ask("hello again").await.unwrap(), "answer 1 from mixtral-8x7b-32768");
    assert!(
        mock.last_prompt()
            .starts_with("Previous conversation:\n\nNew question: hello again"),
        "{}",
        mock.last_prompt()
    );
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn summary_covers_every_document() {
    let (addr, mock) = spawn_mock().await;
    let mut session = Session::new(&config_for(addr), ApiKey::new("test-key")).unwrap();
    session
        .ingest(&format!("http://{}/france", addr))
        .await
        .unwrap();
    session
        .ingest(&format!("http://{}/japan", addr))
        .await
        .unwrap();

    let summary = session.summarize().await.unwrap();
    assert_eq!(summary, "answer 1 from mixtral-8x7b-32768");
    assert_eq!(
        mock.last_prompt(),
        "Summarize the following documents:\n\nParis is the capital of France.\n\nTokyo is the capital of Japan."
    );
    assert_eq!(
        session.transcript()[0].message,
        format!("{}{}", SUMMARY_PREFIX, summary)
    );
    assert!(session.history().is_empty());
}
