use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use docqa_core::config::Settings;
use docqa_core::traits::{EmbedTask, Embedder};
use docqa_core::Error;
use docqa_embed::{get_default_embedder, FakeEmbedder, GeminiEmbedder};
use docqa_llm::GeminiClient;

/// Answer a single request with `body` and return what was received.
async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 { break; }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length { break; }
            }
        }
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(reply.as_bytes()).await;
        String::from_utf8_lossy(&raw).to_string()
    });
    (format!("http://{addr}/v1beta"), handle)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let mut settings = Settings::default();
    settings.embedding.use_fake = true;

    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts, EmbedTask::Document).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 768, "embedding dim follows embedding.dimension");
    assert_eq!(embedder.dim(), 768);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn shared_words_score_higher() {
    let embedder = FakeEmbedder::new(256);
    let texts = vec![
        "The sky is blue.".to_string(),
        "What color is the sky?".to_string(),
        "Grass grows green in spring".to_string(),
    ];
    let embs = embedder.embed_batch(&texts, EmbedTask::Query).await.unwrap();
    assert!(cosine(&embs[1], &embs[0]) > cosine(&embs[1], &embs[2]));
}

#[test]
fn embedder_id_pins_dimension() {
    assert_eq!(FakeEmbedder::new(32).embedder_id(), "fake:xxhash:d32");
    assert_ne!(FakeEmbedder::new(32).embedder_id(), FakeEmbedder::new(64).embedder_id());
}

#[test]
fn hosted_embedder_needs_a_key() {
    let mut settings = Settings::default();
    settings.provider.api_key = None;
    std::env::remove_var("GOOGLE_API_KEY");
    std::env::remove_var("APP_USE_FAKE_EMBEDDINGS");
    assert!(get_default_embedder(&settings).is_err());
}

#[test]
fn empty_text_embeds_without_nan() {
    let v = FakeEmbedder::new(16).embed_text("   ");
    assert!(v.iter().all(|x| x.is_finite() && *x == 0.0));
}

#[tokio::test]
async fn gemini_embedder_sends_task_type_and_reads_values() {
    let (base, request) = serve_once(r#"{"embeddings":[{"values":[0.1,0.2,0.3]},{"values":[0.4,0.5,0.6]}]}"#).await;
    let client = GeminiClient::new(&base, "test-key", Duration::from_secs(5)).unwrap();
    let embedder = GeminiEmbedder::new(client, "embedding-001", 3);
    assert_eq!(embedder.embedder_id(), "gemini:models/embedding-001:d3");

    let texts = vec!["first".to_string(), "second".to_string()];
    let vectors = embedder.embed_batch(&texts, EmbedTask::Document).await.expect("embed");
    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST /v1beta/models/embedding-001:batchEmbedContents"));
    assert!(raw.contains("RETRIEVAL_DOCUMENT"));
    assert!(raw.contains("\"second\""));
}

#[tokio::test]
async fn gemini_embedder_rejects_wrong_dimension() {
    let (base, _request) = serve_once(r#"{"embeddings":[{"values":[0.1,0.2]}]}"#).await;
    let client = GeminiClient::new(&base, "test-key", Duration::from_secs(5)).unwrap();
    let embedder = GeminiEmbedder::new(client, "models/embedding-001", 768);

    let err = embedder.embed_batch(&["q".to_string()], EmbedTask::Query).await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}
