use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docqa_core::config::Settings;
use docqa_core::traits::{Collection, Generator};
use docqa_core::types::{Role, UploadedFile};
use docqa_core::{Error, Result};
use docqa_embed::FakeEmbedder;
use docqa_rag::indexer::Indexer;
use docqa_rag::session::{Session, SessionState};
use docqa_rag::DocQa;
use docqa_vector::LanceCollection;

/// Replies with a fixed text (or error) and remembers every prompt.
struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(message.to_string()), prompts: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|m| Error::Provider { status: Some(503), message: m })
    }
}

fn settings_for(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.storage.persist_directory = dir.to_string_lossy().to_string();
    settings.embedding.use_fake = true;
    settings.embedding.dimension = 64;
    settings.indexing.show_progress = false;
    settings
}

async fn open_collection(settings: &Settings) -> Arc<LanceCollection> {
    let embedder = Arc::new(FakeEmbedder::new(settings.embedding.dimension));
    Arc::new(LanceCollection::open(&settings.persist_path(), &settings.storage.collection_name, embedder).await.unwrap())
}

fn docx(name: &str, paragraphs: &[&str]) -> UploadedFile {
    let body: String = paragraphs.iter().map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>")).collect();
    let xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:document><w:body>{body}</w:body></w:document>"#);
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    UploadedFile::new(name, buf.into_inner())
}

fn pairs(filename: &str, texts: &[&str]) -> Vec<(String, String)> {
    texts.iter().map(|t| (t.to_string(), filename.to_string())).collect()
}

async fn stored_ids(collection: &LanceCollection) -> Vec<usize> {
    let mut ids: Vec<usize> =
        collection.query("anything", None, 100).await.unwrap().into_iter().map(|c| c.id.parse().unwrap()).collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn alpha_beta_gamma_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let translator = ScriptedGenerator::ok(r#"{"query": "Beta", "filter": null, "limit": null}"#);
    let answerer = ScriptedGenerator::ok("Beta is the second letter.");
    let qa = DocQa::new(&settings, collection.clone(), translator.clone(), answerer.clone())?;

    let report = qa.upload(&[docx("greek.docx", &["Alpha. Beta. Gamma."])]).await?;
    assert_eq!(report.added, 1);
    assert_eq!(report.indexed_files, vec!["greek.docx"]);
    assert!(qa.available_documents().await?.contains("greek.docx"));

    let query = "What does the document say about Beta?";
    let retrieved = qa.retrieve(query).await?;
    assert_eq!(retrieved.context_texts, vec!["Alpha. Beta. Gamma."]);
    assert_eq!(retrieved.sources_display(), "greek.docx");
    assert!(translator.last_prompt().contains(query));
    assert!(translator.last_prompt().contains("`greek.docx`"));

    let answer = qa.respond(query, &retrieved.context_texts).await?;
    assert_eq!(answer, "Beta is the second letter.");
    let prompt = answerer.last_prompt();
    assert!(prompt.contains(&format!("The question is '{query}'")));
    assert!(prompt.ends_with("Here is all the context you have:Alpha. Beta. Gamma."));
    Ok(())
}

#[tokio::test]
async fn ids_continue_from_collection_size() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;

    assert_eq!(indexer.index(&pairs("a.pdf", &["one", "two", "three"])).await?, 3);
    assert_eq!(stored_ids(&collection).await, vec![0, 1, 2]);

    assert_eq!(indexer.index(&pairs("b.pdf", &["four", "five"])).await?, 2);
    assert_eq!(collection.count().await?, 5);
    assert_eq!(stored_ids(&collection).await, vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn small_batches_cover_every_chunk() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut settings = settings_for(tmp.path());
    settings.indexing.batch_size = 2;
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;

    let texts: Vec<String> = (0..7).map(|i| format!("chunk number {i}")).collect();
    let items: Vec<(String, String)> = texts.into_iter().map(|t| (t, "big.pdf".to_string())).collect();
    assert_eq!(indexer.index(&items).await?, 7);
    assert_eq!(stored_ids(&collection).await, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn reuploading_a_file_is_deduplicated() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let qa = DocQa::new(&settings, collection.clone(), ScriptedGenerator::ok("{}"), ScriptedGenerator::ok(""))?;

    let file = docx("notes.docx", &["Alpha. Beta. Gamma."]);
    assert_eq!(qa.upload(std::slice::from_ref(&file)).await?.added, 1);
    assert_eq!(qa.upload(std::slice::from_ref(&file)).await?.added, 0);
    assert_eq!(collection.count().await?, 1);

    // Same text under another name is a different chunk.
    assert_eq!(qa.upload(&[docx("copy.docx", &["Alpha. Beta. Gamma."])]).await?.added, 1);
    Ok(())
}

#[tokio::test]
async fn dedup_off_stores_independent_copies() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut settings = settings_for(tmp.path());
    settings.indexing.dedup = false;
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;

    indexer.index(&pairs("a.pdf", &["same"])).await?;
    indexer.index(&pairs("a.pdf", &["same"])).await?;
    assert_eq!(stored_ids(&collection).await, vec![0, 1]);
    Ok(())
}

#[tokio::test]
async fn empty_filename_is_rejected_before_writing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;

    let items = vec![("fine".to_string(), "a.pdf".to_string()), ("orphan".to_string(), String::new())];
    assert!(matches!(indexer.index(&items).await, Err(Error::InvalidInput(_))));
    assert_eq!(collection.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn filename_filter_limits_sources() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let translator = ScriptedGenerator::ok(
        r#"```json
{"query": "reactor safety", "filter": {"comparator": "eq", "attribute": "filename", "value": "b.pdf"}, "limit": 5}
```"#,
    );
    let qa = DocQa::new(&settings, collection.clone(), translator, ScriptedGenerator::ok(""))?;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;
    indexer.index(&pairs("a.pdf", &["reactor safety rules", "reactor cooling"])).await?;
    indexer.index(&pairs("b.pdf", &["safety of the reactor core", "unrelated gardening tips"])).await?;

    let retrieved = qa.retrieve("What does b.pdf say about reactor safety?").await?;
    assert_eq!(retrieved.context_texts.len(), 2);
    assert_eq!(retrieved.sources_display(), "b.pdf");
    Ok(())
}

#[tokio::test]
async fn requested_limit_is_honoured_and_capped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut settings = settings_for(tmp.path());
    settings.retrieval.top_k = 2;
    settings.retrieval.max_k = 3;
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;
    let texts: Vec<String> = (0..6).map(|i| format!("fact {i} about water")).collect();
    indexer.index(&texts.into_iter().map(|t| (t, "w.pdf".to_string())).collect::<Vec<_>>()).await?;

    let no_limit = DocQa::new(&settings, collection.clone(), ScriptedGenerator::ok(r#"{"query": "water"}"#), ScriptedGenerator::ok(""))?;
    assert_eq!(no_limit.retrieve("water?").await?.context_texts.len(), 2);

    let greedy = DocQa::new(&settings, collection.clone(), ScriptedGenerator::ok(r#"{"query": "water", "limit": 50}"#), ScriptedGenerator::ok(""))?;
    assert_eq!(greedy.retrieve("all water facts").await?.context_texts.len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_collection_skips_translation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let translator = ScriptedGenerator::ok(r#"{"query": "x"}"#);
    let qa = DocQa::new(&settings, collection, translator.clone(), ScriptedGenerator::ok(""))?;

    let retrieved = qa.retrieve("anything?").await?;
    assert!(retrieved.is_empty());
    assert_eq!(retrieved.sources_display(), "");
    assert_eq!(translator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn translation_failures_yield_empty_context() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;
    indexer.index(&pairs("a.pdf", &["some stored text"])).await?;

    let prose = DocQa::new(&settings, collection.clone(), ScriptedGenerator::ok("Sure! Here you go."), ScriptedGenerator::ok(""))?;
    assert!(prose.retrieve("stored text?").await?.is_empty());

    let down = DocQa::new(&settings, collection.clone(), ScriptedGenerator::failing("unavailable"), ScriptedGenerator::ok(""))?;
    assert!(down.retrieve("stored text?").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn bad_files_are_reported_and_others_indexed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let qa = DocQa::new(&settings, collection, ScriptedGenerator::ok("{}"), ScriptedGenerator::ok(""))?;

    let files = vec![
        UploadedFile::new("notes.txt", b"plain text".to_vec()),
        UploadedFile::new("broken.docx", b"not a zip archive".to_vec()),
        UploadedFile::new("broken.pdf", b"%PDF-1.4\ngarbage without objects or xref".to_vec()),
        docx("good.docx", &["Some useful content."]),
    ];
    let report = qa.upload(&files).await?;
    assert_eq!(report.added, 1);
    assert_eq!(report.indexed_files, vec!["good.docx"]);
    assert_eq!(report.skipped, vec!["notes.txt"]);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(failed, vec!["broken.docx", "broken.pdf"]);
    Ok(())
}

#[tokio::test]
async fn session_records_answered_turns() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let qa = DocQa::new(
        &settings,
        collection,
        ScriptedGenerator::ok(r#"{"query": "Gamma"}"#),
        ScriptedGenerator::ok("Gamma comes third."),
    )?;
    let mut session = Session::new(Arc::new(qa));

    session.stage(vec![docx("greek.docx", &["Alpha. Beta. Gamma."])]);
    assert_eq!(session.state(), SessionState::AwaitingUpload);
    let report = session.process_documents().await?;
    assert_eq!(report.added, 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.staged().is_empty());

    let reply = session.ask("Which letter is third?").await?;
    assert_eq!(reply.content, "Gamma comes third.");
    assert_eq!(reply.sources.as_deref(), Some("greek.docx"));

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "Which letter is third?");
    assert_eq!(transcript[1].role, Role::Assistant);

    session.reset();
    assert!(session.transcript().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_turn_leaves_transcript_untouched() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = settings_for(tmp.path());
    let collection = open_collection(&settings).await;
    let qa = DocQa::new(
        &settings,
        collection,
        ScriptedGenerator::ok(r#"{"query": "x"}"#),
        ScriptedGenerator::failing("quota exceeded"),
    )?;
    let mut session = Session::new(Arc::new(qa));

    let err = session.ask("Anything?").await.unwrap_err();
    assert!(matches!(err, Error::Provider { status: Some(503), .. }));
    assert!(err.is_recoverable());
    assert!(session.transcript().is_empty());
    assert_eq!(session.state(), SessionState::Idle);

    assert!(matches!(session.ask("   ").await, Err(Error::InvalidInput(_))));
    Ok(())
}

#[tokio::test]
async fn listing_and_indexing_need_no_api_key() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut settings = settings_for(tmp.path());
    settings.provider.api_key = None;
    let qa = DocQa::from_settings(&settings).await?;

    assert!(qa.available_documents().await?.is_empty());
    let report = qa.upload(&[docx("keyless.docx", &["Indexed with the offline embedder."])]).await?;
    assert_eq!(report.added, 1);
    assert_eq!(qa.available_documents().await?.into_iter().collect::<Vec<_>>(), vec!["keyless.docx"]);
    if settings.api_key().is_none() {
        assert!(matches!(qa.respond("anything?", &[]).await, Err(Error::InvalidConfig(_))));
    }
    Ok(())
}
