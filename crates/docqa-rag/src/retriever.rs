//! Self-query retrieval.
//!
//! A small LLM rewrites the user's question into a [`StructuredQuery`]: the
//! text to embed, an optional `filename` filter and an optional result count.
//! The collection then runs a similarity search restricted by that filter.
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use docqa_core::config::RetrievalConfig;
use docqa_core::traits::{Collection, Generator};
use docqa_core::types::{MetadataFilter, RetrievalResult, StructuredQuery, FILENAME_ATTRIBUTE};
use docqa_core::{Error, Result};

/// Placeholder some models emit instead of `null`.
const NO_FILTER: &str = "NO_FILTER";

pub struct Retriever {
    collection: Arc<dyn Collection>,
    translator: Arc<dyn Generator>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(collection: Arc<dyn Collection>, translator: Arc<dyn Generator>, config: RetrievalConfig) -> Self {
        Self { collection, translator, config }
    }

    /// Prompt asking the translation model for a JSON structured query.
    pub fn query_constructor_prompt(&self, question: &str, known_files: &BTreeSet<String>) -> String {
        let files = if known_files.is_empty() {
            "(none)".to_string()
        } else {
            known_files.iter().map(|f| format!("`{f}`")).collect::<Vec<_>>().join(", ")
        };
        format!(
            r#"Your goal is to structure the user's query to match the request schema provided below.

Respond with a single JSON object and nothing else:
{{
    "query": string,   // text string to compare to document contents
    "filter": object | null,   // metadata filter, or null when no filter applies
    "limit": integer | null    // number of documents to retrieve, or null
}}

A filter object is either
  {{"comparator": "eq", "attribute": <name>, "value": <string>}}
or
  {{"comparator": "in", "attribute": <name>, "values": [<string>, ...]}}

The query string should contain only text that is expected to match the
contents of documents. Any conditions in the filter should not be mentioned
in the query as well. Only use the attributes listed below, and only add a
filter or limit when the user asks for one.

Data source:
  content: {content}
  attributes:
    "{attr}" (string): {attr_description}
  known values of "{attr}": {files}

User query:
{question}

Structured request:
"#,
            content = self.config.content_description,
            attr = FILENAME_ATTRIBUTE,
            attr_description = self.config.filename_description,
        )
    }

    /// Translate `question`; `None` when the model fails or answers nonsense.
    pub async fn translate(&self, question: &str) -> Result<Option<StructuredQuery>> {
        let known = self.collection.filenames().await?;
        let prompt = self.query_constructor_prompt(question, &known);
        let raw = match self.translator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, model = self.translator.model(), "query translation failed");
                return Ok(None);
            }
        };
        match parse_structured_query(&raw, question) {
            Ok(sq) => {
                tracing::debug!(query = %sq.query, filter = ?sq.filter, limit = ?sq.limit, "structured query");
                Ok(Some(sq))
            }
            Err(e) => {
                tracing::warn!(error = %e, "unusable structured query");
                Ok(None)
            }
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        if self.collection.count().await? == 0 {
            tracing::info!(collection = self.collection.name(), "collection is empty, nothing to retrieve");
            return Ok(RetrievalResult::default());
        }
        let Some(sq) = self.translate(question).await? else {
            return Ok(RetrievalResult::default());
        };
        let limit = sq.limit.map_or(self.config.top_k, |l| l.min(self.config.max_k));
        let chunks = self.collection.query(&sq.query, sq.filter.as_ref(), limit).await?;
        tracing::info!(hits = chunks.len(), limit, filtered = sq.filter.is_some(), "retrieved context");
        Ok(RetrievalResult::from_chunks(chunks))
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn parse_filter(value: Value) -> Result<Option<MetadataFilter>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() || s.trim() == NO_FILTER => Ok(None),
        v @ Value::Object(_) => {
            let filter: MetadataFilter = serde_json::from_value(v)
                .map_err(|e| Error::InvalidInput(format!("malformed filter: {e}")))?;
            if filter.attribute() != FILENAME_ATTRIBUTE {
                tracing::warn!(attribute = filter.attribute(), "dropping filter on unknown attribute");
                return Ok(None);
            }
            Ok(Some(filter))
        }
        other => Err(Error::InvalidInput(format!("unexpected filter: {other}"))),
    }
}

/// Parse the translation model's answer. Code fences and surrounding prose are
/// ignored; a blank `query` falls back to `original`.
pub fn parse_structured_query(raw: &str, original: &str) -> Result<StructuredQuery> {
    let value: Value = serde_json::from_str(strip_fences(raw))
        .map_err(|e| Error::InvalidInput(format!("structured query is not JSON: {e}")))?;
    let Value::Object(mut obj) = value else {
        return Err(Error::InvalidInput("structured query is not a JSON object".to_string()));
    };
    let query = match obj.remove("query") {
        Some(Value::String(q)) if !q.trim().is_empty() => q,
        _ => original.to_string(),
    };
    let filter = parse_filter(obj.remove("filter").unwrap_or(Value::Null))?;
    let limit = obj
        .remove("limit")
        .and_then(|l| l.as_u64())
        .and_then(|l| usize::try_from(l).ok())
        .filter(|l| *l > 0);
    Ok(StructuredQuery { query, filter, limit })
}
