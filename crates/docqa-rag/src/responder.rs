//! Grounded answer generation.
use std::sync::Arc;

use docqa_core::traits::Generator;
use docqa_core::Result;

const INSTRUCTIONS: &str = "I am going to ask you a question, which I would like you to answer \
based only on the provided context, and not any other information. \
Break your answer up into nicely readable paragraphs.";

/// Instructions, then the literal question, then the context joined by single spaces.
pub fn build_prompt(query: &str, context: &[String]) -> String {
    format!(
        "{INSTRUCTIONS}  The question is '{query}'. Here is all the context you have:{}",
        context.join(" ")
    )
}

pub struct Responder {
    generator: Arc<dyn Generator>,
}

impl Responder {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// One generation request; the answer comes back untouched.
    pub async fn respond(&self, query: &str, context: &[String]) -> Result<String> {
        let prompt = build_prompt(query, context);
        tracing::debug!(model = self.generator.model(), chunks = context.len(), prompt_chars = prompt.len(), "requesting answer");
        self.generator.generate(&prompt).await
    }
}
