use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::agents::LegalRole;
use crate::llm_client::SharedLlmClient;

/// What a member's answer rested on, read back from its response metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grounding {
    pub passages: usize,
    pub web_results: bool,
}

impl Grounding {
    pub fn from_metadata(metadata: Option<&serde_json::Value>) -> Self {
        let Some(meta) = metadata else {
            return Self::default();
        };
        Self {
            passages: meta["passages"].as_u64().unwrap_or_default() as usize,
            web_results: meta["web_results"].as_bool().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartialAnswer {
    pub role: LegalRole,
    pub output: String,
    pub grounding: Grounding,
}

/// Combines grounded member answers into one response.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn combine(&self, query: &str, partials: &[PartialAnswer]) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SynthesisPolicy {
    Concatenate,
    #[default]
    Summarize,
}

pub fn build_synthesizer(
    policy: SynthesisPolicy,
    coordinator: SharedLlmClient,
) -> Arc<dyn Synthesizer> {
    match policy {
        SynthesisPolicy::Concatenate => Arc::new(ConcatenateSynthesis),
        SynthesisPolicy::Summarize => Arc::new(SummarizeSynthesis::new(coordinator)),
    }
}

/// Role-headed sections in roster order.
pub struct ConcatenateSynthesis;

#[async_trait]
impl Synthesizer for ConcatenateSynthesis {
    async fn combine(&self, _query: &str, partials: &[PartialAnswer]) -> anyhow::Result<String> {
        Ok(render_sections(partials))
    }
}

/// A coordinating model rewrites the member answers into one coherent response.
pub struct SummarizeSynthesis {
    coordinator: SharedLlmClient,
}

impl SummarizeSynthesis {
    const DIRECTIVE: &'static str = "You lead a legal team. Merge the specialists' findings below into one coherent answer. Keep every document reference they cite, resolve contradictions explicitly, and end with prioritised recommendations. Do not introduce facts that no specialist reported.";

    pub fn new(coordinator: SharedLlmClient) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Synthesizer for SummarizeSynthesis {
    async fn combine(&self, query: &str, partials: &[PartialAnswer]) -> anyhow::Result<String> {
        let prompt = format!(
            "{directive}\n\nQuestion:\n{query}\n\nSpecialist findings:\n{sections}\n\nRespond with ## Summary, ## Key Points, ## Recommendations.",
            directive = Self::DIRECTIVE,
            query = query.trim(),
            sections = render_sections(partials),
        );

        self.coordinator
            .complete(&prompt)
            .await
            .context("team coordinator failed to synthesize member answers")
    }
}

fn render_sections(partials: &[PartialAnswer]) -> String {
    partials
        .iter()
        .map(|p| format!("### {}\n{}", p.role.name(), p.output.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
