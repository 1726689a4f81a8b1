use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{instrument, warn};

use crate::llm_client::SharedLlmClient;
use crate::rag::types::render_passages;
use crate::rag::SharedKnowledgeBase;

use super::tools::{Capabilities, SharedWebSearch};
use super::traits::{AgentBehavior, AgentRequest, AgentResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum LegalRole {
    Researcher,
    #[value(alias = "contract-analyst")]
    Analyst,
    Strategist,
}

impl LegalRole {
    pub const ALL: [LegalRole; 3] = [
        LegalRole::Researcher,
        LegalRole::Analyst,
        LegalRole::Strategist,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LegalRole::Researcher => "Legal Researcher",
            LegalRole::Analyst => "Contract Analyst",
            LegalRole::Strategist => "Legal Strategist",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LegalRole::Researcher => "Legal research specialist",
            LegalRole::Analyst => "Contract analysis specialist",
            LegalRole::Strategist => "Legal strategy specialist",
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LegalRole::Researcher => "You are the Legal Researcher. Find and cite relevant legal cases and precedents. Provide detailed research summaries with sources. Reference specific sections from the uploaded document.",
            LegalRole::Analyst => "You are the Contract Analyst. Review the contract thoroughly, identify key terms and potential issues, and reference specific clauses from the document.",
            LegalRole::Strategist => "You are the Legal Strategist. Develop a comprehensive legal strategy, weigh both risks and opportunities, and give actionable recommendations.",
        }
    }

    fn body_hint(self) -> &'static str {
        match self {
            LegalRole::Researcher => "## Findings (cite document sections and sources), ## Precedents, ## Open Questions",
            LegalRole::Analyst => "## Key Terms, ## Issues (quote the clause), ## Obligations",
            LegalRole::Strategist => "## Risks, ## Opportunities, ## Recommendations",
        }
    }
}

impl fmt::Display for LegalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn format_prompt(
    directive: &str,
    body_hint: &str,
    request: &AgentRequest,
    document_context: &str,
    web_context: Option<&str>,
) -> String {
    let mut prompt = String::from(directive.trim());

    prompt.push_str("\n\nDocument excerpts (ground every claim in these):\n");
    if document_context.trim().is_empty() {
        prompt.push_str("(no matching excerpts; say so rather than guessing)");
    } else {
        prompt.push_str(document_context.trim());
    }

    if let Some(web) = web_context.filter(|w| !w.trim().is_empty()) {
        prompt.push_str("\n\nWeb search results:\n");
        prompt.push_str(web.trim());
    }

    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(request.input.trim());
    prompt.push_str("\n\nRespond with ");
    prompt.push_str(body_hint.trim());
    prompt.push('.');

    prompt
}

/// One team member: role instructions, model, tools and a read handle on the knowledge base.
pub struct LegalAgent {
    role: LegalRole,
    llm_client: SharedLlmClient,
    tools: Vec<SharedWebSearch>,
    knowledge: SharedKnowledgeBase,
}

impl LegalAgent {
    pub fn new(role: LegalRole, llm_client: SharedLlmClient, knowledge: SharedKnowledgeBase) -> Self {
        Self {
            role,
            llm_client,
            tools: Vec::new(),
            knowledge,
        }
    }

    /// Only the researcher takes web search; other roles ignore the capability.
    pub fn with_capabilities(mut self, capabilities: &Capabilities) -> Self {
        if self.role == LegalRole::Researcher {
            self.tools = capabilities.search.iter().cloned().collect();
        }
        self
    }

    pub fn role(&self) -> LegalRole {
        self.role
    }

    pub fn knowledge(&self) -> &SharedKnowledgeBase {
        &self.knowledge
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    async fn web_context(&self, query: &str) -> Option<String> {
        let mut lines = Vec::new();
        for tool in &self.tools {
            match tool.search(query).await {
                Ok(snippets) => lines.extend(snippets.into_iter().map(|s| format!("- {s}"))),
                Err(err) => warn!(?err, role = %self.role, "Web search failed; continuing without it"),
            }
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

#[async_trait]
impl AgentBehavior for LegalAgent {
    #[instrument(skip_all, fields(role = %self.role))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let passages = self
            .knowledge
            .search(&request.input, self.knowledge.search_limit())
            .await
            .with_context(|| format!("{} could not consult the knowledge base", self.role))?;
        let web = self.web_context(&request.input).await;

        let prompt = format_prompt(
            self.role.directive(),
            self.role.body_hint(),
            &request,
            &render_passages(&passages),
            web.as_deref(),
        );
        let output = self
            .llm_client
            .complete(&prompt)
            .await
            .with_context(|| format!("{} model call failed", self.role))?;

        Ok(AgentResponse::with_metadata(
            output,
            json!({
                "role": self.role.name(),
                "passages": passages.len(),
                "web_results": web.is_some(),
            }),
        ))
    }
}

/// Build the requested roles over one shared knowledge base.
pub fn build_roster(
    roles: &[LegalRole],
    llm_client: &SharedLlmClient,
    knowledge: &SharedKnowledgeBase,
    capabilities: &Capabilities,
) -> Vec<Arc<LegalAgent>> {
    let mut seen = Vec::with_capacity(roles.len());
    for role in roles {
        if !seen.contains(role) {
            seen.push(*role);
        }
    }

    seen.into_iter()
        .map(|role| {
            Arc::new(
                LegalAgent::new(role, Arc::clone(llm_client), Arc::clone(knowledge))
                    .with_capabilities(capabilities),
            )
        })
        .collect()
}
