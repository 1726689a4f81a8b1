use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use crate::agents::roster::build_roster;
use crate::agents::{Capabilities, LegalRole};
use crate::config::{CredentialResolver, Credentials, Settings};
use crate::error::{LegalTeamError, LegalTeamResult};
use crate::ingest::{Ingestor, ProcessedFiles};
use crate::llm_client::{OpenAiLlmClient, SharedLlmClient};
use crate::orchestrator::{build_synthesizer, AnalysisType, LegalTeam, SynthesisPolicy, TeamReport};
use crate::rag::{self, SharedKnowledgeBase, VectorHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Indexed { chunks: usize },
    /// Name already ingested this session; content is not compared.
    Skipped,
}

/// Everything one user session owns. Dropping it releases every handle.
pub struct Session {
    settings: Settings,
    resolver: CredentialResolver,
    capabilities: Capabilities,
    ingestor: Ingestor,
    synthesis: SynthesisPolicy,
    llm_override: Option<SharedLlmClient>,
    vector: Option<VectorHandle>,
    knowledge: Option<SharedKnowledgeBase>,
    processed: ProcessedFiles,
    selected: Option<Vec<LegalRole>>,
    team: Option<LegalTeam>,
    last_error: Option<String>,
}

impl Session {
    const TEAM_NAME: &'static str = "Legal Team";

    pub fn new(settings: Settings, resolver: CredentialResolver, capabilities: Capabilities) -> Self {
        Self {
            ingestor: Ingestor::new(settings.clone()),
            settings,
            resolver,
            capabilities,
            synthesis: SynthesisPolicy::default(),
            llm_override: None,
            vector: None,
            knowledge: None,
            processed: ProcessedFiles::default(),
            selected: None,
            team: None,
            last_error: None,
        }
    }

    pub fn with_synthesis(mut self, policy: SynthesisPolicy) -> Self {
        self.synthesis = policy;
        self
    }

    pub fn with_ingestor(mut self, ingestor: Ingestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    /// Bypass the OpenAI client, e.g. for an already-configured backend.
    pub fn with_llm_client(mut self, client: SharedLlmClient) -> Self {
        self.llm_override = Some(client);
        self
    }

    pub fn set_credential(&mut self, name: &str, value: impl Into<String>) {
        self.resolver.set_interactive(name, value);
    }

    pub fn credentials(&self) -> Credentials {
        self.resolver.credentials()
    }

    pub fn is_connected(&self) -> bool {
        self.vector.is_some()
    }

    /// Reuses an existing handle; otherwise attempts one connection. Failures are
    /// recorded for `status()` and never retried automatically.
    pub async fn connect(&mut self) -> Option<&VectorHandle> {
        if self.vector.is_none() {
            let credentials = self.resolver.credentials();
            let attempt = rag::connect(&credentials, &self.settings).await;
            match attempt {
                Ok(Some(handle)) => {
                    self.last_error = None;
                    self.vector = Some(handle);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Vector store connection failed");
                    self.last_error = Some(err.to_string());
                }
            }
        }
        self.vector.as_ref()
    }

    pub async fn ingest_upload(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> LegalTeamResult<UploadOutcome> {
        let Some(handle) = self.vector.clone() else {
            return Err(self.record(LegalTeamError::connection(anyhow!(
                "not connected to the vector store"
            ))));
        };

        if self.processed.contains(file_name) {
            info!(file = %file_name, "Already ingested this session; skipping");
            return Ok(UploadOutcome::Skipped);
        }

        let result = self.ingestor.ingest(file_name, bytes, &handle).await;
        let report = match result {
            Ok(report) => report,
            Err(err) => return Err(self.record(err)),
        };

        self.processed.insert(file_name);
        self.knowledge = Some(report.knowledge);
        self.last_error = None;
        let roles = self.active_roles(AnalysisType::Custom);
        self.assemble_team(&roles);

        Ok(UploadOutcome::Indexed {
            chunks: report.chunks,
        })
    }

    /// Explicit selection overrides the members an analysis preset would pick.
    pub fn select_members(&mut self, roles: Vec<LegalRole>) {
        self.selected = Some(roles);
        if self.knowledge.is_some() {
            let roles = self.active_roles(AnalysisType::Custom);
            self.assemble_team(&roles);
        }
    }

    pub fn clear_member_selection(&mut self) {
        self.selected = None;
        if self.knowledge.is_some() {
            self.assemble_team(&LegalRole::ALL);
        }
    }

    pub async fn run_query(
        &mut self,
        query: &str,
        analysis: AnalysisType,
    ) -> LegalTeamResult<TeamReport> {
        if self.knowledge.is_none() {
            return Err(self.record(LegalTeamError::query(anyhow!(
                "no document has been ingested yet"
            ))));
        }

        let roles = self.active_roles(analysis);
        let framed = analysis.frame(query);

        let outcome = match &self.team {
            Some(team) if team.roles() == roles => team.run(&framed).await,
            _ => match self.build_team(&roles) {
                Ok(team) => team.run(&framed).await,
                Err(err) => Err(err),
            },
        };

        outcome.map_err(|err| self.record(err))
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.vector.is_some(),
            collection: self.settings.collection.clone(),
            missing_credentials: self.credentials().missing(),
            documents: {
                let mut names: Vec<String> = self.processed.names().map(str::to_string).collect();
                names.sort();
                names
            },
            members: self.team.as_ref().map(LegalTeam::roles).unwrap_or_default(),
            web_search: self.capabilities.search_available(),
            last_error: self.last_error.clone(),
        }
    }

    fn active_roles(&self, analysis: AnalysisType) -> Vec<LegalRole> {
        match &self.selected {
            Some(roles) => roles.clone(),
            None => analysis.members().to_vec(),
        }
    }

    fn llm_client(&self) -> LegalTeamResult<SharedLlmClient> {
        if let Some(client) = &self.llm_override {
            return Ok(Arc::clone(client));
        }
        let key = self
            .resolver
            .credentials()
            .openai_api_key
            .ok_or_else(|| LegalTeamError::query(anyhow!("OPENAI_API_KEY is not set")))?;
        Ok(OpenAiLlmClient::shared(&key, &self.settings))
    }

    fn build_team(&self, roles: &[LegalRole]) -> LegalTeamResult<LegalTeam> {
        let knowledge = self
            .knowledge
            .as_ref()
            .ok_or_else(|| LegalTeamError::query(anyhow!("no document has been ingested yet")))?;
        let llm = self.llm_client()?;
        let members = build_roster(roles, &llm, knowledge, &self.capabilities);
        LegalTeam::new(
            Self::TEAM_NAME,
            members,
            Arc::clone(knowledge),
            build_synthesizer(self.synthesis, llm),
        )
        .map_err(LegalTeamError::query)
    }

    /// Replaces the standing team. A failure leaves no team and is kept for `status()`.
    fn assemble_team(&mut self, roles: &[LegalRole]) {
        match self.build_team(roles) {
            Ok(team) => self.team = Some(team),
            Err(err) => {
                warn!(error = %err, "Team assembly failed");
                self.team = None;
                self.record(err);
            }
        }
    }

    fn record(&mut self, err: LegalTeamError) -> LegalTeamError {
        self.last_error = Some(err.to_string());
        err
    }

    #[cfg(test)]
    fn attach_vector(&mut self, handle: VectorHandle) {
        self.vector = Some(handle);
    }
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub connected: bool,
    pub collection: String,
    pub missing_credentials: Vec<&'static str>,
    pub documents: Vec<String>,
    pub members: Vec<LegalRole>,
    pub web_search: bool,
    pub last_error: Option<String>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.connected {
            writeln!(f, "Vector store: connected (collection '{}')", self.collection)?;
        } else {
            writeln!(f, "Vector store: not connected")?;
        }
        if !self.missing_credentials.is_empty() {
            writeln!(f, "Missing: {}", self.missing_credentials.join(", "))?;
        }
        if self.documents.is_empty() {
            writeln!(f, "Documents: none")?;
        } else {
            writeln!(f, "Documents: {}", self.documents.join(", "))?;
        }
        let members = self
            .members
            .iter()
            .map(|r| r.name())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            f,
            "Team: {}",
            if members.is_empty() { "not assembled" } else { members.as_str() }
        )?;
        write!(
            f,
            "Web search: {}",
            if self.web_search { "available" } else { "unavailable" }
        )?;
        if let Some(err) = &self.last_error {
            write!(f, "\nLast error: {err}")?;
        }
        Ok(())
    }
}
