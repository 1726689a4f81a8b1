use async_trait::async_trait;

/// A question as handed to one team member, already framed by the preset.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub input: String,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// A member's answer plus what grounded it (role, passage count, web use).
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub output: String,
    pub metadata: Option<serde_json::Value>,
}

impl AgentResponse {
    pub fn with_metadata(output: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            output: output.into(),
            metadata: Some(metadata),
        }
    }
}

/// Anything that can answer a request on behalf of the team.
#[async_trait]
pub trait AgentBehavior: Send + Sync {
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse>;
}
