use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::agents::{AgentBehavior, AgentRequest, LegalAgent, LegalRole};
use crate::error::{LegalTeamError, LegalTeamResult};
use crate::rag::SharedKnowledgeBase;

use super::synthesis::{Grounding, PartialAnswer, Synthesizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Validating,
    Dispatching,
    AwaitingResponses,
    Synthesizing,
    Complete,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct MemberFailure {
    pub role: LegalRole,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct TeamReport {
    pub answer: String,
    pub partials: Vec<PartialAnswer>,
    pub failures: Vec<MemberFailure>,
    pub phase: RunPhase,
}

/// Named group of agents sharing one knowledge base.
pub struct LegalTeam {
    name: String,
    members: Vec<Arc<LegalAgent>>,
    knowledge: SharedKnowledgeBase,
    synthesizer: Arc<dyn Synthesizer>,
}

impl LegalTeam {
    /// Fails when a member is bound to a different knowledge base than the team.
    pub fn new(
        name: impl Into<String>,
        members: Vec<Arc<LegalAgent>>,
        knowledge: SharedKnowledgeBase,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> anyhow::Result<Self> {
        if let Some(stray) = members
            .iter()
            .find(|m| !Arc::ptr_eq(m.knowledge(), &knowledge))
        {
            return Err(anyhow!(
                "{} is bound to a different knowledge base than the team",
                stray.role()
            ));
        }

        Ok(Self {
            name: name.into(),
            members,
            knowledge,
            synthesizer,
        })
    }

    pub fn roles(&self) -> Vec<LegalRole> {
        self.members.iter().map(|m| m.role()).collect()
    }

    /// Fan the query out to every member and merge what comes back. Members
    /// that fail are reported and left out; the run fails only if all of them do.
    #[instrument(
        skip_all,
        fields(
            team = %self.name,
            collection = %self.knowledge.collection(),
            members = self.members.len()
        )
    )]
    pub async fn run(&self, query: &str) -> LegalTeamResult<TeamReport> {
        let mut phase = RunPhase::Idle;

        advance(&mut phase, RunPhase::Validating);
        let query = query.trim();
        if query.is_empty() {
            return Err(fail(&mut phase, anyhow!("query is empty")));
        }
        if self.members.is_empty() {
            return Err(fail(&mut phase, anyhow!("no team members selected")));
        }

        advance(&mut phase, RunPhase::Dispatching);
        let handles: Vec<_> = self
            .members
            .iter()
            .map(|member| {
                let member = Arc::clone(member);
                let request = AgentRequest::new(query);
                (member.role(), tokio::spawn(async move { member.handle(request).await }))
            })
            .collect();

        advance(&mut phase, RunPhase::AwaitingResponses);
        let mut partials = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (role, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow!("member task aborted: {join_err}")),
            };
            match outcome {
                Ok(response) => partials.push(PartialAnswer {
                    role,
                    grounding: Grounding::from_metadata(response.metadata.as_ref()),
                    output: response.output,
                }),
                Err(err) => {
                    warn!(?err, %role, "Team member failed");
                    failures.push(MemberFailure {
                        role,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        if partials.is_empty() {
            let reasons = failures
                .iter()
                .map(|f| format!("{}: {}", f.role, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(fail(&mut phase, anyhow!("every team member failed ({reasons})")));
        }

        advance(&mut phase, RunPhase::Synthesizing);
        let answer = match self.synthesizer.combine(query, &partials).await {
            Ok(answer) => answer,
            Err(err) => return Err(fail(&mut phase, err)),
        };

        advance(&mut phase, RunPhase::Complete);
        info!(
            answered = partials.len(),
            failed = failures.len(),
            "Team run complete"
        );

        Ok(TeamReport {
            answer,
            partials,
            failures,
            phase,
        })
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug!(from = %phase, to = %next, "Team run phase");
    *phase = next;
}

fn fail(phase: &mut RunPhase, err: anyhow::Error) -> LegalTeamError {
    warn!(at = %phase, error = %format!("{err:#}"), "Team run failed");
    *phase = RunPhase::Failed;
    LegalTeamError::query(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Capabilities;
    use crate::llm_client::SharedLlmClient;
    use crate::orchestrator::synthesis::ConcatenateSynthesis;
    use crate::rag::KnowledgeBase;
    use crate::testing::{
        test_settings, InMemoryVectorStore, KeywordEmbedder, MockLlmClient, TextReader,
    };
    use std::path::Path;

    async fn knowledge() -> SharedKnowledgeBase {
        let kb = KnowledgeBase::new(
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(KeywordEmbedder),
            &test_settings(),
        )
        .with_reader(Arc::new(TextReader::new(
            "The supplier gives a warranty of twelve months.",
        )));
        kb.add_content(Path::new("/tmp/x.pdf"), "supply.pdf")
            .await
            .expect("seed");
        Arc::new(kb)
    }

    fn member(role: LegalRole, llm: SharedLlmClient, kb: &SharedKnowledgeBase) -> Arc<LegalAgent> {
        Arc::new(LegalAgent::new(role, llm, Arc::clone(kb)).with_capabilities(&Capabilities::default()))
    }

    fn team(members: Vec<Arc<LegalAgent>>, kb: SharedKnowledgeBase) -> LegalTeam {
        LegalTeam::new("Legal Team", members, kb, Arc::new(ConcatenateSynthesis)).expect("team")
    }

    #[tokio::test]
    async fn combined_answer_contains_every_role() {
        let kb = knowledge().await;
        let members = vec![
            member(LegalRole::Researcher, Arc::new(MockLlmClient::new("R: precedent found")), &kb),
            member(LegalRole::Analyst, Arc::new(MockLlmClient::new("A: warranty clause 4")), &kb),
            member(LegalRole::Strategist, Arc::new(MockLlmClient::new("S: negotiate cap")), &kb),
        ];

        let report = team(members, kb).run("X").await.expect("report");

        assert_eq!(report.phase, RunPhase::Complete);
        assert!(report.failures.is_empty());
        for expected in ["R: precedent found", "A: warranty clause 4", "S: negotiate cap"] {
            assert!(report.answer.contains(expected), "missing {expected}");
        }
        assert!(report
            .partials
            .iter()
            .all(|p| p.grounding.passages == 1 && !p.grounding.web_results));
    }

    #[tokio::test]
    async fn empty_team_is_rejected_before_any_model_call() {
        let kb = knowledge().await;
        let coordinator = Arc::new(MockLlmClient::new("never"));
        let team = LegalTeam::new(
            "Legal Team",
            Vec::new(),
            kb,
            Arc::new(crate::orchestrator::synthesis::SummarizeSynthesis::new(coordinator.clone())),
        )
        .expect("team");

        let result = team.run("What are the risks?").await;

        assert!(matches!(result, Err(LegalTeamError::QueryFailure(_))));
        assert_eq!(coordinator.calls(), 0);
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_dispatch() {
        let kb = knowledge().await;
        let llm = Arc::new(MockLlmClient::new("unused"));
        let members = vec![member(LegalRole::Analyst, llm.clone(), &kb)];

        let result = team(members, kb).run("   ").await;

        assert!(matches!(result, Err(LegalTeamError::QueryFailure(_))));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn one_failing_member_does_not_sink_the_run() {
        let kb = knowledge().await;
        let members = vec![
            member(LegalRole::Researcher, Arc::new(MockLlmClient::failing()), &kb),
            member(LegalRole::Analyst, Arc::new(MockLlmClient::new("clause 4 is one-sided")), &kb),
        ];

        let report = team(members, kb).run("warranty").await.expect("partial report");

        assert_eq!(report.partials.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].role, LegalRole::Researcher);
        assert!(report.answer.contains("clause 4 is one-sided"));
    }

    #[tokio::test]
    async fn all_members_failing_is_a_query_failure() {
        let kb = knowledge().await;
        let members = vec![
            member(LegalRole::Analyst, Arc::new(MockLlmClient::failing()), &kb),
            member(LegalRole::Strategist, Arc::new(MockLlmClient::failing()), &kb),
        ];

        let err = team(members, kb).run("warranty").await.expect_err("failure");
        let rendered = err.to_string();
        assert!(rendered.contains("Contract Analyst"));
        assert!(rendered.contains("Legal Strategist"));
    }

    #[tokio::test]
    async fn members_must_share_the_team_knowledge_base() {
        let kb = knowledge().await;
        let other = knowledge().await;
        let members = vec![member(LegalRole::Analyst, Arc::new(MockLlmClient::new("x")), &other)];

        let err = LegalTeam::new("Legal Team", members, kb, Arc::new(ConcatenateSynthesis))
            .err()
            .expect("mismatch rejected");
        assert!(err.to_string().contains("different knowledge base"));
    }
}
