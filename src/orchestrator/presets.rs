use crate::agents::LegalRole;

/// Canned analyses; each picks the members it needs and frames the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AnalysisType {
    ContractReview,
    LegalResearch,
    RiskAssessment,
    ComplianceCheck,
    #[default]
    Custom,
}

impl AnalysisType {
    pub fn members(self) -> &'static [LegalRole] {
        match self {
            AnalysisType::ContractReview => &[LegalRole::Analyst],
            AnalysisType::LegalResearch => &[LegalRole::Researcher],
            AnalysisType::RiskAssessment => &[LegalRole::Analyst, LegalRole::Strategist],
            AnalysisType::ComplianceCheck | AnalysisType::Custom => &LegalRole::ALL,
        }
    }

    fn framing(self) -> Option<&'static str> {
        match self {
            AnalysisType::ContractReview => Some("Review this contract and identify key terms, obligations, and potential issues."),
            AnalysisType::LegalResearch => Some("Research relevant cases and precedents related to this document."),
            AnalysisType::RiskAssessment => Some("Analyze potential legal risks and liabilities in this document."),
            AnalysisType::ComplianceCheck => Some("Check this document for regulatory compliance issues."),
            AnalysisType::Custom => None,
        }
    }

    /// The text sent to the team. Presets other than `Custom` run without a user question.
    pub fn frame(self, query: &str) -> String {
        let query = query.trim();
        match (self.framing(), query.is_empty()) {
            (None, _) => query.to_string(),
            (Some(framing), true) => framing.to_string(),
            (Some(framing), false) => format!("{framing}\n\nFocus: {query}"),
        }
    }
}
