pub mod presets;
pub mod synthesis;
pub mod team;

pub use presets::AnalysisType;
pub use synthesis::{build_synthesizer, Grounding, PartialAnswer, SynthesisPolicy, Synthesizer};
pub use team::{LegalTeam, RunPhase, TeamReport};
