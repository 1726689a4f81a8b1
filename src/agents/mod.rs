pub mod roster;
pub mod tools;
pub mod traits;

pub use roster::{LegalAgent, LegalRole};
pub use tools::Capabilities;
pub use traits::{AgentBehavior, AgentRequest, AgentResponse};
