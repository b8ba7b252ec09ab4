pub mod block;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use block::BlockDefinition;
pub use phase::SessionPhase;
pub use stimulus::{Category, TriggerTable};
pub use trial::{TrialRecord, TrialState};
