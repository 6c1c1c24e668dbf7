pub mod card;
pub mod clock;
pub mod store;

pub use card::{AgentCard, AgentCardBuilder, EconomicTerms, NetworkInfo, Proof, ReputationSummary, RuntimeInfo};
pub use clock::{CausalOrder, VectorClock};
pub use store::{CardStore, CardUpdate, ConflictRecord, InMemoryCardStore, SledCardStore};
