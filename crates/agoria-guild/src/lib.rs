pub mod guild;
pub mod manager;

pub use guild::{Guild, Member};
pub use manager::{GuildManager, GuildManagerConfig, GuildStats};
