pub mod channel;
pub mod manager;

pub use channel::{derive_channel_id, ChannelStatus, DisputeRecord, Payment, PaymentChannel};
pub use manager::ChannelManager;
