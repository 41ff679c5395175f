//! Data Channel Manager: PASV/PORT negotiation and transfer streaming.

pub mod data_channel;
pub mod error;
pub mod pasv;
pub mod port;
pub mod transfer;

pub use data_channel::{DataChannel, DataChannelConfig, DataMode, PendingDataConnection};
pub use error::DataChannelError;
