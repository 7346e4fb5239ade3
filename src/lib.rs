mod config;
mod device;
mod error;
mod hex;
mod output;
mod packet;
pub mod pipeline;
pub mod utils;

pub use config::*;
pub use device::*;
pub use error::*;
pub use hex::*;
pub use output::*;
pub use packet::*;
pub use pipeline::StreamStats;
