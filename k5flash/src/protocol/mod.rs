//! UV-K5 V2 bootloader serial protocol.

pub mod crc;
pub mod message;
pub mod obfuscation;
pub mod packet;
pub mod receiver;

// Re-export common types
pub use message::{Message, MessageType};
pub use packet::{encode, try_extract};
pub use receiver::MessageReceiver;
