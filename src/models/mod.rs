pub mod backend;
pub mod conversation;
pub mod message;
pub mod storage;

pub use backend::*;
pub use conversation::{Conversation, Metadata, Scalar};
pub use message::{Message, Role};
pub use storage::*;
