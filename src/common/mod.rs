pub mod codec;
pub mod types;

pub use codec::{decode_all, decode_message, encode_message};
pub use types::{Message, now_nanos};
