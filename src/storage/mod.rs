pub mod catch_up;
pub mod history;
pub mod memory_set;
pub mod ordered_set;
pub mod sqlite_set;

pub use catch_up::{CatchUp, CatchUpPage};
pub use history::{
    DecodedHistory, FROM_BEGINNING, MESSAGE_NAMESPACE, PAGE_SIZE, channel_key,
    load_decoded_history, load_history, save_message,
};
pub use memory_set::InMemoryOrderedSet;
pub use ordered_set::{Order, OrderedStore, ScoreRange};
pub use sqlite_set::SqliteOrderedSet;

use std::fs;
use std::path::Path;

/// Ensure the directory holding a database file exists
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
