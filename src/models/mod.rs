pub mod channel;
pub mod playlist;
pub mod process;

pub use channel::{channel_id, dedup_last_wins, hash_key, Channel, ChannelPatch};
pub use playlist::{DataSource, Playlist, SyncStrategy};
pub use process::Process;
pub use crate::services::xtream::XtreamCredentials;
