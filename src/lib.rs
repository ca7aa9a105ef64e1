pub mod config;
pub mod error;
pub mod messages;
pub mod server;
pub mod types;

pub mod candidate;
pub mod common_message_handling;
pub mod common_state;
pub mod follower;
pub mod leader;

pub mod log_position;
pub mod observer;
pub mod storage;
pub mod tally;
pub mod timer;
pub mod transport;

pub mod util;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::log_position::{LogInspector, LogPosition};
    pub use crate::messages::heartbeat::Heartbeat;
    pub use crate::messages::poll_state::{NodeStatus, PollStateRequest};
    pub use crate::messages::request_vote::{RequestVoteArgs, RequestVoteReply, RequestVoteRequest};
    pub use crate::messages::RaftMessage;
    pub use crate::observer::*;
    pub use crate::storage::{FileStore, HardState, MemStore, StateStore};
    pub use crate::transport::{ActorTransport, Transport};
    pub use crate::types::*;
    pub use crate::util::*;
}
