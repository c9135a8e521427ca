//! Fetch sessions: task placement, credentials, the worker collaborator traits,
//! and the session that ties one worker connection to one record stream.

pub mod credentials;
pub mod fetch;
pub mod placement;
pub mod worker;

pub use credentials::{Credentials, Token, WireDelegationToken, DELEGATION_TOKEN_KIND};
pub use fetch::{FetchSession, SessionError};
pub use placement::{NetworkAddress, TaskInfo};
pub use worker::{ConnectRequest, RecordStream, WorkerClient, WorkerConnector};
