//! runner-core: session coordination for render-runner
//!
//! This crate owns everything that happens between a `Start` request and the
//! last byte relayed to a render worker:
//!
//! - **Port pool** - [`PortPool`] hands out the fixed set of local worker ports
//! - **Session table** - [`SessionTable`] tracks provisioned worker slots
//! - **Coordinator** - [`SessionCoordinator`] fans a work request out into
//!   sessions, drives the readiness handshake and reaps idle sessions
//! - **Relay** - [`StreamRelay`] proxies frames between a client stream and the
//!   worker websocket bound to a session
//! - **Credentials** - [`CredentialStore`] caches per-domain access tokens
//!
//! # Architecture
//!
//! ```text
//!  Start ──► SessionCoordinator ──► PortPool
//!                 │    │
//!                 │    └──► handoff queue ──► initializer ──► ReadySignal
//!                 ▼
//!            SessionTable ◄── Reaper
//!                 ▲
//!  Stream ──► StreamRelay ──► WorkerDialer ──► ws://host:port/ws
//! ```

pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod manifest;
pub mod pool;
pub mod relay;
pub mod session;

pub use config::RenderConfig;
pub use coordinator::{
    CoordinatorConfig, ImmediatePreparer, PrepareJob, PrepareRequest, ReadinessGate, ReadySignal,
    SessionCoordinator, StartResponse, WorkRequest, WorkerPreparer, readiness_gate,
};
pub use credentials::{CredentialStore, MemoryCredentialStore, TokenModel, credential_key};
pub use error::{RelayError, RunnerError};
pub use manifest::{ManifestInfo, ManifestParam};
pub use pool::PortPool;
pub use relay::{
    Frame, FrameSink, FrameStream, PumpOutcome, PumpReport, RelayStats, StreamRelay,
    WebSocketDialer, WorkerConnection, WorkerDialer,
};
pub use session::{Session, SessionInfo, SessionRef, SessionState, SessionTable};
