//! # TimeTrek Core Library
//!
//! Core logic for TimeTrek, a team time tracker: a per-task timer, the
//! task/project/member store it commits to, and the reports computed over
//! that store. The `timetrek` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: a pure state machine ([`TimerEngine`]) wrapped by a
//!   [`TimerSession`] that persists every change and commits elapsed minutes
//!   to a task when a session stops. The caller drives `tick()` once per
//!   second, usually through a [`Ticker`].
//! - **Store**: [`WorkspaceStore`] keeps an in-memory snapshot of one
//!   workspace and writes through a [`WorkspaceBackend`]. [`WorkspaceDb`]
//!   is the SQLite backend.
//! - **Stats**: pure aggregates over snapshots, recomputed on demand.
//! - **Auth**: [`LocalAuth`] for local accounts.
//! - **Backend**: [`RestBackend`] talks to the hosted backend;
//!   [`HostedBackend`] makes it a [`WorkspaceBackend`].
//!
//! Dependency order: storage, store, timer, stats, presentation.

pub mod auth;
pub mod backend;
pub mod error;
pub mod events;
pub mod member;
pub mod project;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;
pub mod timer;

pub use auth::{LocalAuth, SignUp};
pub use backend::{HostedBackend, RestBackend};
pub use error::{
    AuthError, BackendError, ConfigError, CoreError, DatabaseError, Result, ValidationError,
};
pub use events::Event;
pub use member::{MemberRole, NewMember, Profile, WorkspaceMember};
pub use project::{NewProject, Project, ProjectPatch};
pub use storage::{data_dir, BackendConfig, Config, Database, WorkspaceDb};
pub use store::{WorkspaceBackend, WorkspaceStore};
pub use task::{NewTask, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus};
pub use timer::{
    format_elapsed, minutes_to_commit, PersistedTimer, TimeLedger, TimerEngine, TimerSession,
    TimerState, TimerStateStore, TimerStatus, Ticker,
};
