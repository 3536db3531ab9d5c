//! # IntelliApply
//!
//! Automated submission of web job-application forms.
//!
//! ## Architecture
//!
//! The crate is layered the same way the processing flows:
//!
//! - `store/` — persistence collaborator trait + in-memory implementation
//! - `browser/` — browser session adapter trait + CDP implementation
//! - `resolver/` — five-level hierarchical field resolver
//! - `clients/` — generative text client
//! - `services/` — notifications and the learning-loop cache writer
//! - `engine/` — queue dispatcher, application state machine, challenge
//!   wait protocol
//!
//! `engine::Engine::start` is the single entry point; it returns an
//! `EngineHandle` that owns everything it started.

pub mod browser;
pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod resolver;
pub mod services;
pub mod store;
pub mod utils;

pub use browser::{BrowserSession, SessionFactory};
pub use clients::GenerativeClient;
pub use config::Config;
pub use engine::{Engine, EngineHandle, EngineStatus};
pub use error::{EngineError, Result};
pub use resolver::{FieldQuery, FieldResolver, Resolution};
pub use store::{MemoryStore, Store};
