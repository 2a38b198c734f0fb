//! # Flowdeck
//!
//! Flowdeck is the client-side core of an agent platform's workflow builder.
//! It keeps visual workflows editable as a step tree, renders them onto a
//! canvas graph and follows agent runs over server-sent events.
//!
//! ## Core Features
//!
//! - **Tree and Graph Conversion**: Round-trip between the canonical (flat) step tree and canvas nodes/edges
//! - **Auto Layout**: Deterministic depth-based node placement
//! - **Builder Sessions**: Edit commands applied to the tree, with debounced autosave
//! - **Agent Run Streaming**: At most one stream per run, with frame classification and reconnects
//! - **Classified API Errors**: Billing, auth and not-found failures kept apart from generic ones
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowdeck::{ClientBuilder, Config, stream::StreamCallbacks};
//!
//! let client = ClientBuilder::new().config(Config::create("flowdeck.toml")?).build()?;
//!
//! // Edit a workflow
//! let mut session = client.open_workflow(&workflow_id).await?;
//! session.apply(EditCommand::InsertConditional { after: step_id, expression: Some("ok".into()) })?;
//!
//! // Follow an agent run
//! let run_id = client.start_agent(&thread_id, &Default::default()).await?;
//! let handle = client.stream_agent(&run_id, StreamCallbacks::new().on_message(|raw| println!("{}", raw)));
//! ```

pub mod api;
mod builder;
mod client;
mod common;
mod config;
pub mod editor;
mod error;
pub mod graph;
mod model;
pub mod store;
pub mod stream;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::ClientBuilder;
pub use client::Client;
pub use config::*;
pub use error::FlowdeckError;
pub use model::*;

/// Result type alias for Flowdeck operations.
pub type Result<T> = std::result::Result<T, FlowdeckError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
