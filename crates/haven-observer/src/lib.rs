//! External-facing surface of the Haven NPC runtime.
//!
//! A thin Axum layer over the core: REST routes for every operation in
//! the runtime's contract plus a WebSocket event stream. Handlers hold
//! no logic of their own beyond validation, id parsing and response
//! shaping; everything meaningful happens in the crates below.
//!
//! # Modules
//!
//! - [`state`] -- shared [`state::AppState`]
//! - [`router`] -- the route table
//! - [`handlers`] -- endpoint handlers by surface area
//! - [`ws`] -- the event stream
//! - [`server`] -- bind-and-serve bootstrap
//! - [`error`] -- the API error taxonomy and HTTP mapping

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::serve;
pub use state::AppState;
