//! Server command delivery
//!
//! This module handles:
//! - Registering the application's command handler
//! - Dispatching `ServerCommand`s received by any transport
//! - Keeping handlers off the transport's heartbeat path

mod router;

pub use router::{CommandHandler, CommandRouter};
