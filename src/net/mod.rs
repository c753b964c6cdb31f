//! World network listener.
//!
//! ## Contents
//! - [`Listener`] binds the world port and runs the accept loop
//! - [`SessionAcceptor`], [`CloseSessions`] the session-handling seam

mod listener;

pub use listener::{CloseSessions, Listener, SessionAcceptor};
