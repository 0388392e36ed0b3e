//! ctxkeeper application layer: the composition root and chat turns.
//!
//! The `ctxkeeper` binary is a thin clap front end over [`App`].

pub mod app;
pub mod turn;

pub use app::{App, Stores};
pub use turn::{ChatTurn, TurnReport};
