//! Supervised two-player halma sessions.
//!
//! The controller process owns the authoritative game state and may spawn
//! two children: a display program for rendering and human input, and an
//! engine running the hidden `engine` subcommand of this same binary. All
//! three talk over pipes with a small line-framed protocol (see [`ipc`]),
//! nudged along by best-effort `SIGHUP` wakes. The [`supervisor`]
//! guarantees that however a session ends, no child outlives it.

pub mod config;
pub mod controller;
pub mod engine;
pub mod interactive;
pub mod ipc;
pub mod signals;
pub mod supervisor;
pub mod transcript;
