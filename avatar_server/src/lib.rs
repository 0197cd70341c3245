//! `avatar_server`
//!
//! Position relay:
//! - Assigns player ids and the monster role
//! - Announces joins to the rest of the roster
//! - Forwards each player's pose to everyone else
//!
//! Networking model:
//! - TCP: handshake/roster plane
//! - UDP: pose plane

pub mod server;

pub use server::RelayServer;
