//! `avatar_client`
//!
//! Client-side systems:
//! - Keyboard tracking and per-tick key snapshots
//! - Third-person locomotion controller: animation states, camera-relative
//!   heading, kinematic movement + jump, pose reconciliation, name label
//! - Headless animation mixer and follow camera
//! - Relay connection and remote player roster

pub mod anim;
pub mod camera;
pub mod client;
pub mod controller;
pub mod direction;
pub mod error;
pub mod input;
pub mod label;
pub mod locomotion;
pub mod mixer;
pub mod profile;
pub mod reconcile;
pub mod remote;
pub mod session;

pub use client::GameClient;
pub use controller::CharacterController;
pub use error::ControllerError;
