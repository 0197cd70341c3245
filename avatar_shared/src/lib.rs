//! `avatar_shared`
//!
//! Shared libraries used by both client and relay server.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (math, net, physics, render, config).
//! - Capability traits at every engine seam so the controller can be driven
//!   by fakes in tests.
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod net;
pub mod physics;
pub mod render;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::physics::*;
    pub use crate::render::*;
}
