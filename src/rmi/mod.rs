// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-01-18

//! Remote invocation substrate.
//!
//! A [`Skeleton`] turns a local implementation into a network service; a
//! stub [`Target`] turns an interface plus a remote address into a local
//! object whose calls ship over a stream socket. The [`Connector`] in
//! between carries the in-process bypass so co-located endpoints skip the
//! socket entirely.

pub mod skeleton;
pub mod stub;
pub mod transport;

pub use skeleton::{DefaultHooks, Skeleton, SkeletonHooks};
pub use stub::Target;
pub use transport::{Connector, RemoteHandler};
