//! The teapot demo api.
//!
//! A small JSON api routed with [`router::Router`] and served by the
//! `teapot-http` front end. The `teapot` binary wires it to the command line
//! configuration in [`config`].

pub mod api;
pub mod config;
pub mod model;
pub mod router;

pub use router::Router;
