//! Library surface for the `mediabus` binary, split out so integration tests
//! can drive the router and supervisor without a TLS listener.

pub mod api;
pub mod assets;
pub mod config;
pub mod dto;
pub mod error;
pub mod paths;
pub mod state;
pub mod supervisor;
pub mod zipstream;
