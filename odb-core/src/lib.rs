//! ODB Core
//!
//! Core library for provisioning Oracle Database@AWS infrastructure:
//! the resource/state model shared by providers, and the wait engine
//! that drives long-running operations to a settled state.

pub mod config;
pub mod differ;
pub mod provider;
pub mod resource;
pub mod wait;
