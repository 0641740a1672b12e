//! Data Transfer Objects for REST request/response serialization.
//!
//! Binary message bodies travel as standard base64 strings.

pub mod connection_dto;
pub mod push_dto;

pub use connection_dto::*;
pub use push_dto::*;
