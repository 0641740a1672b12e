//! WebSocket layer: upgrade handling and the per-socket connection.
//!
//! Clients connect at `/ws/{application}/{session_id}/{resource_id}`. Each
//! upgraded socket becomes one [`WsConnection`] registered with the push
//! dispatcher for as long as the socket lives.

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::WsConnection;
pub use messages::PushEnvelope;
