#![warn(rust_2018_idioms)]

pub mod constants;
pub mod message;
pub mod sdp;
pub mod transport;
pub mod websocket;

pub(crate) mod internal;

pub use message::Message;
pub use sdp::candidate::Candidate;
pub use sdp::sdp_type::SdpType;
pub use sdp::session_description::SessionDescription;
pub use sdp::setup_role::SetupRole;
pub use transport::{Transport, TransportFactory, TransportState};
pub use websocket::ready_state::ReadyState;
pub use websocket::{WebSocket, WebSocketConfiguration};
