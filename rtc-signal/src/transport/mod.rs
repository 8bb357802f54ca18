use std::fmt;
use std::sync::Arc;

use crate::message::Message;
use shared::error::Result;

/// Connectivity of a single transport layer, reported through the
/// state-change callback supplied at construction.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

const TRANSPORT_STATE_CONNECTING_STR: &str = "connecting";
const TRANSPORT_STATE_CONNECTED_STR: &str = "connected";
const TRANSPORT_STATE_DISCONNECTED_STR: &str = "disconnected";
const TRANSPORT_STATE_FAILED_STR: &str = "failed";

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportState::Connecting => TRANSPORT_STATE_CONNECTING_STR,
            TransportState::Connected => TRANSPORT_STATE_CONNECTED_STR,
            TransportState::Disconnected => TRANSPORT_STATE_DISCONNECTED_STR,
            TransportState::Failed => TRANSPORT_STATE_FAILED_STR,
        };
        write!(f, "{s}")
    }
}

/// Observer for transport state changes. May be invoked from the
/// transport's own thread, including synchronously from `start`.
pub type TransportStateCallback = Box<dyn Fn(TransportState) + Send + Sync>;

/// Observer for decoded incoming messages; only the WebSocket layer emits
/// these.
pub type IncomingMessageCallback = Box<dyn Fn(Message) + Send + Sync>;

/// Uniform lifecycle shared by the TCP, TLS and WebSocket layers.
///
/// Implementations own their I/O threads. `stop` must be joinable from any
/// thread except the transport's own callback thread; teardown triggered
/// from a callback is therefore routed through the thread pool by the
/// caller.
pub trait Transport: Send + Sync {
    /// Begins connecting. State changes, possibly synchronous, are
    /// delivered to the callback given at construction.
    fn start(&self) -> Result<()>;

    /// Stops the transport and releases its resources. Idempotent.
    fn stop(&self);

    /// Sends a message downstream. Returns `false` when the message was
    /// buffered rather than written through.
    fn send(&self, message: Message) -> Result<bool>;

    /// Initiates a graceful shutdown. Only meaningful for the WebSocket
    /// layer, which sends a close frame; the byte-stream layers ignore it.
    fn close(&self) {}
}

/// Builds the concrete transport layers the [`WebSocket`](crate::WebSocket)
/// stacks bottom-up. The byte-level implementations live behind this seam.
pub trait TransportFactory: Send + Sync {
    fn create_tcp_transport(
        &self,
        hostname: &str,
        service: &str,
        on_state_change: TransportStateCallback,
    ) -> Result<Arc<dyn Transport>>;

    /// `verify` requests certificate verification against the system roots.
    fn create_tls_transport(
        &self,
        lower: Arc<dyn Transport>,
        host: &str,
        verify: bool,
        on_state_change: TransportStateCallback,
    ) -> Result<Arc<dyn Transport>>;

    fn create_ws_transport(
        &self,
        lower: Arc<dyn Transport>,
        host: &str,
        path: &str,
        on_message: IncomingMessageCallback,
        on_state_change: TransportStateCallback,
    ) -> Result<Arc<dyn Transport>>;
}
