/// Remote max message size assumed when the SDP does not specify one.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;

/// Local max message size advertised for data channels.
pub const LOCAL_MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// SCTP port advertised by default in data descriptions.
pub const DEFAULT_SCTP_PORT: u16 = 5000;

/// Number of workers in the process-global thread pool.
pub(crate) const THREAD_POOL_SIZE: usize = 4;

/// Upper bound on buffered incoming messages before new ones are dropped.
pub(crate) const RECV_QUEUE_LIMIT: usize = 1024;

pub(crate) const WS_DEFAULT_SERVICE: &str = "80";
pub(crate) const WSS_DEFAULT_SERVICE: &str = "443";
