use std::fmt;

/// Lifecycle state of a [`WebSocket`](crate::WebSocket).
///
/// A socket starts `Closed`, moves to `Connecting` on `open`, reaches `Open`
/// once the whole transport stack is connected, and returns to the sticky
/// `Closed` terminal after teardown. There are no backward edges except
/// through a fresh `open` once `Closed` is reached again.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    Closed = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

const READY_STATE_CLOSED_STR: &str = "closed";
const READY_STATE_CONNECTING_STR: &str = "connecting";
const READY_STATE_OPEN_STR: &str = "open";
const READY_STATE_CLOSING_STR: &str = "closing";

impl From<u8> for ReadyState {
    fn from(v: u8) -> Self {
        match v {
            1 => ReadyState::Connecting,
            2 => ReadyState::Open,
            3 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ReadyState::Closed => READY_STATE_CLOSED_STR,
            ReadyState::Connecting => READY_STATE_CONNECTING_STR,
            ReadyState::Open => READY_STATE_OPEN_STR,
            ReadyState::Closing => READY_STATE_CLOSING_STR,
        };
        write!(f, "{s}")
    }
}
