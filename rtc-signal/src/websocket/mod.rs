use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, Weak};

use arc_swap::ArcSwapOption;
use log::{debug, error, trace};
use regex::Regex;

use crate::constants::{
    DEFAULT_MAX_MESSAGE_SIZE, RECV_QUEUE_LIMIT, WSS_DEFAULT_SERVICE, WS_DEFAULT_SERVICE,
};
use crate::internal::queue::MessageQueue;
use crate::internal::thread_pool::ThreadPool;
use crate::message::Message;
use crate::transport::{
    IncomingMessageCallback, Transport, TransportFactory, TransportState, TransportStateCallback,
};
use shared::error::{Error, Result};

pub mod ready_state;

pub use ready_state::ReadyState;

pub type OnOpenHdlrFn = Box<dyn FnMut() + Send + Sync>;
pub type OnClosedHdlrFn = Box<dyn FnMut() + Send + Sync>;
pub type OnErrorHdlrFn = Box<dyn FnMut(Error) + Send + Sync>;
pub type OnAvailableHdlrFn = Box<dyn FnMut(usize) + Send + Sync>;

/// URI split per RFC 3986 appendix B; only scheme (2), authority (4),
/// path (5) and query (7) are used, the fragment is dropped.
static URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?").unwrap()
});

#[derive(Default, Debug, Clone)]
pub struct WebSocketConfiguration {
    /// Skip certificate verification on the TLS layer.
    pub disable_tls_verification: bool,
}

#[derive(Default, Clone)]
struct Remote {
    scheme: String,
    host: String,
    hostname: String,
    service: String,
    path: String,
}

/// WebSocket client over a stack of TCP, optional TLS, and WS transports.
///
/// The stack is assembled bottom-up as each layer reports `Connected`:
/// TCP first, TLS when the scheme is `wss`, the WebSocket layer last. Once
/// the WS layer connects, the socket becomes `Open` and the open callback
/// fires. Any layer reporting `Failed` or `Disconnected` tears the whole
/// stack down; teardown runs on the process-global thread pool so a
/// transport can trigger it from its own callback thread.
///
/// Transports hold only weak references back to the socket, the socket owns
/// the transports; nulling the slots before the off-thread `stop` breaks
/// the cycle from any failure point.
pub struct WebSocket {
    config: WebSocketConfiguration,
    factory: Arc<dyn TransportFactory>,
    /// Back-reference handed to transport callbacks; upgrades fail once the
    /// socket is gone, turning late callbacks into no-ops.
    weak_self: Weak<WebSocket>,
    state: AtomicU8,
    remote: Mutex<Remote>,
    /// Serializes transport creation across the three init paths.
    init_mutex: Mutex<()>,
    tcp_transport: Mutex<Option<Arc<dyn Transport>>>,
    tls_transport: Mutex<Option<Arc<dyn Transport>>>,
    ws_transport: Mutex<Option<Arc<dyn Transport>>>,
    recv_queue: MessageQueue,
    on_open_handler: ArcSwapOption<Mutex<OnOpenHdlrFn>>,
    on_closed_handler: ArcSwapOption<Mutex<OnClosedHdlrFn>>,
    on_error_handler: ArcSwapOption<Mutex<OnErrorHdlrFn>>,
    on_available_handler: ArcSwapOption<Mutex<OnAvailableHdlrFn>>,
}

impl WebSocket {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        Self::with_configuration(factory, WebSocketConfiguration::default())
    }

    pub fn with_configuration(
        factory: Arc<dyn TransportFactory>,
        config: WebSocketConfiguration,
    ) -> Arc<Self> {
        trace!("creating WebSocket");
        Arc::new_cyclic(|weak_self| WebSocket {
            config,
            factory,
            weak_self: weak_self.clone(),
            state: AtomicU8::new(ReadyState::Closed as u8),
            remote: Mutex::new(Remote::default()),
            init_mutex: Mutex::new(()),
            tcp_transport: Mutex::new(None),
            tls_transport: Mutex::new(None),
            ws_transport: Mutex::new(None),
            recv_queue: MessageQueue::new(RECV_QUEUE_LIMIT),
            on_open_handler: ArcSwapOption::empty(),
            on_closed_handler: ArcSwapOption::empty(),
            on_error_handler: ArcSwapOption::empty(),
            on_available_handler: ArcSwapOption::empty(),
        })
    }

    /// Connects to `url` (`ws://host[:port]/path?query` or `wss://…`).
    ///
    /// Permitted only while `Closed`. Connection establishment is
    /// asynchronous: the socket moves to `Connecting` and the open callback
    /// fires once the whole stack is up.
    pub fn open(&self, url: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Closed {
            return Err(Error::InvalidState(
                "WebSocket must be closed before opening".to_owned(),
            ));
        }

        let captures = URI_REGEX
            .captures(url)
            .ok_or_else(|| Error::InvalidArgument(format!("malformed WebSocket URL: {url}")))?;

        let scheme = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        if scheme != "ws" && scheme != "wss" {
            return Err(Error::InvalidArgument(format!(
                "invalid WebSocket scheme: {scheme}"
            )));
        }

        let host = captures.get(4).map(|m| m.as_str()).unwrap_or("").to_owned();
        let (hostname, service) = match host.split_once(':') {
            Some((hostname, service)) => (hostname.to_owned(), service.to_owned()),
            None => {
                let service = if scheme == "ws" {
                    WS_DEFAULT_SERVICE
                } else {
                    WSS_DEFAULT_SERVICE
                };
                (host.clone(), service.to_owned())
            }
        };

        let mut path = captures.get(5).map(|m| m.as_str()).unwrap_or("").to_owned();
        if let Some(query) = captures.get(7).map(|m| m.as_str()) {
            if !query.is_empty() {
                path.push('?');
                path.push_str(query);
            }
        }

        debug!("opening WebSocket to {hostname}:{service}");
        *self.remote.lock()? = Remote {
            scheme: scheme.to_owned(),
            host,
            hostname,
            service,
            path,
        };

        self.change_state(ReadyState::Connecting);
        self.init_tcp_transport()?;
        Ok(())
    }

    /// Initiates a graceful close. Full teardown completes asynchronously
    /// once the transports finish stopping.
    pub fn close(&self) {
        let state = self.ready_state();
        if state == ReadyState::Connecting || state == ReadyState::Open {
            debug!("closing WebSocket");
            self.change_state(ReadyState::Closing);
            let transport = self.ws_transport.lock().ok().and_then(|guard| guard.clone());
            match transport {
                Some(transport) => transport.close(),
                None => {
                    self.change_state(ReadyState::Closed);
                }
            }
        }
    }

    /// Closes and tears down the transport stack. Safe to call from any
    /// transport callback; idempotent with respect to the `Closed` terminal.
    pub fn remote_close(&self) {
        if self.ready_state() != ReadyState::Closed {
            self.close();
            self.close_transports();
        }
    }

    /// Sends a text or binary message. Fails with `InvalidState` unless the
    /// socket is `Open`, and with `Oversize` when the payload exceeds
    /// [`max_message_size`](Self::max_message_size).
    pub fn send(&self, message: impl Into<Message>) -> Result<bool> {
        self.outgoing(message.into())
    }

    /// Next buffered incoming message, if any. Never blocks.
    pub fn receive(&self) -> Option<Message> {
        self.recv_queue.pop()
    }

    /// Total bytes currently buffered in the receive queue.
    pub fn available_amount(&self) -> usize {
        self.recv_queue.amount()
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.ready_state() == ReadyState::Closed
    }

    pub fn max_message_size(&self) -> usize {
        DEFAULT_MAX_MESSAGE_SIZE
    }

    pub fn scheme(&self) -> String {
        self.remote_field(|remote| remote.scheme.clone())
    }

    pub fn host(&self) -> String {
        self.remote_field(|remote| remote.host.clone())
    }

    pub fn hostname(&self) -> String {
        self.remote_field(|remote| remote.hostname.clone())
    }

    pub fn service(&self) -> String {
        self.remote_field(|remote| remote.service.clone())
    }

    pub fn path(&self) -> String {
        self.remote_field(|remote| remote.path.clone())
    }

    pub fn on_open(&self, handler: OnOpenHdlrFn) {
        self.on_open_handler.store(Some(Arc::new(Mutex::new(handler))));
    }

    pub fn on_closed(&self, handler: OnClosedHdlrFn) {
        self.on_closed_handler.store(Some(Arc::new(Mutex::new(handler))));
    }

    pub fn on_error(&self, handler: OnErrorHdlrFn) {
        self.on_error_handler.store(Some(Arc::new(Mutex::new(handler))));
    }

    /// Called with the queue depth every time an incoming message is
    /// buffered.
    pub fn on_available(&self, handler: OnAvailableHdlrFn) {
        self.on_available_handler
            .store(Some(Arc::new(Mutex::new(handler))));
    }

    fn remote_field(&self, f: impl FnOnce(&Remote) -> String) -> String {
        self.remote.lock().map(|remote| f(&remote)).unwrap_or_default()
    }

    /// Returns true iff the state actually changed.
    fn change_state(&self, state: ReadyState) -> bool {
        self.state.swap(state as u8, Ordering::AcqRel) != state as u8
    }

    fn outgoing(&self, message: Message) -> Result<bool> {
        let transport = self.ws_transport.lock()?.clone();
        let transport = match transport {
            Some(transport) if self.ready_state() == ReadyState::Open => transport,
            _ => return Err(Error::InvalidState("WebSocket is not open".to_owned())),
        };

        let size = message.size();
        let limit = self.max_message_size();
        if size > limit {
            return Err(Error::Oversize { size, limit });
        }

        transport.send(message)
    }

    fn incoming(&self, message: Message) {
        match message {
            Message::String(_) | Message::Binary(_) => {
                if let Some(depth) = self.recv_queue.push(message) {
                    self.trigger_available(depth);
                }
            }
            // Ping, pong and close bookkeeping stays inside the WS layer
            Message::Control(_) => trace!("ignoring control message"),
        }
    }

    fn init_tcp_transport(&self) -> Result<Arc<dyn Transport>> {
        let result = (|| -> Result<Arc<dyn Transport>> {
            let guard = self.init_mutex.lock()?;
            if let Some(transport) = self.tcp_transport.lock()?.clone() {
                return Ok(transport);
            }

            let (hostname, service, scheme) = {
                let remote = self.remote.lock()?;
                (
                    remote.hostname.clone(),
                    remote.service.clone(),
                    remote.scheme.clone(),
                )
            };

            let weak_this = self.weak_self.clone();
            let on_state_change: TransportStateCallback = Box::new(move |state| {
                let Some(shared_this) = weak_this.upgrade() else {
                    return;
                };
                match state {
                    TransportState::Connected => {
                        if scheme == "ws" {
                            let _ = shared_this.init_ws_transport();
                        } else {
                            let _ = shared_this.init_tls_transport();
                        }
                    }
                    TransportState::Failed => {
                        shared_this
                            .trigger_error(Error::RemoteFailure("TCP connection failed".to_owned()));
                        shared_this.remote_close();
                    }
                    TransportState::Disconnected => shared_this.remote_close(),
                    TransportState::Connecting => {}
                }
            });

            let transport =
                self.factory
                    .create_tcp_transport(&hostname, &service, on_state_change)?;
            *self.tcp_transport.lock()? = Some(Arc::clone(&transport));

            // A concurrent close may have landed between the state check and
            // the publication; the transport must not outlive it
            if self.ready_state() == ReadyState::Closed {
                *self.tcp_transport.lock()? = None;
                return Err(Error::InvalidState("connection is closed".to_owned()));
            }

            drop(guard);
            transport.start()?;
            Ok(transport)
        })();

        match result {
            Ok(transport) => Ok(transport),
            Err(e) => {
                error!("TCP transport initialization failed: {e}");
                let error = Error::TransportInit("TCP");
                self.trigger_error(error.clone());
                self.remote_close();
                Err(error)
            }
        }
    }

    fn init_tls_transport(&self) -> Result<Arc<dyn Transport>> {
        let result = (|| -> Result<Arc<dyn Transport>> {
            let guard = self.init_mutex.lock()?;
            if let Some(transport) = self.tls_transport.lock()?.clone() {
                return Ok(transport);
            }

            let lower = self
                .tcp_transport
                .lock()?
                .clone()
                .ok_or_else(|| Error::InvalidState("TCP transport is not started".to_owned()))?;
            let host = self.remote.lock()?.host.clone();

            let weak_this = self.weak_self.clone();
            let on_state_change: TransportStateCallback = Box::new(move |state| {
                let Some(shared_this) = weak_this.upgrade() else {
                    return;
                };
                match state {
                    TransportState::Connected => {
                        let _ = shared_this.init_ws_transport();
                    }
                    TransportState::Failed => {
                        shared_this
                            .trigger_error(Error::RemoteFailure("TLS connection failed".to_owned()));
                        shared_this.remote_close();
                    }
                    TransportState::Disconnected => shared_this.remote_close(),
                    TransportState::Connecting => {}
                }
            });

            let verify = !self.config.disable_tls_verification;
            let transport =
                self.factory
                    .create_tls_transport(lower, &host, verify, on_state_change)?;
            *self.tls_transport.lock()? = Some(Arc::clone(&transport));

            if self.ready_state() == ReadyState::Closed {
                *self.tls_transport.lock()? = None;
                return Err(Error::InvalidState("connection is closed".to_owned()));
            }

            drop(guard);
            transport.start()?;
            Ok(transport)
        })();

        match result {
            Ok(transport) => Ok(transport),
            Err(e) => {
                error!("TLS transport initialization failed: {e}");
                let error = Error::TransportInit("TLS");
                self.trigger_error(error.clone());
                self.remote_close();
                Err(error)
            }
        }
    }

    fn init_ws_transport(&self) -> Result<Arc<dyn Transport>> {
        let result = (|| -> Result<Arc<dyn Transport>> {
            let guard = self.init_mutex.lock()?;
            if let Some(transport) = self.ws_transport.lock()?.clone() {
                return Ok(transport);
            }

            let mut lower = self.tls_transport.lock()?.clone();
            if lower.is_none() {
                lower = self.tcp_transport.lock()?.clone();
            }
            let lower = lower
                .ok_or_else(|| Error::InvalidState("no lower transport is started".to_owned()))?;

            let (host, path) = {
                let remote = self.remote.lock()?;
                (remote.host.clone(), remote.path.clone())
            };

            let weak_this = self.weak_self.clone();
            let on_message: IncomingMessageCallback = Box::new(move |message| {
                if let Some(shared_this) = weak_this.upgrade() {
                    shared_this.incoming(message);
                }
            });

            let weak_this = self.weak_self.clone();
            let on_state_change: TransportStateCallback = Box::new(move |state| {
                let Some(shared_this) = weak_this.upgrade() else {
                    return;
                };
                match state {
                    TransportState::Connected => {
                        if shared_this.ready_state() == ReadyState::Connecting {
                            debug!("WebSocket open");
                            shared_this.change_state(ReadyState::Open);
                            shared_this.trigger_open();
                        }
                    }
                    TransportState::Failed => {
                        shared_this.trigger_error(Error::RemoteFailure(
                            "WebSocket connection failed".to_owned(),
                        ));
                        shared_this.remote_close();
                    }
                    TransportState::Disconnected => shared_this.remote_close(),
                    TransportState::Connecting => {}
                }
            });

            let transport = self.factory.create_ws_transport(
                lower,
                &host,
                &path,
                on_message,
                on_state_change,
            )?;
            *self.ws_transport.lock()? = Some(Arc::clone(&transport));

            if self.ready_state() == ReadyState::Closed {
                *self.ws_transport.lock()? = None;
                return Err(Error::InvalidState("connection is closed".to_owned()));
            }

            drop(guard);
            transport.start()?;
            Ok(transport)
        })();

        match result {
            Ok(transport) => Ok(transport),
            Err(e) => {
                error!("WebSocket transport initialization failed: {e}");
                let error = Error::TransportInit("WebSocket");
                self.trigger_error(error.clone());
                self.remote_close();
                Err(error)
            }
        }
    }

    fn close_transports(&self) {
        trace!("closing transports");

        // The exchange makes the transition exactly once under concurrency
        if self.change_state(ReadyState::Closed) {
            self.trigger_closed();
        }

        // No user callback may fire past this point
        self.reset_callbacks();

        let ws = self.ws_transport.lock().ok().and_then(|mut guard| guard.take());
        let tls = self.tls_transport.lock().ok().and_then(|mut guard| guard.take());
        let tcp = self.tcp_transport.lock().ok().and_then(|mut guard| guard.take());

        // Stopping is handed off so a transport can terminate the stack from
        // a callback running on its own thread without self-joining
        ThreadPool::instance().enqueue(move || {
            if let Some(transport) = &ws {
                transport.stop();
            }
            if let Some(transport) = &tls {
                transport.stop();
            }
            if let Some(transport) = &tcp {
                transport.stop();
            }
            drop(ws);
            drop(tls);
            drop(tcp);
        });
    }

    fn trigger_open(&self) {
        if let Some(handler) = self.on_open_handler.load_full() {
            if let Ok(mut f) = handler.lock() {
                f();
            }
        }
    }

    fn trigger_closed(&self) {
        if let Some(handler) = self.on_closed_handler.load_full() {
            if let Ok(mut f) = handler.lock() {
                f();
            }
        }
    }

    fn trigger_error(&self, error: Error) {
        if let Some(handler) = self.on_error_handler.load_full() {
            if let Ok(mut f) = handler.lock() {
                f(error);
            }
        }
    }

    fn trigger_available(&self, count: usize) {
        if let Some(handler) = self.on_available_handler.load_full() {
            if let Ok(mut f) = handler.lock() {
                f(count);
            }
        }
    }

    fn reset_callbacks(&self) {
        self.on_open_handler.store(None);
        self.on_closed_handler.store(None);
        self.on_error_handler.store(None);
        self.on_available_handler.store(None);
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        trace!("destroying WebSocket");
        self.remote_close();
    }
}
