//! Web socket: a long-lived connection modelled as effects.
//!
//! Opening the socket yields a stream of [`SocketEvent`]s. Once open, two
//! loops keep running: one waits for the next message and re-arms itself,
//! the other pings the server every ten seconds. Every effect belonging to
//! the connection is registered under [`WEB_SOCKET`] with
//! [`Concurrency::Allow`], so a single cancel tears the whole connection
//! down while the loops themselves never evict each other.

use crate::AlertState;
use reflux_core::prelude::*;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Identity shared by every effect of the connection.
pub const WEB_SOCKET: EffectId = EffectId::from_static("web-socket.connection");

/// Delay before each ping goes out.
pub const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Server the demo connects to.
pub const ECHO_URL: &str = "wss://echo.websocket.events";

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Open and usable
    Connected,
    /// Open requested, not yet confirmed
    Connecting,
    /// Closed
    #[default]
    Disconnected,
}

/// A frame exchanged over the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text frame
    String(String),
    /// Binary frame
    Data(Vec<u8>),
}

/// A transport failure, identified by its code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("web socket error {code}")]
pub struct WebSocketError {
    /// Transport-specific error code
    pub code: i64,
}

impl WebSocketError {
    /// An error with the given code.
    #[must_use]
    pub const fn new(code: i64) -> Self {
        Self { code }
    }
}

/// Close codes defined by RFC 6455.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// No code was received
    Invalid,
    /// 1000
    NormalClosure,
    /// 1001
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1003
    UnsupportedData,
    /// 1005
    NoStatusReceived,
    /// 1006
    AbnormalClosure,
    /// 1007
    InvalidFramePayloadData,
    /// 1008
    PolicyViolation,
    /// 1009
    MessageTooBig,
    /// 1010
    MandatoryExtensionMissing,
    /// 1011
    InternalServerError,
    /// 1015
    TlsHandshakeFailure,
}

impl CloseCode {
    /// The numeric code sent on the wire.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Invalid => 0,
            Self::NormalClosure => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::UnsupportedData => 1003,
            Self::NoStatusReceived => 1005,
            Self::AbnormalClosure => 1006,
            Self::InvalidFramePayloadData => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::MandatoryExtensionMissing => 1010,
            Self::InternalServerError => 1011,
            Self::TlsHandshakeFailure => 1015,
        }
    }
}

/// Lifecycle events reported by an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The handshake completed with the negotiated protocol
    DidOpenWithProtocol(Option<String>),
    /// The peer closed the connection
    DidClose {
        /// Close code
        code: CloseCode,
        /// Optional close reason
        reason: Option<Vec<u8>>,
    },
    /// The connection ended, with an error if it was not clean
    DidCompleteWithError(Option<WebSocketError>),
}

/// Web socket screen state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebSocketState {
    /// Alert being presented, if any
    pub alert: Option<AlertState<WebSocketAction>>,
    /// Connection lifecycle
    pub connectivity_state: ConnectivityState,
    /// Draft message
    pub message_to_send: String,
    /// Text messages received so far, oldest first
    pub received_messages: Vec<String>,
}

/// Web socket screen actions
#[derive(Debug, Clone, PartialEq)]
pub enum WebSocketAction {
    /// The alert was dismissed
    AlertDismissed,
    /// User tapped "Connect" / "Disconnect"
    ConnectButtonTapped,
    /// The draft changed
    MessageToSendChanged(String),
    /// The server answered a ping
    PingResponse(Option<WebSocketError>),
    /// A frame arrived, or receiving failed
    ReceivedSocketMessage(Result<Message, WebSocketError>),
    /// User tapped "Send"
    SendButtonTapped,
    /// The send completed
    SendResponse(Option<WebSocketError>),
    /// A lifecycle event from the socket
    WebSocket(SocketEvent),
}

type OpenFn = dyn Fn(&str, &[String]) -> Effect<SocketEvent> + Send + Sync;
type ReceiveFn = dyn Fn() -> Effect<Result<Message, WebSocketError>> + Send + Sync;
type SendFn = dyn Fn(Message) -> Effect<Option<WebSocketError>> + Send + Sync;
type PingFn = dyn Fn() -> Effect<Option<WebSocketError>> + Send + Sync;

/// The socket operations the reducer depends on.
///
/// Each operation returns an effect rather than performing I/O, so tests
/// can substitute passthrough subjects and drive the socket by hand.
#[derive(Clone)]
pub struct WebSocketClient {
    /// Open a connection; the effect streams lifecycle events until cancelled.
    pub open: Arc<OpenFn>,
    /// Wait for the next frame.
    pub receive: Arc<ReceiveFn>,
    /// Send a frame; emits `None` on success.
    pub send: Arc<SendFn>,
    /// Send a ping; emits `None` once the pong arrives.
    pub send_ping: Arc<PingFn>,
}

impl fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketClient").finish_non_exhaustive()
    }
}

impl WebSocketClient {
    /// A client whose every operation fails the test once started.
    #[must_use]
    #[allow(clippy::panic)] // Unstubbed dependency
    pub fn unimplemented() -> Self {
        Self {
            open: Arc::new(|url: &str, _protocols: &[String]| -> Effect<SocketEvent> {
                let url = url.to_owned();
                Effect::fire_and_forget(move || panic!("WebSocketClient.open is unimplemented ({url})"))
            }),
            receive: Arc::new(|| -> Effect<Result<Message, WebSocketError>> {
                Effect::fire_and_forget(|| panic!("WebSocketClient.receive is unimplemented"))
            }),
            send: Arc::new(|message: Message| -> Effect<Option<WebSocketError>> {
                Effect::fire_and_forget(move || {
                    panic!("WebSocketClient.send is unimplemented (sending {message:?})")
                })
            }),
            send_ping: Arc::new(|| -> Effect<Option<WebSocketError>> {
                Effect::fire_and_forget(|| panic!("WebSocketClient.send_ping is unimplemented"))
            }),
        }
    }

    /// An in-memory socket that echoes every frame back, doing its work on
    /// `scheduler`.
    #[must_use]
    pub fn echo(scheduler: AnyScheduler) -> Self {
        let socket = Arc::new(EchoSocket::default());

        let open = {
            let socket = Arc::clone(&socket);
            let scheduler = Arc::clone(&scheduler);
            Arc::new(move |url: &str, _protocols: &[String]| -> Effect<SocketEvent> {
                let socket = Arc::clone(&socket);
                let url = url.to_owned();
                Effect::task(Arc::clone(&scheduler), move |ctx| {
                    tracing::debug!(%url, "Echo socket opened");
                    socket.open(ctx);
                })
            })
        };
        let receive = {
            let socket = Arc::clone(&socket);
            let scheduler = Arc::clone(&scheduler);
            Arc::new(move || -> Effect<Result<Message, WebSocketError>> {
                let socket = Arc::clone(&socket);
                Effect::task(Arc::clone(&scheduler), move |ctx| socket.receive(ctx))
            })
        };
        let send = {
            let socket = Arc::clone(&socket);
            let scheduler = Arc::clone(&scheduler);
            Arc::new(move |message: Message| -> Effect<Option<WebSocketError>> {
                let socket = Arc::clone(&socket);
                Effect::task(Arc::clone(&scheduler), move |ctx| {
                    ctx.send(socket.send(message));
                })
            })
        };
        let send_ping = {
            let socket = Arc::clone(&socket);
            Arc::new(move || -> Effect<Option<WebSocketError>> {
                let socket = Arc::clone(&socket);
                Effect::task(Arc::clone(&scheduler), move |ctx| {
                    ctx.send(socket.ping());
                })
            })
        };

        Self {
            open,
            receive,
            send,
            send_ping,
        }
    }
}

#[derive(Default)]
struct EchoBuffers {
    connection: Option<TaskContext<SocketEvent>>,
    inbox: VecDeque<Message>,
    receivers: VecDeque<TaskContext<Result<Message, WebSocketError>>>,
}

#[derive(Default)]
struct EchoSocket {
    buffers: Mutex<EchoBuffers>,
}

/// Code reported when operating on a socket that is not open.
const NOT_CONNECTED: i64 = 57;

impl EchoSocket {
    fn lock(&self) -> MutexGuard<'_, EchoBuffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(buffers: &EchoBuffers) -> bool {
        buffers.connection.as_ref().is_some_and(|ctx| !ctx.is_cancelled())
    }

    fn open(self: &Arc<Self>, ctx: TaskContext<SocketEvent>) {
        let socket = Arc::downgrade(self);
        ctx.on_cancel(move || {
            if let Some(socket) = socket.upgrade() {
                let mut buffers = socket.lock();
                buffers.connection = None;
                buffers.inbox.clear();
                buffers.receivers.clear();
            }
        });
        self.lock().connection = Some(ctx.clone());
        ctx.send(SocketEvent::DidOpenWithProtocol(None));
    }

    fn receive(&self, ctx: TaskContext<Result<Message, WebSocketError>>) {
        let mut buffers = self.lock();
        if !Self::is_open(&buffers) {
            drop(buffers);
            ctx.send(Err(WebSocketError::new(NOT_CONNECTED)));
            return;
        }
        match buffers.inbox.pop_front() {
            Some(message) => {
                drop(buffers);
                ctx.send(Ok(message));
            },
            None => buffers.receivers.push_back(ctx),
        }
    }

    fn send(&self, message: Message) -> Option<WebSocketError> {
        let mut buffers = self.lock();
        if !Self::is_open(&buffers) {
            return Some(WebSocketError::new(NOT_CONNECTED));
        }
        buffers.receivers.retain(|ctx| !ctx.is_cancelled());
        match buffers.receivers.pop_front() {
            Some(receiver) => {
                drop(buffers);
                receiver.send(Ok(message));
            },
            None => buffers.inbox.push_back(message),
        }
        None
    }

    fn ping(&self) -> Option<WebSocketError> {
        if Self::is_open(&self.lock()) {
            None
        } else {
            Some(WebSocketError::new(NOT_CONNECTED))
        }
    }
}

/// Web socket screen dependencies
#[derive(Clone)]
pub struct WebSocketEnvironment {
    /// Where socket output is delivered and pings are timed
    pub main_queue: AnyScheduler,
    /// The socket itself
    pub web_socket: WebSocketClient,
}

impl WebSocketEnvironment {
    /// Build an environment.
    #[must_use]
    pub fn new(main_queue: AnyScheduler, web_socket: WebSocketClient) -> Self {
        Self {
            main_queue,
            web_socket,
        }
    }

    /// Every dependency fails loudly; tests replace what they use.
    #[must_use]
    pub fn unimplemented() -> Self {
        Self::new(
            UnimplementedScheduler::shared("main_queue"),
            WebSocketClient::unimplemented(),
        )
    }
}

/// Web socket screen reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketReducer;

impl WebSocketReducer {
    fn receive_next(env: &WebSocketEnvironment) -> Effect<WebSocketAction> {
        (env.web_socket.receive)()
            .receive_on(Arc::clone(&env.main_queue))
            .map(WebSocketAction::ReceivedSocketMessage)
            .cancellable_with(WEB_SOCKET, Concurrency::Allow)
    }

    fn ping(env: &WebSocketEnvironment) -> Effect<WebSocketAction> {
        (env.web_socket.send_ping)()
            .delayed(Arc::clone(&env.main_queue), PING_INTERVAL)
            .map(WebSocketAction::PingResponse)
            .cancellable_with(WEB_SOCKET, Concurrency::Allow)
    }
}

impl Reducer for WebSocketReducer {
    type State = WebSocketState;
    type Action = WebSocketAction;
    type Environment = WebSocketEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match action {
            WebSocketAction::AlertDismissed => {
                state.alert = None;
                Effect::none()
            },

            WebSocketAction::ConnectButtonTapped => match state.connectivity_state {
                ConnectivityState::Connected | ConnectivityState::Connecting => {
                    state.connectivity_state = ConnectivityState::Disconnected;
                    Effect::cancel(WEB_SOCKET)
                },
                ConnectivityState::Disconnected => {
                    state.connectivity_state = ConnectivityState::Connecting;
                    (env.web_socket.open)(ECHO_URL, &[])
                        .receive_on(Arc::clone(&env.main_queue))
                        .map(WebSocketAction::WebSocket)
                        .cancellable_with(WEB_SOCKET, Concurrency::Allow)
                },
            },

            WebSocketAction::MessageToSendChanged(message) => {
                state.message_to_send = message;
                Effect::none()
            },

            WebSocketAction::PingResponse(error) => {
                if let Some(error) = error {
                    tracing::debug!(%error, "Ping failed");
                }
                Self::ping(env)
            },

            WebSocketAction::ReceivedSocketMessage(Ok(Message::String(text))) => {
                state.received_messages.push(text);
                Self::receive_next(env)
            },

            WebSocketAction::ReceivedSocketMessage(Ok(Message::Data(_))) => {
                Self::receive_next(env)
            },

            WebSocketAction::ReceivedSocketMessage(Err(error)) => {
                tracing::debug!(%error, "Receive loop ended");
                Effect::none()
            },

            WebSocketAction::SendButtonTapped => {
                let message = std::mem::take(&mut state.message_to_send);
                (env.web_socket.send)(Message::String(message))
                    .receive_on(Arc::clone(&env.main_queue))
                    .map(WebSocketAction::SendResponse)
                    .cancellable_with(WEB_SOCKET, Concurrency::Allow)
            },

            WebSocketAction::SendResponse(None) => Effect::none(),

            WebSocketAction::SendResponse(Some(error)) => {
                tracing::warn!(%error, "Socket send failed");
                state.alert = Some(AlertState::new("Could not send socket message. Try again."));
                Effect::none()
            },

            WebSocketAction::WebSocket(SocketEvent::DidClose { code, .. }) => {
                tracing::info!(code = code.code(), "Socket closed");
                state.connectivity_state = ConnectivityState::Disconnected;
                Effect::cancel(WEB_SOCKET)
            },

            WebSocketAction::WebSocket(SocketEvent::DidCompleteWithError(error)) => {
                state.connectivity_state = ConnectivityState::Disconnected;
                if let Some(error) = error {
                    tracing::warn!(%error, "Socket completed with error");
                    state.alert = Some(AlertState::new(
                        "Disconnected from socket for some reason. Try again.",
                    ));
                }
                Effect::cancel(WEB_SOCKET)
            },

            WebSocketAction::WebSocket(SocketEvent::DidOpenWithProtocol(_)) => {
                state.connectivity_state = ConnectivityState::Connected;
                Effect::merge(vec![Self::receive_next(env), Self::ping(env)])
            },
        }
    }
}
