//! Handler and client units
//!
//! Every unit is a spawned task with its own mailbox, so a unit that panics
//! or hangs takes down nothing but itself. References to units are cheap
//! clones of the mailbox sender.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{TransportIdentity, TransportKind};
use crate::{Error, Result};

/// Event delivered to a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The client finished connecting
    Connected,
    /// A chat message arrived from the network
    Message {
        /// Sender as reported by the network
        from: String,
        /// Message body
        text: String,
    },
    /// The client sent text out to the network
    Outbound(String),
    /// The client lost or closed its connection
    Disconnected {
        /// Unit id of the client that went away
        client: Uuid,
    },
}

/// Mailbox protocol of a handler unit
#[derive(Debug)]
pub enum HandlerMessage {
    /// Attach the client that delivers to this handler
    BindClient {
        /// Client to talk back to
        client: ClientRef,
        /// Identity the client connected as
        identity: TransportIdentity,
    },
    /// Event coming from the client
    Inbound(ChatEvent),
    /// Stop the handler and its bound client
    Stop,
}

/// Mailbox protocol of a client unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Send text to the network
    Send(String),
    /// Close the connection and stop
    Stop,
}

/// Reference to a running handler unit
#[derive(Debug, Clone)]
pub struct HandlerRef {
    id: Uuid,
    kind: TransportKind,
    tx: mpsc::UnboundedSender<HandlerMessage>,
}

impl HandlerRef {
    /// Wrap a handler mailbox
    #[must_use]
    pub fn new(kind: TransportKind, tx: mpsc::UnboundedSender<HandlerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            tx,
        }
    }

    /// Unit identifier, used in logs
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Protocol family of the handler
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Deliver a message to the handler
    ///
    /// # Errors
    ///
    /// Returns error if the handler has already stopped
    pub fn send(&self, message: HandlerMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::Client(format!("{} handler {} has stopped", self.kind, self.id)))
    }

    /// Bind a client to this handler
    ///
    /// # Errors
    ///
    /// Returns error if the handler has already stopped
    pub fn bind(&self, client: ClientRef, identity: TransportIdentity) -> Result<()> {
        self.send(HandlerMessage::BindClient { client, identity })
    }

    /// Ask the handler to stop; a no-op if it already has
    pub fn stop(&self) {
        let _ = self.tx.send(HandlerMessage::Stop);
    }

    /// Whether the handler is still accepting messages
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Wait until the handler's mailbox is closed
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Reference to a running client unit
#[derive(Debug, Clone)]
pub struct ClientRef {
    id: Uuid,
    kind: TransportKind,
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ClientRef {
    /// Wrap a client mailbox
    #[must_use]
    pub fn new(kind: TransportKind, tx: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            tx,
        }
    }

    /// Unit identifier, used in logs
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Protocol family of the client
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue text to be sent to the network
    ///
    /// # Errors
    ///
    /// Returns error if the client has already stopped
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(ClientMessage::Send(text.into()))
            .map_err(|_| Error::Client(format!("{} client {} has stopped", self.kind, self.id)))
    }

    /// Ask the client to stop; a no-op if it already has
    pub fn stop(&self) {
        let _ = self.tx.send(ClientMessage::Stop);
    }

    /// Whether the client is still accepting messages
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Parameters a client unit connects with
#[derive(Debug)]
pub enum ConnectionParams {
    /// IRC connection
    Irc {
        /// Bot nickname
        nick: String,
        /// Channel to join
        channel: String,
        /// Server host
        host: String,
        /// Server port
        port: u16,
        /// Secure client flavor
        use_ssl: bool,
    },
    /// XMPP connection
    Xmpp {
        /// Account login
        login: String,
        /// Account password
        password: SecretString,
        /// Room to join
        room: String,
        /// Server host
        host: String,
        /// XMPP resource
        resource: String,
    },
    /// Campfire-style connection
    Campfire {
        /// Account login
        login: String,
        /// API token
        token: SecretString,
        /// Room identifier
        room_id: u64,
        /// Account subdomain
        subdomain: String,
    },
}

impl ConnectionParams {
    /// Protocol family of these parameters
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Irc { .. } => TransportKind::Irc,
            Self::Xmpp { .. } => TransportKind::Xmpp,
            Self::Campfire { .. } => TransportKind::Campfire,
        }
    }

    /// Identity a client connecting with these parameters presents
    #[must_use]
    pub fn identity(&self) -> TransportIdentity {
        match self {
            Self::Irc {
                nick,
                channel,
                host,
                port,
                use_ssl,
            } => TransportIdentity::Irc {
                nick: nick.clone(),
                channel: channel.clone(),
                host: host.clone(),
                port: *port,
                use_ssl: *use_ssl,
            },
            Self::Xmpp {
                login,
                room,
                host,
                resource,
                ..
            } => TransportIdentity::Xmpp {
                login: login.clone(),
                room: room.clone(),
                host: host.clone(),
                resource: resource.clone(),
            },
            Self::Campfire {
                login,
                room_id,
                subdomain,
                ..
            } => TransportIdentity::Campfire {
                login: login.clone(),
                room_id: *room_id,
                subdomain: subdomain.clone(),
            },
        }
    }

    /// Check the parameters a client cannot start without
    fn check(&self) -> Result<()> {
        let missing = match self {
            Self::Irc {
                nick,
                host,
                channel,
                ..
            } => [
                ("nick", nick.is_empty()),
                ("host", host.is_empty()),
                ("channel", channel.is_empty()),
            ]
            .into_iter()
            .find_map(|(field, empty)| empty.then_some(field)),
            Self::Xmpp {
                login,
                password,
                host,
                ..
            } => [
                ("login", login.is_empty()),
                ("password", password.expose_secret().is_empty()),
                ("host", host.is_empty()),
            ]
            .into_iter()
            .find_map(|(field, empty)| empty.then_some(field)),
            Self::Campfire {
                login,
                token,
                subdomain,
                ..
            } => [
                ("login", login.is_empty()),
                ("token", token.expose_secret().is_empty()),
                ("subdomain", subdomain.is_empty()),
            ]
            .into_iter()
            .find_map(|(field, empty)| empty.then_some(field)),
        };

        match missing {
            Some(field) => Err(Error::Client(format!(
                "{} client cannot start without {field}",
                self.kind()
            ))),
            None => Ok(()),
        }
    }
}

/// Starts the handler and client units of a transport
///
/// The launcher only depends on this trait, so protocol implementations
/// (and test doubles) can be swapped in.
#[async_trait]
pub trait TransportUnits: Send + Sync {
    /// Start a handler unit for the given protocol
    fn start_handler(&self, kind: TransportKind) -> HandlerRef;

    /// Start a client unit that delivers to `handler`
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be started
    async fn start_client(
        &self,
        handler: &HandlerRef,
        params: ConnectionParams,
    ) -> Result<ClientRef>;
}

/// Task-per-unit implementation of [`TransportUnits`]
///
/// Network framing is left to the protocol crates; these units carry the
/// mailbox plumbing, lifecycle and event logging of each transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskUnits;

#[async_trait]
impl TransportUnits for TaskUnits {
    fn start_handler(&self, kind: TransportKind) -> HandlerRef {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = HandlerRef::new(kind, tx);
        tokio::spawn(run_handler(handler.id(), kind, rx));
        handler
    }

    async fn start_client(
        &self,
        handler: &HandlerRef,
        params: ConnectionParams,
    ) -> Result<ClientRef> {
        params.check()?;

        let kind = params.kind();
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ClientRef::new(kind, tx);

        handler.send(HandlerMessage::Inbound(ChatEvent::Connected))?;
        tokio::spawn(run_client(client.id(), handler.clone(), rx));

        tracing::debug!(
            transport = %kind,
            client = %client.id(),
            handler = %handler.id(),
            "client unit started"
        );
        Ok(client)
    }
}

async fn run_handler(
    id: Uuid,
    kind: TransportKind,
    mut rx: mpsc::UnboundedReceiver<HandlerMessage>,
) {
    let mut client: Option<ClientRef> = None;

    while let Some(message) = rx.recv().await {
        match message {
            HandlerMessage::BindClient {
                client: bound,
                identity,
            } => {
                tracing::info!(
                    transport = %kind,
                    handler = %id,
                    client = %bound.id(),
                    identity = %identity,
                    "client bound to handler"
                );
                if let Some(previous) = client.replace(bound) {
                    previous.stop();
                }
            }
            HandlerMessage::Inbound(ChatEvent::Message { from, text }) => {
                tracing::debug!(
                    transport = %kind,
                    handler = %id,
                    from = %from,
                    text = %text,
                    "chat message"
                );
            }
            HandlerMessage::Inbound(ChatEvent::Disconnected { client: gone }) => {
                // A client replaced by a rebind reports in after the new one is bound
                if client.as_ref().is_some_and(|bound| bound.id() == gone) {
                    tracing::warn!(
                        transport = %kind,
                        handler = %id,
                        client = %gone,
                        "client disconnected"
                    );
                    client = None;
                } else {
                    tracing::debug!(
                        transport = %kind,
                        handler = %id,
                        client = %gone,
                        "stale client disconnected"
                    );
                }
            }
            HandlerMessage::Inbound(event) => {
                tracing::debug!(transport = %kind, handler = %id, ?event, "client event");
            }
            HandlerMessage::Stop => {
                if let Some(client) = client.take() {
                    client.stop();
                }
                break;
            }
        }
    }

    tracing::debug!(transport = %kind, handler = %id, "handler unit stopped");
}

async fn run_client(
    id: Uuid,
    handler: HandlerRef,
    mut rx: mpsc::UnboundedReceiver<ClientMessage>,
) {
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(ClientMessage::Send(text)) => {
                    if handler.send(HandlerMessage::Inbound(ChatEvent::Outbound(text))).is_err() {
                        break;
                    }
                }
                Some(ClientMessage::Stop) | None => break,
            },
            () = handler.closed() => break,
        }
    }

    let _ = handler.send(HandlerMessage::Inbound(ChatEvent::Disconnected { client: id }));
    tracing::debug!(transport = %handler.kind(), client = %id, "client unit stopped");
}
