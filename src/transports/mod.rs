//! Chat network transports
//!
//! A transport is one configured connection to a chat network: a handler
//! unit that mediates between the network and the bot, plus a client unit
//! that owns the connection. Both run as independent tasks; the orchestrator
//! only keeps references to them in a [`TransportHandle`].

pub mod launcher;
pub mod units;

use std::collections::BTreeMap;
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

pub use launcher::{IrcOptions, launch, launch_all, launch_reporting, validate};
pub use units::{
    ChatEvent, ClientMessage, ClientRef, ConnectionParams, HandlerMessage, HandlerRef, TaskUnits,
    TransportUnits,
};

/// Protocol-specific options table (`[transports.options]` in the config file)
pub type TransportOptions = BTreeMap<String, toml::Value>;

/// Chat protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Internet Relay Chat
    Irc,
    /// XMPP multi-user chat
    Xmpp,
    /// Campfire-style hosted chat rooms
    Campfire,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Irc => "irc",
            Self::Xmpp => "xmpp",
            Self::Campfire => "campfire",
        };
        f.write_str(name)
    }
}

/// One configured transport, tagged by `protocol`
#[derive(Debug, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum TransportSpec {
    /// IRC network
    Irc(IrcSpec),
    /// XMPP server
    Xmpp(XmppSpec),
    /// Campfire-style service
    Campfire(CampfireSpec),
}

impl TransportSpec {
    /// Protocol family of this spec
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Irc(_) => TransportKind::Irc,
            Self::Xmpp(_) => TransportKind::Xmpp,
            Self::Campfire(_) => TransportKind::Campfire,
        }
    }
}

/// IRC transport settings
#[derive(Debug, Deserialize)]
pub struct IrcSpec {
    /// Bot nickname
    pub nick: String,
    /// Channel to join (e.g. "#bots")
    pub channel: String,
    /// Server host name
    pub host: String,
    /// Must carry `port` and `use_ssl`
    #[serde(default)]
    pub options: TransportOptions,
}

/// XMPP transport settings
#[derive(Debug, Deserialize)]
pub struct XmppSpec {
    /// Account JID or login name
    pub login: String,
    /// Account password
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Multi-user chat room
    pub room: String,
    /// Server host name
    pub host: String,
    /// XMPP resource
    pub resource: String,
    /// Extra options, passed through untouched
    #[serde(default)]
    pub options: TransportOptions,
}

/// Campfire-style transport settings
#[derive(Debug, Deserialize)]
pub struct CampfireSpec {
    /// Account login
    pub login: String,
    /// API token
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: SecretString,
    /// Room identifier
    pub room_id: u64,
    /// Account subdomain
    pub subdomain: String,
    /// Extra options, passed through untouched
    #[serde(default)]
    pub options: TransportOptions,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Who a running transport is connected as, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportIdentity {
    /// IRC nick on a channel
    Irc {
        /// Bot nickname
        nick: String,
        /// Joined channel
        channel: String,
        /// Server host
        host: String,
        /// Server port
        port: u16,
        /// Whether the secure client flavor is used
        use_ssl: bool,
    },
    /// XMPP account in a room
    Xmpp {
        /// Account login
        login: String,
        /// Joined room
        room: String,
        /// Server host
        host: String,
        /// XMPP resource
        resource: String,
    },
    /// Campfire account in a room
    Campfire {
        /// Account login
        login: String,
        /// Room identifier
        room_id: u64,
        /// Account subdomain
        subdomain: String,
    },
}

impl TransportIdentity {
    /// Protocol family of this identity
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Irc { .. } => TransportKind::Irc,
            Self::Xmpp { .. } => TransportKind::Xmpp,
            Self::Campfire { .. } => TransportKind::Campfire,
        }
    }
}

impl fmt::Display for TransportIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Irc {
                nick,
                channel,
                host,
                port,
                use_ssl,
            } => {
                let scheme = if *use_ssl { "ircs" } else { "irc" };
                write!(f, "{scheme}://{nick}@{host}:{port}/{channel}")
            }
            Self::Xmpp {
                login,
                room,
                host,
                resource,
            } => write!(f, "xmpp://{login}@{host}/{resource} room={room}"),
            Self::Campfire {
                login,
                room_id,
                subdomain,
            } => write!(f, "campfire://{login}@{subdomain} room={room_id}"),
        }
    }
}

/// A successfully launched transport
///
/// The orchestrator holds these; the connection itself belongs to the
/// client unit and is reached only through the references.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    /// Connection identity
    pub identity: TransportIdentity,
    /// Client unit owning the network connection
    pub client: ClientRef,
    /// Handler unit the client delivers to
    pub handler: HandlerRef,
}

impl TransportHandle {
    /// Protocol family of this transport
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.identity.kind()
    }

    /// Snapshot of this transport for status queries
    #[must_use]
    pub fn summary(&self) -> TransportSummary {
        TransportSummary {
            identity: self.identity.clone(),
            handler_alive: self.handler.is_alive(),
            client_alive: self.client.is_alive(),
        }
    }

    /// Stop both units; the handler also stops its bound client
    pub fn stop(&self) {
        self.handler.stop();
        self.client.stop();
    }
}

/// Status of one recorded transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportSummary {
    /// Connection identity
    pub identity: TransportIdentity,
    /// Whether the handler unit is still running
    pub handler_alive: bool,
    /// Whether the client unit is still running
    pub client_alive: bool,
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Specs {
        transports: Vec<TransportSpec>,
    }

    #[test]
    fn deserialize_tagged_specs() {
        let toml = r##"
            [[transports]]
            protocol = "irc"
            nick = "switchbot"
            channel = "#bots"
            host = "irc.libera.chat"
            options = { port = 6697, use_ssl = true }

            [[transports]]
            protocol = "xmpp"
            login = "bot@example.org"
            password = "hunter2"
            room = "lobby@conference.example.org"
            host = "example.org"
            resource = "switchboard"

            [[transports]]
            protocol = "campfire"
            login = "bot"
            token = "abc123"
            room_id = 42
            subdomain = "acme"
        "##;

        let specs: Specs = toml::from_str(toml).unwrap();
        let kinds: Vec<TransportKind> = specs.transports.iter().map(TransportSpec::kind).collect();
        assert_eq!(
            kinds,
            vec![TransportKind::Irc, TransportKind::Xmpp, TransportKind::Campfire]
        );

        let TransportSpec::Irc(irc) = &specs.transports[0] else {
            panic!("expected irc spec");
        };
        assert_eq!(irc.options.get("port"), Some(&toml::Value::Integer(6697)));

        let TransportSpec::Xmpp(xmpp) = &specs.transports[1] else {
            panic!("expected xmpp spec");
        };
        assert_eq!(xmpp.password.expose_secret(), "hunter2");
        assert!(xmpp.options.is_empty());
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let toml = r#"
            [[transports]]
            protocol = "carrier-pigeon"
            nick = "coo"
        "#;
        assert!(toml::from_str::<Specs>(toml).is_err());
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let toml = r#"
            [[transports]]
            protocol = "campfire"
            login = "bot"
            token = "very-secret-token"
            room_id = 7
            subdomain = "acme"
        "#;
        let specs: Specs = toml::from_str(toml).unwrap();
        let debug = format!("{specs:?}");
        assert!(!debug.contains("very-secret-token"));
    }

    #[test]
    fn identity_display() {
        let irc = TransportIdentity::Irc {
            nick: "bot".to_string(),
            channel: "#ops".to_string(),
            host: "irc.example.net".to_string(),
            port: 6697,
            use_ssl: true,
        };
        assert_eq!(irc.to_string(), "ircs://bot@irc.example.net:6697/#ops");
        assert_eq!(irc.kind(), TransportKind::Irc);

        let campfire = TransportIdentity::Campfire {
            login: "bot".to_string(),
            room_id: 9,
            subdomain: "acme".to_string(),
        };
        assert_eq!(campfire.to_string(), "campfire://bot@acme room=9");
    }
}
