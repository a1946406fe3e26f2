//! Transport launcher
//!
//! Starts the handler unit first, then the client unit pointed at it, then
//! binds the client back into the handler. A transport that fails anywhere
//! along the way has its handler stopped and yields no handle; siblings are
//! unaffected. Connecting runs on its own task, so a panicking client start
//! counts as a failed launch.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

use super::units::{ConnectionParams, HandlerRef, TransportUnits};
use super::{
    CampfireSpec, IrcSpec, TransportHandle, TransportIdentity, TransportKind, TransportOptions,
    TransportSpec, XmppSpec,
};
use crate::{Error, Result};

/// Validated IRC options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrcOptions {
    /// Server port
    pub port: u16,
    /// Secure (`true`) or plain (`false`) client flavor
    pub use_ssl: bool,
}

impl IrcOptions {
    /// Extract `port` and `use_ssl` from an IRC options table
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportValidation`] if `port` is missing or out of
    /// range, or `use_ssl` is anything but `true` or `false`
    pub fn from_options(options: &TransportOptions) -> Result<Self> {
        let port = match options.get("port") {
            Some(toml::Value::Integer(n)) => u16::try_from(*n).ok().filter(|p| *p != 0),
            Some(toml::Value::String(s)) => s.trim().parse::<u16>().ok().filter(|p| *p != 0),
            Some(_) | None => None,
        }
        .ok_or_else(|| {
            invalid(
                TransportKind::Irc,
                format!("port must be 1-65535, got {}", describe(options.get("port"))),
            )
        })?;

        let use_ssl = match options.get("use_ssl") {
            Some(toml::Value::Boolean(flag)) => Some(*flag),
            Some(toml::Value::String(s)) if s == "true" => Some(true),
            Some(toml::Value::String(s)) if s == "false" => Some(false),
            Some(_) | None => None,
        }
        .ok_or_else(|| {
            invalid(
                TransportKind::Irc,
                format!(
                    "use_ssl must be true or false, got {}",
                    describe(options.get("use_ssl"))
                ),
            )
        })?;

        Ok(Self { port, use_ssl })
    }
}

fn invalid(kind: TransportKind, reason: String) -> Error {
    Error::TransportValidation {
        transport: kind.to_string(),
        reason,
    }
}

fn describe(value: Option<&toml::Value>) -> String {
    value.map_or_else(|| "nothing".to_string(), ToString::to_string)
}

/// Check a spec without starting anything
///
/// # Errors
///
/// Returns [`Error::TransportValidation`] if the spec's options are unusable
pub fn validate(spec: &TransportSpec) -> Result<TransportIdentity> {
    Ok(match spec {
        TransportSpec::Irc(irc) => {
            let options = IrcOptions::from_options(&irc.options)?;
            TransportIdentity::Irc {
                nick: irc.nick.clone(),
                channel: irc.channel.clone(),
                host: irc.host.clone(),
                port: options.port,
                use_ssl: options.use_ssl,
            }
        }
        TransportSpec::Xmpp(xmpp) => TransportIdentity::Xmpp {
            login: xmpp.login.clone(),
            room: xmpp.room.clone(),
            host: xmpp.host.clone(),
            resource: xmpp.resource.clone(),
        },
        TransportSpec::Campfire(campfire) => TransportIdentity::Campfire {
            login: campfire.login.clone(),
            room_id: campfire.room_id,
            subdomain: campfire.subdomain.clone(),
        },
    })
}

/// Turn a spec into the parameters its client connects with
fn connection_params(spec: TransportSpec) -> Result<ConnectionParams> {
    Ok(match spec {
        TransportSpec::Irc(IrcSpec {
            nick,
            channel,
            host,
            options,
        }) => {
            let IrcOptions { port, use_ssl } = IrcOptions::from_options(&options)?;
            ConnectionParams::Irc {
                nick,
                channel,
                host,
                port,
                use_ssl,
            }
        }
        TransportSpec::Xmpp(XmppSpec {
            login,
            password,
            room,
            host,
            resource,
            ..
        }) => ConnectionParams::Xmpp {
            login,
            password,
            room,
            host,
            resource,
        },
        TransportSpec::Campfire(CampfireSpec {
            login,
            token,
            room_id,
            subdomain,
            ..
        }) => ConnectionParams::Campfire {
            login,
            token,
            room_id,
            subdomain,
        },
    })
}

/// Launch one transport
///
/// Returns `None` (after logging) if the options are invalid or the client
/// fails to start or panics; the already-started handler is stopped in that
/// case.
pub async fn launch(
    units: Arc<dyn TransportUnits>,
    spec: TransportSpec,
) -> Option<TransportHandle> {
    let kind = spec.kind();
    let handler = units.start_handler(kind);

    let connecting = {
        let handler = handler.clone();
        tokio::spawn(async move { connect(units.as_ref(), &handler, spec).await })
    };

    match connecting.await {
        Ok(Ok(handle)) => {
            tracing::info!(
                transport = %kind,
                identity = %handle.identity,
                handler = %handle.handler.id(),
                client = %handle.client.id(),
                "transport launched"
            );
            Some(handle)
        }
        Ok(Err(e)) => {
            tracing::error!(transport = %kind, error = %e, "transport launch failed");
            handler.stop();
            None
        }
        Err(e) => {
            tracing::error!(transport = %kind, error = %e, "transport launch task crashed");
            handler.stop();
            None
        }
    }
}

async fn connect(
    units: &dyn TransportUnits,
    handler: &HandlerRef,
    spec: TransportSpec,
) -> Result<TransportHandle> {
    let params = connection_params(spec)?;
    let identity = params.identity();
    let client = units.start_client(handler, params).await?;

    if let Err(e) = handler.bind(client.clone(), identity.clone()) {
        client.stop();
        return Err(e);
    }

    Ok(TransportHandle {
        identity,
        client,
        handler: handler.clone(),
    })
}

/// Launch every transport independently and keep the successful ones
///
/// Handles are returned in configuration order.
pub async fn launch_all(
    units: Arc<dyn TransportUnits>,
    specs: Vec<TransportSpec>,
) -> Vec<TransportHandle> {
    launch_reporting(units, specs, |_| async { true }).await
}

/// Launch every transport, reporting progress as each one comes up
///
/// After each successful launch `report` receives all handles launched so
/// far (in configuration order), so a slow transport never holds back the
/// others. If `report` returns `false` the handle that was just launched is
/// stopped and left out of the result.
pub async fn launch_reporting<F, Fut>(
    units: Arc<dyn TransportUnits>,
    specs: Vec<TransportSpec>,
    mut report: F,
) -> Vec<TransportHandle>
where
    F: FnMut(Vec<TransportHandle>) -> Fut,
    Fut: Future<Output = bool>,
{
    let total = specs.len();
    let mut slots: Vec<Option<TransportHandle>> =
        std::iter::repeat_with(|| None).take(total).collect();

    let mut pending: FuturesUnordered<_> = specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            let kind = spec.kind();
            let launching = tokio::spawn(launch(Arc::clone(&units), spec));
            async move {
                let launched = launching.await.unwrap_or_else(|e| {
                    tracing::error!(transport = %kind, error = %e, "transport launch task crashed");
                    None
                });
                (index, launched)
            }
        })
        .collect();

    while let Some((index, launched)) = pending.next().await {
        let Some(handle) = launched else {
            continue;
        };

        slots[index] = Some(handle.clone());
        let snapshot: Vec<TransportHandle> = slots.iter().flatten().cloned().collect();
        if !report(snapshot).await {
            handle.stop();
            slots[index] = None;
        }
    }

    let handles: Vec<TransportHandle> = slots.into_iter().flatten().collect();
    tracing::info!(
        launched = handles.len(),
        failed = total - handles.len(),
        "transport launch complete"
    );
    handles
}
