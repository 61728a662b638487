//! The request channel: origin-tagged connections carrying the
//! [`protocol`](crate::protocol) messages to a shared [`StorageBroker`].
//!
//! [`request_channel`] returns a cloneable [`ChannelConnector`] and the
//! [`ChannelService`] that must be driven with [`ChannelService::run`].
//! Each connection is an [`OriginPort`] bound to one origin; the service
//! keeps the handles a connection was granted and releases them when the
//! port is dropped.
//!
//! Every message is dispatched on its own task, so a pending consent prompt
//! never blocks other requests. Dropping a pending [`OriginPort::post`]
//! future abandons the request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::protocol::{decode_request, Request, Response};
use crate::{
    ContentHash, ErrorCode, FileHandle, HandleMode, Origin, RequestOptions, StorageBroker,
};

/// Identifies one connection.
pub type SessionId = Uuid;

/// Errors seen by the connecting side of the channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The service is no longer running.
    #[error("request channel closed")]
    Closed,
    /// A request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    /// The service replied with something that is not a response.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

enum ChannelEvent {
    Open {
        session: SessionId,
        origin: Origin,
    },
    Message {
        session: SessionId,
        data: String,
        reply: oneshot::Sender<Option<String>>,
    },
    Close {
        session: SessionId,
    },
}

/// Creates a request channel in front of `broker`.
#[must_use]
pub fn request_channel(broker: Arc<StorageBroker>) -> (ChannelConnector, ChannelService) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelConnector { tx },
        ChannelService {
            broker,
            rx,
            sessions: Arc::default(),
        },
    )
}

/// Opens connections on behalf of origins.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelConnector {
    /// Opens a connection tagged with `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the service has stopped.
    pub fn connect(&self, origin: Origin) -> Result<OriginPort, ChannelError> {
        let session = Uuid::new_v4();
        self.tx
            .send(ChannelEvent::Open {
                session,
                origin: origin.clone(),
            })
            .map_err(|_| ChannelError::Closed)?;
        Ok(OriginPort {
            session,
            origin,
            tx: self.tx.clone(),
        })
    }
}

/// One origin's connection to the broker.
#[derive(Debug)]
pub struct OriginPort {
    session: SessionId,
    origin: Origin,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl OriginPort {
    /// The origin every message on this port is attributed to.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Posts a raw message and waits for the raw response.
    ///
    /// Returns `Ok(None)` when the service dropped the message as malformed
    /// or unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the service has stopped.
    pub async fn post(&self, message: impl Into<String>) -> Result<Option<String>, ChannelError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ChannelEvent::Message {
                session: self.session,
                data: message.into(),
                reply,
            })
            .map_err(|_| ChannelError::Closed)?;
        response.await.map_err(|_| ChannelError::Closed)
    }

    /// Sends a typed request and decodes the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded, the service has
    /// stopped, or the response cannot be decoded.
    pub async fn send(&self, request: &Request) -> Result<Option<Response>, ChannelError> {
        let message = serde_json::to_string(request).map_err(ChannelError::Encode)?;
        self.post(message)
            .await?
            .map(|raw| serde_json::from_str(&raw).map_err(ChannelError::Decode))
            .transpose()
    }
}

impl Drop for OriginPort {
    fn drop(&mut self) {
        let _ = self.tx.send(ChannelEvent::Close {
            session: self.session,
        });
    }
}

#[derive(Debug)]
struct Session {
    origin: Origin,
    handles: HashMap<ContentHash, FileHandle>,
}

type Sessions = Arc<Mutex<HashMap<SessionId, Session>>>;

/// Drives the channel: decodes messages, dispatches them to the broker, and
/// tracks per-connection handles.
#[derive(Debug)]
pub struct ChannelService {
    broker: Arc<StorageBroker>,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    sessions: Sessions,
}

impl ChannelService {
    /// Runs until every connector and port has been dropped and all
    /// in-flight requests have finished.
    pub async fn run(mut self) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle(event, &mut tasks),
                    None => break,
                },
                Some(joined) = tasks.join_next() => log_join(joined),
            }
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        log::debug!("request channel stopped");
    }

    fn handle(&self, event: ChannelEvent, tasks: &mut JoinSet<()>) {
        match event {
            ChannelEvent::Open { session, origin } => {
                log::debug!("connection {session} opened for {origin}");
                lock(&self.sessions).insert(
                    session,
                    Session {
                        origin,
                        handles: HashMap::new(),
                    },
                );
            }
            ChannelEvent::Close { session } => {
                if let Some(closed) = lock(&self.sessions).remove(&session) {
                    log::debug!(
                        "connection {session} for {} closed, releasing {} handles",
                        closed.origin,
                        closed.handles.len()
                    );
                }
            }
            ChannelEvent::Message {
                session,
                data,
                reply,
            } => {
                let Some(origin) = lock(&self.sessions)
                    .get(&session)
                    .map(|open| open.origin.clone())
                else {
                    log::warn!("dropping message on unknown connection {session}");
                    let _ = reply.send(None);
                    return;
                };
                let request = match decode_request(&data) {
                    Ok(request) => request,
                    Err(err) => {
                        log::warn!("dropping message from {origin}: {err}");
                        let _ = reply.send(None);
                        return;
                    }
                };
                let dispatcher = Dispatcher {
                    broker: Arc::clone(&self.broker),
                    sessions: Arc::clone(&self.sessions),
                    session,
                    origin,
                };
                tasks.spawn(dispatcher.respond(request, reply));
            }
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        log::error!("request task failed: {err}");
    }
}

fn lock(sessions: &Sessions) -> std::sync::MutexGuard<'_, HashMap<SessionId, Session>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Dispatcher {
    broker: Arc<StorageBroker>,
    sessions: Sessions,
    session: SessionId,
    origin: Origin,
}

impl Dispatcher {
    async fn respond(self, request: Request, mut reply: oneshot::Sender<Option<String>>) {
        let hash = request.hash().clone();
        let response = tokio::select! {
            () = reply.closed() => None,
            response = self.dispatch(request) => Some(response),
        };
        let Some(response) = response else {
            log::info!("{} went away; abandoned request for {hash}", self.origin);
            return;
        };
        match serde_json::to_string(&response) {
            Ok(encoded) => {
                let _ = reply.send(Some(encoded));
            }
            Err(err) => log::error!("failed to encode response for {hash}: {err}"),
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::RequestFileHandle {
                hash,
                create,
                description,
            } => {
                let options = RequestOptions {
                    description: description.clone(),
                    create,
                };
                let error = match self.broker.request_handle(&self.origin, &hash, options).await {
                    Ok(handle) => {
                        self.grant(handle);
                        None
                    }
                    Err(err) => Some(err.code()),
                };
                Response::RequestFileHandle {
                    hash,
                    description,
                    success: error.is_none(),
                    error,
                }
            }
            Request::GetFileData { hash } => {
                let (array_buffer, error) = match self.handle(&hash) {
                    Some(handle) => match handle.read().await {
                        Ok(bytes) => (Some(bytes), None),
                        Err(err) => (None, Some(err.code())),
                    },
                    None => (None, Some(ErrorCode::InvalidStateError)),
                };
                Response::GetFileData {
                    hash,
                    array_buffer,
                    error,
                }
            }
            Request::StoreFileData { hash, array_buffer } => {
                let error = match self.handle(&hash) {
                    Some(handle) => handle.write(&array_buffer).await.err().map(|err| err.code()),
                    None => Some(ErrorCode::InvalidStateError),
                };
                Response::StoreFileData {
                    hash,
                    array_buffer,
                    error,
                }
            }
        }
    }

    /// Keeps the granted handle for this connection. A write handle is never
    /// downgraded by a later read grant.
    fn grant(&self, handle: FileHandle) {
        let mut sessions = lock(&self.sessions);
        let Some(session) = sessions.get_mut(&self.session) else {
            return;
        };
        let keep_existing = session
            .handles
            .get(handle.hash())
            .is_some_and(|existing| existing.mode() == HandleMode::Write);
        if !keep_existing {
            session.handles.insert(handle.hash().clone(), handle);
        }
    }

    fn handle(&self, hash: &ContentHash) -> Option<FileHandle> {
        lock(&self.sessions)
            .get(&self.session)
            .and_then(|session| session.handles.get(hash).cloned())
    }
}
