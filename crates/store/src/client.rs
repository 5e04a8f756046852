//! Live store connection: WebSocket listen channel plus REST writes.
//!
//! [`StoreClient`] holds connection configuration; [`StoreClient::connect`]
//! opens the listen channel and spawns a router task that owns the socket.
//! The resulting [`LiveStore`] is the process-wide connection handle --
//! constructed once at startup and injected wherever store access is needed.

use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;
use econote_core::{DocId, FieldPatch, Note, NoteDraft};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::messages::{ClientMessage, ServerMessage, SubscribeTarget, WireDocument};
use crate::rest::StoreRest;
use crate::watch::{WatchChannel, WatchEvent, WatchHandle};
use crate::{DocSnapshot, DocumentStore, NoteQuery};

/// Configuration handle for one remote store project.
///
/// Create a [`LiveStore`] by calling [`connect`](Self::connect).
pub struct StoreClient {
    config: StoreConfig,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Listen-channel URL (e.g. `wss://host/v1/projects/p/listen?key=...`).
    pub fn listen_url(&self) -> String {
        format!(
            "wss://{}/v1/projects/{}/listen?key={}",
            self.config.auth_domain, self.config.project_id, self.config.api_key
        )
    }

    /// Open the listen channel and spawn the router task.
    pub async fn connect(&self) -> Result<LiveStore, StoreError> {
        let url = self.listen_url();
        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            StoreError::Connection(format!(
                "Failed to open listen channel to {}: {e}",
                self.config.auth_domain
            ))
        })?;

        tracing::info!(
            project_id = %self.config.project_id,
            "Connected to document store listen channel",
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let router_cancel = cancel.clone();
        tokio::spawn(async move {
            run_router(ws_stream, cmd_rx, router_cancel).await;
            tracing::info!("Store listen router exited");
        });

        Ok(LiveStore {
            rest: StoreRest::new(&self.config),
            cmd_tx,
            cancel,
        })
    }
}

/// A live connection to the remote document store.
///
/// Cheaply shareable behind `Arc<dyn DocumentStore>`. Dropping or calling
/// [`shutdown`](Self::shutdown) tears down the listen channel and every
/// subscription on it.
pub struct LiveStore {
    rest: StoreRest,
    cmd_tx: mpsc::UnboundedSender<RouterCommand>,
    cancel: CancellationToken,
}

/// Commands from subscription call sites to the router task.
enum RouterCommand {
    Subscribe {
        target_id: String,
        target: SubscribeTarget,
        sink: TargetSink,
    },
    Unsubscribe {
        target_id: String,
    },
}

/// Typed sender for one subscription target.
enum TargetSink {
    Query(mpsc::UnboundedSender<WatchEvent<Vec<Note>>>),
    Document(mpsc::UnboundedSender<WatchEvent<DocSnapshot>>),
}

impl LiveStore {
    /// Close the listen channel and release all subscriptions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn register(&self, target: SubscribeTarget, sink: TargetSink) -> Result<WatchHandle, StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Connection("store connection is shut down".into()));
        }

        let target_id = uuid::Uuid::new_v4().to_string();
        let handle = WatchHandle::new();

        self.cmd_tx
            .send(RouterCommand::Subscribe {
                target_id: target_id.clone(),
                target,
                sink,
            })
            .map_err(|_| StoreError::Connection("listen channel is closed".into()))?;

        // Deregister the target when the handle is closed.
        let cmd_tx = self.cmd_tx.clone();
        let close_signal = handle.clone();
        tokio::spawn(async move {
            close_signal.closed().await;
            let _ = cmd_tx.send(RouterCommand::Unsubscribe { target_id });
        });

        Ok(handle)
    }
}

impl Drop for LiveStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl DocumentStore for LiveStore {
    async fn create_note(&self, draft: NoteDraft) -> Result<DocId, StoreError> {
        self.rest.create_note(&draft).await
    }

    async fn write_fields(&self, id: &DocId, patch: FieldPatch) -> Result<(), StoreError> {
        self.rest.write_fields(id, &patch).await
    }

    async fn delete_note(&self, id: &DocId) -> Result<(), StoreError> {
        self.rest.delete_note(id).await
    }

    async fn subscribe_query(
        &self,
        query: NoteQuery,
    ) -> Result<WatchChannel<Vec<Note>>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register(SubscribeTarget::query(&query), TargetSink::Query(tx))?;
        Ok(WatchChannel::new(rx, handle))
    }

    async fn subscribe_document(
        &self,
        id: &DocId,
    ) -> Result<WatchChannel<DocSnapshot>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register(
            SubscribeTarget::document(id.as_str()),
            TargetSink::Document(tx),
        )?;
        Ok(WatchChannel::new(rx, handle))
    }
}

/// Router task: owns the socket, tracks targets, dispatches frames.
///
/// Exits when the connection drops (all targets receive a terminal
/// connection error -- no automatic reconnect; consumers re-bind) or when
/// the master token is cancelled.
async fn run_router(
    mut ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut cmd_rx: mpsc::UnboundedReceiver<RouterCommand>,
    cancel: CancellationToken,
) {
    let mut targets: HashMap<String, TargetSink> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_stream.send(Message::Close(None)).await;
                return;
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { return };
                match cmd {
                    RouterCommand::Subscribe { target_id, target, sink } => {
                        let frame = ClientMessage::Subscribe {
                            target_id: target_id.clone(),
                            target,
                        };
                        targets.insert(target_id.clone(), sink);
                        if send_frame(&mut ws_stream, &frame).await.is_err() {
                            fail_all(&mut targets, "listen channel closed while subscribing");
                            return;
                        }
                        tracing::debug!(target_id = %target_id, "Subscribed listen target");
                    }
                    RouterCommand::Unsubscribe { target_id } => {
                        if targets.remove(&target_id).is_some() {
                            let frame = ClientMessage::Unsubscribe { target_id: target_id.clone() };
                            // A send failure here also ends delivery, which is
                            // all unsubscribe needs.
                            let _ = send_frame(&mut ws_stream, &frame).await;
                            tracing::debug!(target_id = %target_id, "Unsubscribed listen target");
                        }
                    }
                }
            }

            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&text, &mut targets);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        fail_all(&mut targets, "listen channel closed by store");
                        return;
                    }
                    Some(Err(e)) => {
                        fail_all(&mut targets, &format!("listen channel error: {e}"));
                        return;
                    }
                }
            }
        }
    }
}

async fn send_frame(
    ws_stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    frame: &ClientMessage,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    ws_stream.send(Message::Text(text.into())).await.map_err(|_| ())
}

/// Route one server frame to its target. Decode failures and server error
/// frames are terminal for the target: the error is delivered and the
/// target removed.
fn dispatch(text: &str, targets: &mut HashMap<String, TargetSink>) {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable listen frame dropped");
            return;
        }
    };

    match message {
        ServerMessage::Snapshot { target_id, documents } => {
            let Some(TargetSink::Query(tx)) = targets.get(&target_id) else {
                tracing::debug!(target_id = %target_id, "Snapshot for unknown query target dropped");
                return;
            };
            match decode_documents(documents) {
                Ok(notes) => {
                    let _ = tx.send(WatchEvent::Snapshot(notes));
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e));
                    targets.remove(&target_id);
                }
            }
        }
        ServerMessage::Document { target_id, document } => {
            let Some(TargetSink::Document(tx)) = targets.get(&target_id) else {
                tracing::debug!(target_id = %target_id, "Snapshot for unknown document target dropped");
                return;
            };
            let snapshot = match document {
                Some(doc) => match doc.into_note() {
                    Ok(note) => DocSnapshot::Exists(note),
                    Err(e) => {
                        let _ = tx.send(WatchEvent::Error(e));
                        targets.remove(&target_id);
                        return;
                    }
                },
                None => DocSnapshot::Missing,
            };
            let _ = tx.send(WatchEvent::Snapshot(snapshot));
        }
        ServerMessage::Error { target_id, code, message } => {
            let error = StoreError::from_wire_code(&code, &message);
            tracing::warn!(target_id = %target_id, %error, "Listen target failed");
            match targets.remove(&target_id) {
                Some(TargetSink::Query(tx)) => {
                    let _ = tx.send(WatchEvent::Error(error));
                }
                Some(TargetSink::Document(tx)) => {
                    let _ = tx.send(WatchEvent::Error(error));
                }
                None => {}
            }
        }
    }
}

fn decode_documents(documents: Vec<WireDocument>) -> Result<Vec<Note>, StoreError> {
    documents.into_iter().map(WireDocument::into_note).collect()
}

/// Deliver a terminal connection error to every remaining target.
fn fail_all(targets: &mut HashMap<String, TargetSink>, reason: &str) {
    tracing::warn!(count = targets.len(), reason, "Failing all listen targets");
    for (_, sink) in targets.drain() {
        match sink {
            TargetSink::Query(tx) => {
                let _ = tx.send(WatchEvent::Error(StoreError::Connection(reason.to_owned())));
            }
            TargetSink::Document(tx) => {
                let _ = tx.send(WatchEvent::Error(StoreError::Connection(reason.to_owned())));
            }
        }
    }
}
