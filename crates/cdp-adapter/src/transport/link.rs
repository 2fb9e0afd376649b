//! One websocket connection to the browser and the task that pumps it.

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::endpoint;
use super::{CommandTarget, TransportEvent};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

/// Chromium error texts meaning the flattened session no longer exists.
const SESSION_GONE: &[&str] = &[
    "No session with given id",
    "Session with given id not found",
    "Target closed",
    "Inspected target navigated or closed",
];

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Request {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

pub(super) struct Link {
    requests: mpsc::Sender<Request>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    pump: Option<JoinHandle<()>>,
    browser: parking_lot::Mutex<Option<Child>>,
    open: Arc<AtomicBool>,
}

impl Link {
    pub(super) async fn open(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let endpoint = endpoint::resolve(cfg).await?;
        let conn = Connection::<CdpEventMessage>::connect(&endpoint.ws_url)
            .await
            .map_err(|err| AdapterError::io(format!("connect {}: {err}", endpoint.ws_url)))?;
        info!(target: "cdp-transport", url = %endpoint.ws_url, "connected to chromium");

        let (requests, requests_rx) = mpsc::channel(128);
        let (events_tx, events) = mpsc::channel(512);
        let open = Arc::new(AtomicBool::new(true));

        let pump = Pump {
            conn,
            requests: requests_rx,
            events: events_tx,
            calls: HashMap::new(),
            keepalive: cfg.heartbeat().map(Keepalive::new),
        };
        let flag = Arc::clone(&open);
        let pump = tokio::spawn(async move {
            if let Err(err) = pump.run().await {
                error!(target: "cdp-transport", %err, "connection pump stopped");
            }
            flag.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            requests,
            events: Mutex::new(events),
            pump: Some(pump),
            browser: parking_lot::Mutex::new(endpoint.browser),
            open,
        })
    }

    pub(super) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(super) async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }

    pub(super) async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (reply, answer) = oneshot::channel();
        let request = Request {
            target,
            method: method.to_string(),
            params,
            reply,
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| AdapterError::disconnected("connection pump is gone"))?;

        match tokio::time::timeout(deadline, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::disconnected(format!("{method}: reply dropped"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(format!("{method} got no reply within {deadline:?}"))
                .retriable(true)),
        }
    }

    #[cfg(test)]
    pub(super) fn detached_stub() -> Self {
        let (requests, _) = mpsc::channel(1);
        let (_, events) = mpsc::channel(1);
        Self {
            requests,
            events: Mutex::new(events),
            pump: None,
            browser: parking_lot::Mutex::new(None),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    #[cfg(test)]
    pub(super) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(pump) = &self.pump {
            pump.abort();
        }
        let Some(mut child) = self.browser.lock().take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", %err, "could not stop launched chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to stop chromium"),
        }
    }
}

/// Periodic `Browser.getVersion`. A ping still unanswered when the next one
/// is due means the browser stopped responding.
struct Keepalive {
    ticker: Interval,
    outstanding: Option<CallId>,
}

impl Keepalive {
    fn new(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            outstanding: None,
        }
    }
}

async fn next_tick(keepalive: &mut Option<Keepalive>) {
    match keepalive {
        Some(keepalive) => {
            keepalive.ticker.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}

struct Pump {
    conn: Connection<CdpEventMessage>,
    requests: mpsc::Receiver<Request>,
    events: mpsc::Sender<TransportEvent>,
    calls: HashMap<CallId, Reply>,
    keepalive: Option<Keepalive>,
}

impl Pump {
    async fn run(mut self) -> Result<(), AdapterError> {
        let outcome = self.pump().await;
        let reason = match &outcome {
            Ok(()) => AdapterError::disconnected("cdp connection closed"),
            Err(err) => err.clone(),
        };
        for (_, reply) in self.calls.drain() {
            let _ = reply.send(Err(reason.clone()));
        }
        outcome
    }

    async fn pump(&mut self) -> Result<(), AdapterError> {
        loop {
            tokio::select! {
                Some(request) = self.requests.recv() => self.submit(request)?,
                _ = next_tick(&mut self.keepalive) => self.ping()?,
                message = self.conn.next() => match message {
                    Some(Ok(Message::Response(response))) => self.settle(response),
                    Some(Ok(Message::Event(event))) => self.forward(event).await,
                    Some(Err(err)) => return Err(classify_cdp_error(err)),
                    None => return Ok(()),
                },
            }
        }
    }

    fn submit(&mut self, request: Request) -> Result<(), AdapterError> {
        let session = match request.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(SessionId::from(id)),
        };
        let method: MethodId = request.method.into();
        match self.conn.submit_command(method, session, request.params) {
            Ok(call) => {
                self.calls.insert(call, request.reply);
                Ok(())
            }
            Err(err) => {
                let err = AdapterError::io(err.to_string());
                let _ = request.reply.send(Err(err.clone()));
                Err(err)
            }
        }
    }

    fn ping(&mut self) -> Result<(), AdapterError> {
        let Some(keepalive) = self.keepalive.as_mut() else {
            return Ok(());
        };
        if keepalive.outstanding.is_some() {
            warn!(target: "cdp-transport", "browser missed a keepalive ping");
            return Err(AdapterError::disconnected("browser stopped answering"));
        }
        let call = self
            .conn
            .submit_command("Browser.getVersion".into(), None, json!({}))
            .map_err(|err| AdapterError::io(err.to_string()))?;
        keepalive.outstanding = Some(call);
        Ok(())
    }

    fn settle(&mut self, response: Response) {
        if let Some(keepalive) = self.keepalive.as_mut() {
            if keepalive.outstanding == Some(response.id) {
                keepalive.outstanding = None;
                return;
            }
        }
        let Some(reply) = self.calls.remove(&response.id) else {
            debug!(target: "cdp-transport", id = ?response.id, "reply for unknown call");
            return;
        };
        let error = response.error.map(|e| (e.code, e.message));
        let _ = reply.send(classify_reply(response.result, error));
    }

    async fn forward(&mut self, event: CdpEventMessage) {
        let raw: CdpJsonEventMessage = match event.try_into() {
            Ok(raw) => raw,
            Err(err) => {
                debug!(target: "cdp-transport", %err, "undecodable cdp event");
                return;
            }
        };
        let event = TransportEvent {
            method: raw.method.into_owned(),
            params: raw.params,
            session_id: raw.session_id,
        };
        if self.events.send(event).await.is_err() {
            debug!(target: "cdp-transport", "event dropped, nobody is listening");
        }
    }
}

fn classify_cdp_error(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::Timeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::ChannelSendError(_) => {
            AdapterError::disconnected(hint)
        }
        _ => AdapterError::io(hint).retriable(true),
    }
}

/// A CDP reply as a value or a classified error.
fn classify_reply(result: Option<Value>, error: Option<(i64, String)>) -> Result<Value, AdapterError> {
    match (result, error) {
        (Some(result), _) => Ok(result),
        (None, Some((code, message))) => {
            let gone = SESSION_GONE.iter().any(|marker| message.contains(marker));
            let err = if gone {
                AdapterError::disconnected(message.clone())
            } else {
                AdapterError::io(format!("cdp error {code}: {message}")).retriable(code >= 500)
            };
            Err(err.with_data(json!({ "code": code })))
        }
        (None, None) => Err(AdapterError::internal("empty cdp reply")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_session_reads_as_disconnect() {
        let err = classify_reply(None, Some((-32001, "Session with given id not found.".into())))
            .unwrap_err();
        assert!(err.is_disconnected());
        assert_eq!(err.data, Some(json!({"code": -32001})));

        let err = classify_reply(None, Some((-32000, "Cannot find context".into()))).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::CdpIo);
        assert!(!err.retriable);
    }

    #[test]
    fn result_beats_error_and_empty_is_internal() {
        let value = classify_reply(Some(json!({"ok": true})), Some((1, "x".into()))).unwrap();
        assert_eq!(value["ok"], true);
        let err = classify_reply(None, None).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Internal);
    }

    #[tokio::test]
    async fn call_without_pump_is_disconnected() {
        let link = Link::detached_stub();
        let err = link
            .call(CommandTarget::Browser, "Target.getTargets", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_disconnected());
        assert!(link.next_event().await.is_none());
    }
}
