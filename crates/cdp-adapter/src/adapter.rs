use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::select;
use tokio::sync::Mutex;
use tokio::task::{spawn, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// A tab as reported by `Target.getTargets`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetSummary {
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl TargetSummary {
    /// Whether the tab's URL belongs to `host` (suffix match on the host name,
    /// plain substring match when the URL does not parse).
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return true;
        }
        match Url::parse(&self.url) {
            Ok(url) => url
                .host_str()
                .map(|h| {
                    let h = h.to_ascii_lowercase();
                    h == host || h.ends_with(&format!(".{host}"))
                })
                .unwrap_or(false),
            Err(_) => self.url.to_ascii_lowercase().contains(&host),
        }
    }
}

/// The tab the adapter is currently driving.
#[derive(Clone, Debug)]
pub struct AttachedPage {
    pub target_id: String,
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TargetList {
    #[serde(rename = "targetInfos", default)]
    target_infos: Vec<TargetSummary>,
}

/// Adapter over a pluggable transport, bound to at most one tab.
pub struct CdpAdapter {
    cfg: CdpConfig,
    transport: Arc<dyn CdpTransport>,
    attached: RwLock<Option<AttachedPage>>,
    detached: AtomicBool,
    stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl CdpAdapter {
    pub fn new(cfg: CdpConfig) -> Self {
        let transport = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: CdpConfig, transport: Arc<dyn CdpTransport>) -> Self {
        Self {
            cfg,
            transport,
            attached: RwLock::new(None),
            detached: AtomicBool::new(false),
            stop: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    pub fn attached(&self) -> Option<AttachedPage> {
        self.attached.read().clone()
    }

    /// True once the attached tab went away (closed, crashed or the connection dropped).
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Connect and start following target lifecycle events. Idempotent.
    pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }
        self.transport.start().await?;
        *listener = Some(spawn(Arc::clone(&self).listen()));
        info!(target: "cdp-adapter", "listening for target events");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.stop.cancel();
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            if let Err(err) = listener.await {
                debug!(target: "cdp-adapter", %err, "event listener ended abnormally");
            }
        }
    }

    async fn listen(self: Arc<Self>) {
        loop {
            let event = select! {
                _ = self.stop.cancelled() => return,
                event = self.transport.next_event() => event,
            };
            let Some(event) = event else {
                if !self.stop.is_cancelled() {
                    self.mark_detached("event stream ended");
                }
                return;
            };
            self.handle_event(event);
        }
    }

    fn handle_event(&self, event: TransportEvent) {
        metrics::observe_event(&event.method);
        let Some(current) = self.attached() else {
            return;
        };
        match event.method.as_str() {
            "Target.detachedFromTarget" => {
                let session = event.params.get("sessionId").and_then(Value::as_str);
                if session == Some(current.session_id.as_str()) {
                    self.mark_detached("session detached");
                }
            }
            "Target.targetDestroyed" | "Target.targetCrashed" => {
                let target = event.params.get("targetId").and_then(Value::as_str);
                if target == Some(current.target_id.as_str()) {
                    self.mark_detached(&event.method);
                }
            }
            "Target.targetInfoChanged" => {
                let info = event.params.get("targetInfo");
                let target = info.and_then(|i| i.get("targetId")).and_then(Value::as_str);
                let url = info.and_then(|i| i.get("url")).and_then(Value::as_str);
                if let (Some(target), Some(url)) = (target, url) {
                    if target == current.target_id {
                        if let Some(page) = self.attached.write().as_mut() {
                            page.url = url.to_string();
                        }
                    }
                }
            }
            other => {
                debug!(target: "cdp-adapter", method = %other, "unhandled cdp event");
            }
        }
    }

    fn mark_detached(&self, reason: &str) {
        if !self.detached.swap(true, Ordering::SeqCst) {
            warn!(target: "cdp-adapter", reason, "attached page is gone");
        }
    }

    async fn browser_call(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.send_to(CommandTarget::Browser, method, params).await
    }

    async fn send_to(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let start = Instant::now();
        let result = self.transport.send_command(target, method, params).await;
        metrics::observe_command(method, result.is_ok(), start.elapsed());
        if let Err(err) = &result {
            if err.is_disconnected() {
                self.mark_detached(method);
            }
        }
        result
    }

    /// Send `method` over the attached tab's session.
    pub async fn send_page_command(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        if self.is_detached() {
            return Err(AdapterError::disconnected(
                "page was closed or reloaded; re-attach to continue",
            ));
        }
        let Some(page) = self.attached() else {
            return Err(AdapterError::disconnected("no page attached"));
        };
        self.send_to(CommandTarget::Session(page.session_id), method, params)
            .await
    }

    pub async fn list_pages(&self) -> Result<Vec<TargetSummary>, AdapterError> {
        let reply = self.browser_call("Target.getTargets", json!({})).await?;
        let list: TargetList = serde_json::from_value(reply)
            .map_err(|err| AdapterError::internal(format!("Target.getTargets reply: {err}")))?;
        Ok(list
            .target_infos
            .into_iter()
            .filter(|t| t.target_type == "page")
            .collect())
    }

    /// Attach to the first tab on `host`, opening `start_url` when none is open.
    pub async fn attach(&self, host: &str) -> Result<AttachedPage, AdapterError> {
        let existing = self
            .list_pages()
            .await?
            .into_iter()
            .find(|t| t.matches_host(host));
        let target = match existing {
            Some(target) => target,
            None => self.open_start_page(host).await?,
        };

        let reply = self
            .browser_call(
                "Target.attachToTarget",
                json!({ "targetId": target.target_id, "flatten": true }),
            )
            .await?;
        let page = AttachedPage {
            session_id: string_field(&reply, "sessionId", "Target.attachToTarget")?,
            target_id: target.target_id,
            url: target.url,
        };
        *self.attached.write() = Some(page.clone());
        self.detached.store(false, Ordering::SeqCst);

        // Background tabs refuse clipboard writes.
        if let Err(err) = self.send_page_command("Page.bringToFront", json!({})).await {
            debug!(target: "cdp-adapter", %err, "could not bring tab to front");
        }
        info!(target: "cdp-adapter", url = %page.url, "attached to page");
        Ok(page)
    }

    async fn open_start_page(&self, host: &str) -> Result<TargetSummary, AdapterError> {
        let Some(url) = self.cfg.start_url.clone() else {
            return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no open tab on {host}")));
        };
        let reply = self
            .browser_call("Target.createTarget", json!({ "url": url }))
            .await?;
        Ok(TargetSummary {
            target_id: string_field(&reply, "targetId", "Target.createTarget")?,
            target_type: "page".into(),
            url,
            title: String::new(),
        })
    }

    /// Evaluate `expression` in the attached page, awaiting promises and
    /// returning the result by value (`null` for `undefined`).
    pub async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        let params = json!({
            "expression": expression,
            "awaitPromise": true,
            "returnByValue": true,
            "userGesture": true,
        });
        let mut reply = self.send_page_command("Runtime.evaluate", params).await?;

        if let Some(details) = reply.get_mut("exceptionDetails").map(Value::take) {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script raised an exception")
                .to_string();
            return Err(AdapterError::new(AdapterErrorKind::Evaluation)
                .with_hint(message)
                .with_data(details));
        }

        Ok(reply
            .pointer_mut("/result/value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

fn string_field(reply: &Value, field: &str, method: &str) -> Result<String, AdapterError> {
    reply
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::internal(format!("{method} reply has no {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockTransport {
        rx: Mutex<mpsc::Receiver<TransportEvent>>,
        commands: Mutex<Vec<(String, Value)>>,
        responses: Mutex<VecDeque<Result<Value, AdapterError>>>,
    }

    impl MockTransport {
        fn new_pair() -> (Arc<Self>, mpsc::Sender<TransportEvent>) {
            let (tx, rx) = mpsc::channel(16);
            (
                Arc::new(Self {
                    rx: Mutex::new(rx),
                    commands: Mutex::new(Vec::new()),
                    responses: Mutex::new(VecDeque::new()),
                }),
                tx,
            )
        }

        async fn commands(&self) -> Vec<(String, Value)> {
            self.commands.lock().await.clone()
        }

        async fn respond(&self, value: Value) {
            self.responses.lock().await.push_back(Ok(value));
        }

        async fn fail(&self, err: AdapterError) {
            self.responses.lock().await.push_back(Err(err));
        }
    }

    #[async_trait]
    impl CdpTransport for MockTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            self.rx.lock().await.recv().await
        }

        async fn send_command(
            &self,
            _target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            self.commands
                .lock()
                .await
                .push((method.to_string(), params));
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    fn targets() -> Value {
        json!({
            "targetInfos": [
                {"targetId": "sw", "type": "service_worker", "url": "https://submit.example.com/sw.js"},
                {"targetId": "other", "type": "page", "url": "https://news.example.org/"},
                {"targetId": "portfolio", "type": "page", "url": "https://submit.example.com/portfolio/not-submitted"}
            ]
        })
    }

    async fn attached_adapter() -> (Arc<CdpAdapter>, Arc<MockTransport>, mpsc::Sender<TransportEvent>) {
        let (transport, tx) = MockTransport::new_pair();
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        transport.respond(targets()).await;
        transport.respond(json!({"sessionId": "S1"})).await;
        transport.respond(json!({})).await;
        adapter.attach("example.com").await.expect("attach");
        (adapter, transport, tx)
    }

    #[tokio::test]
    async fn attaches_to_matching_page_with_flattened_session() {
        let (adapter, transport, _tx) = attached_adapter().await;

        let page = adapter.attached().expect("attached page");
        assert_eq!(page.target_id, "portfolio");
        assert_eq!(page.session_id, "S1");

        let commands = transport.commands().await;
        assert_eq!(commands[0].0, "Target.getTargets");
        assert_eq!(commands[1].0, "Target.attachToTarget");
        assert_eq!(commands[1].1["targetId"], "portfolio");
        assert_eq!(commands[1].1["flatten"], true);
        assert_eq!(commands[2].0, "Page.bringToFront");
    }

    #[tokio::test]
    async fn attach_without_matching_tab_or_start_url_fails() {
        let (transport, _tx) = MockTransport::new_pair();
        let adapter = CdpAdapter::with_transport(
            CdpConfig {
                start_url: None,
                ..CdpConfig::default()
            },
            transport.clone() as Arc<dyn CdpTransport>,
        );
        transport.respond(json!({"targetInfos": []})).await;
        let err = adapter.attach("example.com").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn evaluate_returns_value_and_maps_exceptions() {
        let (adapter, transport, _tx) = attached_adapter().await;

        transport
            .respond(json!({"result": {"type": "number", "value": 42}}))
            .await;
        assert_eq!(adapter.evaluate("6 * 7").await.unwrap(), json!(42));

        transport
            .respond(json!({
                "result": {"type": "object"},
                "exceptionDetails": {"text": "Uncaught", "exception": {"description": "ReferenceError: x"}}
            }))
            .await;
        let err = adapter.evaluate("x").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Evaluation);
        assert_eq!(err.hint.as_deref(), Some("ReferenceError: x"));

        let (method, params) = transport.commands().await.pop().unwrap();
        assert_eq!(method, "Runtime.evaluate");
        assert_eq!(params["returnByValue"], true);
        assert_eq!(params["awaitPromise"], true);
    }

    #[tokio::test]
    async fn page_commands_fail_before_attach() {
        let (transport, _tx) = MockTransport::new_pair();
        let adapter =
            CdpAdapter::with_transport(CdpConfig::default(), transport as Arc<dyn CdpTransport>);
        let err = adapter.evaluate("1").await.unwrap_err();
        assert!(err.is_disconnected());
    }

    #[tokio::test]
    async fn detach_event_marks_context_lost() {
        let (adapter, _transport, tx) = attached_adapter().await;
        Arc::clone(&adapter).start().await.expect("start");

        tx.send(TransportEvent {
            method: "Target.detachedFromTarget".into(),
            params: json!({"sessionId": "S1"}),
            session_id: None,
        })
        .await
        .unwrap();

        for _ in 0..50 {
            if adapter.is_detached() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(adapter.is_detached());
        assert!(adapter.evaluate("1").await.unwrap_err().is_disconnected());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn transport_disconnect_during_command_marks_detached() {
        let (adapter, transport, _tx) = attached_adapter().await;
        transport
            .fail(AdapterError::new(AdapterErrorKind::Disconnected).with_hint("closed"))
            .await;
        assert!(adapter.evaluate("1").await.is_err());
        assert!(adapter.is_detached());
    }

    #[test]
    fn host_matching_accepts_subdomains_only() {
        let target = TargetSummary {
            target_id: "t".into(),
            target_type: "page".into(),
            url: "https://submit.example.com/edit".into(),
            title: String::new(),
        };
        assert!(target.matches_host("example.com"));
        assert!(target.matches_host("submit.example.com"));
        assert!(!target.matches_host("ample.com"));
    }
}
