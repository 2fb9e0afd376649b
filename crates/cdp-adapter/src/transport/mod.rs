//! Raw CDP plumbing under [`crate::CdpAdapter`].
//!
//! [`ChromiumTransport`] owns one websocket link at a time and opens a new
//! one on demand once the previous link has closed.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::CdpConfig;
use crate::error::AdapterError;

mod endpoint;
mod link;

use link::Link;

/// An event as it came off the wire.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Browser-level command, or one routed to a flattened page session.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    /// `None` once the connection is gone.
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

type Connector =
    Arc<dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<Link>, AdapterError>> + Send + Sync>;

pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Mutex<Option<Arc<Link>>>,
    connect: Connector,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let connect: Connector =
            Arc::new(|cfg: CdpConfig| Box::pin(async move { Link::open(&cfg).await.map(Arc::new) }));
        Self {
            cfg,
            link: Mutex::new(None),
            connect,
        }
    }

    async fn link(&self) -> Result<Arc<Link>, AdapterError> {
        let mut current = self.link.lock().await;
        if let Some(link) = current.as_ref().filter(|link| link.is_open()) {
            return Ok(Arc::clone(link));
        }
        let link = (self.connect)(self.cfg.clone()).await?;
        *current = Some(Arc::clone(&link));
        Ok(link)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        // Target lifecycle events only flow once discovery is on.
        self.send_command(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
        )
        .await
        .map(drop)
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.link().await {
            Ok(link) => link.next_event().await,
            Err(err) => {
                warn!(target: "cdp-transport", %err, "no link to read events from");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let link = self.link().await?;
        link.call(target, method, params, self.cfg.deadline()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_transport() -> (ChromiumTransport, Arc<AtomicUsize>, Arc<Mutex<Vec<Arc<Link>>>>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let links = Arc::new(Mutex::new(Vec::new()));
        let connect: Connector = {
            let opened = opened.clone();
            let links = links.clone();
            Arc::new(move |_cfg: CdpConfig| {
                let opened = opened.clone();
                let links = links.clone();
                Box::pin(async move {
                    opened.fetch_add(1, Ordering::SeqCst);
                    let link = Arc::new(Link::detached_stub());
                    links.lock().await.push(Arc::clone(&link));
                    Ok(link)
                })
            })
        };
        let transport = ChromiumTransport {
            cfg: CdpConfig::default(),
            link: Mutex::new(None),
            connect,
        };
        (transport, opened, links)
    }

    #[tokio::test]
    async fn reuses_open_link_and_reconnects_after_close() {
        let (transport, opened, links) = counting_transport();

        let first = transport.link().await.unwrap();
        let cached = transport.link().await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        links.lock().await[0].close();
        let second = transport.link().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn command_on_stub_link_reports_disconnect() {
        let (transport, _opened, _links) = counting_transport();
        let err = transport
            .send_command(CommandTarget::Browser, "Browser.getVersion", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_disconnected());
    }
}
