//! [`PageDriver`] backed by the attached CDP page.

use std::sync::Arc;

use action_locator::DomSnapshot;
use async_trait::async_trait;
use cdp_adapter::CdpAdapter;
use serde_json::Value;
use stockmeta_core_types::ElementHandle;
use tracing::debug;

use crate::driver::{KeyStroke, KeyTarget, PageDriver, Setter};
use crate::errors::ActionError;
use crate::scripts;

pub struct CdpPage {
    adapter: Arc<CdpAdapter>,
}

impl CdpPage {
    pub fn new(adapter: Arc<CdpAdapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<CdpAdapter> {
        &self.adapter
    }

    async fn run(&self, handle: Option<ElementHandle>, script: String) -> Result<Value, ActionError> {
        let reply = self.adapter.evaluate(&script).await?;
        interpret(handle, reply)
    }

    async fn on_element(&self, handle: ElementHandle, body: &str) -> Result<Value, ActionError> {
        self.run(Some(handle), scripts::on_element(handle, body)).await
    }
}

/// Turn an action script's `{ok|stale|detached}` reply into a result.
fn interpret(handle: Option<ElementHandle>, reply: Value) -> Result<Value, ActionError> {
    if reply.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(reply.get("value").cloned().unwrap_or(Value::Null));
    }
    if let Some(handle) = handle {
        if let Some(current) = reply.get("stale").and_then(Value::as_u64) {
            return Err(ActionError::StaleHandle { handle, current });
        }
        if reply.get("detached").is_some() {
            return Err(ActionError::ElementGone(handle));
        }
    }
    let message = reply
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected script reply: {reply}"));
    Err(ActionError::Script(message))
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn snapshot(&self) -> Result<DomSnapshot, ActionError> {
        let payload = self.adapter.evaluate(&scripts::collect_snapshot()).await?;
        let snapshot = DomSnapshot::from_value(payload)?;
        debug!(
            generation = snapshot.generation(),
            nodes = snapshot.len(),
            "collected page snapshot"
        );
        Ok(snapshot)
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.on_element(el, scripts::focus()).await.map(drop)
    }

    async fn assign_value(
        &self,
        el: ElementHandle,
        value: &str,
        setter: Setter,
    ) -> Result<(), ActionError> {
        let body = match setter {
            Setter::Prototype => scripts::assign_prototype(value),
            Setter::Property => scripts::assign_property(value),
        };
        self.on_element(el, &body).await.map(drop)
    }

    async fn read_value(&self, el: ElementHandle) -> Result<Option<String>, ActionError> {
        let value = self.on_element(el, scripts::read_value()).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.on_element(el, scripts::click()).await.map(drop)
    }

    async fn pointer_click(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.on_element(el, scripts::pointer_click()).await.map(drop)
    }

    async fn dispatch_key(&self, target: KeyTarget, stroke: KeyStroke) -> Result<(), ActionError> {
        let handle = match target {
            KeyTarget::Element(handle) => Some(handle),
            _ => None,
        };
        self.run(handle, scripts::dispatch_key(target, stroke))
            .await
            .map(drop)
    }

    async fn select_native_option(
        &self,
        el: ElementHandle,
        value: &str,
    ) -> Result<(), ActionError> {
        self.on_element(el, &scripts::select_native(value))
            .await
            .map(drop)
    }

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), ActionError> {
        self.on_element(el, scripts::scroll_into_view()).await.map(drop)
    }

    async fn scroll_page(&self) -> Result<(), ActionError> {
        self.run(None, scripts::scroll_page().to_string()).await.map(drop)
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), ActionError> {
        match self.run(None, scripts::write_clipboard(text)).await {
            Ok(_) => Ok(()),
            Err(ActionError::Script(message)) => Err(ActionError::Clipboard(message)),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockmeta_core_types::NodeId;

    fn handle() -> ElementHandle {
        ElementHandle::new(3, NodeId(9))
    }

    #[test]
    fn ok_reply_yields_value() {
        let value = interpret(Some(handle()), json!({"ok": true, "value": "abc"})).unwrap();
        assert_eq!(value, json!("abc"));
        assert_eq!(interpret(None, json!({"ok": true})).unwrap(), Value::Null);
    }

    #[test]
    fn stale_and_detached_replies_are_distinguished() {
        let err = interpret(Some(handle()), json!({"stale": 12})).unwrap_err();
        assert!(matches!(err, ActionError::StaleHandle { current: 12, .. }));
        let err = interpret(Some(handle()), json!({"detached": true})).unwrap_err();
        assert!(matches!(err, ActionError::ElementGone(_)));
        assert!(err.is_stale());
    }

    #[test]
    fn failed_reply_carries_page_error() {
        let err = interpret(None, json!({"ok": false, "error": "NotAllowedError"})).unwrap_err();
        assert!(matches!(err, ActionError::Script(ref m) if m == "NotAllowedError"));
    }
}
