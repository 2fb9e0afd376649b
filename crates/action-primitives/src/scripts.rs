//! JavaScript injected through `Runtime.evaluate`.
//!
//! The collector keeps element references for the last few generations in
//! `window.__stockmeta`; action scripts resolve `(generation, index)` against
//! it and report staleness instead of throwing.

use serde_json::Value;
use stockmeta_core_types::ElementHandle;

use crate::driver::{Key, KeyStroke, KeyTarget};

/// Generations kept alive page-side.
pub const RETAINED_GENERATIONS: u64 = 8;

/// Hard cap on collected nodes.
pub const MAX_NODES: usize = 15_000;

pub fn collect_snapshot() -> String {
    format!(
        r#"(() => {{
  const ATTRS = ['id','name','class','type','role','placeholder','aria-label','aria-selected',
    'data-test-id','data-testid','data-icon','title','style','src','for'];
  const LIMIT = {limit};
  const KEEP = {keep};
  const state = window.__stockmeta || (window.__stockmeta = {{ gen: 0, byGen: new Map() }});
  const gen = state.gen + 1;
  const refs = [];
  const nodes = [];
  const visible = (el) => typeof el.checkVisibility === 'function'
    ? el.checkVisibility({{ checkVisibilityCSS: true }})
    : el.getClientRects().length > 0;
  const textRuns = (el) => {{
    const runs = [];
    if (el.tagName === 'SCRIPT' || el.tagName === 'STYLE') return runs;
    let slot = 0;
    for (const child of el.childNodes) {{
      if (child.nodeType === 1) slot++;
      else if (child.nodeType === 3) {{
        const text = child.textContent.replace(/\s+/g, ' ').trim();
        if (text) runs.push({{ slot, text }});
      }}
    }}
    return runs;
  }};
  const stack = [[document.documentElement, null]];
  while (stack.length && nodes.length < LIMIT) {{
    const [el, parent] = stack.pop();
    const index = nodes.length;
    const attrs = {{}};
    for (const name of ATTRS) {{
      const v = el.getAttribute(name);
      if (v !== null) attrs[name] = name === 'src' && typeof el.src === 'string' ? el.src : v;
    }}
    const r = el.getBoundingClientRect();
    const runs = textRuns(el);
    const node = {{
      parent, tag: el.tagName.toLowerCase(), attrs, text: runs.map(run => run.text).join(' '), runs,
      rect: {{ x: r.left, y: r.top, width: r.width, height: r.height }},
      visible: visible(el),
    }};
    if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT') node.value = el.value;
    if (el.tagName === 'INPUT' && (el.type === 'checkbox' || el.type === 'radio')) node.checked = el.checked;
    if (el.tagName === 'SELECT') node.options = Array.from(el.options).map(o => ({{ text: o.text, value: o.value }}));
    refs.push(el);
    nodes.push(node);
    const children = el.children;
    for (let i = children.length - 1; i >= 0; i--) stack.push([children[i], index]);
  }}
  state.gen = gen;
  state.byGen.set(gen, refs);
  for (const old of Array.from(state.byGen.keys())) {{
    if (old <= gen - KEEP) state.byGen.delete(old);
  }}
  return {{ generation: gen, nodes }};
}})()"#,
        limit = MAX_NODES,
        keep = RETAINED_GENERATIONS,
    )
}

/// Wraps `body` so it runs with `el` bound to the handle's element.
pub fn on_element(handle: ElementHandle, body: &str) -> String {
    format!(
        r#"(() => {{
  const state = window.__stockmeta;
  const refs = state && state.byGen.get({generation});
  if (!refs) return {{ stale: state ? state.gen : 0 }};
  const el = refs[{index}];
  if (!el || !el.isConnected) return {{ detached: true }};
  {body}
}})()"#,
        generation = handle.generation,
        index = handle.node.0,
        body = body,
    )
}

pub fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

pub fn focus() -> &'static str {
    "el.focus(); return { ok: true };"
}

pub fn assign_prototype(value: &str) -> String {
    format!(
        r#"const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
    : (el instanceof HTMLInputElement ? HTMLInputElement.prototype : null);
  const desc = proto ? Object.getOwnPropertyDescriptor(proto, 'value') : null;
  if (desc && desc.set) desc.set.call(el, {value}); else el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};"#,
        value = literal(value)
    )
}

pub fn assign_property(value: &str) -> String {
    format!(
        r#"el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};"#,
        value = literal(value)
    )
}

pub fn read_value() -> &'static str {
    "return { ok: true, value: typeof el.value === 'string' ? el.value : null };"
}

pub fn click() -> &'static str {
    "el.click(); return { ok: true };"
}

pub fn pointer_click() -> &'static str {
    r#"for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup', 'click']) {
    el.dispatchEvent(new MouseEvent(type, { view: window, bubbles: true, cancelable: true, buttons: 1 }));
  }
  return { ok: true };"#
}

pub fn select_native(value: &str) -> String {
    format!(
        r#"el.value = {value};
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};"#,
        value = literal(value)
    )
}

pub fn scroll_into_view() -> &'static str {
    "el.scrollIntoView({ block: 'center', inline: 'nearest' }); return { ok: true };"
}

pub fn scroll_page() -> &'static str {
    "(() => { window.scrollTo(0, document.body ? document.body.scrollHeight : 0); return { ok: true }; })()"
}

pub fn write_clipboard(text: &str) -> String {
    format!(
        "navigator.clipboard.writeText({text}).then(() => ({{ ok: true }}), (e) => ({{ ok: false, error: String(e) }}))",
        text = literal(text)
    )
}

fn key_events(stroke: KeyStroke) -> (Key, &'static [&'static str]) {
    match stroke {
        KeyStroke::Down(key) => (key, &["keydown"]),
        KeyStroke::Press(key) => (key, &["keydown", "keyup"]),
    }
}

/// Statements dispatching `stroke` on the JS expression list `targets`.
fn dispatch_key_body(targets: &str, stroke: KeyStroke) -> String {
    let (key, types) = key_events(stroke);
    let (name, code, key_code) = key.dom_codes();
    let types = types
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"for (const type of [{types}]) {{
    const evt = new KeyboardEvent(type, {{ key: '{name}', code: '{code}', keyCode: {key_code}, which: {key_code}, bubbles: true, cancelable: true, view: window }});
    for (const target of [{targets}]) if (target) target.dispatchEvent(evt);
  }}
  return {{ ok: true }};"#
    )
}

pub fn dispatch_key(target: KeyTarget, stroke: KeyStroke) -> String {
    match target {
        KeyTarget::Document => format!("(() => {{ {} }})()", dispatch_key_body("document", stroke)),
        KeyTarget::BodyAndRoot => format!(
            "(() => {{ {} }})()",
            dispatch_key_body("document.body, document.documentElement", stroke)
        ),
        KeyTarget::Element(handle) => on_element(handle, &dispatch_key_body("el", stroke)),
    }
}
