//! In-page script generation.
//!
//! Every generated script is a self-contained immediately-invoked function
//! expression evaluating to `{ success, message?|error?, ... }`. Only
//! `wait_for_element` (and `execute_script` when the user code yields a
//! promise) produce a promise; the evaluator is expected to await it.
//!
//! User-supplied strings are always embedded as JSON string literals.

use tracing::debug;

use crate::errors::RelayError;
use crate::operation::{Action, OperationDescriptor, ScrollDirection};

pub const ELEMENT_NOT_FOUND: &str = "元素未找到";
pub const WAIT_TIMED_OUT: &str = "等待元素超时";
pub const CLICK_OK: &str = "点击成功";
pub const TYPE_OK: &str = "输入成功";
pub const SCROLL_OK: &str = "滚动成功";
pub const NAVIGATE_OK: &str = "导航成功";
pub const ELEMENT_APPEARED: &str = "元素已出现";

pub const DEFAULT_SCROLL_AMOUNT: i64 = 300;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 100;
pub const PAGE_TEXT_LIMIT: usize = 5000;
const PAGE_ITEM_LIMIT: usize = 100;

// Shared catch clause: every script reports exceptions in the failure shape.
const CATCH_FAILURE: &str =
    "catch (e) { return { success: false, error: String((e && e.message) || e) }; }";

/// Generates the script for a descriptor.
pub fn generate(descriptor: &OperationDescriptor) -> Result<String, RelayError> {
    let action = descriptor.action()?;
    let script = match action {
        Action::Click => click(required(action, "selector", &descriptor.selector)?)?,
        Action::Type => {
            let selector = required(action, "selector", &descriptor.selector)?;
            let text = required(action, "text", &descriptor.text)?;
            let clear = descriptor.options().clear.unwrap_or(true);
            type_text(selector, text, clear)?
        }
        Action::Scroll => {
            let direction = match descriptor.direction.as_deref() {
                Some(d) => d.parse::<ScrollDirection>()?,
                None => ScrollDirection::Down,
            };
            let amount = descriptor.options().amount.unwrap_or(DEFAULT_SCROLL_AMOUNT);
            scroll(direction, amount)?
        }
        Action::Navigate => navigate(required(action, "url", &descriptor.url)?)?,
        Action::GetPageData => page_data(),
        Action::WaitForElement => {
            let selector = required(action, "selector", &descriptor.selector)?;
            let options = descriptor.options();
            wait_for_element(
                selector,
                options.timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS),
                options.interval.unwrap_or(DEFAULT_WAIT_INTERVAL_MS),
            )?
        }
        Action::ExecuteScript => {
            let options = descriptor.options();
            let code = options
                .script
                .as_deref()
                .or(descriptor.text.as_deref())
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| RelayError::MissingField {
                    action: action.to_string(),
                    field: "text",
                })?;
            execute(code)?
        }
        Action::Screenshot => {
            return Err(RelayError::UnsupportedOperation(
                "screenshot cannot be expressed as an in-page script".into(),
            ))
        }
    };

    debug!(
        action = %action,
        script_bytes = script.len(),
        "Generated browser script"
    );
    Ok(script)
}

fn required<'a>(
    action: Action,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, RelayError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RelayError::MissingField {
            action: action.to_string(),
            field,
        })
}

fn literal(value: &str) -> Result<String, RelayError> {
    Ok(serde_json::to_string(value)?)
}

fn element_not_found() -> String {
    format!("{{ success: false, error: \"{ELEMENT_NOT_FOUND}\" }}")
}

pub fn click(selector: &str) -> Result<String, RelayError> {
    let sel = literal(selector)?;
    let missing = element_not_found();
    Ok(format!(
        r#"(() => {{
  try {{
    const el = document.querySelector({sel});
    if (!el) {{
      return {missing};
    }}
    if (typeof el.scrollIntoView === 'function') {{
      el.scrollIntoView({{ block: 'center', inline: 'center' }});
    }}
    el.click();
    return {{ success: true, message: "{CLICK_OK}" }};
  }} {CATCH_FAILURE}
}})()"#
    ))
}

pub fn type_text(selector: &str, text: &str, clear: bool) -> Result<String, RelayError> {
    let sel = literal(selector)?;
    let txt = literal(text)?;
    let missing = element_not_found();
    Ok(format!(
        r#"(() => {{
  try {{
    const el = document.querySelector({sel});
    if (!el) {{
      return {missing};
    }}
    if (typeof el.focus === 'function') {{
      el.focus();
    }}
    const base = {clear} ? '' : (el.value || '');
    el.value = base + {txt};
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ success: true, message: "{TYPE_OK}", value: el.value }};
  }} {CATCH_FAILURE}
}})()"#
    ))
}

/// `amount` is a distance in pixels; the direction picks its sign.
pub fn scroll(direction: ScrollDirection, amount: i64) -> Result<String, RelayError> {
    if amount < 0 {
        return Err(RelayError::InvalidArgument(format!(
            "scroll amount must not be negative, got {amount}"
        )));
    }
    let call = match direction {
        ScrollDirection::Down => format!("window.scrollBy(0, {amount})"),
        ScrollDirection::Up => format!("window.scrollBy(0, {})", -amount),
        ScrollDirection::Right => format!("window.scrollBy({amount}, 0)"),
        ScrollDirection::Left => format!("window.scrollBy({}, 0)", -amount),
        ScrollDirection::Top => "window.scrollTo(0, 0)".to_string(),
        ScrollDirection::Bottom => "window.scrollTo(0, document.body.scrollHeight)".to_string(),
    };
    Ok(format!(
        r#"(() => {{
  try {{
    {call};
    return {{ success: true, message: "{SCROLL_OK}", direction: "{dir}" }};
  }} {CATCH_FAILURE}
}})()"#,
        dir = direction.as_str()
    ))
}

pub fn navigate(url: &str) -> Result<String, RelayError> {
    let url = literal(url)?;
    Ok(format!(
        r#"(() => {{
  try {{
    window.location.href = {url};
    return {{ success: true, message: "{NAVIGATE_OK}", url: {url} }};
  }} {CATCH_FAILURE}
}})()"#
    ))
}

pub fn page_data() -> String {
    format!(
        r#"(() => {{
  try {{
    const text = (document.body && document.body.innerText) || '';
    const links = Array.from(document.querySelectorAll('a[href]'))
      .slice(0, {PAGE_ITEM_LIMIT})
      .map(a => ({{ text: (a.innerText || '').trim(), href: a.href }}));
    const inputs = Array.from(document.querySelectorAll('input, textarea, select'))
      .slice(0, {PAGE_ITEM_LIMIT})
      .map(el => ({{
        tag: String(el.tagName || '').toLowerCase(),
        type: el.type || null,
        name: el.name || null,
        id: el.id || null
      }}));
    return {{
      success: true,
      title: document.title,
      url: window.location.href,
      text: text.slice(0, {PAGE_TEXT_LIMIT}),
      links: links,
      inputs: inputs
    }};
  }} {CATCH_FAILURE}
}})()"#
    )
}

pub fn wait_for_element(
    selector: &str,
    timeout_ms: u64,
    interval_ms: u64,
) -> Result<String, RelayError> {
    let sel = literal(selector)?;
    let interval_ms = interval_ms.max(1);
    Ok(format!(
        r#"(async () => {{
  try {{
    const deadline = Date.now() + {timeout_ms};
    for (;;) {{
      if (document.querySelector({sel})) {{
        return {{ success: true, message: "{ELEMENT_APPEARED}" }};
      }}
      if (Date.now() >= deadline) {{
        return {{ success: false, error: "{WAIT_TIMED_OUT}" }};
      }}
      await new Promise(resolve => setTimeout(resolve, {interval_ms}));
    }}
  }} {CATCH_FAILURE}
}})()"#
    ))
}

pub fn execute(code: &str) -> Result<String, RelayError> {
    let code = literal(code)?;
    Ok(format!(
        r#"(() => {{
  const fail = e => ({{ success: false, error: String((e && e.message) || e) }});
  const done = v => ({{ success: true, result: v === undefined ? null : v }});
  try {{
    const result = (0, eval)({code});
    if (result && typeof result.then === 'function') {{
      return result.then(done, fail);
    }}
    return done(result);
  }} catch (e) {{
    return fail(e);
  }}
}})()"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationOptions;

    fn descriptor(raw: serde_json::Value) -> OperationDescriptor {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn every_scriptable_action_yields_a_script() {
        let payloads = [
            serde_json::json!({ "action": "click", "selector": "#submit" }),
            serde_json::json!({ "action": "type", "selector": "#q", "text": "hello" }),
            serde_json::json!({ "action": "scroll", "direction": "down" }),
            serde_json::json!({ "action": "navigate", "url": "https://example.com" }),
            serde_json::json!({ "action": "get_page_data" }),
            serde_json::json!({ "action": "wait_for_element", "selector": ".ready" }),
            serde_json::json!({ "action": "execute_script", "text": "document.title" }),
        ];
        for payload in payloads {
            let script = generate(&descriptor(payload.clone()))
                .unwrap_or_else(|e| panic!("{payload} failed: {e}"));
            assert!(script.starts_with("(") && script.ends_with(")()"), "{script}");
        }
    }

    #[test]
    fn unknown_action_fails() {
        let err = generate(&descriptor(serde_json::json!({ "action": "hover" }))).unwrap_err();
        assert!(matches!(err, RelayError::UnknownAction(_)));
    }

    #[test]
    fn screenshot_is_not_scriptable() {
        let err = generate(&OperationDescriptor::new(Action::Screenshot)).unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedOperation(_)));
    }

    #[test]
    fn scroll_down_scrolls_by_300() {
        let script = generate(&descriptor(
            serde_json::json!({ "action": "scroll", "direction": "down" }),
        ))
        .unwrap();
        assert!(script.contains("window.scrollBy(0, 300)"));
    }

    #[test]
    fn scroll_honours_amount_and_direction() {
        let d = OperationDescriptor::new(Action::Scroll)
            .with_direction("left")
            .with_options(OperationOptions {
                amount: Some(120),
                ..Default::default()
            });
        assert!(generate(&d).unwrap().contains("window.scrollBy(-120, 0)"));

        let bad = OperationDescriptor::new(Action::Scroll).with_direction("diagonal");
        assert!(matches!(generate(&bad), Err(RelayError::InvalidArgument(_))));
    }

    #[test]
    fn negative_scroll_amount_is_rejected() {
        for amount in [-1, i64::MIN] {
            let d = OperationDescriptor::new(Action::Scroll)
                .with_direction("up")
                .with_options(OperationOptions {
                    amount: Some(amount),
                    ..Default::default()
                });
            assert!(matches!(generate(&d), Err(RelayError::InvalidArgument(_))));
        }

        let d = descriptor(serde_json::json!({
            "action": "scroll",
            "direction": "up",
            "options": { "amount": i64::MAX }
        }));
        assert!(generate(&d)
            .unwrap()
            .contains(&format!("window.scrollBy(0, {})", -i64::MAX)));
    }

    #[test]
    fn missing_selector_is_reported() {
        let err = generate(&OperationDescriptor::new(Action::Click)).unwrap_err();
        assert!(matches!(err, RelayError::MissingField { field: "selector", .. }));

        let err = generate(&OperationDescriptor::new(Action::Navigate)).unwrap_err();
        assert!(matches!(err, RelayError::MissingField { field: "url", .. }));
    }

    #[test]
    fn selectors_are_embedded_as_string_literals() {
        let script = click(r#"a[title="x"]'); alert(1); ('"#).unwrap();
        assert!(script.contains(r#"document.querySelector("a[title=\"x\"]'); alert(1); ('")"#));
    }

    #[test]
    fn wait_uses_supplied_timeout() {
        let d = OperationDescriptor::new(Action::WaitForElement)
            .with_selector("#late")
            .with_options(OperationOptions {
                timeout: Some(1500),
                interval: Some(50),
                ..Default::default()
            });
        let script = generate(&d).unwrap();
        assert!(script.starts_with("(async () =>"));
        assert!(script.contains("Date.now() + 1500"));
        assert!(script.contains("setTimeout(resolve, 50)"));
    }

    #[test]
    fn execute_script_prefers_option_code() {
        let d = OperationDescriptor::new(Action::ExecuteScript)
            .with_text("ignored()")
            .with_options(OperationOptions {
                script: Some("1 + 1".into()),
                ..Default::default()
            });
        let script = generate(&d).unwrap();
        assert!(script.contains(r#"(0, eval)("1 + 1")"#));

        let empty = OperationDescriptor::new(Action::ExecuteScript).with_text("   ");
        assert!(matches!(generate(&empty), Err(RelayError::MissingField { .. })));
    }
}
