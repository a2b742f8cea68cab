mod script_eval_tests;

use boa_engine::{context::ContextBuilder, Context, Source};

// Minimal DOM stand-in for evaluating generated scripts outside a browser.
pub const DOM_SHIM: &str = r#"
var __calls = [];
var __elements = {};
var __all = {};
function Event(type, init) { this.type = type; this.bubbles = !!(init && init.bubbles); }
function makeElement(tag, props) {
  var el = {
    tagName: tag, value: '', clicks: 0, events: [],
    scrollIntoView: function () { __calls.push('scrollIntoView'); },
    click: function () { this.clicks += 1; __calls.push('click'); },
    focus: function () { __calls.push('focus'); },
    dispatchEvent: function (e) { this.events.push(e.type); return true; }
  };
  if (props) { for (var k in props) { el[k] = props[k]; } }
  return el;
}
var window = {
  scrollX: 0, scrollY: 0,
  location: { href: 'https://dash.local/reports' },
  scrollBy: function (x, y) { this.scrollX += x; this.scrollY += y; },
  scrollTo: function (x, y) { this.scrollX = x; this.scrollY = y; }
};
// Virtual clock: timers only fire when the test drives them.
var __now = 0;
var __timers = [];
Date.now = function () { return __now; };
function setTimeout(fn, ms) {
  __timers.push({ due: __now + (ms || 0), fn: fn });
  return __timers.length;
}
function __runNextTimer() {
  if (__timers.length === 0) { return false; }
  var next = 0;
  for (var i = 1; i < __timers.length; i++) {
    if (__timers[i].due < __timers[next].due) { next = i; }
  }
  var timer = __timers.splice(next, 1)[0];
  if (timer.due > __now) { __now = timer.due; }
  timer.fn();
  return true;
}
var document = {
  title: 'Pricing report',
  body: { innerText: 'Quarterly pricing comparison', scrollHeight: 2400 },
  querySelector: function (sel) { return __elements[sel] || null; },
  querySelectorAll: function (sel) { return __all[sel] || []; }
};
"#;

/// Fresh context with the DOM shim and `setup` already evaluated.
pub fn dom_context(setup: &str) -> Context {
    let mut context = ContextBuilder::new().build().unwrap();
    context.eval(Source::from_bytes(DOM_SHIM)).unwrap();
    if !setup.is_empty() {
        context.eval(Source::from_bytes(setup)).unwrap();
    }
    context
}

/// Evaluates `code` and converts the completion value to JSON.
pub fn eval_json(context: &mut Context, code: &str) -> serde_json::Value {
    let value = context.eval(Source::from_bytes(code)).unwrap();
    value.to_json(context).unwrap()
}

/// Evaluates a script that may yield a promise and returns its settled value.
///
/// Promise jobs and shim timers are run until nothing is left to do.
pub fn eval_settled(context: &mut Context, code: &str) -> serde_json::Value {
    let wrapped = format!(
        "var __settled = null;\nPromise.resolve({code}).then(\
         function (v) {{ __settled = v; }},\
         function (e) {{ __settled = {{ rejected: String(e) }}; }});"
    );
    context.eval(Source::from_bytes(&wrapped)).unwrap();
    for _ in 0..10_000 {
        context.run_jobs();
        if eval_json(context, "__runNextTimer()") != serde_json::Value::Bool(true) {
            break;
        }
    }
    eval_json(context, "__settled")
}

// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webrelay=debug")),
        )
        .with_test_writer()
        .try_init();
}
