use super::{dom_context, eval_json, eval_settled};
use crate::operation::{Action, OperationDescriptor, OperationOptions};
use crate::script::{self, ELEMENT_APPEARED, ELEMENT_NOT_FOUND, WAIT_TIMED_OUT};

fn generate(descriptor: OperationDescriptor) -> String {
    script::generate(&descriptor).unwrap()
}

#[test]
fn click_on_missing_element_reports_not_found() {
    let script = generate(OperationDescriptor::new(Action::Click).with_selector("#submit"));
    let mut ctx = dom_context("");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": false, "error": ELEMENT_NOT_FOUND })
    );
}

#[test]
fn click_hits_existing_element() {
    let script = generate(OperationDescriptor::new(Action::Click).with_selector("#submit"));
    let mut ctx = dom_context("__elements['#submit'] = makeElement('BUTTON');");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(eval_json(&mut ctx, "__elements['#submit'].clicks").as_f64(), Some(1.0));
    assert_eq!(
        eval_json(&mut ctx, "__calls"),
        serde_json::json!(["scrollIntoView", "click"])
    );
}

#[test]
fn scroll_down_moves_300_pixels() {
    let script = generate(OperationDescriptor::new(Action::Scroll).with_direction("down"));
    let mut ctx = dom_context("");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(eval_json(&mut ctx, "window.scrollY").as_f64(), Some(300.0));
    assert_eq!(eval_json(&mut ctx, "window.scrollX").as_f64(), Some(0.0));
}

#[test]
fn scroll_bottom_uses_document_height() {
    let script = generate(OperationDescriptor::new(Action::Scroll).with_direction("bottom"));
    let mut ctx = dom_context("window.scrollY = 10;");
    eval_json(&mut ctx, &script);
    assert_eq!(eval_json(&mut ctx, "window.scrollY").as_f64(), Some(2400.0));
}

#[test]
fn type_replaces_value_and_fires_events() {
    let script = generate(
        OperationDescriptor::new(Action::Type)
            .with_selector("input[name=q]")
            .with_text("季度报表"),
    );
    let mut ctx = dom_context("__elements['input[name=q]'] = makeElement('INPUT', { value: 'old' });");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(result["value"], "季度报表");
    assert_eq!(
        eval_json(&mut ctx, "__elements['input[name=q]'].events"),
        serde_json::json!(["input", "change"])
    );
}

#[test]
fn navigate_sets_location() {
    let script =
        generate(OperationDescriptor::new(Action::Navigate).with_url("https://dash.local/mail"));
    let mut ctx = dom_context("");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(
        eval_json(&mut ctx, "window.location.href"),
        "https://dash.local/mail"
    );
}

#[test]
fn page_data_collects_title_text_and_links() {
    let script = generate(OperationDescriptor::new(Action::GetPageData));
    let mut ctx = dom_context(
        "__all['a[href]'] = [makeElement('A', { innerText: ' Mail stats ', href: '/mail' })];
         __all['input, textarea, select'] = [makeElement('INPUT', { type: 'text', name: 'q' })];",
    );
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(result["title"], "Pricing report");
    assert_eq!(result["url"], "https://dash.local/reports");
    assert_eq!(result["text"], "Quarterly pricing comparison");
    assert_eq!(result["links"][0]["text"], "Mail stats");
    assert_eq!(result["inputs"][0]["tag"], "input");
    assert!(result["inputs"][0]["id"].is_null());
}

#[test]
fn execute_script_returns_completion_value() {
    let script = generate(OperationDescriptor::new(Action::ExecuteScript).with_text("document.title"));
    let mut ctx = dom_context("");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": true, "result": "Pricing report" })
    );
}

#[test]
fn execute_script_catches_exceptions() {
    let script = generate(
        OperationDescriptor::new(Action::ExecuteScript).with_text("throw new Error('boom')"),
    );
    let mut ctx = dom_context("");
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "boom");
}

#[test]
fn exceptions_inside_actions_use_failure_shape() {
    let script = generate(OperationDescriptor::new(Action::Click).with_selector("#broken"));
    let mut ctx = dom_context(
        "__elements['#broken'] = makeElement('BUTTON', { click: function () { throw new Error('detached'); } });",
    );
    let result = eval_json(&mut ctx, &script);
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "detached");
}

fn wait_for(selector: &str, timeout: u64, interval: u64) -> String {
    generate(
        OperationDescriptor::new(Action::WaitForElement)
            .with_selector(selector)
            .with_options(OperationOptions {
                timeout: Some(timeout),
                interval: Some(interval),
                ..Default::default()
            }),
    )
}

#[test]
fn wait_for_element_sees_late_element() {
    let script = wait_for("#late", 1000, 100);
    let mut ctx =
        dom_context("setTimeout(function () { __elements['#late'] = makeElement('DIV'); }, 250);");
    let result = eval_settled(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": true, "message": ELEMENT_APPEARED })
    );
    let elapsed = eval_json(&mut ctx, "Date.now()").as_f64().unwrap();
    assert!((250.0..1000.0).contains(&elapsed), "{elapsed}");
}

#[test]
fn wait_for_element_gives_up_after_timeout() {
    let script = wait_for("#never", 300, 100);
    let mut ctx = dom_context("");
    let result = eval_settled(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": false, "error": WAIT_TIMED_OUT })
    );
    assert!(eval_json(&mut ctx, "Date.now()").as_f64().unwrap() >= 300.0);
}

#[test]
fn execute_script_awaits_resolved_promise() {
    let script = generate(
        OperationDescriptor::new(Action::ExecuteScript)
            .with_text("Promise.resolve(41).then(function (v) { return v + 1; })"),
    );
    let mut ctx = dom_context("");
    let result = eval_settled(&mut ctx, &script);
    assert_eq!(result["success"], true);
    assert_eq!(result["result"].as_f64(), Some(42.0));
}

#[test]
fn execute_script_awaits_timer_backed_promise() {
    let script = generate(OperationDescriptor::new(Action::ExecuteScript).with_text(
        "new Promise(function (resolve) { setTimeout(function () { resolve(document.title); }, 50); })",
    ));
    let mut ctx = dom_context("");
    let result = eval_settled(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": true, "result": "Pricing report" })
    );
}

#[test]
fn execute_script_reports_rejected_promise() {
    let script = generate(
        OperationDescriptor::new(Action::ExecuteScript)
            .with_text("Promise.reject(new Error('quota exceeded'))"),
    );
    let mut ctx = dom_context("");
    let result = eval_settled(&mut ctx, &script);
    assert_eq!(
        result,
        serde_json::json!({ "success": false, "error": "quota exceeded" })
    );
}
