//! End-to-end behavior of a component: resolver, guard, cache, dispatcher,
//! and responder together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use rcomp::cache::{CacheStore, ManualClock, MemoryCacheStore, TEMPLATE_PAGE_KEY};
use rcomp::component::{
    ActionAllowList, ActionError, ActionOutcome, BufferedWriter, Completion, ComponentConfig,
    RenderError, RequestHandler, ResponseWriter, ResultFormat, TemplateRenderer,
};
use rcomp::context::{ComponentIdentity, Params, RequestContext};
use rcomp::http::{Request, StatusCode};

fn request(raw: &str) -> Request {
    Request::parse(raw.as_bytes()).unwrap().0
}

fn get(query: &str) -> Request {
    request(&format!("GET /widget{query} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
}

fn ajax_get(query: &str) -> Request {
    request(&format!(
        "GET /widget{query} HTTP/1.1\r\nHost: localhost\r\nX-Requested-With: XMLHttpRequest\r\n\r\n"
    ))
}

/// Renderer that records every page it renders and writes `page:json`.
#[derive(Clone, Default)]
struct Pages {
    rendered: Arc<Mutex<Vec<String>>>,
}

impl Pages {
    fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

impl TemplateRenderer for Pages {
    fn render(
        &self,
        page: &str,
        result: &Params,
        out: &mut dyn ResponseWriter,
    ) -> Result<(), RenderError> {
        self.rendered.lock().unwrap().push(page.to_owned());
        let mut visible = result.clone();
        visible.remove(TEMPLATE_PAGE_KEY);
        out.write(format!("{page}:{}", Value::Object(visible)).as_bytes());
        Ok(())
    }
}

/// A `Start` action that counts its invocations and returns `{"count": n}`.
fn counting_widget(
    config: ComponentConfig,
    store: Arc<dyn CacheStore>,
) -> (RequestHandler, Arc<AtomicUsize>, Pages) {
    let calls = Arc::new(AtomicUsize::new(0));
    let pages = Pages::default();
    let counter = Arc::clone(&calls);
    let handler = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
        .config(config)
        .shared_cache_store(store)
        .renderer(pages.clone())
        .action("Start", move |_ctx: &mut RequestContext| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            ActionOutcome::from_value(json!({ "count": n }))
        })
        .action("Nothing", |_ctx: &mut RequestContext| ActionOutcome::Empty)
        .action("List", |ctx: &mut RequestContext| {
            ctx.set_template_page("list");
            ActionOutcome::from_value(json!({"items": ["a", "b"]}))
        })
        .build();
    (handler, calls, pages)
}

#[test]
fn default_scenario_renders_start_with_default_template() {
    let (handler, calls, pages) =
        counting_widget(ComponentConfig::default(), Arc::new(MemoryCacheStore::new()));

    let ctx = handler.context_for(&get(""));
    assert_eq!(ctx.identity().to_string(), "yokel:widget");
    assert_eq!(ctx.action(), "Start");

    let mut out = BufferedWriter::new();
    let done = handler.execute(&get(""), &mut out).unwrap();

    assert_eq!(done, Completion::Continue);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(pages.rendered(), vec!["template"]);
    assert_eq!(out.body(), br#"template:{"count":1}"#);
    assert!(!out.is_finalized());
}

#[test]
fn disabled_cache_computes_every_time_without_storing() {
    let store = Arc::new(MemoryCacheStore::new());
    let (handler, calls, _) = counting_widget(
        ComponentConfig::default().with_format(ResultFormat::Json),
        store.clone(),
    );

    for expected in 1..=3 {
        let mut out = BufferedWriter::new();
        handler.execute(&get(""), &mut out).unwrap();
        let body: Value = serde_json::from_slice(out.body()).unwrap();
        assert_eq!(body, json!({ "count": expected }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(store.is_empty());
}

#[test]
fn cached_result_is_served_within_ttl_and_recomputed_after() {
    let clock = ManualClock::new();
    let store = Arc::new(MemoryCacheStore::with_clock(clock.clone()));
    let (handler, calls, _) = counting_widget(
        ComponentConfig::default()
            .with_cache(true, 60)
            .with_format(ResultFormat::Json),
        store,
    );

    let body = |handler: &RequestHandler| {
        let mut out = BufferedWriter::new();
        handler.execute(&get("?page=1"), &mut out).unwrap();
        serde_json::from_slice::<Value>(out.body()).unwrap()
    };

    assert_eq!(body(&handler), json!({"count": 1}));
    clock.advance(Duration::from_secs(30));
    assert_eq!(body(&handler), json!({"count": 1}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(31));
    assert_eq!(body(&handler), json!({"count": 2}));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn different_params_get_different_entries() {
    let (handler, calls, _) = counting_widget(
        ComponentConfig::default().with_cache(true, 60),
        Arc::new(MemoryCacheStore::new()),
    );

    handler.execute(&get("?page=1"), &mut BufferedWriter::new()).unwrap();
    handler.execute(&get("?page=2"), &mut BufferedWriter::new()).unwrap();
    handler.execute(&get("?page=1"), &mut BufferedWriter::new()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_results_are_never_stored() {
    let store = Arc::new(MemoryCacheStore::new());
    let (handler, _, pages) = counting_widget(
        ComponentConfig::default().with_cache(true, 60),
        store.clone(),
    );

    handler.execute(&get("?action=Nothing"), &mut BufferedWriter::new()).unwrap();
    assert!(store.is_empty());

    // unknown actions are empty too
    let mut out = BufferedWriter::new();
    handler.execute(&get("?action=Missing"), &mut out).unwrap();
    assert!(store.is_empty());
    assert_eq!(out.body(), b"template:{}");
    assert_eq!(pages.rendered(), vec!["template", "template"]);
}

#[test]
fn empty_result_recomputes_on_next_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
        .config(ComponentConfig::default().with_cache(true, 60).with_format(ResultFormat::Json))
        .action("Start", move |_ctx: &mut RequestContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            ActionOutcome::Empty
        })
        .build();

    for _ in 0..2 {
        let mut out = BufferedWriter::new();
        handler.execute(&get(""), &mut out).unwrap();
        assert_eq!(out.body(), b"{}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn cached_template_page_is_restored() {
    let (handler, calls, pages) = counting_widget(
        ComponentConfig::default().with_cache(true, 60),
        Arc::new(MemoryCacheStore::new()),
    );

    let mut first = BufferedWriter::new();
    handler.execute(&get("?action=List"), &mut first).unwrap();
    let mut second = BufferedWriter::new();
    handler.execute(&get("?action=List"), &mut second).unwrap();

    assert_eq!(pages.rendered(), vec!["list", "list"]);
    assert_eq!(first.body(), second.body());
    assert_eq!(second.body(), br#"list:{"items":["a","b"]}"#);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ajax_html_resets_buffer_and_finishes() {
    let (handler, _, _) =
        counting_widget(ComponentConfig::default(), Arc::new(MemoryCacheStore::new()));

    let mut out = BufferedWriter::new();
    out.write(b"<html><body>host page so far");

    let done = handler
        .execute(&ajax_get("?component=widget"), &mut out)
        .unwrap();

    assert_eq!(done, Completion::Finished);
    assert_eq!(out.resets(), 1);
    assert!(out.is_flushed());
    assert!(out.is_finalized());
    assert_eq!(out.body(), br#"template:{"count":1}"#);

    // nothing the host writes afterwards reaches the response
    out.write(b"</body></html>");
    assert_eq!(out.body(), br#"template:{"count":1}"#);
}

#[test]
fn ajax_header_for_another_component_is_a_fragment() {
    let (handler, _, _) =
        counting_widget(ComponentConfig::default(), Arc::new(MemoryCacheStore::new()));

    let mut out = BufferedWriter::new();
    out.write(b"<header>");
    let done = handler
        .execute(&ajax_get("?component=gadget"), &mut out)
        .unwrap();

    assert_eq!(done, Completion::Continue);
    assert_eq!(out.resets(), 0);
    assert_eq!(out.body(), br#"<header>template:{"count":1}"#);
}

#[test]
fn json_is_always_the_whole_response() {
    for req in [get(""), ajax_get("?component=widget")] {
        let (handler, _, pages) = counting_widget(
            ComponentConfig::default().with_format(ResultFormat::Json),
            Arc::new(MemoryCacheStore::new()),
        );

        let mut out = BufferedWriter::new();
        out.write(b"<header>");
        let done = handler.execute(&req, &mut out).unwrap();

        assert_eq!(done, Completion::Finished);
        assert_eq!(out.resets(), 1);
        assert!(out.is_finalized());
        assert!(pages.rendered().is_empty());
        assert_eq!(
            out.headers().get("content-type"),
            Some("application/json; charset=utf-8")
        );
        let body: Value = serde_json::from_slice(out.body()).unwrap();
        assert_eq!(body, json!({"count": 1}));
    }
}

#[test]
fn json_from_cache_matches_computed_body() {
    let (handler, _, _) = counting_widget(
        ComponentConfig::default().with_cache(true, 60).with_format(ResultFormat::Json),
        Arc::new(MemoryCacheStore::new()),
    );

    let mut first = BufferedWriter::new();
    handler.execute(&get("?action=List"), &mut first).unwrap();
    let mut second = BufferedWriter::new();
    handler.execute(&get("?action=List"), &mut second).unwrap();

    assert_eq!(first.body(), br#"{"items":["a","b"]}"#);
    assert_eq!(first.body(), second.body());
}

#[test]
fn denied_action_gets_forbidden_response() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
        .config(ComponentConfig::default().with_format(ResultFormat::Json))
        .guard(ActionAllowList::new(["List"]))
        .action("Start", move |_ctx: &mut RequestContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            ActionOutcome::from_value(json!({"secret": true}))
        })
        .build();

    let response = handler.respond(&get(""));
    assert_eq!(response.status(), StatusCode::Forbidden);
    let body: Value = serde_json::from_slice(response.content()).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn action_error_renders_error_payload() {
    let store = Arc::new(MemoryCacheStore::new());
    let handler = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
        .config(ComponentConfig::default().with_cache(true, 60).with_format(ResultFormat::Json))
        .shared_cache_store(store.clone())
        .action("Start", |_ctx: &mut RequestContext| -> Result<Params, ActionError> {
            Err(ActionError::new("backend unavailable"))
        })
        .build();

    let response = handler.respond(&get(""));
    assert_eq!(response.status(), StatusCode::InternalServerError);
    let body: Value = serde_json::from_slice(response.content()).unwrap();
    assert_eq!(body, json!({"status": "error", "message": "backend unavailable"}));
    assert!(store.is_empty());
}

#[test]
fn form_posted_action_is_used() {
    let (handler, _, pages) =
        counting_widget(ComponentConfig::default(), Arc::new(MemoryCacheStore::new()));
    let req = request(
        "POST /widget HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\
Content-Length: 11\r\n\r\naction=List",
    );

    let response = handler.respond(&req);
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(pages.rendered(), vec!["list"]);
}

#[test]
fn huge_cache_time_still_caches() {
    let (handler, calls, _) = counting_widget(
        ComponentConfig::default()
            .with_cache(true, u64::MAX)
            .with_format(ResultFormat::Json),
        Arc::new(MemoryCacheStore::new()),
    );

    for _ in 0..2 {
        let mut out = BufferedWriter::new();
        handler.execute(&get(""), &mut out).unwrap();
        let body: Value = serde_json::from_slice(out.body()).unwrap();
        assert_eq!(body, json!({"count": 1}));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn distinct_query_strings_do_not_accumulate_expired_entries() {
    let clock = ManualClock::new();
    let store = Arc::new(MemoryCacheStore::with_clock(clock.clone()));
    let (handler, _, _) = counting_widget(
        ComponentConfig::default()
            .with_cache(true, 1)
            .with_format(ResultFormat::Json),
        store.clone(),
    );

    for i in 0..200 {
        handler
            .execute(&get(&format!("?junk={i}")), &mut BufferedWriter::new())
            .unwrap();
    }
    assert_eq!(store.len(), 200);

    clock.advance(Duration::from_secs(2));
    handler
        .execute(&get("?junk=last"), &mut BufferedWriter::new())
        .unwrap();
    assert_eq!(store.len(), 1);
}
