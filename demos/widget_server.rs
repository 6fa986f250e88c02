//! A small counter widget served over HTTP.
//!
//! ```text
//! cargo run --example widget_server
//! curl 'http://127.0.0.1:8080/?action=Start'
//! curl 'http://127.0.0.1:8080/?action=Greet&name=ada'
//! curl -H 'X-Requested-With: XMLHttpRequest' 'http://127.0.0.1:8080/?component=counter'
//! ```
//!
//! Set `WIDGET_CACHE_ROOT` to keep cached results on disk instead of in memory,
//! and `RUST_LOG=rcomp=debug` to watch cache hits and misses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use rcomp::cache::FileCacheStore;
use rcomp::component::{
    ActionAllowList, ActionError, ActionOutcome, ComponentConfig, RenderError, RequestHandler,
    ResponseWriter,
};
use rcomp::context::{ComponentIdentity, Params, RequestContext};
use rcomp::server::Server;

/// Minimal "template engine": each page is a function of the result map.
fn render_page(
    page: &str,
    result: &Params,
    out: &mut dyn ResponseWriter,
) -> Result<(), RenderError> {
    let html = match page {
        "template" => format!(
            "<div class=\"counter\">Visits: {}</div>",
            result.get("visits").cloned().unwrap_or(Value::from(0))
        ),
        "greeting" => format!(
            "<p>Hello, {}!</p>",
            result.get("name").and_then(Value::as_str).unwrap_or("stranger")
        ),
        other => {
            return Err(RenderError::PageNotFound {
                page: other.to_owned(),
            });
        }
    };
    out.set_header("Content-Type", "text/html; charset=utf-8");
    out.write(html.as_bytes());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rcomp=info".parse()?))
        .init();

    let visits = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&visits);

    let mut builder = RequestHandler::builder(ComponentIdentity::new("demo", "counter"))
        .config(ComponentConfig::default().with_cache(true, 10))
        .guard(ActionAllowList::new(["Start", "Greet"]))
        .renderer(render_page)
        .action("Start", move |_ctx: &mut RequestContext| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            ActionOutcome::from_value(json!({ "visits": n }))
        })
        .action("Greet", |ctx: &mut RequestContext| -> Result<Params, ActionError> {
            let name = ctx
                .param_str("name")
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| ActionError::new("name is required"))?
                .to_owned();
            ctx.set_template_page("greeting");
            let mut result = Params::new();
            result.insert("name".into(), json!(name));
            Ok(result)
        })
        .action("Admin", |_ctx: &mut RequestContext| {
            ActionOutcome::from_value(json!({"secret": "never served"}))
        });

    if let Ok(root) = std::env::var("WIDGET_CACHE_ROOT") {
        let store = Arc::new(FileCacheStore::new(root));
        let sweeper = Arc::clone(&store);
        tokio::spawn(async move {
            let mut every = tokio::time::interval(Duration::from_secs(60));
            loop {
                every.tick().await;
                let sweeper = Arc::clone(&sweeper);
                match tokio::task::spawn_blocking(move || sweeper.purge_expired()).await {
                    Ok(Ok(removed)) => tracing::info!(removed, "purged expired cache files"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "cache purge failed"),
                    Err(e) => tracing::warn!(error = %e, "cache purge task failed"),
                }
            }
        });
        builder = builder.shared_cache_store(store);
    }

    let server = Server::bind("127.0.0.1:8080").await?;
    server.serve(Arc::new(builder.build())).await?;
    Ok(())
}
