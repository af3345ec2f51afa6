//! API mount point.
//!
//! Schema and resolver generation live outside this crate: a factory
//! implementing [`ApiMiddleware`] receives the configured paths and returns the
//! routes to mount. [`AuthedItemApi`] is the built-in factory; it answers every
//! operation with the authenticated item so clients can check their identity
//! without a generated schema.

use axum::{
    response::{Html, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::{
    api::{config::ApiPaths, Mount},
    auth::AuthedItem,
};

/// Factory for the routes serving the API.
pub trait ApiMiddleware: Send + Sync {
    /// Build the API routes, claiming every path they serve.
    fn mount(&self, paths: &ApiPaths) -> Mount;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AuthedItemApi;

impl ApiMiddleware for AuthedItemApi {
    fn mount(&self, paths: &ApiPaths) -> Mount {
        let page = explorer_page(&paths.api_path);
        let router = Router::new()
            .route(&paths.api_path, get(authenticated_item).post(authenticated_item))
            .route(
                &paths.graphiql_path,
                get(move || {
                    let page = page.clone();
                    async move { Html(page) }
                }),
            );

        Mount::new(router)
            .claiming(&paths.api_path)
            .claiming(&paths.graphiql_path)
    }
}

// axum handler for the API path
async fn authenticated_item(authed: Option<AuthedItem>) -> Json<Value> {
    let (item, list_key) = match authed {
        Some(authed) => (authed.user, Value::String(authed.authed_list_key)),
        None => (Value::Null, Value::Null),
    };

    Json(json!({
        "data": {
            "authenticatedItem": item,
            "authedListKey": list_key,
        }
    }))
}

fn explorer_page(api_path: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head><meta charset="utf-8"><title>Keystone API explorer</title></head>
  <body>
    <h1>API explorer</h1>
    <p>Send queries to <code>{api_path}</code>.</p>
    <textarea id="query" rows="8" cols="60">{{ authenticatedItem {{ id }} }}</textarea>
    <button onclick="run()">Run</button>
    <pre id="result"></pre>
    <script>
      async function run() {{
        const res = await fetch("{api_path}", {{
          method: "POST",
          credentials: "include",
          headers: {{ "content-type": "application/json" }},
          body: JSON.stringify({{ query: document.getElementById("query").value }}),
        }});
        document.getElementById("result").textContent = JSON.stringify(await res.json(), null, 2);
      }}
    </script>
  </body>
</html>
"#
    )
}
