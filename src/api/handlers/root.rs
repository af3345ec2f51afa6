use axum::response::Html;

const LANDING: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Keystone</title>
    <style>
      body { font-family: system-ui, sans-serif; margin: 4rem auto; max-width: 36rem; color: #222; }
      a { color: #1385e5; }
    </style>
  </head>
  <body>
    <h1>Welcome to Keystone</h1>
    <p>The server is running. Sign in to the <a href="/admin">admin UI</a> to manage content.</p>
  </body>
</html>
"#;

// axum handler for /
pub async fn root() -> Html<&'static str> {
    Html(LANDING)
}
