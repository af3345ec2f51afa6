use keystone::{
    api::{handlers::admin::AdminApp, WebServer},
    auth::{hash_secret, AuthStrategy, PasswordAuthStrategy},
    lists::{List, Lists, MemoryAdapter},
    session::{CookiePolicy, CookieSigner, MemoryStore, SessionConfig},
};
use reqwest::{header, Client, StatusCode};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::{sync::oneshot, task::JoinHandle};

struct Running {
    base: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<keystone::Result<()>>,
}

impl Running {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let result = self.handle.await.expect("server task");
        assert!(result.is_ok(), "server error: {result:?}");
    }
}

async fn spawn(server: WebServer) -> Running {
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let server = server.bind(addr).await.expect("bind");
    let base = format!("http://127.0.0.1:{}", server.port());
    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(async move {
        let _ = rx.await;
    }));
    Running {
        base,
        shutdown,
        handle,
    }
}

async fn authed_server() -> WebServer {
    let adapter = MemoryAdapter::new();
    adapter
        .insert(json!({
            "id": "1",
            "email": "ada@example.com",
            "password": hash_secret("correct horse").expect("hash"),
        }))
        .await;
    let users = List::new("User", Arc::new(adapter)).with_hidden_fields(["password"]);
    let mut lists = Lists::new();
    lists.insert(users.clone());

    let strategy: Arc<dyn AuthStrategy> = Arc::new(PasswordAuthStrategy::new(users));
    let signer = CookieSigner::new([SecretString::from("integration secret".to_string())])
        .expect("signer");
    let sessions = SessionConfig::new(Arc::new(MemoryStore::new()), signer, CookiePolicy::default());

    WebServer::new(lists)
        .with_sessions(sessions)
        .with_auth_strategy(strategy.clone())
        .with_admin_ui(Arc::new(AdminApp::default().with_auth_strategy(strategy)))
}

async fn whoami(client: &Client, base: &str, auth: Option<(header::HeaderName, &str)>) -> Value {
    let mut request = client.post(format!("{base}/admin/api")).json(&json!({
        "query": "{ authenticatedItem { id } }"
    }));
    if let Some((name, value)) = auth {
        request = request.header(name, value);
    }
    let response = request.send().await.expect("api request");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("api json")
}

#[tokio::test]
async fn bearer_and_cookie_sessions_over_http() {
    let running = spawn(authed_server().await).await;
    let client = Client::new();
    let base = running.base.as_str();

    let landing = client.get(format!("{base}/")).send().await.expect("landing");
    assert_eq!(landing.status(), StatusCode::OK);
    assert!(landing.text().await.expect("body").contains("Welcome to Keystone"));

    let anonymous = whoami(&client, base, None).await;
    assert_eq!(anonymous["data"]["authenticatedItem"], Value::Null);

    let signin = client
        .post(format!("{base}/admin/signin"))
        .json(&json!({ "identity": "ada@example.com", "secret": "correct horse" }))
        .send()
        .await
        .expect("signin");
    assert_eq!(signin.status(), StatusCode::OK);
    let set_cookie = signin
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .expect("set-cookie");
    assert!(set_cookie.starts_with("keystone.sid=s%3A"));
    let body: Value = signin.json().await.expect("signin json");
    assert_eq!(body["success"], true);
    let token = body["token"].as_str().expect("token").to_string();

    let bearer = format!("Bearer {token}");
    let by_bearer = whoami(&client, base, Some((header::AUTHORIZATION, bearer.as_str()))).await;
    assert_eq!(
        by_bearer["data"]["authenticatedItem"],
        json!({ "id": "1", "email": "ada@example.com" })
    );
    assert_eq!(by_bearer["data"]["authedListKey"], "User");

    let cookie = set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();
    let by_cookie = whoami(&client, base, Some((header::COOKIE, cookie.as_str()))).await;
    assert_eq!(by_cookie, by_bearer);

    let signout = client
        .post(format!("{base}/admin/signout"))
        .header(header::AUTHORIZATION, &bearer)
        .send()
        .await
        .expect("signout");
    assert_eq!(signout.status(), StatusCode::OK);

    let after = whoami(&client, base, Some((header::AUTHORIZATION, bearer.as_str()))).await;
    assert_eq!(after["data"]["authenticatedItem"], Value::Null);
    let after = whoami(&client, base, Some((header::COOKIE, cookie.as_str()))).await;
    assert_eq!(after["data"]["authenticatedItem"], Value::Null);

    running.stop().await;
}

#[tokio::test]
async fn admin_ui_receives_unmatched_paths() {
    let running = spawn(authed_server().await).await;
    let client = Client::new();

    let response = client
        .get(format!("{}/admin/lists/users", running.base))
        .send()
        .await
        .expect("admin ui");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.expect("body").contains("Keystone admin UI"));

    let health = client
        .get(format!("{}/health", running.base))
        .send()
        .await
        .expect("health");
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-app"));
    assert!(health.headers().contains_key("x-request-id"));

    running.stop().await;
}

#[tokio::test]
async fn api_only_server_without_auth() {
    let running = spawn(WebServer::new(Lists::new())).await;
    let client = Client::new();

    let body = whoami(&client, &running.base, Some((header::AUTHORIZATION, "Bearer anything"))).await;
    assert_eq!(body["data"]["authenticatedItem"], Value::Null);

    let missing = client
        .get(format!("{}/admin/lists", running.base))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    running.stop().await;
}
