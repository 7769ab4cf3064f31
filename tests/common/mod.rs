//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use fasty::config::{shared, Config};
use fasty::http::middleware::register_builtins;
use fasty::{
    App, Controller, ControllerRegistry, HttpServer, MiddlewareRegistry, RequestContext, Response,
    Shutdown,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_CONFIG: &str = r#"
[middleware]
global = ["request_log", "security_headers"]

[middleware.groups]
admin = ["auth"]
frontend = []

[auth]
session_key = "user_id"
"#;

struct Home;

impl Controller for Home {
    fn handle(&self, _request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        response.write("home");
        Ok(())
    }
}

/// Logs in whoever posts a `user` field.
struct Login;

impl Controller for Login {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        let user = request
            .post("user")
            .and_then(Value::as_str)
            .map(str::to_string);
        match user {
            Some(user) if request.is_post() => {
                request.set_session("user_id", user.as_str());
                response.write(format!("welcome {user}"));
            }
            _ => response.write("login form"),
        }
        Ok(())
    }
}

struct Dashboard;

impl Controller for Dashboard {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        let user = request.session("user_id").and_then(Value::as_str).unwrap_or("");
        response.write(format!("dashboard for {user}"));
        Ok(())
    }
}

/// Reports how many files arrived under `docs[]`.
struct Upload;

impl Controller for Upload {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        let names: Vec<&str> = request.file("docs").iter().map(|f| f.name.as_str()).collect();
        response.write(format!("{}:{}", names.len(), names.join(",")));
        Ok(())
    }
}

/// Handler that always fails after writing partial output.
struct Failing;

impl Controller for Failing {
    fn handle(&self, _request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        response.write("partial");
        Err(fasty::Error::handler("boom"))
    }
}

/// App wired like the binary, with a few test controllers.
pub fn test_app(toml: &str) -> App {
    let config = shared(Config::from_toml_str(toml).unwrap());

    let mut controllers = ControllerRegistry::new();
    controllers
        .register("Index", || Home)
        .register("Account::Login", || Login)
        .register("Admin::DashboardController", || Dashboard)
        .register("Upload::Index", || Upload)
        .register("Failing::Index", || Failing);

    let mut middleware = MiddlewareRegistry::new();
    register_builtins(&mut middleware, &config);

    App::new(config, controllers, middleware)
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, route: &str) -> String {
        format!("http://{}/?q={}", self.addr, route)
    }

    /// Trigger shutdown and wait for the server to stop.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn spawn_server(app: App) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(Arc::new(app));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestServer {
        addr,
        shutdown,
        handle,
    }
}
