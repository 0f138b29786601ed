#![allow(dead_code)]
//! In-process stand-in for the Salesforce login and tooling endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

pub const LOGIN_PATH: &str = "/services/Soap/u/39.0";
pub const QUERY_PATH: &str = "/services/data/v39.0/tooling/query";
/// Host name the TLS stub answers to; test clients resolve it to the stub.
pub const TLS_HOST: &str = "login.test";

/// A request as seen by the stub.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: String,
}

/// Canned reply for one endpoint.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    pub fn xml(status: StatusCode, body: impl Into<String>) -> Self {
        Reply {
            status,
            content_type: "text/xml",
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, body: impl Into<String>) -> Self {
        Reply {
            status,
            content_type: "application/json",
            body: body.into(),
        }
    }
}

#[derive(Clone)]
struct StubState {
    login: Reply,
    query: Reply,
    captured: Arc<Mutex<Vec<Captured>>>,
}

pub struct Stub {
    pub base_url: String,
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl Stub {
    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

fn router(login: Reply, query: Reply) -> (Router, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        login,
        query,
        captured: captured.clone(),
    };
    let app = Router::new()
        .route(LOGIN_PATH, post(handle_login))
        .route(QUERY_PATH, get(handle_query))
        .with_state(state);
    (app, captured)
}

/// Binds an ephemeral port on localhost and serves both endpoints from it.
pub async fn spawn(login: Reply, query: Reply) -> Stub {
    let (app, captured) = router(login, query);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    Stub {
        base_url: format!("http://{addr}"),
        addr,
        captured,
    }
}

/// Serves both endpoints over HTTPS with a throwaway self-signed certificate.
///
/// `login` receives the stub's `https://login.test:<port>` base URL, so the
/// login reply can point `serverUrl` back at the stub.
pub async fn spawn_tls(login: impl FnOnce(&str) -> Reply, query: Reply) -> Stub {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind tls stub listener");
    listener.set_nonblocking(true).expect("non-blocking listener");
    let addr = listener.local_addr().expect("tls stub address");
    let base_url = format!("https://{TLS_HOST}:{}", addr.port());

    let (app, captured) = router(login(&base_url), query);

    let certified = rcgen::generate_simple_self_signed(vec![TLS_HOST.to_string()])
        .expect("self-signed certificate");
    let tls = axum_server::tls_rustls::RustlsConfig::from_pem(
        certified.cert.pem().into_bytes(),
        certified.key_pair.serialize_pem().into_bytes(),
    )
    .await
    .expect("tls config");

    tokio::spawn(async move {
        axum_server::from_tcp_rustls(listener, tls)
            .serve(app.into_make_service())
            .await
            .expect("tls stub server");
    });

    Stub {
        base_url,
        addr,
        captured,
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn respond(reply: &Reply) -> axum::response::Response {
    (
        reply.status,
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body.clone(),
    )
        .into_response()
}

async fn handle_login(
    State(state): State<StubState>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    state.captured.lock().unwrap().push(Captured {
        headers: header_map(&headers),
        query: HashMap::new(),
        body,
    });
    respond(&state.login)
}

async fn handle_query(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> axum::response::Response {
    state.captured.lock().unwrap().push(Captured {
        headers: header_map(&headers),
        query,
        body: String::new(),
    });
    respond(&state.query)
}

pub fn login_success(server_url: &str, session_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:partner.soap.sforce.com"><soapenv:Body><loginResponse><result><passwordExpired>false</passwordExpired><serverUrl>{server_url}</serverUrl><sessionId>{session_id}</sessionId><userId>005000000000001AAA</userId></result></loginResponse></soapenv:Body></soapenv:Envelope>"#
    )
}

pub fn login_fault(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>{code}</faultcode><faultstring>{message}</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#
    )
}

pub fn unused() -> Reply {
    Reply::json(StatusCode::NOT_FOUND, "[]")
}

/// Client that talks to the stub directly, whatever proxy the environment sets.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build test client")
}

/// Client for a [`spawn_tls`] stub: resolves the stub host to its socket and
/// accepts the self-signed certificate.
pub fn tls_client(stub: &Stub) -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .resolve(TLS_HOST, stub.addr)
        .danger_accept_invalid_certs(true)
        .build()
        .expect("build tls test client")
}
