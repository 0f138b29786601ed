//! SOAP login against the partner API.
//!
//! The login endpoint takes a fixed envelope carrying the username and password
//! and answers with either a `loginResponse` (session id and server URL) or a
//! SOAP fault. Faults are checked first, whatever the HTTP status was.

use std::fmt;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, error, info, warn};

use crate::config::Credentials;
use crate::error::AuthError;

pub const API_VERSION: &str = "39.0";

const SESSION_ID_PATH: &[&str] = &["Body", "loginResponse", "result", "sessionId"];
const SERVER_URL_PATH: &[&str] = &["Body", "loginResponse", "result", "serverUrl"];
const FAULT_CODE_PATH: &[&str] = &["Body", "Fault", "faultcode"];
const FAULT_STRING_PATH: &[&str] = &["Body", "Fault", "faultstring"];

/// An authenticated session, valid for the current run only.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// `https://<host>` of the org that issued the session.
    pub instance_url: String,
    pub session_id: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("session_id", &"<redacted>")
            .finish()
    }
}

/// Exchanges credentials for a [`Session`].
pub async fn authenticate(client: &Client, credentials: &Credentials) -> Result<Session, AuthError> {
    let endpoint = login_endpoint(&credentials.instance_url);
    info!(endpoint = %endpoint, "Logging in via SOAP");

    let response = client
        .post(&endpoint)
        .header(CONTENT_TYPE, "text/xml")
        .header("SOAPAction", "login")
        .body(login_envelope(&credentials.username, &credentials.password))
        .send()
        .await
        .map_err(|e| {
            error!(error = ?e, endpoint = %endpoint, "Login request failed");
            AuthError::Transport(e)
        })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        error!(status = %status, "Login rejected as unauthorized");
        return Err(AuthError::Unauthorized);
    }

    let body = response.text().await.map_err(|e| {
        error!(error = ?e, "Failed to read login response body");
        AuthError::Transport(e)
    })?;
    debug!(status = %status, bytes = body.len(), "Received login response");

    parse_login_response(&body)
}

pub fn login_endpoint(instance_url: &str) -> String {
    format!(
        "{}/services/Soap/u/{}",
        instance_url.trim_end_matches('/'),
        API_VERSION
    )
}

/// Builds the login envelope. Username and password are XML-escaped.
pub fn login_envelope(username: &str, password: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:urn="urn:partner.soap.sforce.com">
  <soapenv:Body>
    <urn:login>
      <urn:username>{}</urn:username>
      <urn:password>{}</urn:password>
    </urn:login>
  </soapenv:Body>
</soapenv:Envelope>
"#,
        escape(username),
        escape(password)
    )
}

/// Turns a login response body into a session, or the fault it carries.
pub fn parse_login_response(body: &str) -> Result<Session, AuthError> {
    check_fault(body)?;

    let fields = extract_fields(body, &[SESSION_ID_PATH, SERVER_URL_PATH]).map_err(|e| {
        error!(error = %e, "Login response is not well-formed XML");
        AuthError::MalformedResponse(e)
    })?;
    let mut fields = fields.into_iter();
    let session_id = fields.next().flatten().filter(|s| !s.is_empty());
    let server_url = fields.next().flatten().filter(|s| !s.is_empty());

    let (session_id, server_url) = match (session_id, server_url) {
        (Some(session_id), Some(server_url)) => (session_id, server_url),
        (None, _) => {
            error!("Login response carries no sessionId");
            return Err(AuthError::MalformedResponse("missing sessionId".to_string()));
        }
        (_, None) => {
            error!("Login response carries no serverUrl");
            return Err(AuthError::MalformedResponse("missing serverUrl".to_string()));
        }
    };

    let instance_url = resolve_instance_url(&server_url)?;
    info!(instance = %instance_url, "Login succeeded");
    Ok(Session {
        instance_url,
        session_id,
    })
}

/// Fields read before a parse error still count, so a truncated fault is
/// reported as a fault. Anything else is left to the strict parse.
fn check_fault(body: &str) -> Result<(), AuthError> {
    let scan = scan_fields(body, &[FAULT_CODE_PATH, FAULT_STRING_PATH]);
    if let Some(e) = &scan.error {
        debug!(error = %e, "Login response is not well-formed; checking partial fault fields");
    }
    let mut fields = scan.found.into_iter();
    let code = fields.next().flatten().unwrap_or_default();
    let message = fields.next().flatten().unwrap_or_default();
    if code.is_empty() {
        return Ok(());
    }
    warn!(fault_code = %code, fault = %message, "Login returned a SOAP fault");
    Err(AuthError::Fault { code, message })
}

/// `https://` plus the host (and port, if any) of the server URL.
pub fn resolve_instance_url(server_url: &str) -> Result<String, AuthError> {
    let url = Url::parse(server_url).map_err(|e| {
        error!(error = ?e, server_url = %server_url, "Unparsable serverUrl");
        AuthError::InvalidServerUrl(server_url.to_string())
    })?;
    let host = url.host_str().ok_or_else(|| {
        error!(server_url = %server_url, "serverUrl has no host");
        AuthError::InvalidServerUrl(server_url.to_string())
    })?;
    Ok(match url.port() {
        Some(port) => format!("https://{host}:{port}"),
        None => format!("https://{host}"),
    })
}

/// Text gathered by [`scan_fields`], plus the first parse error, if any.
struct Scan {
    found: Vec<Option<String>>,
    error: Option<String>,
}

/// Collects the text of the elements at each path below the document root.
///
/// Paths are matched on local names, so namespace prefixes are ignored, and
/// the root element's own name is not part of the path.
fn extract_fields(body: &str, paths: &[&[&str]]) -> Result<Vec<Option<String>>, String> {
    let scan = scan_fields(body, paths);
    match scan.error {
        Some(e) => Err(e),
        None => Ok(scan.found),
    }
}

/// Like [`extract_fields`], but keeps whatever was collected before the
/// document turned out to be malformed.
fn scan_fields(body: &str, paths: &[&[&str]]) -> Scan {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut found: Vec<Option<String>> = vec![None; paths.len()];
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;

    let error = loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => break Some(e.to_string()),
        };
        match event {
            Event::Start(start) => {
                seen_root = true;
                stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
            }
            Event::Empty(_) => seen_root = true,
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => match text.unescape() {
                Ok(text) => record_text(&stack, paths, &mut found, &text),
                Err(e) => break Some(e.to_string()),
            },
            Event::CData(data) => {
                let bytes = data.into_inner();
                record_text(&stack, paths, &mut found, &String::from_utf8_lossy(&bytes));
            }
            Event::Eof if !seen_root => break Some("no root element".to_string()),
            Event::Eof if !stack.is_empty() => {
                break Some(format!("unclosed element <{}>", stack.join("><")))
            }
            Event::Eof => break None,
            _ => {}
        }
    };

    Scan { found, error }
}

fn record_text(stack: &[String], paths: &[&[&str]], found: &mut [Option<String>], text: &str) {
    let Some((_root, below_root)) = stack.split_first() else {
        return;
    };
    for (slot, path) in found.iter_mut().zip(paths) {
        if below_root.iter().map(String::as_str).eq(path.iter().copied()) {
            slot.get_or_insert_with(String::new).push_str(text);
        }
    }
}
