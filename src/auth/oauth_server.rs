use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Request, Response, Server};
use url::Url;

use crate::auth::credential::{Credential, CredentialStore};
use crate::auth::provider::ProviderClient;
use crate::error::{AuthError, Result};
use crate::printer::{MAIN_ART, SUCCESS_ART};

pub const CALLBACK_PATH: &str = "/callback";
/// Loopback address the callback listener binds.
pub const CALLBACK_HOST: &str = "127.0.0.1";

pub type CallbackResult = Result<Credential>;

/// Sending half of the completion gate. Only the first `fire` is delivered;
/// later calls are dropped without blocking.
#[derive(Debug)]
pub struct CompletionSignal {
    sender: SyncSender<CallbackResult>,
    fired: AtomicBool,
}

impl CompletionSignal {
    pub fn fire(&self, result: CallbackResult) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            log::debug!("Completion already signalled, dropping later result");
            return false;
        }
        self.sender.try_send(result).is_ok()
    }
}

/// Receiving half of the completion gate, owned by the login orchestrator.
#[derive(Debug)]
pub struct Completion {
    receiver: Receiver<CallbackResult>,
}

impl Completion {
    /// Blocks until the callback handler reports or `timeout` elapses.
    /// `None` means the timer won the race.
    pub fn wait(&self, timeout: Duration) -> Option<CallbackResult> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(AuthError::CallbackAborted)),
        }
    }
}

pub fn completion_channel() -> (CompletionSignal, Completion) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (
        CompletionSignal {
            sender,
            fired: AtomicBool::new(false),
        },
        Completion { receiver },
    )
}

enum Flow {
    Continue,
    Finished,
}

/// Per-attempt request handler: owns the expected state and everything
/// needed to turn an authorization code into a stored credential.
pub struct CallbackHandler {
    expected_state: String,
    redirect_uri: String,
    provider: Arc<ProviderClient>,
    store: CredentialStore,
}

impl CallbackHandler {
    pub fn new(
        expected_state: String,
        redirect_uri: String,
        provider: Arc<ProviderClient>,
        store: CredentialStore,
    ) -> Self {
        Self {
            expected_state,
            redirect_uri,
            provider,
            store,
        }
    }

    fn handle(
        &self,
        request: Request,
        shutdown: &AtomicBool,
        completion: &CompletionSignal,
    ) -> Flow {
        let parsed_url = match Url::parse("http://localhost")
            .and_then(|base| base.join(request.url()))
        {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Ignoring unparseable request target: {}", e);
                respond(request, 400, page("Bad Request", "Malformed request"));
                return Flow::Continue;
            }
        };

        if parsed_url.path() != CALLBACK_PATH {
            respond(request, 404, page("Not Found", "Waiting for authentication..."));
            return Flow::Continue;
        }

        let outcome = self.complete(&parsed_url, shutdown);
        match &outcome {
            Ok(credential) => respond(request, 200, success_page(&credential.account_id)),
            Err(e) => {
                log::error!("OAuth callback failed: {}", e);
                respond(
                    request,
                    status_for(e),
                    page("Authentication Failed", &e.to_string()),
                );
            }
        }

        completion.fire(outcome);
        Flow::Finished
    }

    fn complete(&self, url: &Url, shutdown: &AtomicBool) -> CallbackResult {
        let mut code = None;
        let mut state = None;
        let mut error = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        // Nothing in the request is trusted until the state matches.
        if state.as_deref() != Some(self.expected_state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        if let Some(error) = error {
            return Err(AuthError::ProviderDenied(error));
        }
        let code = code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)?;

        let access_token = self
            .provider
            .exchange_code(&code, &self.redirect_uri)
            .map_err(|e| match e {
                AuthError::ExchangeRejected(_) => e,
                other => AuthError::ExchangeRejected(other.to_string()),
            })?;
        let account_id = self.provider.fetch_login(&access_token)?;

        if shutdown.load(Ordering::SeqCst) {
            log::warn!("Callback completed after the login attempt was abandoned, not saving");
            return Err(AuthError::CallbackAborted);
        }

        let credential = Credential::new(
            account_id,
            access_token,
            self.provider.client_id().to_string(),
        );
        self.store.save(&credential)?;
        Ok(credential)
    }
}

fn status_for(error: &AuthError) -> u16 {
    match error {
        AuthError::StateMismatch | AuthError::ProviderDenied(_) | AuthError::MissingCode => 400,
        AuthError::ExchangeRejected(_) => 403,
        AuthError::CallbackAborted => 503,
        _ => 500,
    }
}

fn success_page(account_id: &str) -> String {
    format!(
        "<html><body><pre>{}{}</pre>\
         <p>Welcome, {}! You can now close this window.</p></body></html>",
        escape_html(MAIN_ART),
        escape_html(SUCCESS_ART),
        escape_html(account_id)
    )
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<html><body><h1>{}</h1><p>{}</p></body></html>",
        escape_html(title),
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_response(status: u16, body: String) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(status);
    match Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn respond(request: Request, status: u16, body: String) {
    if let Err(e) = request.respond(html_response(status, body)) {
        log::warn!("Failed to write callback response: {}", e);
    }
}

/// Transient listener for the OAuth redirect. Lives for exactly one login
/// attempt; `stop` (also run on drop) closes it.
pub struct CallbackServer {
    server: Option<Arc<Server>>,
    shutdown_flag: Arc<AtomicBool>,
    port: u16,
    worker: Option<thread::JoinHandle<()>>,
}

impl CallbackServer {
    /// Binds the listener on `127.0.0.1:port`. Port 0 picks a free port,
    /// reported by [`CallbackServer::port`].
    pub fn bind(port: u16) -> Result<Self> {
        let server = Server::http((CALLBACK_HOST, port)).map_err(|e| AuthError::Bind {
            port,
            reason: e.to_string(),
        })?;
        let actual_port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        log::debug!("Callback server listening on {}:{}", CALLBACK_HOST, actual_port);

        Ok(Self {
            server: Some(Arc::new(server)),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            port: actual_port,
            worker: None,
        })
    }

    /// Binds and starts serving in one step.
    pub fn start(handler: CallbackHandler, port: u16) -> Result<(Self, Completion)> {
        let mut server = Self::bind(port)?;
        let completion = server.serve(handler)?;
        Ok((server, completion))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts the background worker. The returned [`Completion`] yields the
    /// outcome of the first request to the callback route.
    pub fn serve(&mut self, handler: CallbackHandler) -> Result<Completion> {
        let (signal, completion) = completion_channel();
        let Some(server) = self.server.clone() else {
            // Already stopped: the dropped signal makes `wait` report an abort.
            return Ok(completion);
        };
        let shutdown_flag = self.shutdown_flag.clone();

        let worker = thread::Builder::new()
            .name("oauth-callback".to_string())
            .spawn(move || {
                for request in server.incoming_requests() {
                    if shutdown_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Flow::Finished = handler.handle(request, &shutdown_flag, &signal) {
                        break;
                    }
                }
                log::debug!("Callback worker exiting");
            })
            .map_err(|e| AuthError::Bind {
                port: self.port,
                reason: format!("failed to start callback worker: {}", e),
            })?;

        self.worker = Some(worker);
        Ok(completion)
    }

    /// Closes the listener. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        if let Some(server) = self.server.take() {
            server.unblock();
            log::debug!("Callback server on port {} stopped", self.port);
        }
        // A handler that is mid-request finishes on its own and sees the
        // shutdown flag before it persists anything.
        self.worker.take();
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubAuthConfig;
    use std::net::TcpStream;
    use std::time::Instant;
    use tempfile::tempdir;

    fn unreachable_provider() -> Arc<ProviderClient> {
        let config = GitHubAuthConfig {
            github_client_id: "Iv1.client".to_string(),
            github_client_secret: "secret".to_string(),
            oauth_base_url: "http://127.0.0.1:9".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..GitHubAuthConfig::default()
        };
        Arc::new(ProviderClient::new(&config).unwrap())
    }

    fn get(port: u16, path_and_query: &str) -> u16 {
        reqwest::blocking::get(format!("http://127.0.0.1:{}{}", port, path_and_query))
            .unwrap()
            .status()
            .as_u16()
    }

    fn wait_until_closed(port: u16) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if TcpStream::connect(("127.0.0.1", port)).is_err() {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn test_state_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(".auth.json"));
        let handler = CallbackHandler::new(
            "expected".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            store.clone(),
        );
        let (mut server, completion) = CallbackServer::start(handler, 0).unwrap();

        let status = get(server.port(), "/callback?state=forged&code=abc");
        assert_eq!(status, 400);

        let outcome = completion.wait(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(AuthError::StateMismatch)));
        assert!(!store.exists());
        server.stop();
    }

    #[test]
    fn test_missing_state_is_rejected() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(".auth.json"));
        let handler = CallbackHandler::new(
            "expected".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            store.clone(),
        );
        let (server, completion) = CallbackServer::start(handler, 0).unwrap();

        assert_eq!(get(server.port(), "/callback?code=abc"), 400);
        let outcome = completion.wait(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(AuthError::StateMismatch)));
    }

    #[test]
    fn test_provider_error_and_missing_code() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(".auth.json"));

        let handler = CallbackHandler::new(
            "s1".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            store.clone(),
        );
        let (server, completion) = CallbackServer::start(handler, 0).unwrap();
        assert_eq!(
            get(server.port(), "/callback?state=s1&error=access_denied"),
            400
        );
        assert!(matches!(
            completion.wait(Duration::from_secs(5)).unwrap(),
            Err(AuthError::ProviderDenied(e)) if e == "access_denied"
        ));

        let handler = CallbackHandler::new(
            "s2".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            store.clone(),
        );
        let (server, completion) = CallbackServer::start(handler, 0).unwrap();
        assert_eq!(get(server.port(), "/callback?state=s2"), 400);
        assert!(matches!(
            completion.wait(Duration::from_secs(5)).unwrap(),
            Err(AuthError::MissingCode)
        ));
        assert!(!store.exists());
    }

    #[test]
    fn test_exchange_transport_failure_is_forbidden() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(".auth.json"));
        let handler = CallbackHandler::new(
            "s".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            store.clone(),
        );
        let (server, completion) = CallbackServer::start(handler, 0).unwrap();

        assert_eq!(get(server.port(), "/callback?state=s&code=abc"), 403);
        assert!(matches!(
            completion.wait(Duration::from_secs(5)).unwrap(),
            Err(AuthError::ExchangeRejected(_))
        ));
        assert!(!store.exists());
    }

    #[test]
    fn test_other_paths_do_not_finish_the_attempt() {
        let dir = tempdir().unwrap();
        let handler = CallbackHandler::new(
            "s".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            CredentialStore::new(dir.path().join(".auth.json")),
        );
        let (server, completion) = CallbackServer::start(handler, 0).unwrap();

        assert_eq!(get(server.port(), "/favicon.ico"), 404);
        assert!(completion.wait(Duration::from_millis(200)).is_none());

        assert_eq!(get(server.port(), "/callback?state=wrong"), 400);
        assert!(completion.wait(Duration::from_secs(5)).is_some());
    }

    #[test]
    fn test_stop_is_idempotent_and_closes_listener() {
        let dir = tempdir().unwrap();
        let handler = CallbackHandler::new(
            "s".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            CredentialStore::new(dir.path().join(".auth.json")),
        );
        let (mut server, completion) = CallbackServer::start(handler, 0).unwrap();
        let port = server.port();

        server.stop();
        server.stop();

        assert!(wait_until_closed(port), "listener still accepting on {}", port);
        assert!(matches!(
            completion.wait(Duration::from_secs(5)),
            Some(Err(AuthError::CallbackAborted))
        ));
    }

    #[test]
    fn test_serve_after_stop_reports_abort() {
        let dir = tempdir().unwrap();
        let mut server = CallbackServer::bind(0).unwrap();
        server.stop();

        let handler = CallbackHandler::new(
            "s".to_string(),
            "http://localhost/callback".to_string(),
            unreachable_provider(),
            CredentialStore::new(dir.path().join(".auth.json")),
        );
        let completion = server.serve(handler).unwrap();
        assert!(matches!(
            completion.wait(Duration::from_millis(100)),
            Some(Err(AuthError::CallbackAborted))
        ));
    }

    #[test]
    fn test_bind_conflict() {
        let first = CallbackServer::bind(0).unwrap();
        let err = CallbackServer::bind(first.port()).err().unwrap();
        assert!(matches!(err, AuthError::Bind { .. }));
    }

    #[test]
    fn test_completion_fires_once() {
        let (signal, completion) = completion_channel();
        assert!(signal.fire(Err(AuthError::MissingCode)));
        assert!(!signal.fire(Err(AuthError::StateMismatch)));

        assert!(matches!(
            completion.wait(Duration::from_millis(10)),
            Some(Err(AuthError::MissingCode))
        ));
    }

    #[test]
    fn test_completion_times_out() {
        let (_signal, completion) = completion_channel();
        assert!(completion.wait(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_success_page_escapes_art() {
        let body = success_page("octocat");
        assert!(body.contains("&lt;\\__ \\"));
        assert!(!body.contains("<\\__"));
        assert!(body.contains("Welcome, octocat!"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
    }
}
