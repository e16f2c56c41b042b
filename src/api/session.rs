//! Session service backed by the hosted auth REST API.

use std::cell::RefCell;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ApiClient, ApiError};
use crate::models::{AuthChange, LoginRequest, Session, SessionUser};
use crate::state::{AuthChangeSubscription, SessionService, Subscription};

pub struct HostedSessionService {
    client: ApiClient,
    session: RefCell<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
}

impl HostedSessionService {
    pub fn new(client: ApiClient) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            client,
            session: RefCell::new(None),
            changes,
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let session: Session = self
            .client
            .post("/auth/v1/token?grant_type=password", &request)
            .await?;

        tracing::info!("Signed in as {}", email);
        self.store(Some(session.clone()));
        self.notify(AuthChange::signed_in(session.clone()));

        Ok(session)
    }

    fn store(&self, session: Option<Session>) {
        self.client
            .set_token(session.as_ref().map(|s| s.access_token.clone()));
        *self.session.borrow_mut() = session;
    }

    fn holds(&self, access_token: &str) -> bool {
        self.session
            .borrow()
            .as_ref()
            .is_some_and(|s| s.access_token == access_token)
    }

    fn drop_session(&self) {
        self.store(None);
        self.notify(AuthChange::signed_out());
    }

    fn notify(&self, change: AuthChange) {
        // no subscribers is fine
        let _ = self.changes.send(change);
    }
}

#[async_trait(?Send)]
impl SessionService for HostedSessionService {
    async fn get_session(&self) -> Result<Option<Session>, ApiError> {
        let Some(mut session) = self.session.borrow().clone() else {
            return Ok(None);
        };

        let result = self.client.get::<SessionUser>("/auth/v1/user").await;

        // A sign-out or new sign-in may have replaced the session meanwhile.
        if !self.holds(&session.access_token) {
            tracing::debug!("Session changed during verification, ignoring result");
            return Ok(None);
        }

        match result {
            Ok(user) => {
                session.user = user;
                *self.session.borrow_mut() = Some(session.clone());
                Ok(Some(session))
            }
            Err(ApiError::Unauthorized) => {
                tracing::info!("Session rejected by auth server, signing out locally");
                self.drop_session();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> AuthChangeSubscription {
        Subscription::new(self.changes.subscribe())
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let result = if self.session.borrow().is_some() {
            self.client.post_no_response("/auth/v1/logout").await
        } else {
            Ok(())
        };

        self.drop_session();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthChangeEvent;
    use crate::state::Delivery;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Canned answer for one route of the fake auth server.
    #[derive(Clone)]
    struct Reply {
        status: u16,
        body: &'static str,
        delay: Duration,
    }

    impl Reply {
        fn ok(body: &'static str) -> Self {
            Self { status: 200, body, delay: Duration::ZERO }
        }

        fn status(status: u16) -> Self {
            Self { status, body: "{}", delay: Duration::ZERO }
        }

        fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    const TOKEN_RESPONSE: &str = r#"{"access_token":"tok","token_type":"bearer","refresh_token":"ref","user":{"id":"u-1","email":"ana@school.edu"}}"#;
    const USER_RESPONSE: &str = r#"{"id":"u-1","email":"ana@school.edu"}"#;

    /// Serves one request per connection; records "METHOD path" lines.
    async fn fake_auth_server(routes: Vec<(&'static str, Reply)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    let head_end = loop {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                    let content_length = head
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    while buf.len() < head_end + content_length {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }

                    let request_line = head.lines().next().unwrap_or_default();
                    let mut parts = request_line.split_whitespace();
                    let method = parts.next().unwrap_or_default();
                    let target = parts.next().unwrap_or_default();
                    let path = target.split('?').next().unwrap_or_default();
                    log.lock().unwrap().push(format!("{} {}", method, path));

                    let reply = routes
                        .iter()
                        .find(|(route, _)| *route == path)
                        .map(|(_, reply)| reply.clone())
                        .unwrap_or_else(|| Reply::status(404));
                    tokio::time::sleep(reply.delay).await;

                    let response = format!(
                        "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        reply.status,
                        reply.body.len(),
                        reply.body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn service_at(base_url: &str) -> HostedSessionService {
        HostedSessionService::new(ApiClient::new(base_url, "anon").unwrap())
    }

    fn service() -> HostedSessionService {
        service_at("http://127.0.0.1:9")
    }

    async fn next_event(changes: &mut AuthChangeSubscription) -> AuthChange {
        match tokio::time::timeout(Duration::from_secs(1), changes.recv()).await {
            Ok(Some(Delivery::Event(change))) => change,
            other => panic!("unexpected delivery: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_session_before_sign_in() {
        let service = service();
        assert_eq!(service.get_session().await, Ok(None));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_still_notifies() {
        let service = service();
        let mut changes = service.on_auth_state_change();

        assert_eq!(service.sign_out().await, Ok(()));

        let change = next_event(&mut changes).await;
        assert_eq!(change.event, AuthChangeEvent::SignedOut);
        assert!(change.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_stores_token_and_announces_session() {
        let (url, _) = fake_auth_server(vec![("/auth/v1/token", Reply::ok(TOKEN_RESPONSE))]).await;
        let service = service_at(&url);
        let mut changes = service.on_auth_state_change();

        let session = service.sign_in_with_password("ana@school.edu", "secret").await.unwrap();

        assert_eq!(session.access_token, "tok");
        assert_eq!(service.client.get_token().as_deref(), Some("tok"));
        let change = next_event(&mut changes).await;
        assert_eq!(change.event, AuthChangeEvent::SignedIn);
        assert_eq!(change.session, Some(session));
    }

    #[tokio::test]
    async fn test_get_session_verifies_held_session() {
        let (url, seen) = fake_auth_server(vec![
            ("/auth/v1/token", Reply::ok(TOKEN_RESPONSE)),
            ("/auth/v1/user", Reply::ok(USER_RESPONSE)),
        ])
        .await;
        let service = service_at(&url);
        service.sign_in_with_password("ana@school.edu", "secret").await.unwrap();

        let session = service.get_session().await.unwrap().unwrap();

        assert_eq!(session.user.email.as_deref(), Some("ana@school.edu"));
        assert!(seen.lock().unwrap().contains(&"GET /auth/v1/user".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_session_is_dropped_and_announced() {
        let (url, _) = fake_auth_server(vec![
            ("/auth/v1/token", Reply::ok(TOKEN_RESPONSE)),
            ("/auth/v1/user", Reply::status(401)),
        ])
        .await;
        let service = service_at(&url);
        service.sign_in_with_password("ana@school.edu", "secret").await.unwrap();
        let mut changes = service.on_auth_state_change();

        assert_eq!(service.get_session().await, Ok(None));

        assert!(service.session.borrow().is_none());
        assert_eq!(service.client.get_token(), None);
        assert_eq!(next_event(&mut changes).await.event, AuthChangeEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_out_drops_session_when_remote_call_fails() {
        let (url, seen) = fake_auth_server(vec![
            ("/auth/v1/token", Reply::ok(TOKEN_RESPONSE)),
            ("/auth/v1/logout", Reply::status(500)),
        ])
        .await;
        let service = service_at(&url);
        service.sign_in_with_password("ana@school.edu", "secret").await.unwrap();
        let mut changes = service.on_auth_state_change();

        let result = service.sign_out().await;

        assert!(matches!(result, Err(ApiError::Server(_))));
        assert!(service.session.borrow().is_none());
        assert_eq!(service.client.get_token(), None);
        assert_eq!(next_event(&mut changes).await.event, AuthChangeEvent::SignedOut);
        assert!(seen.lock().unwrap().contains(&"POST /auth/v1/logout".to_string()));
    }

    #[tokio::test]
    async fn test_sign_out_during_verification_is_not_undone() {
        let (url, _) = fake_auth_server(vec![
            ("/auth/v1/token", Reply::ok(TOKEN_RESPONSE)),
            ("/auth/v1/user", Reply::ok(USER_RESPONSE).after(Duration::from_millis(300))),
            ("/auth/v1/logout", Reply::ok("")),
        ])
        .await;
        let service = service_at(&url);
        service.sign_in_with_password("ana@school.edu", "secret").await.unwrap();

        let (verified, signed_out) = futures::join!(service.get_session(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service.sign_out().await
        });

        assert_eq!(verified, Ok(None));
        assert_eq!(signed_out, Ok(()));
        assert!(service.session.borrow().is_none());
        assert_eq!(service.client.get_token(), None);
        assert_eq!(service.get_session().await, Ok(None));
    }
}
