//! Session Gateway for the voting portal API.
//!
//! Logs in lazily, caches the bearer token together with the quorum constants
//! read at login, and re-authenticates once when a response says the token is
//! no longer valid.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use vab_core::{
    config::ApiConfig,
    domain::QuorumSettings,
    errors::{Error, HttpMethod},
    ports::VotingApi,
    Result,
};

const LOGIN: &str = "login";
const ME: &str = "me";
const SETTINGS: &str = "shared/global-settings";
const NOT_AUTHORIZED: &str = "Not authorized";
/// Fetch attempts per call: the first try plus one after re-login.
const MAX_ATTEMPTS: usize = 2;

#[derive(Clone, Debug)]
struct Session {
    token: String,
    quorum: QuorumSettings,
}

enum Fetched {
    Data(Value),
    NotAuthorized,
}

pub struct SessionGateway {
    http: reqwest::Client,
    prefix: String,
    login: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl SessionGateway {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            prefix: cfg.url_prefix.clone(),
            login: cfg.login.clone(),
            password: cfg.password.clone(),
            session: Mutex::new(None),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.prefix)
    }

    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(s) = guard.as_ref() {
            return Ok(s.clone());
        }
        let session = self.sign_in().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn sign_in(&self) -> Result<Session> {
        tracing::info!("signing in to the voting API");
        let resp = self
            .http
            .post(self.url(LOGIN))
            .json(&json!({ "email": self.login, "password": self.password }))
            .send()
            .await
            .map_err(|e| Error::request(HttpMethod::Post, LOGIN, e))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::request(HttpMethod::Post, LOGIN, e))?;

        let token = body
            .pointer("/user/accessTokenAPI")
            .and_then(Value::as_str)
            .filter(|_| is_success(&body))
            .ok_or_else(|| Error::Auth("login rejected".to_string()))?
            .to_string();

        let me = self.get_authorized(ME, &token).await?;
        let total_members = me
            .pointer("/me/totalMembers")
            .and_then(number)
            .filter(|_| is_success(&me))
            .ok_or_else(|| Error::Auth("error getting the me endpoint".to_string()))?;

        let settings = self.get_authorized(SETTINGS, &token).await?;
        let rates = settings
            .get("settings")
            .filter(|_| is_success(&settings))
            .ok_or_else(|| Error::Auth("error getting global settings".to_string()))?;
        let rate = |keys: &[&str]| keys.iter().find_map(|k| rates.get(*k).and_then(number));

        let quorum = QuorumSettings {
            total_members: total_members.max(0.0) as u32,
            rate_grant: rate(&["quorum_rate"]).unwrap_or_default(),
            rate_milestone: rate(&["quorum_rate_milestone"]).unwrap_or_default(),
            rate_simple: rate(&["quorum_rate_simple", "quorum_simple"]).unwrap_or_default(),
        };
        tracing::info!(
            total_members = quorum.total_members,
            "signed in to the voting API"
        );
        Ok(Session { token, quorum })
    }

    /// GET during login: an auth rejection here is fatal.
    async fn get_authorized(&self, endpoint: &str, token: &str) -> Result<Value> {
        match self.get(endpoint, token).await? {
            Fetched::Data(v) => Ok(v),
            Fetched::NotAuthorized => Err(Error::Auth(format!(
                "{endpoint} rejected a fresh token"
            ))),
        }
    }

    async fn get(&self, endpoint: &str, token: &str) -> Result<Fetched> {
        let resp = self
            .http
            .get(self.url(endpoint))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::request(HttpMethod::Get, endpoint, e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Fetched::NotAuthorized);
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::request(HttpMethod::Get, endpoint, status));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::request(HttpMethod::Get, endpoint, e))?;
        if body.get("message").and_then(Value::as_str) == Some(NOT_AUTHORIZED) {
            return Ok(Fetched::NotAuthorized);
        }
        Ok(Fetched::Data(body))
    }
}

#[async_trait]
impl VotingApi for SessionGateway {
    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        for _ in 0..MAX_ATTEMPTS {
            let session = self.session().await?;
            match self.get(endpoint, &session.token).await? {
                Fetched::Data(v) => return Ok(v),
                Fetched::NotAuthorized => {
                    tracing::warn!(endpoint, "token rejected, signing in again");
                    self.invalidate().await;
                }
            }
        }
        Err(Error::Auth(format!(
            "{endpoint} still not authorized after signing in again"
        )))
    }

    async fn quorum(&self) -> Result<QuorumSettings> {
        Ok(self.session().await?.quorum)
    }

    async fn invalidate(&self) {
        *self.session.lock().await = None;
    }
}

fn is_success(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool).unwrap_or(false)
}

/// Numbers sometimes arrive as strings.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
