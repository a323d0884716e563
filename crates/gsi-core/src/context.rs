//! Per-update bookkeeping that travels alongside the decoded snapshot.
//!
//! A [`SessionContext`] is built once per inbound update from a
//! [`RawUpdate`] and the previously committed context. It is immutable:
//! the next update produces a new context rather than mutating this one.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Top-level keys whose presence marks an update as a real delta.
const DELTA_MARKERS: [&str; 2] = ["added", "previously"];

/// Identity of the pipeline that produced a context.
///
/// A session tracker only accepts commits from the pipeline that started
/// the session; two pipelines sharing one tracker is a misconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerId(pub Uuid);

impl ServerId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ServerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Why an `auth` section could not be turned into an [`AuthTokens`] set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthTokensError {
    /// `auth` was present but not an object.
    #[error("auth section is not an object")]
    NotAnObject,

    /// A token value was not a string.
    #[error("auth token {key:?} is not a string")]
    NonStringValue {
        /// The offending key, lowercased.
        key: String,
    },
}

/// Immutable auth token set with case-insensitive keys.
///
/// Values are secrets: [`fmt::Debug`] prints keys only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthTokens {
    tokens: BTreeMap<String, String>,
}

impl AuthTokens {
    /// An empty token set.
    pub const fn empty() -> Self {
        Self {
            tokens: BTreeMap::new(),
        }
    }

    /// Build a token set from key/value pairs. Later duplicates win.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(key, value)| (key.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
        }
    }

    /// Extract the token set from the `auth` section of a document.
    ///
    /// A document without `auth` yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`AuthTokensError`] when `auth` is present but is not an
    /// object of strings.
    pub fn from_document(document: &Value) -> Result<Self, AuthTokensError> {
        let Some(auth) = document.get("auth") else {
            return Ok(Self::empty());
        };
        let section = auth.as_object().ok_or(AuthTokensError::NotAnObject)?;
        let tokens = section
            .iter()
            .map(|(key, value)| {
                let key = key.to_ascii_lowercase();
                match value.as_str() {
                    Some(text) => Ok((key, text.to_owned())),
                    None => Err(AuthTokensError::NonStringValue { key }),
                }
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self { tokens })
    }

    /// Look up a token by key, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the token under `key` equals `expected`.
    ///
    /// Equal-length values are compared without an early exit, so timing
    /// does not reveal the position of the first mismatching byte.
    pub fn matches(&self, key: &str, expected: &str) -> bool {
        self.get(key)
            .is_some_and(|actual| constant_time_eq(actual.as_bytes(), expected.as_bytes()))
    }

    /// Token keys, lowercased and sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// One inbound request body, before parsing.
#[derive(Debug, Clone)]
pub struct RawUpdate {
    /// Request body bytes.
    pub body: Vec<u8>,
    /// Request path, without the query string.
    pub path: String,
    /// Remote address of the game client.
    pub client: SocketAddr,
    /// When the request was read off the socket.
    pub received_at: DateTime<Utc>,
}

impl RawUpdate {
    /// Wrap a body received now.
    pub fn new(body: Vec<u8>, path: impl Into<String>, client: SocketAddr) -> Self {
        Self {
            body,
            path: path.into(),
            client,
            received_at: Utc::now(),
        }
    }
}

/// Bookkeeping for one accepted update.
#[derive(Debug, Clone)]
pub struct SessionContext {
    server_id: ServerId,
    sequence: u64,
    received_at: DateTime<Utc>,
    previous_received_at: Option<DateTime<Utc>>,
    client: SocketAddr,
    path: String,
    auth: AuthTokens,
    document: Value,
    body: Vec<u8>,
}

impl SessionContext {
    /// Build the candidate context for `update`.
    ///
    /// The sequence continues from `previous`, or starts at 1.
    pub fn candidate(
        server_id: ServerId,
        previous: Option<&Self>,
        update: RawUpdate,
        document: Value,
        auth: AuthTokens,
    ) -> Self {
        let sequence = previous.map_or(1, |prev| prev.sequence.saturating_add(1));
        Self {
            server_id,
            sequence,
            received_at: update.received_at,
            previous_received_at: previous.map(|prev| prev.received_at),
            client: update.client,
            path: update.path,
            auth,
            document,
            body: update.body,
        }
    }

    /// Identity of the pipeline that built this context.
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Position of this update in its session, starting at 1.
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Arrival time of this update.
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Arrival time of the previous update in the session.
    pub const fn previous_received_at(&self) -> Option<DateTime<Utc>> {
        self.previous_received_at
    }

    /// Remote address of the game client.
    pub const fn client(&self) -> SocketAddr {
        self.client
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Auth tokens sent with the update.
    pub const fn auth(&self) -> &AuthTokens {
        &self.auth
    }

    /// The parsed but undecoded document.
    pub const fn document(&self) -> &Value {
        &self.document
    }

    /// The raw request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether this is the first update of its session.
    pub const fn is_first(&self) -> bool {
        self.sequence == 1
    }

    /// Whether the update reports no change since the previous one.
    pub fn is_heartbeat(&self) -> bool {
        !self.is_first()
            && !DELTA_MARKERS
                .iter()
                .any(|marker| self.document.get(marker).is_some())
    }

    /// Time elapsed since the previous update in the session.
    pub fn elapsed_since_previous(&self) -> Option<Duration> {
        self.previous_received_at
            .map(|previous| self.received_at.signed_duration_since(previous))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> SocketAddr {
        "127.0.0.1:51000".parse().unwrap()
    }

    fn context(previous: Option<&SessionContext>, document: Value) -> SessionContext {
        let update = RawUpdate::new(document.to_string().into_bytes(), "/", client());
        SessionContext::candidate(
            ServerId::new(),
            previous,
            update,
            document,
            AuthTokens::empty(),
        )
    }

    #[test]
    fn auth_keys_are_case_insensitive() {
        let tokens =
            AuthTokens::from_document(&json!({ "auth": { "Password": "letmein" } })).unwrap();
        assert_eq!(tokens.get("password"), Some("letmein"));
        assert_eq!(tokens.get("PASSWORD"), Some("letmein"));
        assert!(tokens.matches("password", "letmein"));
        assert!(!tokens.matches("password", "letmeout"));
        assert!(!tokens.matches("password", "letmein!"));
        assert!(!tokens.matches("token", "letmein"));
    }

    #[test]
    fn missing_auth_is_empty() {
        let tokens = AuthTokens::from_document(&json!({ "map": {} })).unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn malformed_auth_is_an_error() {
        assert_eq!(
            AuthTokens::from_document(&json!({ "auth": "letmein" })),
            Err(AuthTokensError::NotAnObject)
        );
        assert_eq!(
            AuthTokens::from_document(&json!({ "auth": { "Pin": 1234 } })),
            Err(AuthTokensError::NonStringValue {
                key: String::from("pin")
            })
        );
    }

    #[test]
    fn debug_never_prints_secrets() {
        let tokens = AuthTokens::from_pairs([("password", "letmein")]);
        let rendered = format!("{tokens:?}");
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("letmein"));
    }

    #[test]
    fn sequence_continues_from_previous() {
        let first = context(None, json!({}));
        assert_eq!(first.sequence(), 1);
        assert!(first.is_first());
        assert!(first.elapsed_since_previous().is_none());

        let second = context(Some(&first), json!({ "added": {} }));
        assert_eq!(second.sequence(), 2);
        assert_eq!(second.previous_received_at(), Some(first.received_at()));
        assert!(second.elapsed_since_previous().is_some());
    }

    #[test]
    fn heartbeat_detection() {
        let first = context(None, json!({ "map": {} }));
        assert!(!first.is_heartbeat());

        let quiet = context(Some(&first), json!({ "map": {} }));
        assert!(quiet.is_heartbeat());

        let delta = context(Some(&quiet), json!({ "map": {}, "previously": { "map": {} } }));
        assert!(!delta.is_heartbeat());
    }
}
