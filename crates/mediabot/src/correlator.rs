use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

/// Length of the opaque request token; `ask_trim|` plus the token must fit a 64-byte callback payload
pub const TOKEN_LEN: usize = 8;

/// Identifies a prompt message the user may reply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptId {
    pub chat_id: i64,
    pub message_id: i32,
}

/// A download/trim choice waiting for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CorrelatorState {
    pending: HashMap<String, PendingRequest>,
    prompts: HashMap<PromptId, String>,
}

/// In-process map from short tokens to pending requests, and from trim prompts to tokens
///
/// Every operation holds the lock for a single lookup/insert/remove and never
/// across an await point, so it is safe to share between the interactive
/// handlers and running jobs.
#[derive(Debug)]
pub struct RequestCorrelator {
    ttl: chrono::Duration,
    state: Mutex<CorrelatorState>,
}

impl RequestCorrelator {
    /// Create a correlator whose pending requests expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        RequestCorrelator {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            state: Mutex::new(CorrelatorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CorrelatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, request: &PendingRequest, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(request.created_at) <= self.ttl
    }

    /// Register a URL awaiting the user's choice and return its token
    pub fn register_pending(&self, url: &str) -> String {
        self.register_pending_at(url, Utc::now())
    }

    /// Register with an explicit creation time
    pub fn register_pending_at(&self, url: &str, created_at: DateTime<Utc>) -> String {
        let mut state = self.lock();
        let token = loop {
            let candidate: String = Uuid::new_v4().simple().to_string()[..TOKEN_LEN].to_string();
            if !state.pending.contains_key(&candidate) {
                break candidate;
            }
        };
        state.pending.insert(
            token.clone(),
            PendingRequest { url: url.to_string(), created_at },
        );
        debug!("Registered pending request {} for {}", token, url);
        token
    }

    /// Look up the URL for a token without consuming it; expired entries count as absent
    pub fn resolve(&self, token: &str) -> Option<String> {
        let state = self.lock();
        state
            .pending
            .get(token)
            .filter(|request| self.is_live(request, Utc::now()))
            .map(|request| request.url.clone())
    }

    /// Atomically resolve and consume a token; only the first caller gets the URL
    pub fn claim(&self, token: &str) -> Option<String> {
        let mut state = self.lock();
        let request = state.pending.remove(token)?;
        if self.is_live(&request, Utc::now()) {
            debug!("Claimed pending request {}", token);
            Some(request.url)
        } else {
            debug!("Pending request {} expired before it was claimed", token);
            None
        }
    }

    /// Remove a pending request; a no-op when it is already gone
    pub fn consume(&self, token: &str) {
        self.lock().pending.remove(token);
    }

    /// Remember which token a trim prompt belongs to
    pub fn bind_trim_prompt(&self, prompt: PromptId, token: &str) {
        self.lock().prompts.insert(prompt, token.to_string());
    }

    /// Token bound to a trim prompt, if any
    pub fn resolve_trim_prompt(&self, prompt: PromptId) -> Option<String> {
        self.lock().prompts.get(&prompt).cloned()
    }

    /// Forget a trim prompt binding; a no-op when it is already gone
    pub fn drop_trim_prompt(&self, prompt: PromptId) {
        self.lock().prompts.remove(&prompt);
    }

    /// Drop expired pending requests and the prompt bindings pointing at them
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let before = state.pending.len();
        let ttl = self.ttl;
        state
            .pending
            .retain(|_, request| now.signed_duration_since(request.created_at) <= ttl);
        let purged = before - state.pending.len();

        let CorrelatorState { pending, prompts } = &mut *state;
        prompts.retain(|_, token| pending.contains_key(token));

        purged
    }

    /// Number of pending requests, including expired ones not yet purged
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}
