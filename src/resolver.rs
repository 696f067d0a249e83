//! Login → user-id resolution state.
//!
//! The cache itself is plain owned state inside the manager task; the actual
//! API calls are spawned by the actor, which posts completions back into its
//! mailbox. This keeps `lookup` synchronous (readiness checks run on every
//! reconcile pass) while coalescing concurrent interest in the same login
//! into one outstanding call.

use std::collections::{HashMap, HashSet};

/// Bidirectional login↔id map plus in-flight bookkeeping.
///
/// Mappings are monotonic: once a login resolved to an id, neither direction
/// is ever rewritten for the rest of the run.
#[derive(Debug, Default)]
pub(crate) struct IdResolver {
    by_login: HashMap<String, String>,
    by_id: HashMap<String, String>,
    in_flight: HashSet<String>,
    // logins the server reported as unknown; kept so reconcile passes don't
    // re-query them, cleared when the application shows fresh interest
    not_found: HashSet<String>,
}

impl IdResolver {
    /// Cached id for `login`, if resolution completed. Never blocks.
    pub fn lookup(&self, login: &str) -> Option<&str> {
        self.by_login.get(login).map(String::as_str)
    }

    /// Reverse lookup, id → login.
    pub fn login_for(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Registers interest in `login`. Returns `true` iff the caller should
    /// start an API call: unknown, not already in flight and not recorded as
    /// missing.
    pub fn begin(&mut self, login: &str) -> bool {
        if self.by_login.contains_key(login)
            || self.in_flight.contains(login)
            || self.not_found.contains(login)
        {
            return false;
        }
        self.in_flight.insert(login.to_owned());
        true
    }

    pub fn is_in_flight(&self, login: &str) -> bool {
        self.in_flight.contains(login)
    }

    /// Records a completed resolution. `id = None` marks the login missing.
    pub fn complete(&mut self, login: &str, id: Option<String>) {
        self.in_flight.remove(login);
        match id {
            Some(id) => {
                // monotonic: first resolution wins
                if !self.by_login.contains_key(login) {
                    self.by_id.entry(id.clone()).or_insert_with(|| login.to_owned());
                    self.by_login.insert(login.to_owned(), id);
                }
                self.not_found.remove(login);
            }
            None => {
                self.not_found.insert(login.to_owned());
            }
        }
    }

    /// Drops the in-flight marker without recording a result, so a later
    /// reconcile pass may retry. Used when the API call itself failed.
    pub fn abandon(&mut self, login: &str) {
        self.in_flight.remove(login);
    }

    /// A fresh listen names this login again: forget a cached miss so the
    /// next reconcile pass queries the server once more.
    pub fn renew_interest(&mut self, login: &str) {
        self.not_found.remove(login);
    }
}
