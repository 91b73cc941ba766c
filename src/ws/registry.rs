//! The connection registry: the single owner of all cross-connection
//! shared mutable state.
//!
//! Two maps, both DashMap-backed so every operation is atomic with respect
//! to concurrent mutation from other connections' handlers:
//! - direct addressing: identity -> the one live connection (reconnect
//!   evicts the previous connection, last-writer-wins);
//! - scope membership: scope id -> members currently joined (event rooms).
//!
//! Nothing outside this module touches the maps directly.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::ConnectionSender;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// A live connection bound to one authenticated identity.
/// The conn_id disambiguates an identity's successive connections so a
/// stale disconnect can never tear down its replacement's entry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: u64,
    pub user_id: String,
    pub tx: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(user_id: String, tx: ConnectionSender) -> Self {
        Self {
            conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            tx,
        }
    }
}

/// A connection joined to a scope, with display data cached at join time
/// so presence snapshots need no storage round trip.
#[derive(Debug, Clone)]
pub struct ScopeMember {
    pub conn_id: u64,
    pub user_id: String,
    pub display_name: String,
    pub tx: ConnectionSender,
}

/// In-memory routing tables for live connections.
#[derive(Debug, Default)]
pub struct Registry {
    /// identity -> live connection
    direct: DashMap<String, ConnectionHandle>,
    /// scope id -> joined members
    scopes: DashMap<String, Vec<ScopeMember>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a connection under its identity's direct-addressing slot.
    /// Returns the replaced connection, if any, so the caller can close it.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.direct.insert(handle.user_id.clone(), handle)
    }

    /// Remove the direct entry (only if this connection still owns it) and
    /// leave every scope the connection was joined to, in that order.
    /// Returns the scope ids whose membership changed, for presence broadcasts.
    pub fn unregister(&self, user_id: &str, conn_id: u64) -> Vec<String> {
        self.direct.remove_if(user_id, |_, h| h.conn_id == conn_id);
        self.leave_scopes_by_conn(conn_id)
    }

    /// Add a connection to a scope's member set, creating the set if absent.
    /// A re-join by the same identity replaces its previous membership.
    pub fn join_scope(&self, scope_id: &str, member: ScopeMember) {
        let mut entry = self.scopes.entry(scope_id.to_string()).or_default();
        entry.retain(|m| m.user_id != member.user_id);
        entry.push(member);
    }

    /// Remove an identity from a scope's member set; the set itself is
    /// deleted once empty so no dangling PresenceSet survives.
    pub fn leave_scope(&self, scope_id: &str, user_id: &str) {
        if let Some(mut entry) = self.scopes.get_mut(scope_id) {
            entry.retain(|m| m.user_id != user_id);
        }
        self.scopes.remove_if(scope_id, |_, members| members.is_empty());
    }

    /// Remove one connection from every scope it is joined to.
    /// Returns the scope ids it actually left.
    fn leave_scopes_by_conn(&self, conn_id: u64) -> Vec<String> {
        let scope_ids: Vec<String> = self.scopes.iter().map(|e| e.key().clone()).collect();
        let mut left = Vec::new();

        for scope_id in scope_ids {
            if let Some(mut entry) = self.scopes.get_mut(&scope_id) {
                let before = entry.len();
                entry.retain(|m| m.conn_id != conn_id);
                if entry.len() < before {
                    left.push(scope_id.clone());
                }
            }
            self.scopes.remove_if(&scope_id, |_, members| members.is_empty());
        }

        left
    }

    /// Current member set of a scope (empty when the scope has no set).
    pub fn members(&self, scope_id: &str) -> Vec<ScopeMember> {
        self.scopes
            .get(scope_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Look up an identity's live connection for direct addressing.
    pub fn find(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.direct.get(user_id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(user: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<axum::extract::ws::Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(user.to_string(), tx), rx)
    }

    fn member(h: &ConnectionHandle) -> ScopeMember {
        ScopeMember {
            conn_id: h.conn_id,
            user_id: h.user_id.clone(),
            display_name: h.user_id.to_uppercase(),
            tx: h.tx.clone(),
        }
    }

    #[test]
    fn register_evicts_previous_connection() {
        let registry = Registry::new();
        let (old, _rx_old) = handle("u1");
        let (new, _rx_new) = handle("u1");

        assert!(registry.register(old.clone()).is_none());
        let evicted = registry.register(new.clone()).expect("old connection evicted");
        assert_eq!(evicted.conn_id, old.conn_id);
        assert_eq!(registry.find("u1").unwrap().conn_id, new.conn_id);
    }

    #[test]
    fn stale_unregister_does_not_remove_replacement() {
        let registry = Registry::new();
        let (old, _rx_old) = handle("u1");
        let (new, _rx_new) = handle("u1");
        registry.register(old.clone());
        registry.register(new.clone());

        // The evicted connection's cleanup runs after the replacement registered
        registry.unregister("u1", old.conn_id);
        assert_eq!(registry.find("u1").unwrap().conn_id, new.conn_id);

        registry.unregister("u1", new.conn_id);
        assert!(registry.find("u1").is_none());
    }

    #[test]
    fn join_leave_last_operation_wins() {
        let registry = Registry::new();
        let (h, _rx) = handle("u1");

        // join, leave, join again: final state reflects the last operation
        registry.join_scope("event:e1", member(&h));
        registry.leave_scope("event:e1", "u1");
        registry.join_scope("event:e1", member(&h));
        assert_eq!(registry.members("event:e1").len(), 1);

        registry.leave_scope("event:e1", "u1");
        assert!(registry.members("event:e1").is_empty());
    }

    #[test]
    fn rejoin_does_not_duplicate_membership() {
        let registry = Registry::new();
        let (h, _rx) = handle("u1");
        registry.join_scope("event:e1", member(&h));
        registry.join_scope("event:e1", member(&h));
        assert_eq!(registry.members("event:e1").len(), 1);
    }

    #[test]
    fn empty_scope_set_is_deleted() {
        let registry = Registry::new();
        let (h, _rx) = handle("u1");
        registry.join_scope("event:e1", member(&h));
        registry.leave_scope("event:e1", "u1");
        // Scope set must not linger empty
        assert!(registry.scopes.get("event:e1").is_none());
    }

    #[test]
    fn unregister_leaves_joined_scopes() {
        let registry = Registry::new();
        let (a, _rx_a) = handle("u1");
        let (b, _rx_b) = handle("u2");
        registry.register(a.clone());
        registry.register(b.clone());
        registry.join_scope("event:e1", member(&a));
        registry.join_scope("event:e1", member(&b));

        let left = registry.unregister("u1", a.conn_id);
        assert_eq!(left, vec!["event:e1".to_string()]);

        let remaining = registry.members("event:e1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "u2");
    }
}
