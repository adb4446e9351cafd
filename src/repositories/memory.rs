//! In-memory store backend.
//!
//! Backs the integration suites and embedded use. Every conditional
//! transition holds the map lock for the whole read-modify-write, so the
//! compare-and-swap contracts of the traits hold here too.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::models::{AuthRefreshToken, AuthSession, PendingTwoFactor, RecoveryCode, User};
use crate::repositories::{
    PendingTwoFactorStore, RecoveryCodeStore, RefreshTokenStore, SessionStore, UserStore,
};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.lock().expect("user lock").insert(user.id.clone(), user);
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.users.lock().expect("user lock").get(user_id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().expect("user lock");
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.get(user_id))
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut users = self.users.lock().expect("user lock");
        if let Some(user) = users.get_mut(user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn store_two_factor_secret(
        &self,
        user_id: &str,
        encrypted_secret: &str,
    ) -> Result<(), AuthError> {
        let mut users = self.users.lock().expect("user lock");
        if let Some(user) = users.get_mut(user_id) {
            user.two_factor_secret = Some(encrypted_secret.to_string());
            user.two_factor_enabled = false;
        }
        Ok(())
    }

    async fn enable_two_factor(&self, user_id: &str) -> Result<(), AuthError> {
        let mut users = self.users.lock().expect("user lock");
        if let Some(user) = users.get_mut(user_id) {
            user.two_factor_enabled = true;
        }
        Ok(())
    }

    async fn disable_two_factor(&self, user_id: &str) -> Result<(), AuthError> {
        let mut users = self.users.lock().expect("user lock");
        if let Some(user) = users.get_mut(user_id) {
            user.two_factor_enabled = false;
            user.two_factor_secret = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<AuthSession> {
        self.sessions
            .lock()
            .expect("session lock")
            .get(session_id)
            .cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &AuthSession) -> Result<(), AuthError> {
        self.sessions
            .lock()
            .expect("session lock")
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.get(session_id))
    }

    async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<AuthSession>, AuthError> {
        let sessions = self.sessions.lock().expect("session lock");
        let mut active: Vec<AuthSession> = sessions
            .values()
            .filter(|session| session.user_id == user_id && !session.revoked)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn revoke(&self, session_id: &str) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.lock().expect("session lock");
        match sessions.get_mut(session_id) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut sessions = self.sessions.lock().expect("session lock");
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<String, AuthRefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token_id: &str) -> Option<AuthRefreshToken> {
        self.tokens
            .lock()
            .expect("token lock")
            .get(token_id)
            .cloned()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, token: &AuthRefreshToken) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("token lock")
            .insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthRefreshToken>, AuthError> {
        let tokens = self.tokens.lock().expect("token lock");
        Ok(tokens
            .values()
            .find(|token| token.token_hash == token_hash)
            .cloned())
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AuthRefreshToken>, AuthError> {
        let tokens = self.tokens.lock().expect("token lock");
        let mut linked: Vec<AuthRefreshToken> = tokens
            .values()
            .filter(|token| token.session_id == session_id)
            .cloned()
            .collect();
        linked.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(linked)
    }

    async fn mark_rotated(
        &self,
        token_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut tokens = self.tokens.lock().expect("token lock");
        match tokens.get_mut(token_id) {
            Some(token) if !token.rotated => {
                token.rotated = true;
                token.rotated_at = Some(rotated_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_grace_used(&self, token_id: &str) -> Result<bool, AuthError> {
        let mut tokens = self.tokens.lock().expect("token lock");
        match tokens.get_mut(token_id) {
            Some(token) if !token.grace_used => {
                token.grace_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let mut tokens = self.tokens.lock().expect("token lock");
        match tokens.get_mut(token_id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_for_session(&self, session_id: &str) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.lock().expect("token lock");
        let mut revoked = 0;
        for token in tokens.values_mut() {
            if token.session_id == session_id && !token.revoked {
                token.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.lock().expect("token lock");
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPendingTwoFactorStore {
    pending: Mutex<HashMap<String, PendingTwoFactor>>,
}

impl MemoryPendingTwoFactorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pending_id: &str) -> Option<PendingTwoFactor> {
        self.pending
            .lock()
            .expect("pending lock")
            .get(pending_id)
            .cloned()
    }
}

#[async_trait]
impl PendingTwoFactorStore for MemoryPendingTwoFactorStore {
    async fn create(&self, record: &PendingTwoFactor) -> Result<(), AuthError> {
        self.pending
            .lock()
            .expect("pending lock")
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_id(&self, pending_id: &str) -> Result<Option<PendingTwoFactor>, AuthError> {
        Ok(self.get(pending_id))
    }

    async fn delete(&self, pending_id: &str) -> Result<(), AuthError> {
        self.pending.lock().expect("pending lock").remove(pending_id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut pending = self.pending.lock().expect("pending lock");
        let before = pending.len();
        pending.retain(|_, record| record.expires_at > now);
        Ok((before - pending.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecoveryCodeStore {
    codes: Mutex<HashMap<String, RecoveryCode>>,
}

impl MemoryRecoveryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_user(&self, user_id: &str) -> usize {
        self.codes
            .lock()
            .expect("code lock")
            .values()
            .filter(|code| code.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl RecoveryCodeStore for MemoryRecoveryCodeStore {
    async fn replace_for_user(
        &self,
        user_id: &str,
        codes: &[RecoveryCode],
    ) -> Result<(), AuthError> {
        let mut stored = self.codes.lock().expect("code lock");
        stored.retain(|_, code| code.user_id != user_id);
        for code in codes {
            stored.insert(code.id.clone(), code.clone());
        }
        Ok(())
    }

    async fn list_unused_for_user(&self, user_id: &str) -> Result<Vec<RecoveryCode>, AuthError> {
        let stored = self.codes.lock().expect("code lock");
        let mut unused: Vec<RecoveryCode> = stored
            .values()
            .filter(|code| code.user_id == user_id && !code.used)
            .cloned()
            .collect();
        unused.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(unused)
    }

    async fn mark_used(&self, code_id: &str) -> Result<bool, AuthError> {
        let mut stored = self.codes.lock().expect("code lock");
        match stored.get_mut(code_id) {
            Some(code) if !code.used => {
                code.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<(), AuthError> {
        let mut stored = self.codes.lock().expect("code lock");
        stored.retain(|_, code| code.user_id != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_rotated_succeeds_exactly_once() {
        let store = MemoryRefreshTokenStore::new();
        let token = AuthRefreshToken::new("session-1", "hash-1", 3600);
        store.create(&token).await.unwrap();

        let now = Utc::now();
        assert!(store.mark_rotated(&token.id, now).await.unwrap());
        assert!(!store.mark_rotated(&token.id, now).await.unwrap());

        let stored = store.get(&token.id).unwrap();
        assert!(stored.rotated);
        assert_eq!(stored.rotated_at, Some(now));
    }

    #[tokio::test]
    async fn mark_grace_used_is_one_shot() {
        let store = MemoryRefreshTokenStore::new();
        let token = AuthRefreshToken::new("session-1", "hash-1", 3600);
        store.create(&token).await.unwrap();

        assert!(store.mark_grace_used(&token.id).await.unwrap());
        assert!(!store.mark_grace_used(&token.id).await.unwrap());
    }

    #[tokio::test]
    async fn session_revoke_is_idempotent() {
        let store = MemorySessionStore::new();
        let session = AuthSession::new("user-1", "127.0.0.1", "agent", 900, false);
        store.create(&session).await.unwrap();

        assert!(store.revoke(&session.id).await.unwrap());
        assert!(!store.revoke(&session.id).await.unwrap());
        assert!(store.get(&session.id).unwrap().revoked);
    }

    #[tokio::test]
    async fn replace_for_user_purges_prior_codes() {
        let store = MemoryRecoveryCodeStore::new();
        let first = vec![RecoveryCode::new("user-1", "AB12-CD34")];
        store.replace_for_user("user-1", &first).await.unwrap();

        let second = vec![
            RecoveryCode::new("user-1", "EF56-AB78"),
            RecoveryCode::new("user-1", "1234-5678"),
        ];
        store.replace_for_user("user-1", &second).await.unwrap();

        assert_eq!(store.count_for_user("user-1"), 2);
        let unused = store.list_unused_for_user("user-1").await.unwrap();
        assert!(unused.iter().all(|code| !code.matches("AB12-CD34")));
    }
}
