//! Session storage keyed by session id.
//!
//! [`ContextManager`] is the entry point for front-ends: it owns a
//! [`SessionStore`] and hands out one turn at a time per session through
//! [`ContextManager::with_session`].

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::context::ConversationContext;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound(String),
    #[error("session payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("session storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationContext>, SessionError>;
    async fn save(&self, context: ConversationContext) -> Result<(), SessionError>;
    async fn delete(&self, session_id: &str) -> Result<bool, SessionError>;
    async fn all(&self) -> Result<Vec<ConversationContext>, SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ConversationContext>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationContext>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, context: ConversationContext) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(context.session_id.clone(), context);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id).is_some())
    }

    async fn all(&self) -> Result<Vec<ConversationContext>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().cloned().collect())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub tier_distribution: BTreeMap<String, usize>,
    pub goal_distribution: BTreeMap<String, usize>,
}

pub struct ContextManager {
    store: Arc<dyn SessionStore>,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(Arc::new(InMemorySessionStore::default()))
    }
}

impl ContextManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store, turn_locks: Mutex::new(HashMap::new()) }
    }

    pub async fn create(&self) -> Result<ConversationContext, SessionError> {
        let context = ConversationContext::new();
        self.store.save(context.clone()).await?;
        tracing::info!(
            event_name = "session.created",
            correlation_id = %context.session_id,
            "conversation session created"
        );
        Ok(context)
    }

    pub async fn get(&self, session_id: &str) -> Result<ConversationContext, SessionError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub async fn save(&self, context: ConversationContext) -> Result<(), SessionError> {
        self.store.save(context).await
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, SessionError> {
        self.turn_locks.lock().await.remove(session_id);
        self.store.delete(session_id).await
    }

    /// Runs one read-modify-write turn against a stored session. Turns on
    /// the same session queue behind each other; other sessions proceed.
    pub async fn with_session<F, Fut, T>(&self, session_id: &str, turn: F) -> Result<T, SessionError>
    where
        F: FnOnce(ConversationContext) -> Fut,
        Fut: Future<Output = (ConversationContext, T)>,
    {
        let lock = self.turn_lock(session_id).await;
        let _turn = lock.lock().await;

        let context = self.get(session_id).await?;
        let (mut context, output) = turn(context).await;
        context.touch();
        self.store.save(context).await?;
        Ok(output)
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks.entry(session_id.to_string()).or_default().clone()
    }

    pub async fn summary(&self, session_id: &str) -> String {
        let context = match self.store.get(session_id).await {
            Ok(Some(context)) => context,
            _ => return "Session not found".to_string(),
        };

        let tier = context
            .customer_profile
            .tier
            .map(|tier| tier.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mut summary = format!("Session: {}\n", context.session_id);
        summary.push_str(&format!("Customer Tier: {tier}\n"));
        summary.push_str(&format!(
            "Order Frequency: {}/month\n",
            context.customer_profile.order_frequency
        ));
        summary.push_str(&format!("Current Goal: {}\n", context.current_goal));
        summary.push_str(&format!("Delivery History: {} entries\n", context.delivery_history.len()));
        summary.push_str(&format!("Pricing History: {} entries\n", context.pricing_history.len()));
        summary
    }

    pub async fn export(&self, session_id: &str) -> Result<String, SessionError> {
        let context = self.get(session_id).await?;
        Ok(serde_json::to_string_pretty(&context)?)
    }

    pub async fn import(&self, raw: &str) -> Result<ConversationContext, SessionError> {
        let context: ConversationContext = serde_json::from_str(raw)?;
        if context.session_id.trim().is_empty() {
            return Err(SessionError::Storage("imported session has no session_id".to_string()));
        }
        self.store.save(context.clone()).await?;
        Ok(context)
    }

    /// Drops sessions idle for longer than `max_age` and returns their ids.
    pub async fn clear_expired(&self, max_age: Duration) -> Result<Vec<String>, SessionError> {
        // An age reaching past the representable calendar cannot expire anything.
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|max_age| Utc::now().checked_sub_signed(max_age))
        else {
            return Ok(Vec::new());
        };

        let mut expired = Vec::new();
        for context in self.store.all().await? {
            if context.last_activity < cutoff {
                self.delete(&context.session_id).await?;
                expired.push(context.session_id);
            }
        }

        if !expired.is_empty() {
            tracing::info!(
                event_name = "session.expired_cleared",
                correlation_id = "session_sweep",
                cleared = expired.len(),
                "expired sessions removed"
            );
        }
        Ok(expired)
    }

    pub async fn stats(&self) -> Result<SessionStats, SessionError> {
        let sessions = self.store.all().await?;
        let mut stats = SessionStats { total_sessions: sessions.len(), ..SessionStats::default() };

        for context in &sessions {
            let tier = context.customer_profile.tier.map(|tier| tier.as_str()).unwrap_or("unknown");
            *stats.tier_distribution.entry(tier.to_string()).or_default() += 1;
            if !context.current_goal.is_empty() {
                *stats.goal_distribution.entry(context.current_goal.clone()).or_default() += 1;
            }
        }
        Ok(stats)
    }
}
