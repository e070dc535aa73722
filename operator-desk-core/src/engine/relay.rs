//! Relay engine: maps inbound and operator actions onto the store and the hub

use super::outbound::Outbound;
use crate::bus::{EventHub, EventSubscriber, InboundKind, InboundMessage, OutboundMessage, RelayEvent};
use crate::config::RelayConfig;
use crate::store::{ConversationStore, Message, Sender, UserId};
use crate::utils::truncate;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

type UserLock = Arc<tokio::sync::Mutex<()>>;

/// The relay core
///
/// Store mutations and event publication share one critical section, so per
/// user the order of `newMessage` events always equals history order. The
/// store lock is never held across outbound I/O; operator deliveries are
/// serialized per user instead.
pub struct RelayEngine {
    store: Mutex<ConversationStore>,
    hub: EventHub,
    outbound: Arc<dyn Outbound>,
    config: RelayConfig,
    user_locks: Mutex<HashMap<UserId, UserLock>>,
}

impl RelayEngine {
    pub fn new(config: RelayConfig, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            store: Mutex::new(ConversationStore::new()),
            hub: EventHub::new(config.event_buffer),
            outbound,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a live observer
    pub fn subscribe(&self) -> EventSubscriber {
        self.hub.subscribe()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Snapshot of active users, insertion order
    pub fn active_users(&self) -> Vec<UserId> {
        self.store.lock().list_active()
    }

    /// Snapshot of one user's history; empty when unknown
    pub fn history(&self, user: &UserId) -> Vec<Message> {
        self.store.lock().history(user)
    }

    /// Dispatch one message from the inbound adapter
    pub async fn handle_inbound(&self, msg: InboundMessage) {
        let user = msg.sender_id;
        match msg.kind {
            InboundKind::SessionStart => {
                self.start_session(&user);
                self.greet(&user, &self.config.greetings.session_start);
            }
            InboundKind::Text(text) => {
                let (newly_active, _) = self.receive_message(&user, text);
                if newly_active {
                    self.greet(&user, &self.config.greetings.first_message);
                }
            }
        }
    }

    /// Mark the user as engaged; returns whether they were new
    pub fn start_session(&self, user: &UserId) -> bool {
        let mut store = self.store.lock();
        let newly_active = store.ensure_active(user);
        if newly_active {
            info!("User {} started a session", user);
            self.hub.publish(RelayEvent::NewUser(user.clone()));
        }
        newly_active
    }

    /// Record a message written by the user
    pub fn receive_message(&self, user: &UserId, text: impl Into<String>) -> (bool, Message) {
        let mut store = self.store.lock();
        let newly_active = store.ensure_active(user);
        if newly_active {
            info!("New user {}", user);
            self.hub.publish(RelayEvent::NewUser(user.clone()));
        }
        let message = store.append_message(user, text, Sender::User);
        debug!("Inbound from {}: {}", user, truncate(&message.text, 80));
        self.hub.publish(RelayEvent::NewMessage {
            user_id: user.clone(),
            message: message.clone(),
        });
        (newly_active, message)
    }

    /// Deliver operator text, then record and broadcast it
    ///
    /// Nothing is recorded or broadcast when delivery fails. Once started,
    /// delivery runs to completion even if the caller goes away.
    pub async fn send(self: &Arc<Self>, user: UserId, text: impl Into<String>) -> Result<Message> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }

        let engine = Arc::clone(self);
        run_to_completion(async move {
            engine
                .with_user_lock(&user, async {
                    engine.deliver(&user, &text).await?;

                    let mut store = engine.store.lock();
                    let message = store.append_message(&user, text, Sender::Operator);
                    engine.hub.publish(RelayEvent::NewMessage {
                        user_id: user.clone(),
                        message: message.clone(),
                    });
                    info!("Operator message delivered to {}", user);
                    Ok::<_, Error>(message)
                })
                .await
        })
        .await
    }

    /// Deliver the termination notice, then forget the user
    pub async fn end(self: &Arc<Self>, user: UserId) -> Result<()> {
        let engine = Arc::clone(self);
        run_to_completion(async move {
            engine
                .with_user_lock(&user, async {
                    engine.deliver(&user, &engine.config.end_notice).await?;

                    let mut store = engine.store.lock();
                    store.end_user(&user);
                    engine.hub.publish(RelayEvent::ChatEnded(user.clone()));
                    info!("Chat with {} ended", user);
                    Ok::<_, Error>(())
                })
                .await
        })
        .await
    }

    /// Empty a user's history, keeping them active
    pub fn clear(&self, user: &UserId) {
        let mut store = self.store.lock();
        store.clear_history(user);
        self.hub.publish(RelayEvent::ChatCleared(user.clone()));
        info!("History of {} cleared", user);
    }

    /// Re-key a user; broadcasts only on success
    pub fn rename(&self, old: &UserId, new: &UserId) -> Result<()> {
        let mut store = self.store.lock();
        store.rename_user(old, new)?;
        if old != new {
            self.drop_idle_lock(old);
        }
        self.hub.publish(RelayEvent::UserRenamed {
            old_user_id: old.clone(),
            new_user_id: new.clone(),
        });
        info!("User {} renamed to {}", old, new);
        Ok(())
    }

    /// Run `action` while holding the user's delivery lock
    ///
    /// The lock entry is dropped again once no other action waits on it.
    async fn with_user_lock<T>(&self, user: &UserId, action: impl Future<Output = T>) -> T {
        let lock = self
            .user_locks
            .lock()
            .entry(user.clone())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            action.await
        };
        drop(lock);
        self.drop_idle_lock(user);
        result
    }

    /// Forget `user`'s lock when only the map still holds it
    fn drop_idle_lock(&self, user: &UserId) {
        let mut locks = self.user_locks.lock();
        if locks.get(user).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(user);
        }
    }

    async fn deliver(&self, user: &UserId, text: &str) -> Result<()> {
        let message = OutboundMessage::new(self.config.channel.clone(), user.as_str(), text);
        self.outbound.deliver(message).await.map_err(|e| {
            warn!("Delivery to {} failed: {}", user, e);
            match e {
                Error::Delivery(_) => e,
                other => Error::Delivery(other.to_string()),
            }
        })
    }

    /// Fire-and-forget reply; never recorded, failures only logged
    fn greet(&self, user: &UserId, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let outbound = Arc::clone(&self.outbound);
        let message = OutboundMessage::new(self.config.channel.clone(), user.as_str(), text);
        let user = user.clone();
        tokio::spawn(async move {
            if let Err(e) = outbound.deliver(message).await {
                warn!("Failed to greet {}: {}", user, e);
            }
        });
    }
}

/// Run an operator action on its own task so dropping the caller cannot cut
/// it short; a panicking adapter surfaces as a delivery error.
async fn run_to_completion<T, F>(action: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(action)
        .await
        .map_err(|e| Error::Delivery(format!("delivery task failed: {}", e)))?
}
