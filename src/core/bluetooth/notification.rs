//! Notification handling
//! This module handles setting up notification streams on characteristics and
//! forwarding their values to the dispatcher's notification channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bluest::{Characteristic, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::types::{Notification, NotificationSink};

type SubscriptionKey = (String, Uuid, Uuid);

/// Notification handler for subscribed characteristics
#[derive(Clone, Default)]
pub struct NotificationHandler {
    subscriptions: Arc<Mutex<HashMap<SubscriptionKey, CancellationToken>>>,
}

impl NotificationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up notifications for a characteristic. Re-subscribing replaces the old stream.
    pub fn setup_notifications(
        &self,
        address: &str,
        service: Uuid,
        notify_char: Characteristic,
        sink: NotificationSink,
    ) {
        let key = (address.to_string(), service, notify_char.uuid());
        let cancel_token = CancellationToken::new();

        let previous = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, cancel_token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        info!("Subscribing to notifications on {}...", notify_char.uuid());
        let address = address.to_string();
        tokio::spawn(async move {
            Self::process_notifications(address, notify_char, sink, cancel_token).await;
        });
    }

    /// Stop the notification stream for a characteristic, if one is running
    pub fn stop_notifications(&self, address: &str, service: Uuid, characteristic: Uuid) -> bool {
        let token = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(address.to_string(), service, characteristic));
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every stream belonging to one device
    pub fn stop_device(&self, address: &str) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(addr, _, _), token| {
                if addr == address {
                    token.cancel();
                    false
                } else {
                    true
                }
            });
    }

    pub fn stop_all(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for token in subscriptions.values() {
            token.cancel();
        }
        subscriptions.clear();
    }

    async fn process_notifications(
        address: String,
        notify_char: Characteristic,
        sink: NotificationSink,
        cancel_token: CancellationToken,
    ) {
        let characteristic = notify_char.uuid();
        info!("Listening for notifications from {} on {}...", address, characteristic);

        match notify_char.notify().await {
            Ok(mut notification_stream) => loop {
                tokio::select! {
                    result = notification_stream.next() => {
                        match result {
                            Some(Ok(value)) => {
                                debug!("Received notification from {}: {:?}", address, value);
                                // An empty channel just means nobody is listening right now.
                                let _ = sink.send(Notification {
                                    address: address.clone(),
                                    characteristic,
                                    value,
                                });
                            }
                            Some(Err(e)) => {
                                error!("Error in notification stream: {}", e);
                                break;
                            }
                            None => break,
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            },
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
            }
        }

        info!("Notification stream for {} on {} ended", address, characteristic);
    }
}
