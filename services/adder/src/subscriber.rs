//! Redis pub/sub transport for file-arrival notifications.
//!
//! Notifications are JSON payloads published on topic channels; topics are
//! subscribed as channel patterns so a configured topic matches its whole
//! subtree.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use mosaic_sync::{
    Notification, Subscribe, SubscriberOptions, Subscription, SyncError, SyncResult,
};

/// Opens subscription sessions over Redis pub/sub.
pub struct RedisSubscriber;

#[async_trait]
impl Subscribe for RedisSubscriber {
    async fn open(&self, options: &SubscriberOptions) -> SyncResult<Box<dyn Subscription>> {
        let url = broker_url(options);
        let client = redis::Client::open(url.as_str())
            .map_err(|err| SyncError::Subscription(err.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|err| SyncError::Subscription(err.to_string()))?;

        for topic in &options.topics {
            pubsub
                .psubscribe(format!("{}*", topic))
                .await
                .map_err(|err| SyncError::Subscription(err.to_string()))?;
        }
        if !options.services.is_empty() {
            debug!(services = %options.services, "Service filtering not applied by this transport");
        }

        info!(url = %url, topics = ?options.topics, "Subscribed to notification channels");
        Ok(Box::new(RedisSubscription { pubsub }))
    }
}

struct RedisSubscription {
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn recv(&mut self, timeout: Duration) -> SyncResult<Option<Notification>> {
        let mut messages = self.pubsub.on_message();
        match tokio::time::timeout(timeout, messages.next()).await {
            // Poll timeout: no message this interval.
            Err(_) => Ok(None),
            Ok(None) => Err(SyncError::Subscription(
                "notification stream closed".to_string(),
            )),
            Ok(Some(message)) => {
                let payload: String = message
                    .get_payload()
                    .map_err(|err| SyncError::Subscription(err.to_string()))?;
                match serde_json::from_str::<Notification>(&payload) {
                    Ok(notification) => Ok(Some(notification)),
                    Err(err) => {
                        warn!(error = %err, payload = %payload, "Ignoring undecodable notification");
                        Ok(None)
                    }
                }
            }
        }
    }
}

/// Broker URL: the first explicit address wins, otherwise the nameserver
/// host on the default port.
fn broker_url(options: &SubscriberOptions) -> String {
    if let Some(first) = options
        .addresses
        .as_ref()
        .and_then(|addresses| addresses.first())
    {
        return first.clone();
    }
    format!("redis://{}:6379", options.nameserver)
}
