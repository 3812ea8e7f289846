//! Coordination engine entry points.
//!
//! One submodule per entity kind; every entry follows the same skeleton:
//! identity, authorise, open a transaction, read the old record, validate,
//! mutate, match subscribers, bump notification indices, assemble the
//! response.

pub mod constraints;
pub mod operational_intents;
pub mod subscriptions;
pub mod vertiports;

use crate::models::subscription::Subscription;
use crate::store::Store;
use crate::Config;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Source of the current time, injectable for tests
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used outside of tests
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The public operation surface of the coordination service
#[derive(Clone)]
pub struct Server {
    store: Store,
    enable_http: bool,
    clock: Arc<dyn Clock>,
}

impl Server {
    /// Creates a server over `store` using the system clock
    pub fn new(store: Store, enable_http: bool) -> Self {
        Server::with_clock(store, enable_http, Arc::new(SystemClock))
    }

    /// Creates a server with an injected clock
    pub fn with_clock(store: Store, enable_http: bool, clock: Arc<dyn Clock>) -> Self {
        Server {
            store,
            enable_http,
            clock,
        }
    }

    /// Creates a server and a fresh store from configuration values
    pub fn from_config(config: &Config) -> Self {
        Server::new(
            Store::with_retries(config.transaction_retries),
            config.enable_http,
        )
    }
}

/// Notification state of one subscription, as the subscriber will see it
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub subscription_id: Uuid,
    pub notification_index: i32,
}

/// Subscriptions to notify at one USS callback URL
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberToNotify {
    pub uss_base_url: String,
    pub subscriptions: Vec<SubscriptionState>,
}

/// Groups affected subscriptions by callback URL. The notification index
/// bump has already happened inside the same transaction, so the indices
/// here are the ones the subscribers will observe.
pub fn subscribers_to_notify(subs: &[Subscription]) -> Vec<SubscriberToNotify> {
    let mut by_url: BTreeMap<&str, Vec<SubscriptionState>> = BTreeMap::new();

    for sub in subs {
        by_url
            .entry(sub.uss_base_url.as_str())
            .or_default()
            .push(SubscriptionState {
                subscription_id: sub.id,
                notification_index: sub.notification_index,
            });
    }

    by_url
        .into_iter()
        .map(|(url, subscriptions)| SubscriberToNotify {
            uss_base_url: url.to_string(),
            subscriptions,
        })
        .collect()
}
