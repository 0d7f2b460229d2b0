// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event subscription lease lifecycle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::LeaseConfig;
use crate::protocol::gena::{Notification, parse_timeout};
use crate::protocol::{Endpoint, SubscribeRequest, Transport};
use crate::schedule::TaskSlot;

/// Lifecycle of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseState {
    /// No lease, nothing scheduled.
    Unsubscribed,
    /// A subscribe is in flight, or a retry is scheduled.
    Subscribing,
    /// The lease is held; a renewal is scheduled.
    Active,
    /// A renewal of a held lease is in flight.
    Renewing,
    /// Failures persist; retries continue in the background.
    Error,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unsubscribed => "unsubscribed",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::Renewing => "renewing",
            Self::Error => "error",
        })
    }
}

/// What [`SubscriptionLeaseManager::validate`] decided about a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The notification is current; the expected sequence advanced.
    Accepted,
    /// The identifier matches but the sequence is behind (duplicate or
    /// reordered delivery).
    Stale,
    /// The identifier is not the current one.
    Mismatch,
}

impl Delivery {
    /// Returns `true` for [`Delivery::Accepted`].
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

type Observer = Arc<dyn Fn(LeaseState) + Send + Sync>;

#[derive(Debug, Default)]
struct LeaseRecord {
    sid: Option<String>,
    expected_seq: u64,
    last_lease_secs: u64,
    failures: u32,
}

struct LeaseInner<T> {
    transport: Arc<T>,
    endpoint: Endpoint,
    event_path: String,
    config: LeaseConfig,
    record: Mutex<LeaseRecord>,
    state_tx: watch::Sender<LeaseState>,
    timer: Arc<TaskSlot>,
    observer: Mutex<Option<Observer>>,
    epoch: AtomicU64,
}

/// Keeps one event subscription alive for one device.
///
/// [`acquire`](Self::acquire) subscribes; on success the lease is renewed
/// unconditionally one second before it lapses (never sooner than the
/// configured floor), whether or not notifications arrived. Every renewal
/// yields an identifier that supersedes the previous one and resets the
/// expected sequence number.
///
/// Failures never propagate. A failed attempt schedules a retry after a
/// backoff proportional to the last known lease. After
/// [`LeaseConfig::error_threshold`] consecutive failures the lease rests
/// in [`LeaseState::Error`] between retries; each retry passes through
/// [`LeaseState::Subscribing`].
///
/// Dropping the manager cancels its timers without unsubscribing; call
/// [`shutdown`](Self::shutdown) for an orderly release.
pub struct SubscriptionLeaseManager<T> {
    inner: Arc<LeaseInner<T>>,
}

impl<T: Transport> SubscriptionLeaseManager<T> {
    /// Creates a manager for the event service at `event_path`.
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        endpoint: Endpoint,
        event_path: impl Into<String>,
        config: LeaseConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(LeaseState::Unsubscribed);
        Self {
            inner: Arc::new(LeaseInner {
                transport,
                endpoint,
                event_path: event_path.into(),
                config,
                record: Mutex::new(LeaseRecord::default()),
                state_tx,
                timer: TaskSlot::new(),
                observer: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a callback run on every state transition.
    ///
    /// The callback runs synchronously on the task that made the
    /// transition and must not call back into this manager.
    pub fn on_transition<F>(&self, observer: F)
    where
        F: Fn(LeaseState) + Send + Sync + 'static,
    {
        *self.inner.observer.lock() = Some(Arc::new(observer));
    }

    /// Subscribes now, cancelling any pending renewal or retry.
    ///
    /// An attempt still in flight from a timer is superseded: whatever it
    /// returns is discarded. Returns the state after this attempt.
    pub async fn acquire(&self) -> LeaseState {
        self.inner.timer.cancel();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.attempt(epoch).await;
        self.state()
    }

    /// Checks a notification against the current lease.
    ///
    /// Accepts it only if the identifier is current and the sequence is at
    /// least the expected one; the expected sequence then moves one past
    /// it. Anything else leaves the lease untouched.
    pub fn validate(&self, notification: &Notification) -> Delivery {
        let mut record = self.inner.record.lock();
        if record.sid.as_deref() != Some(notification.sid.as_str()) {
            tracing::trace!(
                sid = %notification.sid,
                seq = notification.seq,
                "Notification for unknown subscription"
            );
            return Delivery::Mismatch;
        }
        if notification.seq < record.expected_seq {
            tracing::trace!(
                sid = %notification.sid,
                seq = notification.seq,
                expected = record.expected_seq,
                "Stale notification discarded"
            );
            return Delivery::Stale;
        }
        record.expected_seq = notification.seq.saturating_add(1);
        Delivery::Accepted
    }

    /// Cancels timers, forgets the lease and sends a best-effort
    /// `UNSUBSCRIBE`.
    pub async fn shutdown(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.timer.cancel();
        let sid = {
            let mut record = self.inner.record.lock();
            record.failures = 0;
            record.expected_seq = 0;
            record.sid.take()
        };
        self.inner.set_state(LeaseState::Unsubscribed);

        if let Some(sid) = sid {
            match self
                .inner
                .transport
                .unsubscribe(&self.inner.endpoint, &self.inner.event_path, &sid)
                .await
            {
                Ok(status) => tracing::debug!(sid = %sid, status, "Unsubscribed"),
                Err(err) => tracing::debug!(sid = %sid, error = %err, "Unsubscribe failed"),
            }
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LeaseState {
        *self.inner.state_tx.borrow()
    }

    /// Returns a receiver following the state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<LeaseState> {
        self.inner.state_tx.subscribe()
    }

    /// Current subscription identifier.
    #[must_use]
    pub fn sid(&self) -> Option<String> {
        self.inner.record.lock().sid.clone()
    }

    /// Sequence number the next notification must reach.
    #[must_use]
    pub fn expected_sequence(&self) -> u64 {
        self.inner.record.lock().expected_seq
    }

    /// Consecutive failed attempts.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.inner.record.lock().failures
    }

    /// Event path this lease covers.
    #[must_use]
    pub fn event_path(&self) -> &str {
        &self.inner.event_path
    }
}

impl<T> Drop for SubscriptionLeaseManager<T> {
    fn drop(&mut self) {
        self.inner.timer.cancel();
    }
}

impl<T> fmt::Debug for SubscriptionLeaseManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionLeaseManager")
            .field("endpoint", &self.inner.endpoint)
            .field("event_path", &self.inner.event_path)
            .field("state", &*self.inner.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

/// Timer entry point. Boxed so the attempt future can schedule itself.
fn scheduled_attempt<T: Transport>(
    inner: Weak<LeaseInner<T>>,
    epoch: u64,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        if let Some(inner) = inner.upgrade() {
            inner.attempt(epoch).await;
        }
    })
}

impl<T: Transport> LeaseInner<T> {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_state(&self, state: LeaseState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::trace!(endpoint = %self.endpoint, state = %state, "Lease transition");
            let observer = self.observer.lock().clone();
            if let Some(observer) = observer {
                observer(state);
            }
        }
    }

    async fn attempt(self: &Arc<Self>, epoch: u64) {
        let renewing = self.record.lock().sid.clone();
        let current = *self.state_tx.borrow();
        self.set_state(match (&renewing, current) {
            (Some(_), LeaseState::Active) => LeaseState::Renewing,
            _ => LeaseState::Subscribing,
        });

        let request = SubscribeRequest {
            event_path: self.event_path.clone(),
            sid: renewing.clone(),
            timeout_secs: self.config.requested_secs(),
        };
        let result = self.transport.subscribe(&self.endpoint, &request).await;

        if !self.is_current(epoch) {
            tracing::trace!(endpoint = %self.endpoint, "Superseded subscribe result discarded");
            return;
        }

        let granted = match result {
            Ok(response) if response.is_success() => match response.sid {
                Some(sid) => {
                    let lease_secs = response
                        .timeout
                        .as_deref()
                        .and_then(parse_timeout)
                        .unwrap_or(self.config.requested_secs());
                    Ok((sid, lease_secs))
                }
                None => {
                    self.record.lock().sid = None;
                    Err(format!("status {} without SID", response.status))
                }
            },
            Ok(response) => {
                self.record.lock().sid = None;
                Err(format!("status {}", response.status))
            }
            Err(err) => Err(err.to_string()),
        };

        match granted {
            Ok((sid, lease_secs)) => self.granted(epoch, sid, lease_secs, renewing.as_deref()),
            Err(reason) => self.failed(epoch, &reason),
        }
    }

    fn granted(self: &Arc<Self>, epoch: u64, sid: String, lease_secs: u64, previous: Option<&str>) {
        {
            let mut record = self.record.lock();
            record.sid = Some(sid.clone());
            record.expected_seq = 0;
            record.last_lease_secs = lease_secs;
            record.failures = 0;
        }

        let delay = self.config.renewal_delay(lease_secs);
        tracing::info!(
            endpoint = %self.endpoint,
            path = %self.event_path,
            sid = %sid,
            seconds = lease_secs,
            "Subscription lease acquired"
        );
        if previous.is_some_and(|old| old != sid) {
            tracing::debug!(sid = %sid, "Renewal replaced subscription identifier");
        }

        self.set_state(LeaseState::Active);
        self.timer
            .schedule(delay, scheduled_attempt(Arc::downgrade(self), epoch));
    }

    fn failed(self: &Arc<Self>, epoch: u64, reason: &str) {
        let (failures, delay) = {
            let mut record = self.record.lock();
            record.failures = record.failures.saturating_add(1);
            (
                record.failures,
                self.config.retry_delay(record.last_lease_secs),
            )
        };

        tracing::warn!(
            endpoint = %self.endpoint,
            path = %self.event_path,
            reason,
            failures,
            retry_secs = delay.as_secs(),
            "Subscribe failed, retrying"
        );

        if failures >= self.config.error_threshold() {
            self.set_state(LeaseState::Error);
        } else {
            self.set_state(LeaseState::Subscribing);
        }
        self.timer
            .schedule(delay, scheduled_attempt(Arc::downgrade(self), epoch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::error::TransportError;
    use crate::protocol::{ActionRequest, RawResponse, SubscribeResponse};

    /// Answers subscribes from a script; an exhausted script fails.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<SubscribeResponse, TransportError>>>,
        requests: Mutex<Vec<SubscribeRequest>>,
        unsubscribed: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn grant(self, sid: &str, timeout: &str) -> Self {
            self.replies.lock().push_back(Ok(SubscribeResponse {
                status: 200,
                sid: Some(sid.to_string()),
                timeout: Some(timeout.to_string()),
            }));
            self
        }

        fn refuse(self, status: u16) -> Self {
            self.replies.lock().push_back(Ok(SubscribeResponse {
                status,
                sid: None,
                timeout: None,
            }));
            self
        }
    }

    impl Transport for Scripted {
        async fn subscribe(
            &self,
            _endpoint: &Endpoint,
            request: &SubscribeRequest,
        ) -> Result<SubscribeResponse, TransportError> {
            self.requests.lock().push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::ConnectionFailed("unreachable".into())))
        }

        async fn unsubscribe(
            &self,
            _endpoint: &Endpoint,
            _event_path: &str,
            sid: &str,
        ) -> Result<u16, TransportError> {
            self.unsubscribed.lock().push(sid.to_string());
            Ok(200)
        }

        async fn invoke(
            &self,
            _endpoint: &Endpoint,
            _request: &ActionRequest,
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::ConnectionFailed("not scripted".into()))
        }
    }

    fn manager(transport: Scripted) -> (Arc<Scripted>, SubscriptionLeaseManager<Scripted>) {
        let transport = Arc::new(transport);
        let endpoint = Endpoint::parse("http://10.0.0.9:49153/setup.xml").unwrap();
        let lease = SubscriptionLeaseManager::new(
            Arc::clone(&transport),
            endpoint,
            "/upnp/event/basicevent1",
            LeaseConfig::default(),
        );
        (transport, lease)
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_records_identifier() {
        let (transport, lease) = manager(Scripted::default().grant("uuid:1", "Second-300"));

        assert_eq!(lease.acquire().await, LeaseState::Active);
        assert_eq!(lease.sid().as_deref(), Some("uuid:1"));
        assert_eq!(lease.expected_sequence(), 0);

        let requests = transport.requests.lock();
        assert_eq!(requests[0].sid, None);
        assert_eq!(requests[0].timeout_secs, 1800);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_fires_at_lease_minus_one() {
        let (transport, lease) = manager(
            Scripted::default()
                .grant("uuid:1", "Second-120")
                .grant("uuid:2", "Second-120"),
        );
        lease.acquire().await;

        tokio::time::sleep(Duration::from_millis(118_900)).await;
        assert_eq!(lease.sid().as_deref(), Some("uuid:1"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(lease.sid().as_deref(), Some("uuid:2"));

        let requests = transport.requests.lock();
        assert_eq!(requests[1].sid.as_deref(), Some("uuid:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_lease_renews_at_floor() {
        let (transport, lease) = manager(
            Scripted::default()
                .grant("uuid:1", "Second-4")
                .grant("uuid:2", "Second-4"),
        );
        lease.acquire().await;

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(transport.requests.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.requests.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_timeout_assumes_requested_lease() {
        let transport = Scripted::default();
        transport.replies.lock().push_back(Ok(SubscribeResponse {
            status: 200,
            sid: Some("uuid:1".into()),
            timeout: None,
        }));
        let (transport, lease) = manager(transport);
        lease.acquire().await;

        tokio::time::sleep(Duration::from_secs(1798)).await;
        assert_eq!(transport.requests.lock().len(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.requests.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_retries_with_backoff() {
        let (transport, lease) = manager(Scripted::default().refuse(412).grant("uuid:1", "Second-60"));

        assert_eq!(lease.acquire().await, LeaseState::Subscribing);
        assert_eq!(lease.failures(), 1);
        assert_eq!(lease.sid(), None);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(lease.state(), LeaseState::Active);
        assert_eq!(lease.failures(), 0);
        assert_eq!(transport.requests.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_reports_error_and_keeps_retrying() {
        let (transport, lease) = manager(Scripted::default());
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&transitions);
        lease.on_transition(move |state| seen.lock().push(state));

        lease.acquire().await;
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(lease.state(), LeaseState::Error);
        assert_eq!(lease.failures(), 3);
        assert_eq!(
            *transitions.lock(),
            vec![LeaseState::Subscribing, LeaseState::Error]
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.requests.lock().len(), 4);
        assert_eq!(lease.state(), LeaseState::Error);
        assert_eq!(
            transitions.lock()[2..],
            [LeaseState::Subscribing, LeaseState::Error]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn error_recovers_through_subscribing() {
        let (transport, lease) = manager(Scripted::default());
        lease.acquire().await;
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(lease.state(), LeaseState::Error);

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&transitions);
        lease.on_transition(move |state| seen.lock().push(state));
        transport.replies.lock().push_back(Ok(SubscribeResponse {
            status: 200,
            sid: Some("uuid:7".to_string()),
            timeout: Some("Second-300".to_string()),
        }));

        assert_eq!(lease.acquire().await, LeaseState::Active);
        assert_eq!(
            *transitions.lock(),
            vec![LeaseState::Subscribing, LeaseState::Active]
        );
        assert_eq!(lease.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn validate_enforces_order() {
        let (_, lease) = manager(Scripted::default().grant("uuid:2", "Second-300"));
        lease.acquire().await;

        let accepted = lease.validate(&Notification::new("uuid:2", 5, ""));
        assert_eq!(accepted, Delivery::Accepted);
        assert_eq!(lease.validate(&Notification::new("uuid:2", 3, "")), Delivery::Stale);
        assert_eq!(lease.validate(&Notification::new("uuid:2", 5, "")), Delivery::Stale);
        assert_eq!(lease.expected_sequence(), 6);
        assert_eq!(lease.validate(&Notification::new("uuid:9", 7, "")), Delivery::Mismatch);
        assert_eq!(lease.expected_sequence(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn reacquire_invalidates_old_identifier() {
        let (_, lease) = manager(
            Scripted::default()
                .grant("uuid:1", "Second-300")
                .grant("uuid:2", "Second-300"),
        );
        lease.acquire().await;
        assert!(lease.validate(&Notification::new("uuid:1", 0, "")).is_accepted());

        lease.acquire().await;
        assert_eq!(lease.validate(&Notification::new("uuid:1", 1, "")), Delivery::Mismatch);
        assert!(lease.validate(&Notification::new("uuid:2", 0, "")).is_accepted());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_unsubscribes_and_stops_timers() {
        let (transport, lease) = manager(Scripted::default().grant("uuid:1", "Second-30"));
        lease.acquire().await;

        lease.shutdown().await;
        assert_eq!(lease.state(), LeaseState::Unsubscribed);
        assert_eq!(lease.sid(), None);
        assert_eq!(*transport.unsubscribed.lock(), vec!["uuid:1".to_string()]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.requests.lock().len(), 1);
    }
}
