// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Belkin Wemo on/off switch.

use std::fmt;
use std::sync::Arc;

use crate::action::ActionInvoker;
use crate::capabilities::DeviceKind;
use crate::command::{ValidationReport, parse_params, require_text};
use crate::error::PerformError;
use crate::event::DeviceId;
use crate::manager::HubContext;
use crate::protocol::gena::{Notification, parse_property_set};
use crate::protocol::{ActionRequest, Endpoint, Transport};
use crate::state::{DeviceState, StateChange};
use crate::subscription::{LeaseState, SubscriptionLeaseManager};
use crate::types::{OnOff, Status, TaskId};

use super::{Actor, DeviceCore, route_actors, route_notifications, settle};

const SERVICE: &str = "urn:Belkin:service:basicevent:1";
const CONTROL_PATH: &str = "/upnp/control/basicevent1";
const EVENT_PATH: &str = "/upnp/event/basicevent1";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SwitchCommand {
    Power(OnOff),
    Rename(String),
}

impl SwitchCommand {
    fn parse(perform: &str, parameter: Option<&str>) -> Result<Self, ValidationReport> {
        match perform {
            "on" => Ok(Self::Power(OnOff::On)),
            "off" => Ok(Self::Power(OnOff::Off)),
            "set" => {
                let params = parse_params(parameter)?;
                let mut report = ValidationReport::new();
                let name = require_text(&params, "name", &mut report).map(str::to_string);
                report.into_result()?;
                name.map(Self::Rename)
                    .ok_or_else(|| ValidationReport::required_field("name"))
            }
            _ => Err(ValidationReport::invalid_field("perform")),
        }
    }
}

/// Reads the switch position from a `BinaryState` value such as
/// `1|1457|0|0`; only the first field matters.
fn binary_state(value: &str) -> OnOff {
    let level = value
        .split('|')
        .next()
        .and_then(|field| field.trim().parse::<i64>().ok())
        .unwrap_or(0);
    OnOff::from_bool(level != 0)
}

fn power_status(power: OnOff) -> Status {
    if power.is_on() { Status::On } else { Status::Off }
}

/// A Wemo switch.
///
/// The switch starts `waiting`. It primes its state with
/// `GetBinaryState`, then follows `BinaryState` notifications on the basic
/// event service. The first observation passes through `busy` before
/// settling on `on` or `off`.
pub struct WemoSwitch<T> {
    core: DeviceCore,
    invoker: ActionInvoker<T>,
    lease: SubscriptionLeaseManager<T>,
}

impl<T: Transport> WemoSwitch<T> {
    /// Builds the switch, registers its broker handlers, primes its state
    /// and subscribes to its events.
    pub(crate) async fn start(
        ctx: &HubContext,
        transport: Arc<T>,
        id: DeviceId,
        uid: &str,
        name: &str,
        endpoint: Endpoint,
    ) -> Arc<Self> {
        let core = DeviceCore::new(
            ctx,
            id,
            uid,
            DeviceKind::WemoSwitch,
            endpoint.clone(),
            name,
            Status::Waiting,
        );
        let lease = SubscriptionLeaseManager::new(
            Arc::clone(&transport),
            endpoint,
            EVENT_PATH,
            ctx.config().lease().clone(),
        );
        let store = Arc::clone(core.store());
        lease.on_transition(move |state| {
            if state == LeaseState::Error {
                store.apply(&StateChange::status(Status::Error));
            }
        });

        let switch = Arc::new(Self {
            core,
            invoker: ActionInvoker::new(transport),
            lease,
        });

        let weak = Arc::downgrade(&switch);
        let notifications = route_notifications(switch.core.broker(), move |notification| {
            if let Some(switch) = weak.upgrade() {
                switch.notify(notification);
            }
        });
        switch.core.hold(route_actors(switch.core.broker(), &switch));
        switch.core.hold(notifications);

        switch.prime().await;
        switch.lease.acquire().await;
        switch
    }

    pub(crate) fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// The event subscription of this switch.
    #[must_use]
    pub fn lease(&self) -> &SubscriptionLeaseManager<T> {
        &self.lease
    }

    async fn prime(&self) {
        let request = ActionRequest::new(CONTROL_PATH, SERVICE, "GetBinaryState");
        let outcome = self.invoker.invoke(self.core.endpoint(), &request).await;
        if let Some(value) = outcome.payload().and_then(|payload| payload.get("BinaryState")) {
            self.observe(value);
        }
    }

    fn notify(&self, notification: &Notification) {
        if !self.lease.validate(notification).is_accepted() {
            return;
        }
        match parse_property_set(&notification.body) {
            Ok(properties) => {
                if let Some(value) = properties.get("BinaryState") {
                    self.observe(value);
                }
            }
            Err(err) => tracing::error!(
                device = %self.core.id(),
                error = %err,
                "Undecodable notification"
            ),
        }
    }

    fn observe(&self, value: &str) {
        if self.core.status() == Status::Waiting {
            self.core.set_status(Status::Busy);
        }
        self.core.set_status(power_status(binary_state(value)));
    }

    /// Releases the subscription and deregisters broker handlers.
    pub(crate) async fn shutdown(&self) {
        self.core.release();
        self.lease.shutdown().await;
    }
}

impl<T: Transport> Actor for WemoSwitch<T> {
    fn id(&self) -> DeviceId {
        self.core.id()
    }

    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn state(&self) -> DeviceState {
        self.core.snapshot()
    }

    fn validate(&self, perform: &str, parameter: Option<&str>) -> ValidationReport {
        SwitchCommand::parse(perform, parameter)
            .err()
            .unwrap_or_default()
    }

    async fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        let command = SwitchCommand::parse(perform, parameter).map_err(PerformError::Invalid)?;
        tracing::info!(device = %self.core.id(), task = %task_id, perform, "Perform");

        match command {
            SwitchCommand::Power(power) => {
                let request = ActionRequest::new(CONTROL_PATH, SERVICE, "SetBinaryState")
                    .arg("BinaryState", power.as_upnp());
                let outcome = self.invoker.invoke(self.core.endpoint(), &request).await;
                if settle(outcome)?.is_some() {
                    self.core.set_status(power_status(power));
                }
            }
            SwitchCommand::Rename(name) => {
                let request = ActionRequest::new(CONTROL_PATH, SERVICE, "ChangeFriendlyName")
                    .arg("FriendlyName", name.as_str());
                let outcome = self.invoker.invoke(self.core.endpoint(), &request).await;
                if settle(outcome)?.is_some() {
                    self.core.apply(&StateChange::name(name));
                }
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for WemoSwitch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WemoSwitch")
            .field("core", &self.core)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Message;
    use crate::device::testing::{ScriptedTransport, context, endpoint, notify};

    async fn switch(transport: &Arc<ScriptedTransport>) -> (HubContext, Arc<WemoSwitch<ScriptedTransport>>) {
        let ctx = context();
        let switch = WemoSwitch::start(
            &ctx,
            Arc::clone(transport),
            DeviceId::new(4),
            "uuid:Socket-1_0-221",
            "Desk",
            endpoint(),
        )
        .await;
        (ctx, switch)
    }

    #[test]
    fn first_field_decides() {
        assert_eq!(binary_state("1|1457|0|0"), OnOff::On);
        assert_eq!(binary_state("8"), OnOff::On);
        assert_eq!(binary_state("0"), OnOff::Off);
        assert_eq!(binary_state("garbage"), OnOff::Off);
    }

    #[test]
    fn validation() {
        assert!(SwitchCommand::parse("on", None).is_ok());
        assert_eq!(
            SwitchCommand::parse("set", Some(r#"{"name":""}"#)),
            Err(ValidationReport::required_field("name"))
        );
        assert_eq!(
            SwitchCommand::parse("set", None),
            Err(ValidationReport::required_field("parameter"))
        );
        assert_eq!(
            SwitchCommand::parse("toggle", None),
            Err(ValidationReport::invalid_field("perform"))
        );
    }

    #[tokio::test]
    async fn primer_settles_status() {
        let transport = ScriptedTransport::new();
        transport.reply("GetBinaryState", &[("BinaryState", "1")]);
        let (_ctx, switch) = switch(&transport).await;

        assert_eq!(switch.state().status(), Status::On);
        assert_eq!(switch.lease().sid().as_deref(), Some("uuid:1"));
        assert_eq!(transport.subscribed()[0].event_path, EVENT_PATH);
    }

    #[tokio::test]
    async fn first_observation_passes_through_busy() {
        let transport = ScriptedTransport::new();
        transport.fail("GetBinaryState");
        let ctx = context();
        let mut events = ctx.events().subscribe();
        let switch = WemoSwitch::start(
            &ctx,
            Arc::clone(&transport),
            DeviceId::new(4),
            "uuid:Socket-1_0-221",
            "Desk",
            endpoint(),
        )
        .await;
        assert_eq!(switch.state().status(), Status::Waiting);

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:1", 0, "BinaryState", "0|0|0")));

        let first = events.recv().await.unwrap();
        assert_eq!(first.state().map(DeviceState::status), Some(Status::Busy));
        let second = events.recv().await.unwrap();
        assert_eq!(second.state().map(DeviceState::status), Some(Status::Off));
    }

    #[tokio::test]
    async fn notifications_for_other_leases_are_ignored() {
        let transport = ScriptedTransport::new();
        transport.reply("GetBinaryState", &[("BinaryState", "0")]);
        let (ctx, switch) = switch(&transport).await;

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:99", 3, "BinaryState", "1")));
        assert_eq!(switch.state().status(), Status::Off);

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:1", 3, "BinaryState", "1")));
        assert_eq!(switch.state().status(), Status::On);

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:1", 2, "BinaryState", "0")));
        assert_eq!(switch.state().status(), Status::On);
        assert_eq!(switch.lease().expected_sequence(), 4);
    }

    #[tokio::test]
    async fn on_sends_binary_state() {
        let transport = ScriptedTransport::new();
        transport.reply("GetBinaryState", &[("BinaryState", "0")]);
        let (_ctx, switch) = switch(&transport).await;

        switch.perform(&TaskId::new("t1"), "on", None).await.unwrap();

        let calls = transport.calls("SetBinaryState");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![("BinaryState".to_string(), "1".to_string())]);
        assert_eq!(switch.state().status(), Status::On);
    }

    #[tokio::test]
    async fn rename_keeps_name_on_fault() {
        let transport = ScriptedTransport::new();
        transport.fault("ChangeFriendlyName", 501, "Action Failed");
        let (_ctx, switch) = switch(&transport).await;

        let result = switch
            .perform(&TaskId::new("t2"), "set", Some(r#"{"name":"Porch"}"#))
            .await;
        assert!(matches!(result, Err(PerformError::Fault(faults)) if faults.len() == 1));
        assert_eq!(switch.state().name(), "Desk");

        switch
            .perform(&TaskId::new("t3"), "set", Some(r#"{"name":"Porch"}"#))
            .await
            .unwrap();
        assert_eq!(switch.state().name(), "Porch");
    }

    #[tokio::test]
    async fn invalid_perform_never_reaches_device() {
        let transport = ScriptedTransport::new();
        let (_ctx, switch) = switch(&transport).await;
        let before = transport.invoked().len();

        let result = switch
            .perform(&TaskId::new("t4"), "set", Some(r#"{"name":""}"#))
            .await;
        assert_eq!(
            result,
            Err(PerformError::Invalid(ValidationReport::required_field("name")))
        );
        assert_eq!(transport.invoked().len(), before);
    }

    #[tokio::test]
    async fn shutdown_unsubscribes_and_deregisters() {
        let transport = ScriptedTransport::new();
        let (ctx, switch) = switch(&transport).await;
        assert_eq!(ctx.broker().handler_count(crate::broker::Topic::Discovery), 1);

        switch.shutdown().await;

        assert_eq!(transport.unsubscribed(), vec!["uuid:1".to_string()]);
        assert_eq!(ctx.broker().handler_count(crate::broker::Topic::Discovery), 0);
        assert_eq!(ctx.broker().handler_count(crate::broker::Topic::Actors), 0);
    }
}
