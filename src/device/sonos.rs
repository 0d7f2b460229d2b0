// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sonos zone players and bridges.
//!
//! A zone player reports transport state and play mode through
//! AVTransport `LastChange` events, but volume, mute and track position are
//! never evented, so the speaker also polls them. The poll interval is
//! short while something is playing and long while idle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value, json};
use url::Url;

use crate::action::{ActionInvoker, ActionOutcome, ActionPayload};
use crate::capabilities::DeviceKind;
use crate::command::{
    Params, ValidationReport, optional_number, optional_text, parse_optional_params, parse_params,
    require_text,
};
use crate::config::PollConfig;
use crate::error::{ParseError, PerformError};
use crate::event::DeviceId;
use crate::manager::HubContext;
use crate::protocol::gena::{Notification, parse_last_change, parse_property_set};
use crate::protocol::{ActionRequest, Endpoint, Transport};
use crate::schedule::TaskSlot;
use crate::state::{DeviceState, StateChange};
use crate::subscription::{LeaseState, SubscriptionLeaseManager};
use crate::types::{OnOff, Percentage, PlayMode, Status, TaskId};

use super::{Actor, DeviceCore, parse_rename, route_actors, route_notifications, settle};

const AV_TRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";
const AV_TRANSPORT_CONTROL: &str = "/MediaRenderer/AVTransport/Control";
const RENDERING: &str = "urn:schemas-upnp-org:service:RenderingControl:1";
const RENDERING_CONTROL: &str = "/MediaRenderer/RenderingControl/Control";
const DEVICE_PROPERTIES: &str = "urn:schemas-upnp-org:service:DeviceProperties:1";
const DEVICE_PROPERTIES_CONTROL: &str = "/DeviceProperties/Control";
const EVENT_PATH: &str = "/MediaRenderer/AVTransport/Event";

fn av_transport(action: &str) -> ActionRequest {
    ActionRequest::new(AV_TRANSPORT_CONTROL, AV_TRANSPORT, action).arg("InstanceID", "0")
}

fn rendering(action: &str) -> ActionRequest {
    ActionRequest::new(RENDERING_CONTROL, RENDERING, action)
        .arg("InstanceID", "0")
        .arg("Channel", "Master")
}

fn transport_status(state: &str) -> Status {
    match state {
        "PLAYING" => Status::Playing,
        "PAUSED_PLAYBACK" => Status::Paused,
        "TRANSITIONING" => Status::Busy,
        _ => Status::Idle,
    }
}

/// Largest seek target accepted by `set`, in milliseconds.
const MAX_POSITION_MS: f64 = 9_999.0 * 3_600_000.0;

/// Formats milliseconds as the `H:MM:SS` target of a `REL_TIME` seek.
fn hms(ms: u64) -> String {
    let secs = ms.saturating_add(500) / 1000;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Parses an `H:MM:SS[.fff]` duration into milliseconds.
fn parse_hms(text: &str) -> Option<u64> {
    let mut secs = 0u64;
    let mut fields = 0;
    for field in text.trim().split(':') {
        let whole = field.split('.').next()?;
        secs = secs.checked_mul(60)?.checked_add(whole.parse().ok()?)?;
        fields += 1;
    }
    if fields == 3 {
        secs.checked_mul(1000)
    } else {
        None
    }
}

/// Metadata of the current track, from a DIDL-Lite document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrackMeta {
    title: String,
    artist: String,
    album: String,
    album_art_uri: String,
}

impl TrackMeta {
    fn parse(didl: &str) -> Result<Self, ParseError> {
        let mut meta = Self::default();
        if !didl.trim_start().starts_with('<') {
            // Devices send NOT_IMPLEMENTED or nothing when no track is loaded.
            return Ok(meta);
        }

        let mut reader = Reader::from_str(didl);
        reader.trim_text(true);
        let mut current: Option<String> = None;
        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    current =
                        Some(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
                }
                Event::Text(text) => {
                    let value = text.unescape()?.into_owned();
                    match current.as_deref() {
                        Some("title") => meta.title = value,
                        Some("creator") => meta.artist = value,
                        Some("album") => meta.album = value,
                        Some("albumArtURI") => meta.album_art_uri = value,
                        _ => {}
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(meta)
    }

    fn merge_into(&self, track: &mut Map<String, Value>) {
        track.insert("title".to_string(), json!(self.title));
        track.insert("artist".to_string(), json!(self.artist));
        track.insert("album".to_string(), json!(self.album));
        track.insert("albumArtURI".to_string(), json!(self.album_art_uri));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Settings {
    name: Option<String>,
    mode: Option<PlayMode>,
    position_ms: Option<u64>,
    volume: Option<Percentage>,
    muted: Option<OnOff>,
}

impl Settings {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn parse(params: &Params) -> Result<Self, ValidationReport> {
        let mut report = ValidationReport::new();
        let mut settings = Self {
            name: optional_text(params, "name", &mut report)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            ..Self::default()
        };

        if let Some(mode) = optional_text(params, "mode", &mut report) {
            match mode.parse() {
                Ok(mode) => settings.mode = Some(mode),
                Err(_) => report.invalidate("mode"),
            }
        }
        if let Some(position) = optional_number(params, "position", &mut report) {
            if (0.0..=MAX_POSITION_MS).contains(&position) {
                settings.position_ms = Some(position.round() as u64);
            } else {
                report.invalidate("position");
            }
        }
        if let Some(volume) = optional_number(params, "volume", &mut report) {
            match Percentage::from_f64(volume) {
                Ok(volume) => settings.volume = Some(volume),
                Err(_) => report.invalidate("volume"),
            }
        }
        if let Some(muted) = optional_text(params, "muted", &mut report) {
            match muted.parse() {
                Ok(muted) => settings.muted = Some(muted),
                Err(_) => report.invalidate("muted"),
            }
        }

        report.into_result().map(|()| settings)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SpeakerCommand {
    Play(Option<Url>),
    QueueNext(Url),
    Transport(&'static str),
    Set(Settings),
}

impl SpeakerCommand {
    fn parse(perform: &str, parameter: Option<&str>) -> Result<Self, ValidationReport> {
        let action = match perform {
            "set" => return Settings::parse(&parse_params(parameter)?).map(Self::Set),
            "play" | "queueNext" => None,
            "stop" => Some("Stop"),
            "pause" => Some("Pause"),
            "next" => Some("Next"),
            "previous" => Some("Previous"),
            "flush" => Some("RemoveAllTracksFromQueue"),
            _ => return Err(ValidationReport::invalid_field("perform")),
        };

        let params = parse_optional_params(parameter)?;
        if let Some(action) = action {
            return Ok(Self::Transport(action));
        }

        let mut report = ValidationReport::new();
        let url = if perform == "play" {
            optional_text(&params, "url", &mut report).filter(|url| !url.is_empty())
        } else {
            require_text(&params, "url", &mut report)
        };
        let url = url.and_then(|url| match Url::parse(url) {
            Ok(url) => Some(url),
            Err(_) => {
                report.invalidate("url");
                None
            }
        });
        report.into_result()?;

        if perform == "play" {
            Ok(Self::Play(url))
        } else {
            url.map(Self::QueueNext)
                .ok_or_else(|| ValidationReport::required_field("url"))
        }
    }
}

/// A Sonos zone player.
///
/// Starts `idle`, reads its zone name, subscribes to AVTransport events
/// and starts polling. Any failed action flips the status to `error`; the
/// next transport event restores it.
pub struct SonosSpeaker<T> {
    core: DeviceCore,
    invoker: ActionInvoker<T>,
    lease: SubscriptionLeaseManager<T>,
    poll: Arc<TaskSlot>,
    poll_config: PollConfig,
}

/// Poll timer entry point. Boxed so a poll can schedule the next one.
fn scheduled_poll<T: Transport>(
    speaker: Weak<SonosSpeaker<T>>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        if let Some(speaker) = speaker.upgrade() {
            speaker.refresh().await;
        }
    })
}

impl<T: Transport> SonosSpeaker<T> {
    /// Builds the speaker, registers its broker handlers, subscribes to
    /// its events and runs the first poll.
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
            DeviceKind::SonosSpeaker,
            endpoint.clone(),
            name,
            Status::Idle,
        );
        core.apply(&StateChange::batch([
            StateChange::property("track", json!({})),
            StateChange::property("mode", PlayMode::Normal.as_str()),
        ]));

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

        let speaker = Arc::new(Self {
            core,
            invoker: ActionInvoker::new(transport),
            lease,
            poll: TaskSlot::new(),
            poll_config: ctx.config().poll().clone(),
        });

        let weak = Arc::downgrade(&speaker);
        let notifications = route_notifications(speaker.core.broker(), move |notification| {
            if let Some(speaker) = weak.upgrade() {
                speaker.notify(notification);
            }
        });
        speaker.core.hold(route_actors(speaker.core.broker(), &speaker));
        speaker.core.hold(notifications);

        speaker.read_zone_name().await;
        speaker.lease.acquire().await;
        speaker.refresh().await;
        speaker
    }

    pub(crate) fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// The event subscription of this speaker.
    #[must_use]
    pub fn lease(&self) -> &SubscriptionLeaseManager<T> {
        &self.lease
    }

    /// Returns `true` while a poll is scheduled.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll.is_pending()
    }

    async fn read_zone_name(&self) {
        let request = ActionRequest::new(
            DEVICE_PROPERTIES_CONTROL,
            DEVICE_PROPERTIES,
            "GetZoneAttributes",
        );
        if let Some(payload) = self.query(request).await
            && let Some(zone) = payload.get("CurrentZoneName").filter(|zone| !zone.is_empty())
        {
            self.core.apply(&StateChange::name(zone));
        }
    }

    /// Sends an action that only reads; a failure flips the status.
    async fn query(&self, request: ActionRequest) -> Option<ActionPayload> {
        match self.invoker.invoke(self.core.endpoint(), &request).await {
            ActionOutcome::Success(payload) => Some(payload),
            ActionOutcome::ProtocolFault(_) | ActionOutcome::TransportError(_) => {
                self.core.set_status(Status::Error);
                None
            }
        }
    }

    /// Sends an action on behalf of a perform.
    ///
    /// Returns whether the device confirmed it.
    async fn command(&self, request: ActionRequest) -> Result<bool, PerformError> {
        let outcome = self.invoker.invoke(self.core.endpoint(), &request).await;
        if !outcome.is_success() {
            self.core.set_status(Status::Error);
        }
        settle(outcome).map(|payload| payload.is_some())
    }

    /// Polls volume, mute and position, then schedules the next poll.
    async fn refresh(self: &Arc<Self>) {
        let mut changes = Vec::new();

        if let Some(payload) = self.query(av_transport("GetPositionInfo")).await {
            let meta = payload
                .get("TrackMetaData")
                .map(TrackMeta::parse)
                .transpose()
                .unwrap_or_else(|err| {
                    tracing::debug!(device = %self.core.id(), error = %err, "Undecodable track metadata");
                    None
                })
                .unwrap_or_default();
            let mut track = Map::new();
            meta.merge_into(&mut track);
            let position = payload.get("RelTime").and_then(parse_hms).unwrap_or(0);
            let duration = payload.get("TrackDuration").and_then(parse_hms).unwrap_or(0);
            track.insert("position".to_string(), json!(position));
            track.insert("duration".to_string(), json!(duration));
            changes.push(StateChange::property("track", Value::Object(track)));
        }

        if let Some(payload) = self.query(rendering("GetVolume")).await
            && let Some(volume) = payload
                .get("CurrentVolume")
                .and_then(|volume| volume.trim().parse::<u8>().ok())
        {
            changes.push(StateChange::property("volume", volume));
        }

        if let Some(payload) = self.query(rendering("GetMute")).await
            && let Some(muted) = payload.get("CurrentMute")
        {
            let muted = OnOff::from_bool(muted.trim() == "1");
            changes.push(StateChange::property("muted", muted.as_str()));
        }

        self.core.apply(&StateChange::batch(changes));
        self.schedule_refresh(self.poll_interval());
    }

    fn poll_interval(&self) -> Duration {
        if self.core.status() == Status::Idle {
            self.poll_config.idle()
        } else {
            self.poll_config.active()
        }
    }

    fn schedule_refresh(self: &Arc<Self>, delay: Duration) {
        self.poll
            .schedule(delay, scheduled_poll(Arc::downgrade(self)));
    }

    fn notify(self: &Arc<Self>, notification: &Notification) {
        if !self.lease.validate(notification).is_accepted() {
            return;
        }
        if let Err(err) = self.observe(&notification.body) {
            tracing::error!(device = %self.core.id(), error = %err, "Undecodable notification");
        }
    }

    fn observe(self: &Arc<Self>, body: &str) -> Result<(), ParseError> {
        let properties = parse_property_set(body)?;
        let Some(last_change) = properties.get("LastChange") else {
            return Ok(());
        };
        let vars = parse_last_change(last_change)?;

        let mut changes = Vec::new();
        if let Some(state) = vars.get("TransportState") {
            changes.push(StateChange::status(transport_status(state)));
        }
        if let Some(mode) = vars.get("CurrentPlayMode") {
            changes.push(StateChange::property(
                "mode",
                PlayMode::from_upnp(mode).as_str(),
            ));
        }
        if self.core.apply(&StateChange::batch(changes)) {
            // The poll interval depends on the status.
            self.schedule_refresh(Duration::ZERO);
        }

        if let Some(didl) = vars.get("CurrentTrackMetaData") {
            let meta = TrackMeta::parse(didl)?;
            let mut track = match self.core.snapshot().property("track") {
                Some(Value::Object(track)) => track.clone(),
                _ => Map::new(),
            };
            meta.merge_into(&mut track);
            self.core
                .apply(&StateChange::property("track", Value::Object(track)));
        }
        Ok(())
    }

    async fn apply_settings(&self, settings: Settings) -> Result<(), PerformError> {
        let mut faults = Vec::new();
        let mut record = |result: Result<bool, PerformError>| match result {
            Ok(confirmed) => confirmed,
            Err(PerformError::Fault(mut found)) => {
                faults.append(&mut found);
                false
            }
            Err(PerformError::Invalid(_)) => false,
        };

        if let Some(name) = settings.name {
            let request = ActionRequest::new(
                DEVICE_PROPERTIES_CONTROL,
                DEVICE_PROPERTIES,
                "SetZoneAttributes",
            )
            .arg("DesiredZoneName", name.as_str())
            .arg("DesiredIcon", "")
            .arg("DesiredConfiguration", "");
            if record(self.command(request).await) {
                self.core.apply(&StateChange::name(name));
            }
        }
        if let Some(mode) = settings.mode {
            let request = av_transport("SetPlayMode").arg("NewPlayMode", mode.as_upnp());
            if record(self.command(request).await) {
                self.core
                    .apply(&StateChange::property("mode", mode.as_str()));
            }
        }
        if let Some(position) = settings.position_ms {
            let request = av_transport("Seek")
                .arg("Unit", "REL_TIME")
                .arg("Target", hms(position));
            record(self.command(request).await);
        }
        if let Some(volume) = settings.volume {
            let request = rendering("SetVolume").arg("DesiredVolume", volume.value().to_string());
            if record(self.command(request).await) {
                self.core
                    .apply(&StateChange::property("volume", volume.value()));
            }
        }
        if let Some(muted) = settings.muted {
            let request = rendering("SetMute").arg("DesiredMute", muted.as_upnp());
            if record(self.command(request).await) {
                self.core
                    .apply(&StateChange::property("muted", muted.as_str()));
            }
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(PerformError::Fault(faults))
        }
    }

    /// Stops polling, releases the subscription and deregisters broker
    /// handlers.
    pub(crate) async fn shutdown(&self) {
        self.core.release();
        self.poll.cancel();
        self.lease.shutdown().await;
    }
}

impl<T: Transport> Actor for SonosSpeaker<T> {
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
        SpeakerCommand::parse(perform, parameter)
            .err()
            .unwrap_or_default()
    }

    async fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        let command = SpeakerCommand::parse(perform, parameter).map_err(PerformError::Invalid)?;
        tracing::info!(device = %self.core.id(), task = %task_id, perform, "Perform");

        match command {
            SpeakerCommand::Play(url) => {
                if let Some(url) = url {
                    let request = av_transport("SetAVTransportURI")
                        .arg("CurrentURI", url.as_str())
                        .arg("CurrentURIMetaData", "");
                    self.command(request).await?;
                }
                self.command(av_transport("Play").arg("Speed", "1")).await?;
            }
            SpeakerCommand::QueueNext(url) => {
                let request = av_transport("AddURIToQueue")
                    .arg("EnqueuedURI", url.as_str())
                    .arg("EnqueuedURIMetaData", "")
                    .arg("DesiredFirstTrackNumberEnqueued", "0")
                    .arg("EnqueueAsNext", "1");
                self.command(request).await?;
            }
            SpeakerCommand::Transport(action) => {
                self.command(av_transport(action)).await?;
            }
            SpeakerCommand::Set(settings) => self.apply_settings(settings).await?,
        }
        Ok(())
    }
}

impl<T> fmt::Debug for SonosSpeaker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SonosSpeaker")
            .field("core", &self.core)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// A Sonos zone bridge.
///
/// The bridge only relays for its players. It is always `present` and can
/// only be renamed, which happens locally.
#[derive(Debug)]
pub struct SonosBridge {
    core: DeviceCore,
}

impl SonosBridge {
    pub(crate) fn start(
        ctx: &HubContext,
        id: DeviceId,
        uid: &str,
        name: &str,
        endpoint: Endpoint,
    ) -> Arc<Self> {
        let core = DeviceCore::new(
            ctx,
            id,
            uid,
            DeviceKind::SonosBridge,
            endpoint,
            name,
            Status::Present,
        );
        let bridge = Arc::new(Self { core });
        bridge.core.hold(route_actors(bridge.core.broker(), &bridge));
        bridge
    }

    pub(crate) fn core(&self) -> &DeviceCore {
        &self.core
    }

    pub(crate) fn shutdown(&self) {
        self.core.release();
    }
}

impl Actor for SonosBridge {
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
        parse_rename(perform, parameter).err().unwrap_or_default()
    }

    async fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        let name = parse_rename(perform, parameter).map_err(PerformError::Invalid)?;
        tracing::info!(device = %self.core.id(), task = %task_id, name = %name, "Renamed");
        self.core.apply(&StateChange::name(name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Message;
    use crate::device::testing::{ScriptedTransport, context, endpoint, notify};

    const PLAYING: &str = r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0"><TransportState val="PLAYING"/><CurrentPlayMode val="SHUFFLE_NOREPEAT"/><CurrentTrackMetaData val="&lt;DIDL-Lite xmlns:dc=&quot;http://purl.org/dc/elements/1.1/&quot; xmlns:upnp=&quot;urn:schemas-upnp-org:metadata-1-0/upnp/&quot;&gt;&lt;item&gt;&lt;dc:title&gt;So What&lt;/dc:title&gt;&lt;dc:creator&gt;Miles Davis&lt;/dc:creator&gt;&lt;upnp:album&gt;Kind of Blue&lt;/upnp:album&gt;&lt;/item&gt;&lt;/DIDL-Lite&gt;"/></InstanceID></Event>"#;

    async fn speaker(
        transport: &Arc<ScriptedTransport>,
    ) -> (HubContext, Arc<SonosSpeaker<ScriptedTransport>>) {
        let ctx = context();
        let speaker = SonosSpeaker::start(
            &ctx,
            Arc::clone(transport),
            DeviceId::new(9),
            "uuid:RINCON_000E58A0C0FE01400",
            "ZonePlayer",
            endpoint(),
        )
        .await;
        (ctx, speaker)
    }

    #[test]
    fn seek_target_format() {
        assert_eq!(hms(0), "0:00:00");
        assert_eq!(hms(83_400), "0:01:23");
        assert_eq!(hms(3_723_000), "1:02:03");
        assert_eq!(parse_hms("0:03:45"), Some(225_000));
        assert_eq!(parse_hms("0:00:01.500"), Some(1_000));
        assert_eq!(parse_hms("NOT_IMPLEMENTED"), None);
    }

    #[test]
    fn time_conversions_do_not_overflow() {
        assert_eq!(hms(u64::MAX), "5124095576030:25:51");
        assert_eq!(parse_hms("0:0:18446744073709552"), None);
        assert_eq!(parse_hms("9999:59:59"), Some(35_999_999_000));
    }

    #[test]
    fn transport_states() {
        assert_eq!(transport_status("PAUSED_PLAYBACK"), Status::Paused);
        assert_eq!(transport_status("TRANSITIONING"), Status::Busy);
        assert_eq!(transport_status("NO_MEDIA_PRESENT"), Status::Idle);
    }

    #[test]
    fn set_validation() {
        let report = SpeakerCommand::parse(
            "set",
            Some(r#"{"mode":"loop","volume":140,"muted":"yes","position":-1}"#),
        )
        .unwrap_err();
        assert_eq!(report.invalid(), ["mode", "position", "volume", "muted"]);

        assert_eq!(
            SpeakerCommand::parse("set", None),
            Err(ValidationReport::required_field("parameter"))
        );
        assert!(SpeakerCommand::parse("set", Some(r#"{"mode":"Shuffle1"}"#)).is_ok());

        assert_eq!(
            SpeakerCommand::parse("set", Some(r#"{"position":1e30}"#)),
            Err(ValidationReport::invalid_field("position"))
        );
        assert!(SpeakerCommand::parse("set", Some(r#"{"position":3600000}"#)).is_ok());
    }

    #[test]
    fn url_validation() {
        assert_eq!(
            SpeakerCommand::parse("queueNext", Some("{}")),
            Err(ValidationReport::required_field("url"))
        );
        assert_eq!(
            SpeakerCommand::parse("play", Some(r#"{"url":"not a url"}"#)),
            Err(ValidationReport::invalid_field("url"))
        );
        assert_eq!(SpeakerCommand::parse("play", None), Ok(SpeakerCommand::Play(None)));
        assert_eq!(
            SpeakerCommand::parse("flush", None),
            Ok(SpeakerCommand::Transport("RemoveAllTracksFromQueue"))
        );
        assert_eq!(
            SpeakerCommand::parse("stop", Some("[1]")),
            Err(ValidationReport::invalid_field("parameter"))
        );
        assert_eq!(
            SpeakerCommand::parse("shuffle", None),
            Err(ValidationReport::invalid_field("perform"))
        );
    }

    #[test]
    fn track_metadata() {
        let meta = TrackMeta::parse(
            r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item><dc:title>Blue in Green</dc:title><upnp:albumArtURI>/getaa?s=1</upnp:albumArtURI></item></DIDL-Lite>"#,
        )
        .unwrap();
        assert_eq!(meta.title, "Blue in Green");
        assert_eq!(meta.album_art_uri, "/getaa?s=1");
        assert_eq!(TrackMeta::parse("NOT_IMPLEMENTED").unwrap(), TrackMeta::default());
    }

    #[tokio::test]
    async fn start_reads_zone_and_polls() {
        let transport = ScriptedTransport::new();
        transport.reply("GetZoneAttributes", &[("CurrentZoneName", "Kitchen")]);
        transport.reply("GetVolume", &[("CurrentVolume", "23")]);
        transport.reply("GetMute", &[("CurrentMute", "1")]);
        transport.reply(
            "GetPositionInfo",
            &[("RelTime", "0:00:42"), ("TrackDuration", "0:03:00")],
        );
        let (_ctx, speaker) = speaker(&transport).await;

        let state = speaker.state();
        assert_eq!(state.name(), "Kitchen");
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(state.property("volume"), Some(&json!(23)));
        assert_eq!(state.property("muted"), Some(&json!("on")));
        assert_eq!(state.property("track").and_then(|t| t.get("position")), Some(&json!(42_000)));
        assert_eq!(speaker.lease().event_path(), EVENT_PATH);
        assert!(speaker.is_polling());
    }

    #[tokio::test]
    async fn last_change_updates_status_mode_and_track() {
        let transport = ScriptedTransport::new();
        let (ctx, speaker) = speaker(&transport).await;

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:1", 0, "LastChange", PLAYING)));

        let state = speaker.state();
        assert_eq!(state.status(), Status::Playing);
        assert_eq!(state.property("mode"), Some(&json!("shuffle1")));
        let track = state.property("track").unwrap();
        assert_eq!(track["title"], "So What");
        assert_eq!(track["artist"], "Miles Davis");
        assert_eq!(track["album"], "Kind of Blue");
    }

    #[tokio::test(start_paused = true)]
    async fn polls_faster_while_playing() {
        let transport = ScriptedTransport::new();
        let (ctx, speaker) = speaker(&transport).await;
        let polls = || transport.calls("GetVolume").len();
        assert_eq!(polls(), 1);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(polls(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(polls(), 2);

        ctx.broker()
            .publish(&Message::Discovery(notify("uuid:1", 0, "LastChange", PLAYING)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(polls(), 3);
        tokio::time::sleep(Duration::from_millis(360)).await;
        assert_eq!(polls(), 4);
        assert_eq!(speaker.state().status(), Status::Playing);
    }

    #[tokio::test]
    async fn play_with_url_sets_uri_first() {
        let transport = ScriptedTransport::new();
        let (_ctx, speaker) = speaker(&transport).await;

        speaker
            .perform(
                &TaskId::new("t1"),
                "play",
                Some(r#"{"url":"x-rincon-mp3radio://stream.example.com/jazz"}"#),
            )
            .await
            .unwrap();

        let actions: Vec<String> = transport
            .invoked()
            .into_iter()
            .map(|request| request.action)
            .filter(|action| action == "SetAVTransportURI" || action == "Play")
            .collect();
        assert_eq!(actions, ["SetAVTransportURI", "Play"]);
    }

    #[tokio::test]
    async fn failed_action_flips_status_to_error() {
        let transport = ScriptedTransport::new();
        let (_ctx, speaker) = speaker(&transport).await;
        transport.fault("Pause", 701, "Transition not available");

        let result = speaker.perform(&TaskId::new("t2"), "pause", None).await;
        assert!(matches!(result, Err(PerformError::Fault(_))));
        assert_eq!(speaker.state().status(), Status::Error);
    }

    #[tokio::test]
    async fn set_applies_confirmed_settings() {
        let transport = ScriptedTransport::new();
        let (_ctx, speaker) = speaker(&transport).await;
        transport.fault("SetMute", 402, "Invalid Args");

        let result = speaker
            .perform(
                &TaskId::new("t3"),
                "set",
                Some(r#"{"volume":35,"mode":"repeat","muted":"on","position":61000}"#),
            )
            .await;

        assert!(matches!(result, Err(PerformError::Fault(faults)) if faults.len() == 1));
        let state = speaker.state();
        assert_eq!(state.property("volume"), Some(&json!(35)));
        assert_eq!(state.property("mode"), Some(&json!("repeat")));
        let seek = transport.calls("Seek");
        assert_eq!(seek[0].args[2], ("Target".to_string(), "0:01:01".to_string()));
    }

    #[tokio::test]
    async fn bridge_renames_locally() {
        let ctx = context();
        let bridge = SonosBridge::start(&ctx, DeviceId::new(2), "uuid:RINCON_B", "Bridge", endpoint());
        assert_eq!(bridge.state().status(), Status::Present);

        bridge
            .perform(&TaskId::new("t4"), "set", Some(r#"{"name":"Hall bridge"}"#))
            .await
            .unwrap();
        assert_eq!(bridge.state().name(), "Hall bridge");
        assert_eq!(
            bridge.validate("play", None),
            ValidationReport::invalid_field("perform")
        );
    }
}
