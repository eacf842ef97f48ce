//! Capabilities and ContactCapabilities.
//!
//! Media capabilities are translated between Telepathy's StreamedMedia
//! flags and the engine's [`MediaCaps`]. Only audio and video survive the
//! round trip; the remaining Telepathy flags have no engine counterpart.

use std::collections::HashMap;

use {
    bitflags::bitflags,
    lilac_common::{
        Handle, HandleType,
        names::{
            IFACE_CHANNEL_TYPE_STREAMED_MEDIA, IFACE_CHANNEL_TYPE_TEXT, PROP_CHANNEL_TYPE,
            PROP_TARGET_HANDLE, PROP_TARGET_HANDLE_TYPE,
        },
    },
    lilac_engine::MediaCaps,
    lilac_handles::HandleRepo,
    serde::Serialize,
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use crate::{Command, Connection, ConnectionEvent, Result};

bitflags! {
    /// `Channel_Media_Capabilities`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StreamedMediaCaps: u32 {
        const AUDIO = 1 << 0;
        const VIDEO = 1 << 1;
        const NAT_TRAVERSAL_STUN = 1 << 2;
        const NAT_TRAVERSAL_GTALK_P2P = 1 << 3;
        const NAT_TRAVERSAL_ICE_UDP = 1 << 4;
        const IMMUTABLE_STREAMS = 1 << 5;
    }
}

bitflags! {
    /// `Connection_Capability_Flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GenericCaps: u32 {
        const CREATE = 1 << 0;
        const INVITE = 1 << 1;
    }
}

/// Telepathy flags for what the engine reports.
#[must_use]
pub fn tp_media_caps(caps: MediaCaps) -> StreamedMediaCaps {
    let mut out = StreamedMediaCaps::empty();
    if caps.intersects(MediaCaps::AUDIO | MediaCaps::AUDIO_SINGLE_DIRECTION | MediaCaps::AUDIO_VIDEO) {
        out |= StreamedMediaCaps::AUDIO;
    }
    if caps.intersects(MediaCaps::VIDEO | MediaCaps::VIDEO_SINGLE_DIRECTION | MediaCaps::AUDIO_VIDEO) {
        out |= StreamedMediaCaps::VIDEO;
    }
    out
}

/// Engine caps for what a client advertises.
#[must_use]
pub fn engine_media_caps(caps: StreamedMediaCaps) -> MediaCaps {
    let mut out = MediaCaps::empty();
    if caps.contains(StreamedMediaCaps::AUDIO) {
        out |= MediaCaps::AUDIO;
    }
    if caps.contains(StreamedMediaCaps::VIDEO) {
        out |= MediaCaps::VIDEO;
    }
    if caps.contains(StreamedMediaCaps::AUDIO | StreamedMediaCaps::VIDEO) {
        out |= MediaCaps::AUDIO_VIDEO;
    }
    out
}

fn generic_for(specific: StreamedMediaCaps) -> GenericCaps {
    if specific.is_empty() {
        GenericCaps::empty()
    } else {
        GenericCaps::CREATE | GenericCaps::INVITE
    }
}

/// One `CapabilitiesChanged` entry `(usuuuu)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityChange {
    pub handle: u32,
    pub channel_type: String,
    pub old_generic: u32,
    pub new_generic: u32,
    pub old_specific: u32,
    pub new_specific: u32,
}

impl CapabilityChange {
    fn streamed_media(handle: u32, old: StreamedMediaCaps, new: StreamedMediaCaps) -> Self {
        Self {
            handle,
            channel_type: IFACE_CHANNEL_TYPE_STREAMED_MEDIA.to_string(),
            old_generic: generic_for(old).bits(),
            new_generic: generic_for(new).bits(),
            old_specific: old.bits(),
            new_specific: new.bits(),
        }
    }
}

/// One `GetCapabilities` entry `(usuu)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityEntry {
    pub handle: u32,
    pub channel_type: String,
    pub generic: u32,
    pub specific: u32,
}

/// A requestable channel class: fixed properties plus the names of the
/// properties a request may also set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestableChannelClass {
    pub channel_type: String,
    pub target_handle_type: u32,
    pub allowed: Vec<String>,
}

impl RequestableChannelClass {
    /// One-to-one text channels, targeted by handle.
    #[must_use]
    pub fn text() -> Self {
        Self {
            channel_type: IFACE_CHANNEL_TYPE_TEXT.to_string(),
            target_handle_type: HandleType::Contact.as_u32(),
            allowed: vec![PROP_TARGET_HANDLE.to_string()],
        }
    }

    /// Fixed-property keys, for the `a{sv}` half of the struct.
    #[must_use]
    pub fn fixed_keys() -> [&'static str; 2] {
        [PROP_CHANNEL_TYPE, PROP_TARGET_HANDLE_TYPE]
    }
}

/// Per-connection capability bookkeeping.
#[derive(Default)]
pub(crate) struct CapabilityState {
    /// Caps last reported for each contact, for change detection.
    last_seen: HashMap<Handle, StreamedMediaCaps>,
    timers: HashMap<u64, CancellationToken>,
    next_timer: u64,
}

impl CapabilityState {
    pub(crate) fn cancel_timers(&mut self) {
        for (id, token) in self.timers.drain() {
            debug!(timer = id, "cancelling capability poll");
            token.cancel();
        }
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

impl Connection {
    fn contact_media_caps(&self, handle: Handle) -> Result<StreamedMediaCaps> {
        if Some(handle) == self.self_handle() {
            return Ok(tp_media_caps(self.engine().ui_media_caps()));
        }
        let id = self.handles().contacts().inspect(handle)?;
        Ok(self
            .account()
            .map(|a| tp_media_caps(a.media_caps(&id)))
            .unwrap_or_default())
    }

    /// `Capabilities.AdvertiseCapabilities(a(su), as) → a(su)`.
    pub fn advertise_capabilities(
        &mut self,
        add: &[(String, u32)],
        remove: &[String],
    ) -> Result<Vec<(String, u32)>> {
        let old = tp_media_caps(self.engine().ui_media_caps());

        let mut wanted = old;
        if remove.iter().any(|t| t == IFACE_CHANNEL_TYPE_STREAMED_MEDIA) {
            wanted = StreamedMediaCaps::empty();
        }
        for (channel_type, flags) in add {
            if channel_type == IFACE_CHANNEL_TYPE_STREAMED_MEDIA {
                wanted |= StreamedMediaCaps::from_bits_truncate(*flags);
            }
        }

        self.engine().set_ui_media_caps(engine_media_caps(wanted));
        let new = tp_media_caps(self.engine().ui_media_caps());
        debug!(old = old.bits(), new = new.bits(), "advertised media caps");

        if new != old
            && let Some(me) = self.self_handle()
        {
            self.emit(ConnectionEvent::CapabilitiesChanged(vec![
                CapabilityChange::streamed_media(me.get(), old, new),
            ]));
        }

        let mut out = vec![(IFACE_CHANNEL_TYPE_TEXT.to_string(), 0)];
        if !new.is_empty() {
            out.push((IFACE_CHANNEL_TYPE_STREAMED_MEDIA.to_string(), new.bits()));
        }
        Ok(out)
    }

    /// `Capabilities.GetCapabilities(au) → a(usuu)`. Handle 0 stands for the
    /// connection itself.
    pub fn get_capabilities(&self, handles: &[u32]) -> Result<Vec<CapabilityEntry>> {
        let contacts = self.handles().contacts();
        let mut resolved = Vec::with_capacity(handles.len());
        for raw in handles {
            let handle = match (*raw, self.self_handle()) {
                (0, Some(me)) => me,
                (raw, _) => contacts.validate(raw)?,
            };
            resolved.push((*raw, handle));
        }

        let text_generic = (GenericCaps::CREATE | GenericCaps::INVITE).bits();
        let mut out = Vec::new();
        for (raw, handle) in resolved {
            out.push(CapabilityEntry {
                handle: raw,
                channel_type: IFACE_CHANNEL_TYPE_TEXT.to_string(),
                generic: text_generic,
                specific: 0,
            });
            let media = self.contact_media_caps(handle)?;
            if !media.is_empty() {
                out.push(CapabilityEntry {
                    handle: raw,
                    channel_type: IFACE_CHANNEL_TYPE_STREAMED_MEDIA.to_string(),
                    generic: generic_for(media).bits(),
                    specific: media.bits(),
                });
            }
        }
        Ok(out)
    }

    /// `ContactCapabilities.GetContactCapabilities(au)`.
    pub fn get_contact_capabilities(
        &self,
        handles: &[u32],
    ) -> Result<Vec<(u32, Vec<RequestableChannelClass>)>> {
        let contacts = self.handles().contacts();
        handles
            .iter()
            .map(|raw| {
                if *raw == 0 {
                    return Ok((0, Vec::new()));
                }
                contacts.validate(*raw)?;
                Ok((*raw, vec![RequestableChannelClass::text()]))
            })
            .collect()
    }

    /// `ContactCapabilities.UpdateCapabilities`. Nothing to update, but
    /// only while connected.
    pub fn update_capabilities(&self) -> Result<()> {
        self.require_connected()
    }

    /// Re-read `from`'s caps a little later.
    ///
    /// Heuristic: the engine has no "caps changed" callback, but capability
    /// discovery usually completes within a few seconds of a presence
    /// stanza. Poll once after `poll_delay`.
    pub(crate) fn schedule_caps_poll(&mut self, from: &str) {
        let handle = match self.handles().contacts().ensure(from) {
            Ok(h) => h,
            Err(e) => {
                debug!(from, error = %e, "presence from unusable id");
                return;
            },
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(from, "no runtime, not polling capabilities");
            return;
        };

        if !self.caps.last_seen.contains_key(&handle) {
            let current = self.contact_media_caps(handle).unwrap_or_default();
            self.caps.last_seen.insert(handle, current);
        }

        let timer = self.caps.next_timer;
        self.caps.next_timer = self.caps.next_timer.wrapping_add(1);
        let token = CancellationToken::new();
        self.caps.timers.insert(timer, token.clone());

        let commands = self.commands.clone();
        let delay = self.options().poll_delay;
        runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {},
                () = tokio::time::sleep(delay) => {
                    let _ = commands.send(Command::PollCapabilities { timer, handle });
                },
            }
        });
        debug!(from, timer, delay_secs = delay.as_secs(), "scheduled capability poll");
    }

    pub(crate) fn poll_capabilities(&mut self, timer: u64, handle: Handle) {
        if self.caps.timers.remove(&timer).is_none() {
            debug!(timer, "stale capability poll");
            return;
        }
        let new = match self.contact_media_caps(handle) {
            Ok(caps) => caps,
            Err(e) => {
                debug!(%handle, error = %e, "capability poll for unknown handle");
                return;
            },
        };
        let old = self.caps.last_seen.insert(handle, new).unwrap_or_default();
        if old != new {
            debug!(%handle, old = old.bits(), new = new.bits(), "contact caps changed");
            self.emit(ConnectionEvent::CapabilitiesChanged(vec![
                CapabilityChange::streamed_media(handle.get(), old, new),
            ]));
        }
    }

    /// Number of outstanding capability polls.
    pub fn pending_caps_polls(&self) -> usize {
        self.caps.pending_timers()
    }
}
