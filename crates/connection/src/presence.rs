//! SimplePresence: translation between the seven Telepathy statuses and
//! the engine's status primitives.

use std::collections::BTreeMap;

use {
    lilac_common::Handle,
    lilac_engine::{EngineStatus, StatusPrimitive},
    lilac_handles::HandleRepo,
    serde::Serialize,
    tracing::debug,
};

use crate::{Connection, ConnectionEvent, Error, Result};

/// `Connection_Presence_Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PresenceType {
    Unset = 0,
    Offline = 1,
    Available = 2,
    Away = 3,
    ExtendedAway = 4,
    Hidden = 5,
    Busy = 6,
    Unknown = 7,
    Error = 8,
}

impl PresenceType {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// One row of the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSpec {
    pub name: &'static str,
    pub kind: PresenceType,
    pub may_set_on_self: bool,
    pub can_have_message: bool,
}

const fn spec(
    name: &'static str,
    kind: PresenceType,
    may_set_on_self: bool,
    can_have_message: bool,
) -> StatusSpec {
    StatusSpec {
        name,
        kind,
        may_set_on_self,
        can_have_message,
    }
}

pub const AVAILABLE: usize = 0;
pub const BUSY: usize = 1;
pub const AWAY: usize = 2;
pub const EXTENDED_AWAY: usize = 3;
pub const HIDDEN: usize = 4;
pub const OFFLINE: usize = 5;
pub const UNKNOWN: usize = 6;

/// The statuses this connection manager exposes, by index.
pub const STATUSES: [StatusSpec; 7] = [
    spec("available", PresenceType::Available, true, true),
    spec("busy", PresenceType::Busy, true, true),
    spec("away", PresenceType::Away, true, true),
    spec("xa", PresenceType::ExtendedAway, true, true),
    spec("hidden", PresenceType::Hidden, true, false),
    spec("offline", PresenceType::Offline, false, false),
    spec("unknown", PresenceType::Unknown, false, false),
];

/// Engine primitive to ask for when setting status `index`.
#[must_use]
pub fn primitive_for_index(index: usize) -> StatusPrimitive {
    match index {
        AVAILABLE => StatusPrimitive::Available,
        BUSY => StatusPrimitive::Unavailable,
        AWAY => StatusPrimitive::Away,
        EXTENDED_AWAY => StatusPrimitive::ExtendedAway,
        HIDDEN => StatusPrimitive::Invisible,
        OFFLINE => StatusPrimitive::Offline,
        _ => StatusPrimitive::Unset,
    }
}

/// Status index for a raw engine primitive. Unset and unknown primitives
/// are reported as available rather than failing.
#[must_use]
pub fn index_for_primitive(raw: u32) -> usize {
    match StatusPrimitive::from_raw(raw) {
        Some(StatusPrimitive::Offline) => OFFLINE,
        Some(StatusPrimitive::Available) => AVAILABLE,
        Some(StatusPrimitive::Unavailable) => BUSY,
        Some(StatusPrimitive::Invisible) => HIDDEN,
        Some(StatusPrimitive::Away) => AWAY,
        Some(StatusPrimitive::ExtendedAway) => EXTENDED_AWAY,
        _ => AVAILABLE,
    }
}

/// Remove markup from a status message and decode the common entities.
#[must_use]
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        if tag.starts_with("br") {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// A Telepathy status: index into [`STATUSES`] plus optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceStatus {
    pub index: usize,
    pub message: Option<String>,
}

impl PresenceStatus {
    /// Translate an engine status. No status at all means unknown.
    #[must_use]
    pub fn from_engine(status: Option<&EngineStatus>) -> Self {
        match status {
            None => Self {
                index: UNKNOWN,
                message: None,
            },
            Some(status) => Self {
                index: index_for_primitive(status.primitive),
                message: status.message.as_deref().map(strip_markup),
            },
        }
    }

    #[must_use]
    pub fn spec(&self) -> &'static StatusSpec {
        &STATUSES[self.index.min(UNKNOWN)]
    }

    #[must_use]
    pub fn to_simple(&self) -> SimplePresence {
        let spec = self.spec();
        SimplePresence {
            kind: spec.kind.as_u32(),
            status: spec.name.to_string(),
            message: self.message.clone().unwrap_or_default(),
        }
    }
}

/// `Simple_Presence` struct `(uss)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimplePresence {
    pub kind: u32,
    pub status: String,
    pub message: String,
}

impl Connection {
    /// `SimplePresence.Statuses`: name → (type, may set on self, can have
    /// message).
    pub fn statuses(&self) -> BTreeMap<String, (u32, bool, bool)> {
        STATUSES
            .iter()
            .map(|s| {
                (
                    s.name.to_string(),
                    (s.kind.as_u32(), s.may_set_on_self, s.can_have_message),
                )
            })
            .collect()
    }

    /// Status of `handle` as the engine currently reports it.
    pub(crate) fn contact_status(&self, handle: Handle) -> Result<PresenceStatus> {
        let Some(account) = self.account() else {
            return Ok(PresenceStatus::from_engine(None));
        };
        if Some(handle) == self.self_handle() {
            return Ok(PresenceStatus::from_engine(account.active_status().as_ref()));
        }
        let name = self.handles().contacts().inspect(handle)?;
        let status = match account.find_buddy(&name) {
            Some(buddy) => buddy.status,
            None => {
                debug!(account_id = %account.key(), buddy = %name, "not on the buddy list, no status");
                None
            },
        };
        Ok(PresenceStatus::from_engine(status.as_ref()))
    }

    /// `SimplePresence.GetPresences(au)`.
    pub fn get_presences(&self, handles: &[u32]) -> Result<BTreeMap<u32, SimplePresence>> {
        self.require_connected()?;
        let contacts = self.handles().contacts();
        let handles = handles
            .iter()
            .map(|raw| contacts.validate(*raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        handles
            .into_iter()
            .map(|h| Ok((h.get(), self.contact_status(h)?.to_simple())))
            .collect()
    }

    /// `SimplePresence.SetPresence(ss)`.
    pub fn set_presence(&self, status: &str, message: &str) -> Result<()> {
        let Some(index) = STATUSES.iter().position(|s| s.name == status) else {
            return Err(Error::invalid_input(format!("unknown status '{status}'")));
        };
        let spec = &STATUSES[index];
        if !spec.may_set_on_self {
            return Err(Error::invalid_input(format!(
                "status '{status}' cannot be set on yourself"
            )));
        }
        let account = self.account().ok_or(Error::NotConnected)?;

        let status_id = account
            .status_type_id_with_primitive(primitive_for_index(index))
            .unwrap_or_else(|| {
                debug!(account_id = %account.key(), status, "defaulting to 'available' status");
                "available".to_string()
            });
        let attrs = if spec.can_have_message && !message.is_empty() {
            vec![("message".to_string(), message.to_string())]
        } else {
            Vec::new()
        };
        account.set_status_list(&status_id, true, &attrs);
        Ok(())
    }

    pub(crate) fn emit_presence(&self, handle: Handle, status: &PresenceStatus) {
        let mut update = BTreeMap::new();
        update.insert(handle.get(), status.to_simple());
        self.emit(ConnectionEvent::PresencesChanged(update));
    }

    pub(crate) fn emit_self_presence(&self) {
        let Some(me) = self.self_handle() else {
            return;
        };
        match self.contact_status(me) {
            Ok(status) => self.emit_presence(me, &status),
            Err(e) => debug!(error = %e, "no self presence to emit"),
        }
    }

    pub(crate) fn buddy_status_changed(&self, buddy: &str, status: Option<&EngineStatus>) {
        let handle = match self.handles().contacts().ensure(buddy) {
            Ok(h) => h,
            Err(e) => {
                debug!(buddy, error = %e, "ignoring status for unusable buddy name");
                return;
            },
        };
        debug!(buddy, status = ?status.map(|s| &s.id), "buddy changed status");
        self.emit_presence(handle, &PresenceStatus::from_engine(status));
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn every_index_round_trips_through_its_primitive() {
        // unknown maps to unset, which reads back as available.
        for index in 0..UNKNOWN {
            let prim = primitive_for_index(index);
            assert_eq!(index_for_primitive(prim.as_u32()), index, "index {index}");
        }
        assert_eq!(primitive_for_index(UNKNOWN), StatusPrimitive::Unset);
    }

    #[rstest]
    #[case(0)]
    #[case(StatusPrimitive::Mobile.as_u32())]
    #[case(StatusPrimitive::Tune.as_u32())]
    #[case(42)]
    fn unsupported_primitives_read_as_available(#[case] raw: u32) {
        assert_eq!(index_for_primitive(raw), AVAILABLE);
    }

    #[test]
    fn no_status_is_unknown() {
        let status = PresenceStatus::from_engine(None);
        assert_eq!(status.index, UNKNOWN);
        assert_eq!(status.to_simple().kind, PresenceType::Unknown.as_u32());
    }

    #[rstest]
    #[case("<b>out</b> to lunch", "out to lunch")]
    #[case("line one<br/>line two", "line one\nline two")]
    #[case("fish &amp; chips &lt;3", "fish & chips <3")]
    #[case("no markup", "no markup")]
    #[case("dangling <tag", "dangling <tag")]
    fn markup_is_stripped(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_markup(input), expected);
    }

    #[test]
    fn engine_message_is_cleaned() {
        let status = EngineStatus::new("away", StatusPrimitive::Away).with_message("<i>brb</i>");
        let presence = PresenceStatus::from_engine(Some(&status));
        assert_eq!(presence.index, AWAY);
        assert_eq!(presence.to_simple().message, "brb");
        assert_eq!(presence.to_simple().status, "away");
    }

    #[test]
    fn table_flags() {
        assert!(!STATUSES[HIDDEN].can_have_message);
        assert!(!STATUSES[OFFLINE].may_set_on_self);
        assert!(!STATUSES[UNKNOWN].may_set_on_self);
        assert_eq!(STATUSES[EXTENDED_AWAY].name, "xa");
    }
}
