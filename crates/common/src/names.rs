//! Telepathy D-Bus names: interfaces, bus name and object path prefixes.

/// Name of this connection manager on the bus.
pub const CM_NAME: &str = "lilac";

pub const CM_BUS_NAME_PREFIX: &str = "org.freedesktop.Telepathy.ConnectionManager.";
pub const CM_OBJECT_PATH_PREFIX: &str = "/org/freedesktop/Telepathy/ConnectionManager/";
pub const CONN_BUS_NAME_PREFIX: &str = "org.freedesktop.Telepathy.Connection.";
pub const CONN_OBJECT_PATH_PREFIX: &str = "/org/freedesktop/Telepathy/Connection/";

pub const ERROR_PREFIX: &str = "org.freedesktop.Telepathy.Error";

pub const IFACE_CONNECTION_MANAGER: &str = "org.freedesktop.Telepathy.ConnectionManager";
pub const IFACE_CONNECTION: &str = "org.freedesktop.Telepathy.Connection";
pub const IFACE_CONNECTION_SIMPLE_PRESENCE: &str =
    "org.freedesktop.Telepathy.Connection.Interface.SimplePresence";
pub const IFACE_CONNECTION_CAPABILITIES: &str =
    "org.freedesktop.Telepathy.Connection.Interface.Capabilities";
pub const IFACE_CONNECTION_CONTACT_CAPABILITIES: &str =
    "org.freedesktop.Telepathy.Connection.Interface.ContactCapabilities";

pub const IFACE_CHANNEL: &str = "org.freedesktop.Telepathy.Channel";
pub const IFACE_CHANNEL_TYPE_TEXT: &str = "org.freedesktop.Telepathy.Channel.Type.Text";
pub const IFACE_CHANNEL_TYPE_CONTACT_LIST: &str =
    "org.freedesktop.Telepathy.Channel.Type.ContactList";
pub const IFACE_CHANNEL_TYPE_STREAMED_MEDIA: &str =
    "org.freedesktop.Telepathy.Channel.Type.StreamedMedia";
pub const IFACE_CHANNEL_INTERFACE_GROUP: &str = "org.freedesktop.Telepathy.Channel.Interface.Group";

pub const IFACE_MEDIA_SESSION_HANDLER: &str = "org.freedesktop.Telepathy.Media.SessionHandler";
pub const IFACE_MEDIA_STREAM_HANDLER: &str = "org.freedesktop.Telepathy.Media.StreamHandler";

/// Fixed property keys used in requestable channel classes.
pub const PROP_CHANNEL_TYPE: &str = "org.freedesktop.Telepathy.Channel.ChannelType";
pub const PROP_TARGET_HANDLE_TYPE: &str = "org.freedesktop.Telepathy.Channel.TargetHandleType";
pub const PROP_TARGET_HANDLE: &str = "org.freedesktop.Telepathy.Channel.TargetHandle";

/// Names of the static list handles, in handle order starting at 1.
///
/// Only `subscribe` is served; publish/known/deny are not implemented.
pub const LIST_HANDLE_NAMES: &[&str] = &["subscribe"];

/// Bus name for a connection: `<prefix><cm>.<protocol>.<unique name>`.
#[must_use]
pub fn connection_bus_name(protocol: &str, unique_name: &str) -> String {
    format!(
        "{CONN_BUS_NAME_PREFIX}{CM_NAME}.{}.{unique_name}",
        crate::escape_as_identifier(protocol)
    )
}

/// Object path for a connection: `<prefix><cm>/<protocol>/<unique name>`.
#[must_use]
pub fn connection_object_path(protocol: &str, unique_name: &str) -> String {
    format!(
        "{CONN_OBJECT_PATH_PREFIX}{CM_NAME}/{}/{unique_name}",
        crate::escape_as_identifier(protocol)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_names_escape_protocol() {
        assert_eq!(
            connection_bus_name("xmpp", "bob_40example_2ecom"),
            "org.freedesktop.Telepathy.Connection.lilac.xmpp.bob_40example_2ecom"
        );
        assert_eq!(
            connection_object_path("my-proto", "bob"),
            "/org/freedesktop/Telepathy/Connection/lilac/my_2dproto/bob"
        );
    }
}
