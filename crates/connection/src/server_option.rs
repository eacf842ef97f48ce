use {
    lilac_engine::{AccountOption, ProtocolInfo},
    tracing::warn,
};

/// Option names protocols use for the server to connect to: `server`
/// (OSCAR and friends) and `connect_server` (XMPP).
pub const SERVER_OPTION_NAMES: &[&str] = &["server", "connect_server"];

/// The option a server override should be written to: the first option, in
/// the protocol's own order, whose name is one of [`SERVER_OPTION_NAMES`].
pub fn find_server_option(protocol: &ProtocolInfo) -> Option<&AccountOption> {
    let found = protocol
        .options
        .iter()
        .find(|o| SERVER_OPTION_NAMES.contains(&o.pref_name.as_str()));
    if found.is_none() {
        warn!(protocol = %protocol.id, "server protocol option not found");
    }
    found
}
