//! Plain Rust values to and from their Telepathy wire shapes.

use std::collections::{BTreeMap, HashMap};

use {
    lilac_channels::{ChannelInfo, PendingMessage},
    lilac_connection::{
        CapabilityChange, CapabilityEntry, ConnectionParams, ParamSpec, RequestableChannelClass,
        SimplePresence,
    },
    lilac_engine::{Candidate, Codec, MediaType, OptionValue},
    zbus::zvariant::{OwnedObjectPath, OwnedValue, Value},
};

use crate::{Result, TpDbusError};

/// `(usuuua{ss})`
pub type CodecTuple = (u32, String, u32, u32, u32, HashMap<String, String>);
/// `(usuussduss)`
pub type TransportTuple = (u32, String, u32, u32, String, String, f64, u32, String, String);
/// `(uuuuus)`
pub type PendingTuple = (u32, u32, u32, u32, u32, String);
/// `(a{sv}as)`
pub type ChannelClassTuple = (HashMap<String, Value<'static>>, Vec<String>);

const TRANSPORT_UDP: u32 = 0;
const TRANSPORT_TCP: u32 = 1;
/// `Media_Stream_Transport_Type_Local`.
const TRANSPORT_LOCAL: u32 = 0;

pub fn object_path(path: &str) -> Result<OwnedObjectPath> {
    Ok(OwnedObjectPath::try_from(path.to_string())?)
}

pub fn presences(map: BTreeMap<u32, SimplePresence>) -> HashMap<u32, (u32, String, String)> {
    map.into_iter()
        .map(|(handle, p)| (handle, (p.kind, p.status, p.message)))
        .collect()
}

pub fn capability_changes(changes: Vec<CapabilityChange>) -> Vec<(u32, String, u32, u32, u32, u32)> {
    changes
        .into_iter()
        .map(|c| {
            (
                c.handle,
                c.channel_type,
                c.old_generic,
                c.new_generic,
                c.old_specific,
                c.new_specific,
            )
        })
        .collect()
}

pub fn capability_entries(entries: Vec<CapabilityEntry>) -> Vec<(u32, String, u32, u32)> {
    entries
        .into_iter()
        .map(|e| (e.handle, e.channel_type, e.generic, e.specific))
        .collect()
}

pub fn channel_class(class: RequestableChannelClass) -> ChannelClassTuple {
    let [type_key, handle_type_key] = RequestableChannelClass::fixed_keys();
    let fixed = HashMap::from([
        (type_key.to_string(), Value::from(class.channel_type)),
        (handle_type_key.to_string(), Value::from(class.target_handle_type)),
    ]);
    (fixed, class.allowed)
}

pub fn channel(info: &ChannelInfo) -> Result<(OwnedObjectPath, String, u32, u32)> {
    Ok((
        object_path(&info.object_path)?,
        info.channel_type.to_string(),
        info.handle_type.as_u32(),
        info.handle,
    ))
}

pub fn pending(message: PendingMessage) -> PendingTuple {
    (
        message.id,
        u32::try_from(message.timestamp).unwrap_or(u32::MAX),
        message.sender,
        message.message_type.as_u32(),
        message.flags,
        message.text,
    )
}

pub fn param(spec: ParamSpec) -> (String, u32, String, Value<'static>) {
    let default = match spec.default {
        Some(OptionValue::String(s)) => Value::from(s),
        Some(OptionValue::Int(i)) => Value::from(i),
        Some(OptionValue::Bool(b)) => Value::from(b),
        None => Value::from(""),
    };
    (spec.name, spec.flags.bits(), spec.signature.to_string(), default)
}

fn string_param(params: &mut HashMap<String, OwnedValue>, key: &str) -> Result<Option<String>> {
    params
        .remove(key)
        .map(|v| {
            String::try_from(v)
                .map_err(|_| TpDbusError::InvalidArgument(format!("parameter {key} must be a string")))
        })
        .transpose()
}

/// `RequestConnection`'s `a{sv}` to connection parameters. `account` is
/// required; unknown keys are rejected.
pub fn connection_params(
    protocol: &str,
    mut params: HashMap<String, OwnedValue>,
) -> Result<ConnectionParams> {
    let account = string_param(&mut params, "account")?
        .ok_or_else(|| TpDbusError::InvalidArgument("missing required parameter account".into()))?;
    let password = string_param(&mut params, "password")?.unwrap_or_default();
    let server = string_param(&mut params, "server")?;
    if let Some(extra) = params.keys().next() {
        return Err(TpDbusError::InvalidArgument(format!("unknown parameter {extra}")));
    }

    let mut out = ConnectionParams::new(protocol, account, password);
    if let Some(server) = server {
        out = out.with_server(server);
    }
    Ok(out)
}

fn media_type(raw: u32) -> Result<MediaType> {
    match raw {
        0 => Ok(MediaType::Audio),
        1 => Ok(MediaType::Video),
        other => Err(TpDbusError::InvalidArgument(format!("unknown media type {other}"))),
    }
}

pub fn codec(codec: Codec) -> CodecTuple {
    (
        codec.id,
        codec.encoding_name,
        codec.media_type.as_u32(),
        codec.clock_rate,
        codec.channels,
        codec.params.into_iter().collect(),
    )
}

pub fn codec_from(tuple: CodecTuple) -> Result<Codec> {
    let (id, encoding_name, media, clock_rate, channels, params) = tuple;
    Ok(Codec {
        id,
        encoding_name,
        media_type: media_type(media)?,
        clock_rate,
        channels,
        params: params.into_iter().collect(),
    })
}

/// One candidate as a single-transport `(usuussduss)` list.
pub fn transport(candidate: Candidate) -> TransportTuple {
    let proto = if candidate.protocol.eq_ignore_ascii_case("tcp") {
        TRANSPORT_TCP
    } else {
        TRANSPORT_UDP
    };
    (
        candidate.component,
        candidate.ip,
        u32::from(candidate.port),
        proto,
        "RTP".into(),
        "AVP".into(),
        f64::from(candidate.priority) / f64::from(u32::MAX),
        TRANSPORT_LOCAL,
        candidate.username.unwrap_or_default(),
        candidate.password.unwrap_or_default(),
    )
}

/// `NewNativeCandidate(s, a(usuussduss))` to one candidate per transport.
pub fn candidates_from(foundation: &str, transports: Vec<TransportTuple>) -> Result<Vec<Candidate>> {
    transports
        .into_iter()
        .map(|(component, ip, port, proto, _, _, preference, _, username, password)| {
            let port = u16::try_from(port)
                .map_err(|_| TpDbusError::InvalidArgument(format!("invalid port {port}")))?;
            let protocol = match proto {
                TRANSPORT_UDP => "udp",
                TRANSPORT_TCP => "tcp",
                other => {
                    return Err(TpDbusError::InvalidArgument(format!(
                        "unknown transport protocol {other}"
                    )));
                },
            };
            let priority = (preference.clamp(0.0, 1.0) * f64::from(u32::MAX)) as u32;
            Ok(Candidate {
                foundation: foundation.to_string(),
                component,
                ip,
                port,
                protocol: protocol.into(),
                priority,
                username: Some(username).filter(|s| !s.is_empty()),
                password: Some(password).filter(|s| !s.is_empty()),
            })
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        lilac_common::HandleType,
        lilac_connection::ParamFlags,
    };

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, OwnedValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OwnedValue::try_from(Value::from(*v)).unwrap()))
            .collect()
    }

    #[test]
    fn connection_params_need_an_account() {
        let err = connection_params("xmpp", params(&[("password", "pw")])).unwrap_err();
        assert!(matches!(err, TpDbusError::InvalidArgument(_)));

        let p = connection_params(
            "xmpp",
            params(&[("account", "me@example.com"), ("password", "pw"), ("server", "s.example.com")]),
        )
        .unwrap();
        assert_eq!(p.username, "me@example.com");
        assert_eq!(p.server(), Some("s.example.com"));
    }

    #[test]
    fn unknown_connection_params_are_rejected() {
        let err =
            connection_params("xmpp", params(&[("account", "me"), ("port", "5222")])).unwrap_err();
        assert!(matches!(err, TpDbusError::InvalidArgument(m) if m.contains("port")));
    }

    #[test]
    fn params_without_default_send_an_empty_string() {
        let (name, flags, sig, default) = param(ParamSpec {
            name: "account".into(),
            flags: ParamFlags::REQUIRED,
            signature: "s",
            default: None,
        });
        assert_eq!((name.as_str(), flags, sig.as_str()), ("account", 1, "s"));
        assert_eq!(default, Value::from(""));
    }

    #[test]
    fn channel_entries_carry_handle_type_numbers() {
        let info = ChannelInfo {
            object_path: "/org/freedesktop/Telepathy/Connection/lilac/xmpp/me/ImChannel3".into(),
            channel_type: lilac_common::names::IFACE_CHANNEL_TYPE_TEXT,
            handle_type: HandleType::Contact,
            handle: 3,
        };
        let (path, kind, handle_type, handle) = channel(&info).unwrap();
        assert_eq!(path.as_str(), info.object_path);
        assert_eq!(kind, "org.freedesktop.Telepathy.Channel.Type.Text");
        assert_eq!((handle_type, handle), (1, 3));
        assert!(object_path("not a path").is_err());
    }

    #[test]
    fn codecs_reject_unknown_media_types() {
        let tuple = (96, "H264".to_string(), 1, 90_000, 0, HashMap::new());
        let codec = codec_from(tuple.clone()).unwrap();
        assert_eq!(codec.media_type, MediaType::Video);
        assert_eq!(super::codec(codec), tuple);
        assert!(codec_from((0, "x".into(), 7, 0, 0, HashMap::new())).is_err());
    }

    #[test]
    fn native_candidates_split_per_transport() {
        let transports = vec![
            (1, "10.0.0.1".to_string(), 4000, 0, "RTP".to_string(), "AVP".to_string(), 1.0, 0, String::new(), String::new()),
            (2, "10.0.0.1".to_string(), 4001, 1, "RTP".to_string(), "AVP".to_string(), 0.0, 0, "u".to_string(), "p".to_string()),
        ];
        let candidates = candidates_from("L1", transports).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].protocol, "udp");
        assert_eq!(candidates[0].priority, u32::MAX);
        assert_eq!(candidates[0].username, None);
        assert_eq!(candidates[1].protocol, "tcp");
        assert_eq!(candidates[1].username.as_deref(), Some("u"));

        let bad_port = vec![(1, "h".to_string(), 70_000, 0, String::new(), String::new(), 0.5, 0, String::new(), String::new())];
        assert!(candidates_from("L2", bad_port).is_err());
    }
}
