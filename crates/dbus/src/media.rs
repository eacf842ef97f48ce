//! Media session objects: `Channel.Interface.MediaSignalling` and
//! `Media.SessionHandler` at the session path, `Media.StreamHandler` per
//! stream.

use {
    lilac_connection::ConnectionHandle,
    tracing::debug,
    zbus::{
        interface,
        object_server::SignalEmitter,
        zvariant::{ObjectPath, OwnedObjectPath},
    },
};

use crate::{
    Result,
    convert::{self, CodecTuple, TransportTuple},
};

/// `org.freedesktop.Telepathy.Channel.Interface.MediaSignalling`.
pub struct MediaSignallingIface {
    conn: ConnectionHandle,
    path: String,
}

impl MediaSignallingIface {
    pub fn new(conn: ConnectionHandle, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Channel.Interface.MediaSignalling")]
impl MediaSignallingIface {
    fn get_session_handlers(&self) -> Result<Vec<(OwnedObjectPath, String)>> {
        let conn = self.conn.lock();
        conn.media_backend(&self.path)
            .map(|b| Ok((convert::object_path(b.object_path())?, b.conference_type().to_string())))
            .into_iter()
            .collect()
    }

    #[zbus(signal)]
    pub async fn new_session_handler(
        emitter: &SignalEmitter<'_>,
        session_handler: ObjectPath<'_>,
        session_type: &str,
    ) -> zbus::Result<()>;
}

/// `org.freedesktop.Telepathy.Media.SessionHandler`.
pub struct SessionHandlerIface {
    conn: ConnectionHandle,
    path: String,
}

impl SessionHandlerIface {
    pub fn new(conn: ConnectionHandle, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Media.SessionHandler")]
impl SessionHandlerIface {
    fn ready(&self) -> Result<()> {
        Ok(self.conn.lock().media_ready(&self.path)?)
    }

    fn error(&self, error_code: u32, message: String) -> Result<()> {
        Ok(self.conn.lock().media_error(&self.path, error_code, &message)?)
    }

    #[zbus(signal)]
    pub async fn new_stream_handler(
        emitter: &SignalEmitter<'_>,
        stream_handler: ObjectPath<'_>,
        id: u32,
        media_type: u32,
        direction: u32,
    ) -> zbus::Result<()>;
}

/// `org.freedesktop.Telepathy.Media.StreamHandler`, reduced to codec and
/// candidate exchange.
pub struct StreamHandlerIface {
    conn: ConnectionHandle,
    path: String,
}

impl StreamHandlerIface {
    pub fn new(conn: ConnectionHandle, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Media.StreamHandler")]
impl StreamHandlerIface {
    fn ready(&self, codecs: Vec<CodecTuple>) -> Result<()> {
        let codecs = codecs
            .into_iter()
            .map(convert::codec_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(self.conn.lock().stream_codecs_ready(&self.path, codecs)?)
    }

    fn new_native_candidate(
        &self,
        candidate_id: String,
        transports: Vec<TransportTuple>,
    ) -> Result<()> {
        let candidates = convert::candidates_from(&candidate_id, transports)?;
        let mut conn = self.conn.lock();
        for candidate in candidates {
            conn.stream_native_candidate(&self.path, candidate)?;
        }
        Ok(())
    }

    fn native_candidates_prepared(&self) {
        debug!(stream = %self.path, "native candidates prepared");
    }

    fn error(&self, error_code: u32, message: String) -> Result<()> {
        Ok(self.conn.lock().stream_error(&self.path, error_code, &message)?)
    }

    #[zbus(signal)]
    pub async fn set_remote_codecs(
        emitter: &SignalEmitter<'_>,
        codecs: Vec<CodecTuple>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn add_remote_candidate(
        emitter: &SignalEmitter<'_>,
        candidate_id: &str,
        transports: Vec<TransportTuple>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn close(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
}
