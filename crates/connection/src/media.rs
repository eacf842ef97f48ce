//! Media sessions owned by a connection.
//!
//! Each engine media session gets a [`MediaBackend`] exported at
//! `<connection path>/MediaChannel<n>`. Bus calls address backends and
//! streams by object path; engine events address them by session id.

use std::{collections::HashMap, sync::Arc};

use {
    lilac_engine::{Candidate, Codec, MediaSession, MediaState, MediaType},
    lilac_media::MediaBackend,
    tracing::{debug, warn},
};

use crate::{Connection, Error, Result};

#[derive(Default)]
pub(crate) struct MediaSessions {
    /// Keyed by engine session id.
    backends: HashMap<String, MediaBackend>,
    next_channel: u32,
}

impl MediaSessions {
    pub(crate) fn backend_mut(&mut self, media_id: &str) -> Option<&mut MediaBackend> {
        let backend = self.backends.get_mut(media_id);
        if backend.is_none() {
            debug!(media_id, "no backend for media session");
        }
        backend
    }

    fn by_path(&self, session_path: &str) -> Option<&MediaBackend> {
        self.backends
            .values()
            .find(|b| b.object_path() == session_path)
    }

    fn by_path_mut(&mut self, session_path: &str) -> Result<&mut MediaBackend> {
        self.backends
            .values_mut()
            .find(|b| b.object_path() == session_path)
            .ok_or_else(|| Error::not_available(format!("no media session at {session_path}")))
    }

    /// The backend holding the stream at `stream_path`.
    fn by_stream_path_mut(&mut self, stream_path: &str) -> Result<&mut MediaBackend> {
        self.backends
            .values_mut()
            .find(|b| b.streams().iter().any(|s| s.object_path() == stream_path))
            .ok_or_else(|| Error::not_available(format!("no media stream at {stream_path}")))
    }
}

impl Connection {
    pub(crate) fn media_created(&mut self, peer: &str, media: Arc<dyn MediaSession>) {
        let media_id = media.id().to_string();
        if self.media.backends.contains_key(&media_id) {
            warn!(media_id, "media session already tracked");
            return;
        }
        self.media.next_channel = self.media.next_channel.wrapping_add(1);
        let path = format!("{}/MediaChannel{}", self.object_path(), self.media.next_channel);
        let mut backend = MediaBackend::new(path, Arc::new(self.events.clone()));
        if let Err(e) = backend.set_media(media) {
            warn!(media_id, error = %e, "could not attach media session");
            return;
        }
        debug!(media_id, peer, session = %backend.object_path(), "media session created");
        self.media.backends.insert(media_id, backend);
    }

    pub(crate) fn media_stream_added(
        &mut self,
        media_id: &str,
        sid: &str,
        who: &str,
        media_type: MediaType,
    ) {
        if let Some(backend) = self.media.backend_mut(media_id) {
            backend.add_media_stream(sid, who, media_type);
        }
    }

    pub(crate) fn media_state_changed(
        &mut self,
        media_id: &str,
        state: MediaState,
        sid: Option<&str>,
        name: Option<&str>,
    ) {
        let Some(backend) = self.media.backend_mut(media_id) else {
            return;
        };
        if backend.state_changed(state, sid, name) {
            debug!(media_id, "media session ended");
            self.media.backends.remove(media_id);
        }
    }

    /// End every media session, e.g. on disconnect.
    pub(crate) fn close_media(&mut self) {
        for (media_id, mut backend) in self.media.backends.drain() {
            debug!(media_id, "closing media session");
            backend.state_changed(MediaState::End, None, None);
        }
    }

    /// Object paths of live session handlers.
    pub fn media_sessions(&self) -> Vec<String> {
        self.media
            .backends
            .values()
            .map(|b| b.object_path().to_string())
            .collect()
    }

    /// Session handler at `session_path`, if any.
    pub fn media_backend(&self, session_path: &str) -> Option<&MediaBackend> {
        self.media.by_path(session_path)
    }

    /// `Media.SessionHandler.Ready`.
    pub fn media_ready(&mut self, session_path: &str) -> Result<()> {
        self.media.by_path_mut(session_path)?.ready();
        Ok(())
    }

    /// `Media.SessionHandler.Error`.
    pub fn media_error(&mut self, session_path: &str, code: u32, message: &str) -> Result<()> {
        Ok(self.media.by_path_mut(session_path)?.error(code, message)?)
    }

    /// `Media.StreamHandler.Ready`: the stream engine's local codecs.
    pub fn stream_codecs_ready(&mut self, stream_path: &str, codecs: Vec<Codec>) -> Result<()> {
        let backend = self.media.by_stream_path_mut(stream_path)?;
        if let Some(stream) = backend.stream_by_path_mut(stream_path) {
            stream.set_local_codecs(codecs);
        }
        Ok(())
    }

    /// `Media.StreamHandler.NewNativeCandidate`.
    pub fn stream_native_candidate(&mut self, stream_path: &str, candidate: Candidate) -> Result<()> {
        let backend = self.media.by_stream_path_mut(stream_path)?;
        if let Some(stream) = backend.stream_by_path_mut(stream_path) {
            stream.add_local_candidate(candidate);
        }
        Ok(())
    }

    /// `Media.StreamHandler.Error`.
    pub fn stream_error(&mut self, stream_path: &str, code: u32, message: &str) -> Result<()> {
        Ok(self
            .media
            .by_stream_path_mut(stream_path)?
            .stream_error(stream_path, code, message)?)
    }
}
