use std::sync::Arc;

use {
    lilac_engine::{Candidate, Codec, MediaType},
    tracing::debug,
};

use crate::{MediaEvent, MediaEventSink};

/// One stream of a media session, named by the engine's session id.
pub struct MediaStream {
    object_path: String,
    id: u32,
    name: String,
    peer: String,
    media_type: MediaType,
    codecs_ready: bool,
    local_codecs: Vec<Codec>,
    local_candidates: Vec<Candidate>,
    remote_codecs: Vec<Codec>,
    remote_candidates: Vec<Candidate>,
    sink: Arc<dyn MediaEventSink>,
}

impl MediaStream {
    pub(crate) fn new(
        object_path: String,
        id: u32,
        name: &str,
        peer: &str,
        media_type: MediaType,
        sink: Arc<dyn MediaEventSink>,
    ) -> Self {
        Self {
            object_path,
            id,
            name: name.to_string(),
            peer: peer.to_string(),
            media_type,
            codecs_ready: false,
            local_codecs: Vec::new(),
            local_candidates: Vec::new(),
            remote_codecs: Vec::new(),
            remote_candidates: Vec::new(),
            sink,
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Engine session id.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn codecs_ready(&self) -> bool {
        self.codecs_ready
    }

    pub fn codecs(&self) -> Vec<Codec> {
        self.local_codecs.clone()
    }

    pub fn local_candidates(&self) -> Vec<Candidate> {
        self.local_candidates.clone()
    }

    pub fn remote_codecs(&self) -> &[Codec] {
        &self.remote_codecs
    }

    pub fn remote_candidates(&self) -> &[Candidate] {
        &self.remote_candidates
    }

    /// `StreamHandler.Ready` / `SupportedCodecs`: the local side knows its
    /// codecs.
    pub fn set_local_codecs(&mut self, codecs: Vec<Codec>) {
        debug!(stream = self.id, count = codecs.len(), "local codecs ready");
        self.local_codecs = codecs;
        self.codecs_ready = true;
    }

    /// `StreamHandler.NewNativeCandidate`.
    pub fn add_local_candidate(&mut self, candidate: Candidate) {
        self.local_candidates.push(candidate);
    }

    pub fn set_remote_codecs(&mut self, codecs: Vec<Codec>) {
        self.remote_codecs.clone_from(&codecs);
        self.sink.emit(MediaEvent::RemoteCodecs {
            stream_path: self.object_path.clone(),
            codecs,
        });
    }

    pub fn add_remote_candidates(&mut self, candidates: Vec<Candidate>) {
        self.remote_candidates.extend(candidates.iter().cloned());
        self.sink.emit(MediaEvent::RemoteCandidates {
            stream_path: self.object_path.clone(),
            candidates,
        });
    }

    /// Report a failure on this stream. The stream closes afterwards.
    pub fn error(&self, code: u32, message: &str) {
        debug!(stream = self.id, code, message, "stream error");
        self.sink.emit(MediaEvent::StreamError {
            stream_path: self.object_path.clone(),
            code,
            message: message.to_string(),
        });
        self.close();
    }

    pub(crate) fn close(&self) {
        self.sink.emit(MediaEvent::StreamClosed {
            stream_path: self.object_path.clone(),
        });
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("object_path", &self.object_path)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}
