//! Media session handler.
//!
//! The backend sits between an engine media session and the client's
//! stream engine: the engine adds streams and pushes remote codecs and
//! candidates; the client calls `Ready` and `Error` over the bus.

use std::sync::Arc;

use {
    lilac_engine::{Candidate, Codec, MediaSession, MediaState, MediaType},
    tracing::{debug, info},
};

use crate::{Error, MediaEvent, MediaEventSink, MediaStream, Result, StreamDirection};

/// Session handler for one call.
pub struct MediaBackend {
    object_path: String,
    conference_type: String,
    media: Option<Arc<dyn MediaSession>>,
    streams: Vec<MediaStream>,
    ready: bool,
    next_stream_id: u32,
    sink: Arc<dyn MediaEventSink>,
}

impl MediaBackend {
    pub fn new(object_path: impl Into<String>, sink: Arc<dyn MediaEventSink>) -> Self {
        Self {
            object_path: object_path.into(),
            conference_type: "rtp".into(),
            media: None,
            streams: Vec::new(),
            ready: false,
            next_stream_id: 1,
            sink,
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn conference_type(&self) -> &str {
        &self.conference_type
    }

    pub fn media(&self) -> Option<&Arc<dyn MediaSession>> {
        self.media.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn streams(&self) -> &[MediaStream] {
        &self.streams
    }

    pub fn stream(&self, sid: &str) -> Option<&MediaStream> {
        self.streams.iter().find(|s| s.name() == sid)
    }

    pub fn stream_mut(&mut self, sid: &str) -> Option<&mut MediaStream> {
        self.streams.iter_mut().find(|s| s.name() == sid)
    }

    pub fn stream_by_path_mut(&mut self, object_path: &str) -> Option<&mut MediaStream> {
        self.streams
            .iter_mut()
            .find(|s| s.object_path() == object_path)
    }

    /// Attach the engine session. A backend serves exactly one session.
    pub fn set_media(&mut self, media: Arc<dyn MediaSession>) -> Result<()> {
        if self.media.is_some() {
            return Err(Error::AlreadyAttached {
                object_path: self.object_path.clone(),
            });
        }
        self.media = Some(media);
        self.sink.emit(MediaEvent::NewSessionHandler {
            session_path: self.object_path.clone(),
            session_type: self.conference_type.clone(),
        });
        Ok(())
    }

    /// Track a stream the engine created. Announced immediately if the
    /// client already called `Ready`.
    pub fn add_media_stream(&mut self, sid: &str, who: &str, media_type: MediaType) -> &MediaStream {
        let id = self.next_stream_id;
        self.next_stream_id = self.next_stream_id.wrapping_add(1);
        let stream = MediaStream::new(
            format!("{}/MediaStream{id}", self.object_path),
            id,
            sid,
            who,
            media_type,
            Arc::clone(&self.sink),
        );
        if self.ready {
            self.emit_new_stream(&stream);
        }
        self.streams.push(stream);
        &self.streams[self.streams.len() - 1]
    }

    fn emit_new_stream(&self, stream: &MediaStream) {
        // Streams are bidirectional as far as the stream engine is concerned;
        // direction changes only happen in signalling.
        debug!(
            stream = stream.id(),
            media_type = stream.media_type().as_str(),
            "emitting NewStreamHandler"
        );
        self.sink.emit(MediaEvent::NewStreamHandler {
            session_path: self.object_path.clone(),
            stream_path: stream.object_path().to_string(),
            id: stream.id(),
            media_type: stream.media_type(),
            direction: StreamDirection::Bidirectional,
        });
    }

    /// `Media.SessionHandler.Ready`. Only the first call announces streams.
    pub fn ready(&mut self) {
        if self.ready {
            return;
        }
        debug!(session = %self.object_path, "emitting NewStreamHandler for each stream");
        self.ready = true;
        for stream in &self.streams {
            self.emit_new_stream(stream);
        }
    }

    /// `Media.SessionHandler.Error`: end the engine session and fail every
    /// stream.
    pub fn error(&mut self, code: u32, message: &str) -> Result<()> {
        let Some(media) = self.media.as_ref() else {
            debug!(session = %self.object_path, "no session, returning an error");
            return Err(Error::NoSession);
        };
        info!(
            session = %self.object_path,
            code,
            message,
            "session handler error, failing each stream"
        );
        media.end();

        // Closing a stream removes it from `streams`, so walk a snapshot.
        let snapshot: Vec<String> = self.streams.iter().map(|s| s.name().to_string()).collect();
        for sid in snapshot {
            if let Some(stream) = self.stream(&sid) {
                stream.error(code, message);
            }
            self.stream_closed(&sid);
        }
        Ok(())
    }

    /// `Media.StreamHandler.Error` on a single stream.
    pub fn stream_error(&mut self, stream_path: &str, code: u32, message: &str) -> Result<()> {
        let Some(pos) = self
            .streams
            .iter()
            .position(|s| s.object_path() == stream_path)
        else {
            return Err(Error::UnknownStream {
                sid: stream_path.to_string(),
            });
        };
        let stream = self.streams.swap_remove(pos);
        stream.error(code, message);
        Ok(())
    }

    fn stream_closed(&mut self, sid: &str) {
        self.streams.retain(|s| s.name() != sid);
    }

    /// Engine `state-changed`. END with a session id and no participant
    /// name means the whole stream is over.
    ///
    /// Returns `true` when the entire session ended (no sid, no name).
    pub fn state_changed(&mut self, state: MediaState, sid: Option<&str>, name: Option<&str>) -> bool {
        if state != MediaState::End {
            return false;
        }
        match (sid, name) {
            (Some(sid), None) => {
                if let Some(pos) = self.streams.iter().position(|s| s.name() == sid) {
                    let stream = self.streams.swap_remove(pos);
                    stream.close();
                }
                false
            },
            (None, None) => {
                for stream in self.streams.drain(..) {
                    stream.close();
                }
                self.media = None;
                self.sink.emit(MediaEvent::SessionClosed {
                    session_path: self.object_path.clone(),
                });
                true
            },
            _ => false,
        }
    }

    // Engine-facing backend operations.

    pub fn add_stream(
        &mut self,
        sid: &str,
        who: &str,
        media_type: MediaType,
        initiator: bool,
        transmitter: &str,
    ) -> bool {
        debug!(sid, who, media_type = media_type.as_str(), initiator, transmitter, "add_stream");
        true
    }

    pub fn add_remote_candidates(&mut self, sid: &str, who: &str, candidates: Vec<Candidate>) {
        match self.stream_mut(sid) {
            Some(stream) => stream.add_remote_candidates(candidates),
            None => debug!(sid, who, "couldn't find stream"),
        }
    }

    /// Whether codecs are ready for `sid`, or for every stream when `sid`
    /// is `None`.
    pub fn codecs_ready(&self, sid: Option<&str>) -> bool {
        match sid {
            Some(sid) => self.stream(sid).is_some_and(MediaStream::codecs_ready),
            None => self.streams.iter().all(MediaStream::codecs_ready),
        }
    }

    pub fn get_codecs(&self, sid: &str) -> Vec<Codec> {
        self.stream(sid).map(MediaStream::codecs).unwrap_or_default()
    }

    pub fn get_local_candidates(&self, sid: &str, _who: &str) -> Vec<Candidate> {
        self.stream(sid)
            .map(MediaStream::local_candidates)
            .unwrap_or_default()
    }

    pub fn set_remote_codecs(&mut self, sid: &str, who: &str, codecs: Vec<Codec>) -> bool {
        match self.stream_mut(sid) {
            Some(stream) => stream.set_remote_codecs(codecs),
            None => debug!(sid, who, "couldn't find stream"),
        }
        true
    }

    /// Choosing the send codec is left to the stream engine.
    pub fn set_send_codec(&mut self, _sid: &str, _codec: &Codec) -> bool {
        false
    }
}
