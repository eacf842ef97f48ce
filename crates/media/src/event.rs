use {
    lilac_engine::{Candidate, Codec, MediaType},
    tokio::sync::mpsc,
};

/// `Media_Stream_Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StreamDirection {
    None = 0,
    Send = 1,
    Receive = 2,
    Bidirectional = 3,
}

impl StreamDirection {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Media-side changes that become bus signals.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// `NewSessionHandler(os)` on the connection's media channel.
    NewSessionHandler {
        session_path: String,
        session_type: String,
    },
    /// `Media.SessionHandler.NewStreamHandler(ouuu)`.
    NewStreamHandler {
        session_path: String,
        stream_path: String,
        id: u32,
        media_type: MediaType,
        direction: StreamDirection,
    },
    /// The remote side offered codecs (`StreamHandler.SetRemoteCodecs`).
    RemoteCodecs {
        stream_path: String,
        codecs: Vec<Codec>,
    },
    /// The remote side offered candidates (`StreamHandler.AddRemoteCandidate`).
    RemoteCandidates {
        stream_path: String,
        candidates: Vec<Candidate>,
    },
    /// A stream failed; it closes right after.
    StreamError {
        stream_path: String,
        code: u32,
        message: String,
    },
    StreamClosed { stream_path: String },
    /// The whole session ended and its objects should be unexported.
    SessionClosed { session_path: String },
}

pub trait MediaEventSink: Send + Sync {
    fn emit(&self, event: MediaEvent);
}

impl MediaEventSink for mpsc::UnboundedSender<MediaEvent> {
    fn emit(&self, event: MediaEvent) {
        if self.send(event).is_err() {
            tracing::debug!("media event receiver dropped");
        }
    }
}
