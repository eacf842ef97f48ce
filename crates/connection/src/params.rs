use {
    secrecy::{ExposeSecret, Secret},
    std::fmt,
};

/// Account parameters a connection is created with. Immutable afterwards.
#[derive(Clone)]
pub struct ConnectionParams {
    pub protocol: String,
    pub username: String,
    pub password: Secret<String>,
    /// Server override, applied only if the protocol has a server option.
    pub server: Option<String>,
}

impl ConnectionParams {
    pub fn new(protocol: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            username: username.into(),
            password: Secret::new(password.into()),
            server: None,
        }
    }

    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// The server override, ignoring empty strings.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref().filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("server", &self.server)
            .finish()
    }
}
