/// Which Session Map backend to construct at startup.
#[derive(Debug, Clone)]
pub enum SessionMapBackend {
    Memory,
    Relational { connection_string: String },
}

/// Configuration surface recognized by this core. Loading this from a file
/// or environment is an external collaborator's job; callers construct this
/// struct directly.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub registration_secret: String,
    pub session_map_backend: SessionMapBackend,
}

impl DistributorConfig {
    pub fn new(registration_secret: impl Into<String>) -> Self {
        DistributorConfig { registration_secret: registration_secret.into(), session_map_backend: SessionMapBackend::Memory }
    }

    pub fn with_relational_backend(mut self, connection_string: impl Into<String>) -> Self {
        self.session_map_backend = SessionMapBackend::Relational { connection_string: connection_string.into() };
        self
    }
}
