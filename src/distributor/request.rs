use crate::error::Error;
use crate::model::Capabilities;

/// A non-empty ordered sequence of capability sets. Only the first is ever
/// served; the remaining alternatives are reported in the failure message
/// but not tried (see Design Notes — "Alternative capability sets unused").
#[derive(Debug, Clone)]
pub struct NewSessionRequest {
    capability_sets: Vec<Capabilities>,
}

impl NewSessionRequest {
    pub fn new(capability_sets: Vec<Capabilities>) -> Result<Self, Error> {
        if capability_sets.is_empty() {
            return Err(Error::SessionNotCreated { caps: vec![], reason: "empty capability payload".into() });
        }
        Ok(NewSessionRequest { capability_sets })
    }

    pub fn single(caps: Capabilities) -> Self {
        NewSessionRequest { capability_sets: vec![caps] }
    }

    pub fn primary(&self) -> &Capabilities {
        &self.capability_sets[0]
    }

    pub fn all(&self) -> &[Capabilities] {
        &self.capability_sets
    }
}
