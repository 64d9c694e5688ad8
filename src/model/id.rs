use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A UUID tagged with the entity it identifies, so `NodeId` and `SessionId`
/// cannot be swapped at a call site even though both wrap the same `Uuid`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    id: Uuid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: Uuid) -> Self {
        Id { id, _marker: PhantomData }
    }

    pub fn random() -> Self {
        Id::new(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.id
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Id<T> {}
impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        write!(f, "{}({})", clean_name, self.id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodeTag;
#[derive(Debug, Clone, Copy)]
pub struct SessionTag;

pub type NodeId = Id<NodeTag>;
pub type SessionId = Id<SessionTag>;
