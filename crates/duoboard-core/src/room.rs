//! Binding between a client and a shared whiteboard room.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Characters the hosted document store refuses in path keys.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room id is empty")]
    Empty,
    #[error("Room id contains forbidden character '{0}'")]
    ForbiddenCharacter(char),
}

/// Which room this client is drawing in. Lives for the app session.
///
/// Serialized as the bare room id. Deserializing validates it like [`RoomBinding::join`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomBinding {
    room_id: String,
}

impl RoomBinding {
    /// Open a brand new room with a random id.
    pub fn create() -> Self {
        Self {
            room_id: Uuid::new_v4().to_string(),
        }
    }

    /// Join an existing room by the id a partner shared.
    pub fn join(room_id: &str) -> Result<Self, RoomError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(RoomError::Empty);
        }
        if let Some(c) = room_id.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
            return Err(RoomError::ForbiddenCharacter(c));
        }
        Ok(Self {
            room_id: room_id.to_string(),
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Path of this room's whiteboard document under `root`.
    pub fn document_key(&self, root: &str) -> String {
        let root = root.trim_matches('/');
        if root.is_empty() {
            self.room_id.clone()
        } else {
            format!("{}/{}", root, self.room_id)
        }
    }
}

impl TryFrom<String> for RoomBinding {
    type Error = RoomError;

    fn try_from(room_id: String) -> Result<Self, Self::Error> {
        Self::join(&room_id)
    }
}

impl From<RoomBinding> for String {
    fn from(room: RoomBinding) -> Self {
        room.room_id
    }
}

impl fmt::Display for RoomBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.room_id)
    }
}
