/*
 * Defines the profile data model shared by every layer: the validated
 * `ProfileId`, the `Profile` entity as exchanged with the remote service and
 * stored locally, and `ProfileEdit`, the subset of fields the edit screen
 * changes. Only structural invariants live here; orchestration belongs to
 * `profile_service`.
 */
use serde::{Deserialize, Serialize};
use std::fmt;

/*
 * Stable identifier of a profile. It is validated on construction and on
 * deserialization, so a `ProfileId` in hand is never empty and is safe to use
 * as a storage file stem.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

pub fn is_valid_profile_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl ProfileId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidProfileId> {
        let value = value.into();
        if value.trim().is_empty() || !value.chars().all(is_valid_profile_id_char) {
            return Err(InvalidProfileId(value));
        }
        Ok(ProfileId(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProfileId {
    type Error = InvalidProfileId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProfileId::new(value)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidProfileId(pub String);

impl fmt::Display for InvalidProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid profile id: '{}'. Must be non-empty and contain only ASCII letters, digits, '_' or '-'.",
            self.0
        )
    }
}

impl std::error::Error for InvalidProfileId {}

/*
 * The user profile as served by the remote API. `nfts` and `likes` hold
 * identifiers into an external NFT catalog; they are never checked for
 * referential integrity here. `likes` is a set semantically, but duplicates
 * coming from the remote are preserved until the next toggle of that value.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub nfts: Vec<String>,
    #[serde(default)]
    pub likes: Vec<String>,
}

impl Profile {
    pub fn new(id: ProfileId, name: String) -> Self {
        Profile {
            id,
            name,
            avatar: String::new(),
            description: String::new(),
            website: String::new(),
            nfts: Vec::new(),
            likes: Vec::new(),
        }
    }

    pub fn is_liked(&self, nft_id: &str) -> bool {
        self.likes.iter().any(|liked| liked == nft_id)
    }

    /*
     * Adds `nft_id` to `likes` if absent, otherwise removes every occurrence of
     * it. Returns whether the NFT is liked afterwards.
     */
    pub fn toggle_like(&mut self, nft_id: &str) -> bool {
        if self.is_liked(nft_id) {
            self.likes.retain(|liked| liked != nft_id);
            false
        } else {
            self.likes.push(nft_id.to_string());
            true
        }
    }

    pub fn apply_edit(&mut self, edit: ProfileEdit) {
        self.name = edit.name;
        self.avatar = edit.avatar;
        self.description = edit.description;
        self.website = edit.website;
    }
}

// Fields the edit-profile screen can change. `nfts` and `likes` are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileEdit {
    pub name: String,
    pub avatar: String,
    pub description: String,
    pub website: String,
}

impl ProfileEdit {
    pub fn from_profile(profile: &Profile) -> Self {
        ProfileEdit {
            name: profile.name.clone(),
            avatar: profile.avatar.clone(),
            description: profile.description.clone(),
            website: profile.website.clone(),
        }
    }
}
