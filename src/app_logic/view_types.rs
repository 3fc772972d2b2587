/*
 * This module defines the data types used for communication between the
 * profile presenter and whatever view renders it. The view reports user
 * actions as `ViewEvent`s; the presenter answers with `ViewCommand`s that the
 * view drains and executes. Neither side holds a reference to the other. The
 * `ViewEventHandler` trait is what the presenter implements for the view.
 */
use crate::core::{Profile, ProfileEdit};

// Header fields of the profile screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHeader {
    pub name: String,
    pub avatar: String,
    pub description: String,
    pub website: String,
}

impl From<&Profile> for ProfileHeader {
    fn from(profile: &Profile) -> Self {
        ProfileHeader {
            name: profile.name.clone(),
            avatar: profile.avatar.clone(),
            description: profile.description.clone(),
            website: profile.website.clone(),
        }
    }
}

/*
 * User actions reported by the view. `LikeToggled` comes from the NFT lists;
 * `ProfileEdited` carries the fields of the edit screen when the user confirms.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ViewDidLoad,
    RetryRequested,
    LikeToggled { nft_id: String },
    ProfileEdited(ProfileEdit),
    ViewClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    SetLoading {
        visible: bool,
    },
    DisplayProfile {
        header: ProfileHeader,
    },
    // Title rows of the profile table, e.g. "My NFTs (2)".
    ReloadTable {
        rows: Vec<String>,
    },
    // Contents of the "my NFTs" and "favourite NFTs" screens.
    UpdateNftLists {
        my_nfts: Vec<String>,
        favourite_nfts: Vec<String>,
    },
    ShowError {
        message: String,
        retryable: bool,
    },
}

pub trait ViewEventHandler {
    // Handles a user action; resulting commands are queued, not returned.
    fn handle_event(&mut self, event: ViewEvent);

    // Called by the view to drain the presenter's queued commands in order.
    fn try_dequeue_command(&mut self) -> Option<ViewCommand>;
}
