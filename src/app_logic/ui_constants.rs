/*
 * Shared text constants of the profile screen. Used by the presenter when it
 * composes table rows and error messages, and by tests that assert on them.
 */

// Title of the row leading to the NFTs owned by the profile. The count is appended.
pub const MY_NFTS_ROW_TITLE: &str = "My NFTs";

// Title of the row leading to the liked NFTs. The count is appended.
pub const FAVOURITE_NFTS_ROW_TITLE: &str = "Favourite NFTs";

pub const ABOUT_DEVELOPER_ROW_TITLE: &str = "About the developer";

pub const LOAD_FAILED_MESSAGE: &str = "Could not load the profile";
pub const LIKE_FAILED_MESSAGE: &str = "Could not update favourites";
pub const EDIT_FAILED_MESSAGE: &str = "Could not save the profile";
pub const PROFILE_NOT_LOADED_MESSAGE: &str = "The profile has not been loaded yet";
