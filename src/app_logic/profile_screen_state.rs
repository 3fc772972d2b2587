/*
 * This module defines `ProfileScreenState`, the presenter's view of one
 * profile screen session: the last profile confirmed by the service, the like
 * toggles sent but not yet confirmed, and the lists and table rows derived
 * from both. The displayed favourites are always the confirmed likes with the
 * pending toggles applied on top, so confirming or rolling back one toggle
 * never disturbs another one still in flight.
 */
use super::ui_constants::{ABOUT_DEVELOPER_ROW_TITLE, FAVOURITE_NFTS_ROW_TITLE, MY_NFTS_ROW_TITLE};
use super::view_types::ProfileHeader;
use crate::core::Profile;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileScreenState {
    /* The profile as last returned by the service. `None` until the first successful load. */
    pub profile: Option<Profile>,
    /* Like toggles sent to the service and not yet answered, in the order they were made. */
    pub pending_like_toggles: Vec<String>,
    pub my_nfts: Vec<String>,
    pub favourite_nfts: Vec<String>,
    pub title_rows: Vec<String>,
    pub is_loading: bool,
    /* Count of writes the service has confirmed during this session. */
    pub confirmed_writes: u64,
}

impl ProfileScreenState {
    pub fn new() -> Self {
        log::debug!("ProfileScreenState::new called.");
        Self::default()
    }

    pub fn compose_title_rows(my_nft_count: usize, favourite_count: usize) -> Vec<String> {
        vec![
            format!("{MY_NFTS_ROW_TITLE} ({my_nft_count})"),
            format!("{FAVOURITE_NFTS_ROW_TITLE} ({favourite_count})"),
            ABOUT_DEVELOPER_ROW_TITLE.to_string(),
        ]
    }

    pub fn header(&self) -> Option<ProfileHeader> {
        self.profile.as_ref().map(ProfileHeader::from)
    }

    pub fn apply_confirmed_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
        self.refresh_derived();
    }

    // The profile returned by a confirmed like toggle or edit.
    pub fn apply_written_profile(&mut self, profile: Profile) {
        self.confirmed_writes += 1;
        self.apply_confirmed_profile(profile);
    }

    /*
     * Applies a loaded profile unless a write was confirmed after the load was
     * issued (`writes_at_issue` is `confirmed_writes` at that time). Such a
     * load may have been answered before the write landed. Returns whether the
     * profile was applied.
     */
    pub fn apply_loaded_profile(&mut self, profile: Profile, writes_at_issue: u64) -> bool {
        if self.confirmed_writes != writes_at_issue {
            return false;
        }
        self.apply_confirmed_profile(profile);
        true
    }

    /*
     * Records an optimistic toggle of `nft_id`. Returns `false`, changing
     * nothing, when no profile is loaded yet.
     */
    pub fn begin_like_toggle(&mut self, nft_id: &str) -> bool {
        if self.profile.is_none() {
            return false;
        }
        self.pending_like_toggles.push(nft_id.to_string());
        self.refresh_derived();
        true
    }

    // Drops one pending toggle of `nft_id`, whether it was confirmed or failed.
    pub fn finish_like_toggle(&mut self, nft_id: &str) {
        if let Some(pos) = self.pending_like_toggles.iter().position(|n| n == nft_id) {
            self.pending_like_toggles.remove(pos);
        }
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        let Some(profile) = &self.profile else {
            self.my_nfts.clear();
            self.favourite_nfts.clear();
            self.title_rows.clear();
            return;
        };
        let mut displayed = profile.clone();
        for nft_id in &self.pending_like_toggles {
            displayed.toggle_like(nft_id);
        }
        self.my_nfts = displayed.nfts;
        self.favourite_nfts = displayed.likes;
        self.title_rows = Self::compose_title_rows(self.my_nfts.len(), self.favourite_nfts.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProfileId;

    fn loaded_state() -> ProfileScreenState {
        let mut profile = Profile::new(ProfileId::new("1").unwrap(), "Alice".to_string());
        profile.nfts = vec!["n1".to_string(), "n2".to_string()];
        profile.likes = vec!["n1".to_string()];
        let mut state = ProfileScreenState::new();
        state.apply_confirmed_profile(profile);
        state
    }

    #[test]
    fn test_compose_title_rows() {
        assert_eq!(
            ProfileScreenState::compose_title_rows(2, 1),
            vec![
                "My NFTs (2)".to_string(),
                "Favourite NFTs (1)".to_string(),
                "About the developer".to_string()
            ]
        );
    }

    #[test]
    fn test_toggle_before_load_is_refused() {
        let mut state = ProfileScreenState::new();
        assert!(!state.begin_like_toggle("n1"));
        assert!(state.pending_like_toggles.is_empty());
        assert!(state.title_rows.is_empty());
    }

    #[test]
    fn test_pending_toggle_is_displayed_and_rolled_back() {
        let mut state = loaded_state();

        assert!(state.begin_like_toggle("n2"));
        assert_eq!(state.favourite_nfts, vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(state.title_rows[1], "Favourite NFTs (2)");

        state.finish_like_toggle("n2");
        assert_eq!(state.favourite_nfts, vec!["n1".to_string()]);
        assert_eq!(state.title_rows[1], "Favourite NFTs (1)");
    }

    #[test]
    fn test_rolling_back_one_toggle_keeps_the_other() {
        let mut state = loaded_state();
        state.begin_like_toggle("n1");
        state.begin_like_toggle("n2");
        assert_eq!(state.favourite_nfts, vec!["n2".to_string()]);

        state.finish_like_toggle("n1");

        assert_eq!(state.favourite_nfts, vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(state.pending_like_toggles, vec!["n2".to_string()]);
    }

    #[test]
    fn test_load_issued_before_confirmed_write_is_ignored() {
        let mut state = loaded_state();
        let writes_at_issue = state.confirmed_writes;
        let before_write = state.profile.clone().unwrap();

        let mut written = before_write.clone();
        written.likes.push("n2".to_string());
        state.apply_written_profile(written.clone());

        assert!(!state.apply_loaded_profile(before_write.clone(), writes_at_issue));
        assert_eq!(state.profile, Some(written));
        assert!(state.apply_loaded_profile(before_write.clone(), state.confirmed_writes));
        assert_eq!(state.profile, Some(before_write));
    }
}
