/*
 * This module provides the application logic layer, centered around
 * `ProfilePresenter`, which acts as the Presenter for the profile screen. It
 * also includes `ProfileScreenState` for the state of one screen session and
 * the event/command types exchanged with the view.
 * Unit tests for `ProfilePresenter` are in `presenter_tests.rs`.
 */
pub mod presenter;
pub mod profile_screen_state;
pub mod ui_constants;
pub mod view_types;


pub use presenter::ProfilePresenter;
pub use profile_screen_state::ProfileScreenState;
pub use view_types::{ProfileHeader, ViewCommand, ViewEvent, ViewEventHandler};
