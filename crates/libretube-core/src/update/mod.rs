//! Checking for and downloading newer builds.
//!
//! The running build's version name and each release name carry a run
//! number (`Nightly Build 42`); a release is newer only when its run number
//! is strictly greater.

mod checker;
mod info;
mod manager;

pub use checker::{
    DEFAULT_ASSET_SUFFIX, DEFAULT_UPDATE_FEED_URL, EXPERIMENTAL_TAG, GithubReleases,
    ReleaseSource, UpdateChannel, UpdateChecker, UpdateStatus, extract_run_number,
    local_run_number, remote_run_number, sanitize_changelog,
};
pub use info::{Asset, UpdateInfo};
pub use manager::UpdateManager;
