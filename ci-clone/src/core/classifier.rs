//! Deterministic classification of the triggering event.

use crate::core::types::EventKind;

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const TAG_EVENT: &str = "tag";
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// Classify an event label and ref into an [`EventKind`].
///
/// - `PullRequest` if the label is `pull_request`.
/// - `Tag` if the label is `tag` or the ref lives under `refs/tags/`.
/// - `Ordinary` otherwise.
///
/// A tag ref wins over an ordinary label; the pull-request label wins over
/// everything.
pub fn classify_event(event: &str, git_ref: &str) -> EventKind {
    if event == PULL_REQUEST_EVENT {
        EventKind::PullRequest
    } else if event == TAG_EVENT || git_ref.starts_with(TAG_REF_PREFIX) {
        EventKind::Tag
    } else {
        EventKind::Ordinary
    }
}
