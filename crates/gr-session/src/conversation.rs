//! Conversation normalization.
//!
//! Backend chat protocols require strict user/assistant alternation starting
//! on "user". Caller-side state (system notices, retries) can break that, so
//! histories are repaired here and never rejected.

use gr_core::{Role, Turn};

/// Inserted between the contents of two merged same-role turns.
pub const FOLLOW_UP_SEPARATOR: &str = "\n\n(Follow-up): ";

/// Produce a backend-legal conversation from `history`.
///
/// Leading turns before the first user turn are dropped (no user turn means
/// an empty result). Adjacent same-role turns are merged, the later content
/// appended to the earlier one after [`FOLLOW_UP_SEPARATOR`]. Total and pure.
pub fn normalize(history: &[Turn]) -> Vec<Turn> {
    let mut normalized: Vec<Turn> = Vec::with_capacity(history.len());
    for turn in history.iter().skip_while(|turn| turn.role != Role::User) {
        match normalized.last_mut() {
            Some(previous) if previous.role == turn.role => {
                previous.content.push_str(FOLLOW_UP_SEPARATOR);
                previous.content.push_str(&turn.content);
            }
            _ => normalized.push(turn.clone()),
        }
    }
    normalized
}

/// Normalize `history` with `input` appended as the newest user turn.
///
/// If the history already ends on a user turn, `input` becomes a follow-up
/// of it. The result is never empty.
pub fn with_input(history: &[Turn], input: &str) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 1);
    turns.extend_from_slice(history);
    turns.push(Turn::user(input));
    normalize(&turns)
}
