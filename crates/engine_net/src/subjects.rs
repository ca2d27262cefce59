//! NATS subject hierarchy.
//!
//! All race subjects are prefixed with `race.` to namespace within a shared
//! NATS cluster. Every room has exactly one broadcast subject; each client
//! publishes to it and subscribes to it, filtering its own echoes.

/// Root prefix for all race NATS subjects.
pub const PREFIX: &str = "race";

/// Build the broadcast subject for a race room.
///
/// `race.room.<room>`
#[must_use]
pub fn room(room: &str) -> String {
    format!("{PREFIX}.room.{}", sanitize_token(room))
}

/// NATS tokens may not contain `.`, `*`, `>` or whitespace; those
/// characters are replaced with `_`.
fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_subject() {
        assert_eq!(room("lobby-7"), "race.room.lobby-7");
    }

    #[test]
    fn test_room_subject_escapes_wildcards() {
        assert_eq!(room("a.b *>"), "race.room.a_b___");
    }
}
