pub const PLACEHOLDER_NAME: &str = "Player";
pub const MAX_NAME_LEN: usize = 12;

const SLOT_SEPARATOR: char = ',';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbySlot {
    pub name: Option<String>,
    pub ready: bool,
}

impl LobbySlot {
    /// Parses a `name,ready` slot value. Any other shape is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let (name, ready) = value.split_once(SLOT_SEPARATOR)?;
        if ready.is_empty() || ready.contains(SLOT_SEPARATOR) {
            return None;
        }

        Some(Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            ready: ready == "1",
        })
    }

    pub fn is_occupied(&self) -> bool {
        self.name.is_some()
    }
}

/// Lobby as last announced by the server. Replaced as a whole on every LOBBY
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbySnapshot {
    pub players: u8,
    pub p1: LobbySlot,
    pub p2: LobbySlot,
}

impl LobbySnapshot {
    pub fn slots(&self) -> [&LobbySlot; 2] {
        [&self.p1, &self.p2]
    }

    pub fn all_ready(&self) -> bool {
        self.slots()
            .iter()
            .all(|slot| slot.is_occupied() && slot.ready)
    }
}

/// Display name as sent in CONNECT: trimmed, cut to [`MAX_NAME_LEN`]
/// characters, restricted to `[A-Za-z0-9_-]`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .take(MAX_NAME_LEN)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_invalid_characters() {
        assert_eq!(sanitize_name("  Jü@n_99!!"), "Jn_99");
        assert_eq!(sanitize_name("a-b_c"), "a-b_c");
    }

    #[test]
    fn test_sanitize_placeholder() {
        assert_eq!(sanitize_name(""), PLACEHOLDER_NAME);
        assert_eq!(sanitize_name("    "), PLACEHOLDER_NAME);
        assert_eq!(sanitize_name("@@!!ü"), PLACEHOLDER_NAME);
    }

    #[test]
    fn test_sanitize_truncates() {
        assert_eq!(sanitize_name("abcdefghijKLMNOPQRST"), "abcdefghijKL");
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!(
            LobbySlot::parse("Ann,1"),
            Some(LobbySlot {
                name: Some("Ann".to_string()),
                ready: true,
            })
        );
        assert_eq!(
            LobbySlot::parse(",0"),
            Some(LobbySlot {
                name: None,
                ready: false,
            })
        );
        assert_eq!(LobbySlot::parse("Ann"), None);
        assert_eq!(LobbySlot::parse("Ann,1,2"), None);
        assert_eq!(LobbySlot::parse("Ann,"), None);
    }

    #[test]
    fn test_all_ready() {
        let mut lobby = LobbySnapshot {
            players: 2,
            p1: LobbySlot::parse("Ann,1").unwrap(),
            p2: LobbySlot::parse("Bob,0").unwrap(),
        };
        assert!(!lobby.all_ready());

        lobby.p2.ready = true;
        assert!(lobby.all_ready());
    }
}
