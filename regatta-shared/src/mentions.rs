//! Entity mention micro-format for notification content
//!
//! Content strings embed typed entity references as
//! `@<entityType>:<entityId>_<DisplayName>`, with spaces in the display
//! name replaced by underscores so a mention is a single whitespace-free
//! token. The delimiter layout is fixed: `:` after the entity type, `_`
//! after the id.
//!
//! Parsing converts underscores in the name part back to spaces, which is
//! lossy for display names containing literal underscores. Historical rows
//! written with the older `@type:id:Name` layout are accepted on parse;
//! the writer only emits the canonical form.
//!
//! # Example
//!
//! ```
//! use regatta_shared::mentions::{mention, parse_segments, Segment};
//! use uuid::Uuid;
//!
//! let id = Uuid::new_v4();
//! let content = format!("{} requests to join", mention("user", id, "Dana Kim"));
//!
//! let segments = parse_segments(&content);
//! match &segments[0] {
//!     Segment::Mention(m) => {
//!         assert_eq!(m.entity_type, "user");
//!         assert_eq!(m.entity_id, id);
//!         assert_eq!(m.display_name, "Dana Kim");
//!     }
//!     _ => panic!("expected a mention"),
//! }
//! ```

use uuid::Uuid;

/// A parsed entity mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Entity type tag, e.g. "user", "team", "competition"
    pub entity_type: String,

    /// Referenced entity ID
    pub entity_id: Uuid,

    /// Display name with underscores restored to spaces
    pub display_name: String,
}

/// One token of parsed notification content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text between mentions
    Text(String),

    /// An entity mention
    Mention(Mention),
}

/// Formats an entity mention in the canonical layout.
pub fn mention(entity_type: &str, entity_id: Uuid, display_name: &str) -> String {
    format!(
        "@{}:{}_{}",
        entity_type,
        entity_id,
        display_name.replace(' ', "_")
    )
}

/// Splits content into text and mention segments.
///
/// An `@` that does not start a well-formed mention (missing delimiters,
/// unparsable id) is kept as plain text. Adjacent text runs are merged.
pub fn parse_segments(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = content;

    while let Some(at) = rest.find('@') {
        let (before, candidate) = rest.split_at(at);
        text.push_str(before);

        match parse_one(&candidate[1..]) {
            Some((m, consumed)) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Mention(m));
                rest = &candidate[1 + consumed..];
            }
            None => {
                text.push('@');
                rest = &candidate[1..];
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    segments
}

/// Returns the first mention in the content, if any.
pub fn first_mention(content: &str) -> Option<Mention> {
    parse_segments(content).into_iter().find_map(|s| match s {
        Segment::Mention(m) => Some(m),
        Segment::Text(_) => None,
    })
}

/// Parses one mention starting just past the `@`.
///
/// Returns the mention and how many bytes of input it consumed.
fn parse_one(input: &str) -> Option<(Mention, usize)> {
    let token_end = input
        .find(char::is_whitespace)
        .unwrap_or(input.len());
    let token = &input[..token_end];

    let colon = token.find(':')?;
    let entity_type = &token[..colon];
    if entity_type.is_empty() || !entity_type.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let tail = &token[colon + 1..];

    // Canonical layout ends the id at '_'; the legacy layout used a second
    // ':'. Whichever delimiter comes first wins.
    let id_end = match (tail.find('_'), tail.find(':')) {
        (Some(u), Some(c)) => u.min(c),
        (Some(u), None) => u,
        (None, Some(c)) => c,
        (None, None) => return None,
    };

    let entity_id = Uuid::parse_str(&tail[..id_end]).ok()?;
    let display_name = tail[id_end + 1..].replace('_', " ");
    if display_name.is_empty() {
        return None;
    }

    let mention = Mention {
        entity_type: entity_type.to_string(),
        entity_id,
        display_name,
    };

    Some((mention, token_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn test_mention_format() {
        let id = uuid();
        let m = mention("team", id, "Red Hawks");
        assert_eq!(m, format!("@team:{}_Red_Hawks", id));
    }

    #[test]
    fn test_round_trip() {
        let id = uuid();
        let content = format!("{} requests to join your team", mention("user", id, "Dana Kim"));

        let segments = parse_segments(&content);
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0],
            Segment::Mention(Mention {
                entity_type: "user".to_string(),
                entity_id: id,
                display_name: "Dana Kim".to_string(),
            })
        );
        assert_eq!(
            segments[1],
            Segment::Text(" requests to join your team".to_string())
        );
    }

    #[test]
    fn test_multiple_mentions() {
        let user = uuid();
        let team = uuid();
        let content = format!(
            "{} was admitted to {}",
            mention("user", user, "Lee"),
            mention("team", team, "Red Hawks")
        );

        let segments = parse_segments(&content);
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], Segment::Mention(m) if m.entity_id == user));
        assert_eq!(segments[1], Segment::Text(" was admitted to ".to_string()));
        assert!(matches!(&segments[2], Segment::Mention(m) if m.entity_id == team));
    }

    #[test]
    fn test_legacy_colon_layout() {
        let id = uuid();
        let content = format!("@team:{}:Red_Hawks was approved", id);

        let first = first_mention(&content).unwrap();
        assert_eq!(first.entity_type, "team");
        assert_eq!(first.entity_id, id);
        assert_eq!(first.display_name, "Red Hawks");
    }

    #[test]
    fn test_bare_at_is_text() {
        let segments = parse_segments("mail me @ the office");
        assert_eq!(
            segments,
            vec![Segment::Text("mail me @ the office".to_string())]
        );
    }

    #[test]
    fn test_unparsable_id_is_text() {
        let segments = parse_segments("@team:notauuid_Red_Hawks");
        assert_eq!(
            segments,
            vec![Segment::Text("@team:notauuid_Red_Hawks".to_string())]
        );
    }

    #[test]
    fn test_mention_at_end_of_content() {
        let id = uuid();
        let content = format!("approved: {}", mention("team", id, "Hawks"));

        let segments = parse_segments(&content);
        assert_eq!(segments.len(), 2);
        assert!(matches!(&segments[1], Segment::Mention(m) if m.display_name == "Hawks"));
    }

    #[test]
    fn test_underscored_name_parses_to_spaces() {
        let id = uuid();
        // Literal underscores in the stored name come back as spaces.
        let content = format!("@user:{}_Dana_Kim", id);
        let first = first_mention(&content).unwrap();
        assert_eq!(first.display_name, "Dana Kim");
    }

    #[test]
    fn test_first_mention_none_for_plain_text() {
        assert!(first_mention("no mentions here").is_none());
    }
}
