use reqwest::Url;

use crate::model::RoomId;

/// Extract a room id from whatever the user pasted: a bare id, a join path
/// or a full invite link such as `https://host/pvp/ab12cd`.
pub fn parse_room_id(raw: &str) -> Option<RoomId> {
    let raw = raw.trim();
    let candidate = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|s| s.filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            match segments.iter().position(|s| *s == "pvp") {
                Some(i) if i + 1 < segments.len() => segments[i + 1].to_owned(),
                _ => segments.last().map(|s| s.to_string()).unwrap_or_default(),
            }
        }
        _ => match raw.trim_matches('/').rsplit_once("pvp/") {
            Some((_, id)) => id.to_owned(),
            None => raw.to_owned(),
        },
    };

    let id: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    (!id.is_empty()).then(|| RoomId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> Option<String> {
        parse_room_id(raw).map(|id| id.to_string())
    }

    #[test]
    fn bare_ids_pass_through() {
        assert_eq!(parsed(" ab12cd "), Some("ab12cd".into()));
        assert_eq!(parsed("ab 12#cd"), Some("ab12cd".into()));
    }

    #[test]
    fn invite_links() {
        assert_eq!(parsed("https://chat.example.com/pvp/ab12cd"), Some("ab12cd".into()));
        assert_eq!(parsed("http://localhost:4000/pvp/ab12cd/join"), Some("ab12cd".into()));
        assert_eq!(parsed("https://chat.example.com/r/xy98zz/"), Some("xy98zz".into()));
        assert_eq!(parsed("/pvp/ab12cd"), Some("ab12cd".into()));
    }

    #[test]
    fn nothing_usable() {
        assert_eq!(parsed(""), None);
        assert_eq!(parsed("   ###  "), None);
    }
}
