use tracing::warn;

pub const COACH_PERSONA: &str = "You are SUMAKSES AI, a career coach helping Filipino BPO professionals transition to tech careers. Keep responses under 200 words, practical and encouraging.";

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_CLIENT_CONTEXT_CHARS: usize = 1000;

pub const CHAT_MAX_TOKENS: u32 = 500;
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// Cuts `text` to at most `max` characters on a char boundary.
/// Returns the kept prefix and whether anything was dropped.
pub fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Persona first, then the caller's own context, bounded.
pub fn compose_context(client_context: Option<&str>) -> String {
    let extra = client_context.map(str::trim).filter(|c| !c.is_empty());
    match extra {
        None => COACH_PERSONA.to_string(),
        Some(extra) => {
            let (kept, truncated) = truncate_chars(extra, MAX_CLIENT_CONTEXT_CHARS);
            if truncated {
                warn!(
                    "Chat context truncated from {} to {MAX_CLIENT_CONTEXT_CHARS} characters",
                    extra.chars().count()
                );
            }
            format!("{COACH_PERSONA}\n\n{kept}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_chars("kumusta", 10), ("kumusta", false));
        assert_eq!(truncate_chars("", 0), ("", false));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (kept, truncated) = truncate_chars("ñañañ", 3);
        assert_eq!(kept, "ñañ");
        assert!(truncated);
    }

    #[test]
    fn test_context_starts_with_persona() {
        assert_eq!(compose_context(None), COACH_PERSONA);
        assert_eq!(compose_context(Some("   ")), COACH_PERSONA);

        let context = compose_context(Some("Goal: QA tester"));
        assert_eq!(context, format!("{COACH_PERSONA}\n\nGoal: QA tester"));
    }

    #[test]
    fn test_client_context_is_bounded() {
        let context = compose_context(Some(&"a".repeat(5000)));
        let extra = context.strip_prefix(COACH_PERSONA).unwrap();
        assert_eq!(extra.trim_start().len(), MAX_CLIENT_CONTEXT_CHARS);
    }
}
