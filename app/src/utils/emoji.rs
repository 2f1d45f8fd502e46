/// Shared emoji-name normalization used by both the reaction importer (to
/// match a reaction's emoji name against an already-resolved custom emoji)
/// and the reaction/custom-emoji exporters (to match against Mattermost's
/// vocabulary).

/// Strips a Slack skin-tone modifier suffix, e.g. `"thumbsup::skin-tone-3"`
/// -> `"thumbsup"`.
pub fn strip_skin_tone(name: &str) -> &str {
    name.split("::skin-tone-").next().unwrap_or(name)
}

/// Candidate emoji names to try in order against Mattermost, covering the
/// `+1`/`-1` <-> `thumbs_up`/`thumbs_down` naming mismatch between Slack and
/// Mattermost.
pub fn reaction_alternates(name: &str) -> Vec<String> {
    let base = strip_skin_tone(name);
    let mut candidates = vec![base.to_string()];
    match base {
        "thumbsup" | "+1" | "thumbs_up" => {
            candidates = vec!["thumbs_up".to_string(), "thumbsup".to_string(), "+1".to_string()];
        }
        "thumbsdown" | "-1" | "thumbs_down" => {
            candidates = vec!["thumbs_down".to_string(), "thumbsdown".to_string(), "-1".to_string()];
        }
        _ => {}
    }
    candidates.dedup();
    candidates
}

const CYRILLIC_MAP: &[(char, &str)] = &[
    ('а', "a"), ('б', "b"), ('в', "v"), ('г', "g"), ('д', "d"), ('е', "e"), ('ё', "yo"),
    ('ж', "zh"), ('з', "z"), ('и', "i"), ('й', "y"), ('к', "k"), ('л', "l"), ('м', "m"),
    ('н', "n"), ('о', "o"), ('п', "p"), ('р', "r"), ('с', "s"), ('т', "t"), ('у', "u"),
    ('ф', "f"), ('х', "kh"), ('ц', "ts"), ('ч', "ch"), ('ш', "sh"), ('щ', "shch"),
    ('ъ', ""), ('ы', "y"), ('ь', ""), ('э', "e"), ('ю', "yu"), ('я', "ya"),
    ('А', "A"), ('Б', "B"), ('В', "V"), ('Г', "G"), ('Д', "D"), ('Е', "E"), ('Ё', "Yo"),
    ('Ж', "Zh"), ('З', "Z"), ('И', "I"), ('Й', "Y"), ('К', "K"), ('Л', "L"), ('М', "M"),
    ('Н', "N"), ('О', "O"), ('П', "P"), ('Р', "R"), ('С', "S"), ('Т', "T"), ('У', "U"),
    ('Ф', "F"), ('Х', "Kh"), ('Ц', "Ts"), ('Ч', "Ch"), ('Ш', "Sh"), ('Щ', "Shch"),
    ('Ъ', ""), ('Ы', "Y"), ('Ь', ""), ('Э', "E"), ('Ю', "Yu"), ('Я', "Ya"),
];

/// Transliterates Cyrillic characters to ASCII via a fixed mapping, then
/// sanitizes the result to `[A-Za-z0-9_]+` the way Mattermost's emoji name
/// validator requires. Non-mapped, non-alphanumeric characters become `_`.
pub fn transliterate_and_sanitize(shortcode: &str) -> String {
    let mut latin = String::with_capacity(shortcode.len());
    for c in shortcode.chars() {
        if let Some((_, repl)) = CYRILLIC_MAP.iter().find(|(ch, _)| *ch == c) {
            latin.push_str(repl);
        } else {
            latin.push(c);
        }
    }

    let mut sanitized = String::with_capacity(latin.len());
    for c in latin.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            sanitized.push(c);
        } else {
            sanitized.push('_');
        }
    }
    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }
    sanitized.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_skin_tone_suffix() {
        assert_eq!(strip_skin_tone("thumbsup::skin-tone-3"), "thumbsup");
        assert_eq!(strip_skin_tone("tada"), "tada");
    }

    #[test]
    fn thumbs_up_alternates_in_priority_order() {
        assert_eq!(
            reaction_alternates("+1"),
            vec!["thumbs_up".to_string(), "thumbsup".to_string(), "+1".to_string()]
        );
    }

    #[test]
    fn transliterates_cyrillic_shortcode() {
        assert_eq!(transliterate_and_sanitize("привет"), "privet");
    }

    #[test]
    fn sanitizes_mixed_shortcode() {
        assert_eq!(transliterate_and_sanitize("party-parrot!"), "party_parrot");
    }
}
