use std::collections::HashMap;

use serde_json::Value;

/// Lookup tables the per-channel scheduler keeps warm across a run, needed to
/// resolve `<@U…>`/`<#C…>` mentions to display names while rendering.
pub struct MarkdownCtx<'a> {
    pub usernames: &'a HashMap<String, String>,
    pub channel_names: &'a HashMap<String, String>,
}

/// Converts one message's raw Slack payload to Mattermost-flavored Markdown.
/// Tries `blocks`, then classic `attachments`, then plain `text`, falling
/// through whenever an earlier layer renders empty.
pub fn convert_message_body(raw: &Value, ctx: &MarkdownCtx, has_files: bool) -> String {
    let mut body = raw
        .get("blocks")
        .and_then(Value::as_array)
        .map(|blocks| render_blocks(blocks, ctx))
        .unwrap_or_default();

    if body.trim().is_empty() {
        body = raw
            .get("attachments")
            .and_then(Value::as_array)
            .map(|attachments| render_classic_attachments(attachments, ctx))
            .unwrap_or_default();
    }

    if body.trim().is_empty() {
        body = raw
            .get("text")
            .and_then(Value::as_str)
            .map(|text| slack_text_to_md(text, ctx))
            .unwrap_or_default();
    }

    if body.trim().is_empty() {
        body = if has_files { " ".to_string() } else { "-".to_string() };
    }

    body
}

/// Rewrites Slack's `<...>` token syntax in a plain/mrkdwn string: special
/// broadcasts, user/channel mentions, and link tokens.
pub fn slack_text_to_md(text: &str, ctx: &MarkdownCtx) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '<' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some(close) = chars[i..].iter().position(|&c| c == '>') else {
            out.push(chars[i]);
            i += 1;
            continue;
        };
        let token: String = chars[i + 1..i + close].iter().collect();
        out.push_str(&render_token(&token, ctx));
        i += close + 1;
    }
    out
}

fn render_token(token: &str, ctx: &MarkdownCtx) -> String {
    match token {
        "!here" => return "@here".to_string(),
        "!channel" => return "@channel".to_string(),
        "!everyone" => return "@all".to_string(),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('@') {
        let (id, label) = split_pipe(rest);
        return match label {
            Some(l) => format!("@{l}"),
            None => format!("@{}", ctx.usernames.get(id).cloned().unwrap_or_else(|| id.to_string())),
        };
    }

    if let Some(rest) = token.strip_prefix('#') {
        let (id, label) = split_pipe(rest);
        return match label {
            Some(l) => format!("~{l}"),
            None => format!("~{}", ctx.channel_names.get(id).cloned().unwrap_or_else(|| id.to_string())),
        };
    }

    if let Some(rest) = token.strip_prefix("!subteam^") {
        let (_, label) = split_pipe(rest);
        return label.map(|l| l.to_string()).unwrap_or_else(|| token.to_string());
    }

    let (url, label) = split_pipe(token);
    match label {
        Some(l) => format!("[{l}]({url})"),
        None => url.to_string(),
    }
}

fn split_pipe(s: &str) -> (&str, Option<&str>) {
    match s.split_once('|') {
        Some((a, b)) => (a, Some(b)),
        None => (s, None),
    }
}

fn render_blocks(blocks: &[Value], ctx: &MarkdownCtx) -> String {
    blocks
        .iter()
        .filter_map(|b| render_block(b, ctx))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_block(block: &Value, ctx: &MarkdownCtx) -> Option<String> {
    match block.get("type").and_then(Value::as_str)? {
        "rich_text" => Some(render_rich_text(block, ctx)),
        "section" => render_section(block, ctx),
        "header" => block
            .get("text")
            .and_then(|t| t.get("text"))
            .and_then(Value::as_str)
            .map(|t| format!("# {t}")),
        "divider" => Some("---".to_string()),
        "context" => Some(render_context(block, ctx)),
        "image" => render_image(block),
        _ => None,
    }
}

fn render_section(block: &Value, ctx: &MarkdownCtx) -> Option<String> {
    let text = block.get("text")?;
    let body = text.get("text").and_then(Value::as_str)?;
    let rendered = if text.get("type").and_then(Value::as_str) == Some("mrkdwn") {
        slack_text_to_md(body, ctx)
    } else {
        body.to_string()
    };
    Some(rendered)
}

fn render_context(block: &Value, ctx: &MarkdownCtx) -> String {
    let Some(elements) = block.get("elements").and_then(Value::as_array) else {
        return String::new();
    };
    elements
        .iter()
        .filter_map(|el| match el.get("type").and_then(Value::as_str) {
            Some("image") => el
                .get("image_url")
                .and_then(Value::as_str)
                .map(|url| format!("![{}]({url})", el.get("alt_text").and_then(Value::as_str).unwrap_or(""))),
            Some("mrkdwn") => el.get("text").and_then(Value::as_str).map(|t| slack_text_to_md(t, ctx)),
            _ => el.get("text").and_then(Value::as_str).map(str::to_string),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn render_image(block: &Value) -> Option<String> {
    let url = block.get("image_url").and_then(Value::as_str)?;
    let alt = block.get("alt_text").and_then(Value::as_str).unwrap_or("");
    Some(format!("![{alt}]({url})"))
}

fn render_rich_text(block: &Value, ctx: &MarkdownCtx) -> String {
    let Some(elements) = block.get("elements").and_then(Value::as_array) else {
        return String::new();
    };
    elements
        .iter()
        .map(|el| render_rich_text_group(el, ctx))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rich_text_group(group: &Value, ctx: &MarkdownCtx) -> String {
    match group.get("type").and_then(Value::as_str) {
        Some("rich_text_section") => render_rich_text_elements(group, ctx),
        Some("rich_text_quote") => {
            let body = render_rich_text_elements(group, ctx);
            body.lines().map(|l| format!("> {l}")).collect::<Vec<_>>().join("\n")
        }
        Some("rich_text_preformatted") => {
            format!("```\n{}\n```", render_rich_text_elements(group, ctx))
        }
        Some("rich_text_list") => render_rich_text_list(group, ctx),
        _ => String::new(),
    }
}

fn render_rich_text_list(list: &Value, ctx: &MarkdownCtx) -> String {
    let ordered = list.get("style").and_then(Value::as_str) == Some("ordered");
    let Some(items) = list.get("elements").and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let prefix = if ordered { format!("{}. ", idx + 1) } else { "- ".to_string() };
            format!("{prefix}{}", render_rich_text_elements(item, ctx))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rich_text_elements(section: &Value, ctx: &MarkdownCtx) -> String {
    let Some(elements) = section.get("elements").and_then(Value::as_array) else {
        return String::new();
    };
    elements.iter().map(|el| render_rich_text_element(el, ctx)).collect()
}

fn render_rich_text_element(el: &Value, ctx: &MarkdownCtx) -> String {
    match el.get("type").and_then(Value::as_str) {
        Some("text") => {
            let text = el.get("text").and_then(Value::as_str).unwrap_or("");
            apply_inline_style(text, el.get("style"))
        }
        Some("link") => {
            let url = el.get("url").and_then(Value::as_str).unwrap_or("");
            match el.get("text").and_then(Value::as_str) {
                Some(label) if !label.is_empty() => format!("[{label}]({url})"),
                _ => url.to_string(),
            }
        }
        Some("user") => {
            let id = el.get("user_id").and_then(Value::as_str).unwrap_or("");
            format!("@{}", ctx.usernames.get(id).cloned().unwrap_or_else(|| id.to_string()))
        }
        Some("channel") => {
            let id = el.get("channel_id").and_then(Value::as_str).unwrap_or("");
            format!("~{}", ctx.channel_names.get(id).cloned().unwrap_or_else(|| id.to_string()))
        }
        Some("emoji") => {
            let name = el.get("name").and_then(Value::as_str).unwrap_or("");
            format!(":{name}:")
        }
        Some("date") => el
            .get("fallback")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        Some("broadcast") => match el.get("range").and_then(Value::as_str) {
            Some("here") => "@here".to_string(),
            Some("channel") => "@channel".to_string(),
            Some("everyone") => "@all".to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn apply_inline_style(text: &str, style: Option<&Value>) -> String {
    let Some(style) = style else {
        return text.to_string();
    };
    let mut rendered = text.to_string();
    if style.get("code").and_then(Value::as_bool).unwrap_or(false) {
        rendered = format!("`{rendered}`");
    }
    if style.get("bold").and_then(Value::as_bool).unwrap_or(false) {
        rendered = format!("**{rendered}**");
    }
    if style.get("italic").and_then(Value::as_bool).unwrap_or(false) {
        rendered = format!("_{rendered}_");
    }
    if style.get("strike").and_then(Value::as_bool).unwrap_or(false) {
        rendered = format!("~~{rendered}~~");
    }
    rendered
}

fn render_classic_attachments(attachments: &[Value], ctx: &MarkdownCtx) -> String {
    attachments
        .iter()
        .map(|a| render_classic_attachment(a, ctx))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn render_classic_attachment(a: &Value, ctx: &MarkdownCtx) -> String {
    let mut parts = Vec::new();

    if let Some(pretext) = a.get("pretext").and_then(Value::as_str) {
        if !pretext.is_empty() {
            parts.push(slack_text_to_md(pretext, ctx));
        }
    }

    let title = a.get("title").and_then(Value::as_str);
    match (title, a.get("title_link").and_then(Value::as_str)) {
        (Some(t), Some(link)) if !t.is_empty() => parts.push(format!("[{t}]({link})")),
        (Some(t), _) if !t.is_empty() => parts.push(format!("**{t}**")),
        _ => {}
    }

    if let Some(text) = a.get("text").and_then(Value::as_str) {
        if !text.is_empty() {
            parts.push(slack_text_to_md(text, ctx));
        }
    }

    if let Some(actions) = a.get("actions").and_then(Value::as_array) {
        let links: Vec<String> = actions
            .iter()
            .filter_map(|act| {
                let label = act.get("text").and_then(Value::as_str)?;
                let url = act.get("url").and_then(Value::as_str)?;
                Some(format!("[{label}]({url})"))
            })
            .collect();
        if !links.is_empty() {
            parts.push(links.join(" "));
        }
    }

    if parts.is_empty() {
        if let Some(fallback) = a.get("fallback").and_then(Value::as_str) {
            parts.push(slack_text_to_md(fallback, ctx));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_ctx() -> (HashMap<String, String>, HashMap<String, String>) {
        (HashMap::new(), HashMap::new())
    }

    #[test]
    fn broadcasts_map_to_mentions() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        assert_eq!(slack_text_to_md("<!here> hello", &ctx), "@here hello");
    }

    #[test]
    fn link_with_label() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        assert_eq!(
            slack_text_to_md("see <https://example.com|docs>", &ctx),
            "see [docs](https://example.com)"
        );
    }

    #[test]
    fn naked_url_passes_through() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        assert_eq!(slack_text_to_md("go to <https://example.com>", &ctx), "go to https://example.com");
    }

    #[test]
    fn user_mention_resolves_via_lookup() {
        let mut u = HashMap::new();
        u.insert("U1".to_string(), "alice".to_string());
        let c = HashMap::new();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        assert_eq!(slack_text_to_md("hi <@U1>", &ctx), "hi @alice");
    }

    #[test]
    fn channel_mention_falls_back_to_id() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        assert_eq!(slack_text_to_md("see <#C9>", &ctx), "see ~C9");
    }

    #[test]
    fn plain_text_used_when_no_blocks_or_attachments() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        let raw = serde_json::json!({ "text": "plain <!channel> message" });
        assert_eq!(convert_message_body(&raw, &ctx, false), "@channel message");
    }

    #[test]
    fn empty_message_with_files_becomes_space() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        let raw = serde_json::json!({ "text": "" });
        assert_eq!(convert_message_body(&raw, &ctx, true), " ");
    }

    #[test]
    fn empty_message_without_files_becomes_dash() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        let raw = serde_json::json!({});
        assert_eq!(convert_message_body(&raw, &ctx, false), "-");
    }

    #[test]
    fn rich_text_bold_and_list() {
        let (u, c) = empty_ctx();
        let ctx = MarkdownCtx { usernames: &u, channel_names: &c };
        let raw = serde_json::json!({
            "blocks": [{
                "type": "rich_text",
                "elements": [{
                    "type": "rich_text_list",
                    "style": "bullet",
                    "elements": [
                        { "type": "rich_text_section", "elements": [{ "type": "text", "text": "one", "style": {"bold": true} }] },
                        { "type": "rich_text_section", "elements": [{ "type": "text", "text": "two" }] }
                    ]
                }]
            }]
        });
        assert_eq!(convert_message_body(&raw, &ctx, false), "- **one**\n- two");
    }
}
