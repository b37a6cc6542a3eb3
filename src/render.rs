use std::fmt::Write;

use crate::session::{Message, Role};
use crate::settings::{ModelId, SessionConfig, MAX_MAX_TOKENS, MIN_MAX_TOKENS};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; display: flex; }
.sidebar { width: 18rem; padding: 1rem; background: #F0F2F6; min-height: 100vh; }
.sidebar label { display: block; margin-top: 1rem; }
.main { flex: 1; max-width: 46rem; margin: 0 auto; padding: 1rem; }
.chat-message {
  padding: 1.5rem; border-radius: 0.5rem; margin-bottom: 1rem;
  display: flex; flex-direction: column; color: #000000;
}
.chat-message.user { background-color: #EFEFEF; }
.chat-message.assistant { background-color: #E0F7FA; }
.chat-message .message-content { display: flex; margin-top: 0.5rem; }
.chat-message .avatar { width: 20%; }
.chat-message .content { width: 80%; white-space: pre-wrap; }
.error { background: #FDECEA; color: #611A15; padding: 1rem; border-radius: 0.5rem; }
.thinking { color: #555555; font-style: italic; margin-bottom: 1rem; }
.warning { background: #FFF8E1; color: #663C00; padding: 1rem; border-radius: 0.5rem; }
.chat-input { display: flex; gap: 0.5rem; }
.chat-input input { flex: 1; }
"#;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_message(role: Role, content: &str) -> String {
    let avatar = match role {
        Role::User => "👤",
        Role::Assistant => "🤖",
    };
    format!(
        r#"<div class="chat-message {class}">
  <div class="message-content">
    <div class="avatar">{avatar}</div>
    <div class="content">{content}</div>
  </div>
</div>
"#,
        class = role.as_str(),
        content = escape_html(content),
    )
}

/// Everything the page shows, borrowed from the session at render time.
pub struct PageModel<'a> {
    pub config: &'a SessionConfig,
    pub history: &'a [Message],
    pub error: Option<&'a str>,
    pub awaiting_reply: bool,
}

fn render_sidebar(out: &mut String, config: &SessionConfig) {
    let options: String = ModelId::ALL
        .iter()
        .map(|m| {
            let selected = if *m == config.model { " selected" } else { "" };
            format!(r#"<option value="{id}"{selected}>{id}</option>"#, id = m.as_str())
        })
        .collect();
    let _ = write!(
        out,
        r#"<aside class="sidebar">
<h2>Configuration</h2>
<form method="post" action="/config">
  <label>Enter Anthropic API Key
    <input type="password" name="api_key" value="{key}">
  </label>
  <small>Get your API key from https://console.anthropic.com/</small>
  <label>Select Claude Model
    <select name="model">{options}</select>
  </label>
  <label>Max Tokens for Response: {max_tokens}
    <input type="range" name="max_tokens" min="{min}" max="{max}" value="{max_tokens}">
  </label>
  <button type="submit">Apply</button>
</form>
<form method="post" action="/clear">
  <button type="submit">Clear Conversation</button>
</form>
</aside>
"#,
        key = escape_html(&config.api_key),
        max_tokens = config.max_tokens,
        min = MIN_MAX_TOKENS,
        max = MAX_MAX_TOKENS,
    );
}

pub fn render_page(page: &PageModel<'_>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Claude Chat App</title>
<style>{STYLE}</style>
</head>
<body>
"#
    );
    render_sidebar(&mut out, page.config);

    out.push_str("<main class=\"main\">\n<h1>💬 Chat with Claude</h1>\n");
    for m in page.history {
        out.push_str(&render_message(m.role, &m.content));
    }
    if page.awaiting_reply {
        out.push_str("<div class=\"thinking\">Claude is thinking...</div>\n");
    }
    if let Some(err) = page.error {
        let _ = writeln!(out, r#"<div class="error">{}</div>"#, escape_html(err));
    }

    let configured = page.config.api_key_configured();
    let disabled = if !configured || page.awaiting_reply { " disabled" } else { "" };
    let _ = write!(
        out,
        r#"<form class="chat-input" method="post" action="/chat">
  <input type="text" name="message" placeholder="Type your message here..." autofocus{disabled}>
  <button type="submit"{disabled}>Send</button>
</form>
"#
    );
    if !configured {
        out.push_str(
            "<div class=\"warning\">Please configure your Anthropic API key in the sidebar</div>\n",
        );
    }
    out.push_str("</main>\n</body>\n</html>\n");
    out
}
