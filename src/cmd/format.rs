/*!
format.rs

Human output helpers for `mcp-bridge run` (boxed headers, color, emoji).

  - StyleOptions::detect() -> StyleOptions   (NO_COLOR / NO_EMOJI / COLUMNS)
  - color(role, text, &StyleOptions) -> String
  - emoji(tag, &StyleOptions) -> &'static str
  - box_header(title, subtitle_opt, &StyleOptions) -> String

JSON output paths do not use these helpers.
*/

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width: width,
        }
    }

    /// No color, no emoji; used by tests and piped output.
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",    // cyan-ish
        Role::Secondary => "38;5;250", // gray
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "error" => "✖",
        "info" => "ℹ",
        "clock" => "⏱",
        _ => "",
    }
}

/// Single-line boxed title with an optional dimmed subtitle.
///
/// Content wider than the terminal is cut with an ellipsis.
pub fn box_header(
    title: impl AsRef<str>,
    subtitle: Option<impl AsRef<str>>,
    style: &StyleOptions,
) -> String {
    let max_inner = style.term_width.saturating_sub(4).max(16);
    let raw = match subtitle.as_ref() {
        Some(s) => format!("{}  {}", title.as_ref(), s.as_ref()),
        None => title.as_ref().to_string(),
    };
    let raw = truncate_ellipsis(&raw, max_inner);
    let width = raw.chars().count();

    // color only the title part; subtitle (if it survived truncation) stays secondary
    let title_len = title.as_ref().chars().count().min(width);
    let (t, rest): (String, String) = (
        raw.chars().take(title_len).collect(),
        raw.chars().skip(title_len).collect(),
    );
    let inner = format!(
        "{}{}",
        color(Role::Primary, t, style),
        color(Role::Secondary, rest, style)
    );

    let bar = "─".repeat(width + 2);
    format!("┌{bar}┐\n│ {inner} │\n└{bar}┘")
}

/// Cut `s` to at most `max_chars` characters, ending in `…` when shortened.
pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_style_has_no_escape_codes() {
        let style = StyleOptions::plain();
        assert_eq!(color(Role::Error, "x", &style), "x");
        assert_eq!(emoji("success", &style), "");
    }

    #[test]
    fn box_header_shape() {
        let style = StyleOptions::plain();
        let boxed = box_header("Run OK", Some("12ms"), &style);
        let lines: Vec<&str> = boxed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "│ Run OK  12ms │");
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_ellipsis("abc", 4), "abc");
    }
}
