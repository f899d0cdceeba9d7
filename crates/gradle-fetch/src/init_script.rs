//! Generation of the init script that plugs the project info model into
//! the daemon.

use std::fmt::Write as _;
use std::path::Path;

const TEMPLATE: &str = include_str!("../templates/init-script.gradle");
const CLASSPATH_PLACEHOLDER: &str = "{{CLASSPATH}}";
const INPUT_FILE_PLACEHOLDER: &str = "{{INPUT_FILE}}";

/// Fills the init script template.
///
/// Every substituted value is embedded as a single-quoted string literal.
pub fn render_init_script(classpath: &[String], input_file: &Path) -> String {
    let classpath = classpath
        .iter()
        .map(|entry| format!("'{}'", escape_string_literal(entry)))
        .collect::<Vec<_>>()
        .join(", ");
    let input_file = escape_string_literal(&input_file.to_string_lossy());

    // One pass over the template, so substituted text is never rescanned.
    let mut script = String::with_capacity(TEMPLATE.len() + classpath.len() + input_file.len());
    let mut rest = TEMPLATE;
    while let Some(start) = rest.find("{{") {
        script.push_str(&rest[..start]);
        rest = &rest[start..];
        if let Some(tail) = rest.strip_prefix(CLASSPATH_PLACEHOLDER) {
            script.push_str(&classpath);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(INPUT_FILE_PLACEHOLDER) {
            script.push_str(&input_file);
            rest = tail;
        } else {
            script.push_str("{{");
            rest = &rest[2..];
        }
    }
    script.push_str(rest);
    script
}

/// Escapes `value` for use inside a single-quoted script string.
pub fn escape_string_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    safe_to_paste(&escaped)
}

/// Replaces invisible and line-breaking characters with `\uXXXX` escapes.
///
/// Characters outside the basic multilingual plane are written as a
/// surrogate pair.
pub fn safe_to_paste(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut units = [0_u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn needs_escape(c: char) -> bool {
    c.is_control() || c == '\u{2028}' || c == '\u{2029}' || is_format_char(c)
}

/// Unicode general category `Cf`.
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}
