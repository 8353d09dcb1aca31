//! `--machinereadable` output: one `key=value` pair per line.
//!
//! Keys are bare or double-quoted. Quoted values may span lines and escape
//! `"` and `\` with a backslash.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?:"((?:[^"\\]|\\.)*)"|([^="\s]+))=(.*)$"#).unwrap());

/// Key/value map of one `showvminfo --machinereadable` dump.
#[derive(Clone, Debug, Default)]
pub struct MachineReadable {
    values: HashMap<String, String>,
}

impl MachineReadable {
    #[must_use]
    pub fn parse(output: &str) -> Self {
        let mut values = HashMap::new();
        let mut lines = output.lines();
        while let Some(line) = lines.next() {
            let Some(caps) = LINE_RE.captures(line) else {
                continue;
            };
            let key = caps
                .get(1)
                .map(|m| unescape(m.as_str()))
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default();
            let raw = caps.get(3).map_or("", |m| m.as_str());

            let value = if let Some(rest) = raw.strip_prefix('"') {
                let mut buf = rest.to_string();
                while !closes_quote(&buf) {
                    let Some(next) = lines.next() else {
                        break;
                    };
                    buf.push('\n');
                    buf.push_str(next);
                }
                let body = buf.strip_suffix('"').unwrap_or(&buf);
                unescape(body)
            } else {
                raw.trim().to_string()
            };

            values.insert(key, value);
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn str_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// `on`/`off` flags; missing keys read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "on" | "true" | "yes" | "1"))
    }

    pub fn number<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// True when `buf` ends with a quote that is not itself escaped.
fn closes_quote(buf: &str) -> bool {
    let Some(body) = buf.strip_suffix('"') else {
        return false;
    };
    let backslashes = body.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 0
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.clone().next()
            && (next == '"' || next == '\\')
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}
