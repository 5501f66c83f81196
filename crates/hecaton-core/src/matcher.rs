// Hecaton Pattern Matcher
// Shell-style glob patterns tested against a device's identity facets

use regex::Regex;

use crate::device::Device;

/// A compiled shell glob (`*`, `?`, `[abc]`, `[!abc]`)
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Option<Regex>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        let regex = match Regex::new(&translate(pattern)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                // e.g. a reversed range like [z-a]
                log::debug!("pattern {:?} is not a valid glob, matching literally: {}", pattern, e);
                None
            }
        };
        Self {
            source: pattern.to_string(),
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => text == self.source,
        }
    }
}

/// Translate a glob into an anchored regex
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str("\\["),
            },
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

/// Index of the `]` closing a class whose body starts at `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    // A leading ']' is part of the class
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

fn translate_class(body: &[char]) -> String {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut out = String::from(if negated { "[^" } else { "[" });
    for (idx, c) in body.iter().enumerate() {
        let is_range = *c == '-' && idx > 0 && idx + 1 < body.len();
        if is_range {
            out.push('-');
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    out.push(']');
    out
}

/// Whether `device` satisfies `pattern`.
///
/// The pattern is tried against the physical system path, the evdev node,
/// the hardware id and finally the name; any hit is a match. Facets the
/// device doesn't expose are skipped.
pub fn matches(device: &Device, pattern: &GlobPattern) -> bool {
    if let Some(path) = &device.system_path {
        if pattern.is_match(&path.to_string_lossy()) {
            return true;
        }
    }
    if let Some(node) = device.device_node() {
        if pattern.is_match(node) {
            return true;
        }
    }
    if let Some(id) = device.hardware_id() {
        if pattern.is_match(id) {
            return true;
        }
    }
    pattern.is_match(&device.name)
}

/// Convenience wrapper compiling `pattern` on the fly
pub fn matches_str(device: &Device, pattern: &str) -> bool {
    matches(device, &GlobPattern::new(pattern))
}
