//! Field and function name normalization
//!
//! Remote keys are lower camel case (`firstName`), remote functions are a
//! verb followed by upper camel case (`getAccountInfo`). Snake case input is
//! converted; literal names pass through untouched.

/// Remote key for a field name
pub fn to_remote_field_name(name: &str, literal: bool) -> String {
    if literal {
        return name.to_string();
    }
    lower_first(&camelize(name))
}

/// Remote function name: `prefix` followed by the camelized field name
pub fn to_remote_function_name(prefix: &str, name: &str, literal: bool) -> String {
    if literal {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{}", camelize(name))
    }
}

/// Upper camel case; each `_`-separated segment is capitalized
fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segments = name.split('_');

    if let Some(first) = segments.next() {
        out.push_str(&upper_first(first));
    }
    for segment in segments {
        out.push_str(&capitalize(segment));
    }
    out
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character and lowercase the rest of the leading
/// alphanumeric run
fn capitalize(segment: &str) -> String {
    let run = segment
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric())
        .map_or(segment.len(), |(i, _)| i);
    let (word, rest) = segment.split_at(run);

    let mut out = upper_first(&word.to_lowercase());
    out.push_str(rest);
    out
}
