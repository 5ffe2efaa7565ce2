//! Small utility helpers used across modules.

/// Replaces occurrences of `{key}` in the template with provided values.
/// Unknown placeholders and other braces are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// The JSON object inside a model reply: a fenced block is unwrapped first,
/// then everything from the first `{` to the last `}` is taken.
pub fn extract_json_object(raw: &str) -> Option<&str> {
  let body = fenced_body(raw).unwrap_or(raw).trim();
  let start = body.find('{')?;
  let end = body.rfind('}')?;
  (start < end).then(|| &body[start..=end])
}

fn fenced_body(raw: &str) -> Option<&str> {
  let open = raw.find("```")?;
  let after = &raw[open + 3..];
  // skip an info string such as `json`
  let body_start = after.find('\n').map_or(0, |i| i + 1);
  let after = &after[body_start..];
  let close = after.find("```")?;
  Some(&after[..close])
}
