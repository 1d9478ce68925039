//! Tolerant template filling
//!
//! `${key}` and `$key` placeholders substitute values from the event's
//! template data. Unknown or absent keys render as an empty string rather
//! than failing, and `$$` escapes a literal dollar sign. A malformed
//! placeholder (unterminated `${`) is left as-is.

use std::collections::BTreeMap;

/// Fills `template` from `data` with safe-substitute semantics
pub fn fill(template: &str, data: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((start, '{')) => {
                let start = *start;
                match template[start..].find('}') {
                    Some(rel_end) => {
                        let key = &template[start + 1..start + rel_end];
                        if let Some(value) = data.get(key) {
                            out.push_str(value);
                        }
                        // Skip past the closing brace
                        while let Some((j, _)) = chars.peek() {
                            if *j > start + rel_end {
                                break;
                            }
                            chars.next();
                        }
                    }
                    None => {
                        out.push_str(&template[i..]);
                        break;
                    }
                }
            }
            Some((start, c2)) if c2.is_ascii_alphabetic() || *c2 == '_' => {
                let start = *start;
                let mut end = start;
                while let Some((j, c3)) = chars.peek() {
                    if c3.is_ascii_alphanumeric() || *c3 == '_' {
                        end = *j + c3.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let key = &template[start..end];
                if let Some(value) = data.get(key) {
                    out.push_str(value);
                }
            }
            _ => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("project_name".to_string(), "svc".to_string());
        map.insert("status".to_string(), "success".to_string());
        map
    }

    #[test]
    fn substitutes_braced_and_bare_placeholders() {
        assert_eq!(
            fill("Project ${project_name} is $status", &data()),
            "Project svc is success"
        );
    }

    #[test]
    fn missing_keys_render_blank() {
        assert_eq!(fill("v=${version}!", &data()), "v=!");
        assert_eq!(fill("v=$version!", &data()), "v=!");
    }

    #[test]
    fn dollar_escapes_and_literals() {
        assert_eq!(fill("cost: $$5", &data()), "cost: $5");
        assert_eq!(fill("just a $ sign", &data()), "just a $ sign");
        assert_eq!(fill("trailing $", &data()), "trailing $");
    }

    #[test]
    fn unterminated_placeholder_kept_verbatim() {
        assert_eq!(fill("broken ${project", &data()), "broken ${project");
    }
}
