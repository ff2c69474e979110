use serde_json::{json, Value};

/// Replaces every `{{ path }}` placeholder with the value at that path in
/// the render scope. Unresolvable paths render as the empty string; an
/// unterminated `{{` is copied through verbatim.
pub fn render(s: &str, scope: &Value) -> String {
    let mut out = String::new();
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        if let Some(end_rel) = tail.find("}}") {
            let (expr_with, new_rest) = tail.split_at(end_rel + 2);
            let expr = expr_with
                .trim_start_matches("{{")
                .trim_end_matches("}}")
                .trim();
            let val = lookup(expr, scope).unwrap_or_default();
            out.push_str(&val);
            rest = new_rest;
        } else {
            out.push_str(tail);
            rest = "";
            break;
        }
    }
    out.push_str(rest);
    out
}

/// The scope handlers template against: the trigger payload under a
/// `trigger` root, so documents write `{{trigger.contact.email}}`.
pub fn trigger_scope(trigger: &Value) -> Value {
    json!({ "trigger": trigger })
}

fn lookup(path: &str, scope: &Value) -> Option<String> {
    let mut cur = scope;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        match cur {
            Value::Object(map) => {
                cur = map.get(part)?;
            }
            Value::Array(arr) => {
                let idx: usize = part.parse().ok()?;
                cur = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(match cur {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_nested_paths() {
        let scope = trigger_scope(&json!({ "contact": { "email": "ada@example.com" } }));
        assert_eq!(
            render("Hello {{trigger.contact.email}}!", &scope),
            "Hello ada@example.com!"
        );
    }

    #[test]
    fn unresolvable_paths_render_empty() {
        let scope = trigger_scope(&json!({ "a": 1 }));
        assert_eq!(render("x={{trigger.missing.key}}", &scope), "x=");
    }

    #[test]
    fn array_indices_and_numbers() {
        let scope = trigger_scope(&json!({ "tags": ["vip", "beta"], "count": 7 }));
        assert_eq!(render("{{trigger.tags.1}}/{{trigger.count}}", &scope), "beta/7");
    }

    #[test]
    fn unterminated_placeholder_passes_through() {
        let scope = trigger_scope(&json!({}));
        assert_eq!(render("keep {{trigger.a", &scope), "keep {{trigger.a");
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        let scope = trigger_scope(&json!({ "name": "Skillify" }));
        assert_eq!(render("{{ trigger.name }}", &scope), "Skillify");
    }
}
