//! `${VAR}` expansion for raw config text.
//!
//! * `${VAR}` is replaced by the variable's value, or left untouched if unset.
//! * `${VAR:-fallback}` uses `fallback` when `VAR` is unset or empty.
//! * `$${` is an escaped literal `${`.

/// Expand placeholders using the process environment.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$${") {
            out.push_str("${");
            rest = after;
            continue;
        }
        let Some(body) = tail.strip_prefix("${") else {
            out.push('$');
            rest = &tail[1..];
            continue;
        };
        let Some(end) = body.find('}') else {
            // Unterminated, keep the remainder literally.
            out.push_str(tail);
            return out;
        };

        let expr = &body[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };
        let value = if name.is_empty() {
            None
        } else {
            lookup(name).filter(|v| fallback.is_none() || !v.is_empty())
        };
        match (value, fallback) {
            (Some(v), _) => out.push_str(&v),
            (None, Some(fallback)) => out.push_str(fallback),
            (None, None) => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            },
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "LILAC_USER" => Some("alice".into()),
            "LILAC_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_variables() {
        assert_eq!(substitute_env_with("user = \"${LILAC_USER}\"", env), "user = \"alice\"");
    }

    #[test]
    fn unknown_variables_stay_put() {
        assert_eq!(substitute_env_with("${LILAC_NOPE}", env), "${LILAC_NOPE}");
        assert_eq!(substitute_env_with("${}", env), "${}");
    }

    #[test]
    fn fallbacks_cover_unset_and_empty() {
        assert_eq!(substitute_env_with("${LILAC_NOPE:-bob}", env), "bob");
        assert_eq!(substitute_env_with("${LILAC_EMPTY:-bob}", env), "bob");
        assert_eq!(substitute_env_with("${LILAC_USER:-bob}", env), "alice");
    }

    #[test]
    fn escapes_and_stray_dollars() {
        assert_eq!(substitute_env_with("$${LILAC_USER}", env), "${LILAC_USER}");
        assert_eq!(substitute_env_with("cost: $5", env), "cost: $5");
        assert_eq!(substitute_env_with("open ${LILAC_USER", env), "open ${LILAC_USER");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
