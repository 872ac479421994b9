// Named Interpolation
// Substitutes %{key} references with values from the execution context

use crate::execution::context::ExecutionContext;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
    #[error("key not found: {0}")]
    MissingKey(String),

    #[error("unterminated reference at offset {0}")]
    Unterminated(usize),
}

/// Replace every `%{key}` in `template` with the context value for `key`.
///
/// `%%` collapses to a single `%`. Any other `%` is copied through as-is.
pub fn interpolate(template: &str, ctx: &ExecutionContext) -> Result<String, InterpolationError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            offset += pos + 2;
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let end = body
                .find('}')
                .ok_or(InterpolationError::Unterminated(offset + pos))?;
            let key = &body[..end];
            let value = ctx
                .get_string(key)
                .ok_or_else(|| InterpolationError::MissingKey(key.to_string()))?;
            out.push_str(&value);
            offset += pos + 2 + end + 1;
            rest = &body[end + 1..];
        } else {
            out.push('%');
            offset += pos + 1;
            rest = tail;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Escape every `%` that does not start a `%{` reference, so that the
/// result passes through [`interpolate`] with those characters intact.
pub fn escape_literal_percent(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut chars = statement.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '%' && chars.peek() != Some(&'{') {
            out.push('%');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.insert("workspace", "/home/build");
        ctx.insert("coverage", 87.5);
        ctx
    }

    #[test]
    fn test_substitutes_named_keys() {
        let result = interpolate("cd %{workspace} && echo %{coverage}", &ctx()).unwrap();
        assert_eq!(result, "cd /home/build && echo 87.5");
    }

    #[test]
    fn test_missing_key() {
        let err = interpolate("echo %{nope}", &ctx()).unwrap_err();
        assert_eq!(err, InterpolationError::MissingKey("nope".to_string()));
    }

    #[test]
    fn test_unterminated_reference() {
        let err = interpolate("echo %{workspace", &ctx()).unwrap_err();
        assert_eq!(err, InterpolationError::Unterminated(5));
    }

    #[test]
    fn test_plain_percent_passes_through() {
        assert_eq!(interpolate("90% done", &ctx()).unwrap(), "90% done");
        assert_eq!(interpolate("100%%", &ctx()).unwrap(), "100%");
    }

    #[test]
    fn test_escape_then_interpolate() {
        let escaped = escape_literal_percent("'%{coverage}%' == '87.5%'");
        assert_eq!(escaped, "'%{coverage}%%' == '87.5%%'");
        assert_eq!(interpolate(&escaped, &ctx()).unwrap(), "'87.5%' == '87.5%'");
    }
}
