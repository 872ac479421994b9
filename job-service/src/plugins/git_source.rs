// Git Source
// Clones a repository onto the build host through the transport

use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::expression::interpolate;
use crate::job::SourceSpec;
use crate::plugins::{Source, SourceError, Transport};

/// Source plugin for `type: git`
pub struct GitSource;

#[async_trait::async_trait]
impl Source for GitSource {
    async fn checkout(
        &self,
        transport: &dyn Transport,
        ctx: &ExecutionContext,
        source: &SourceSpec,
        log: &mut dyn Notifier,
    ) -> Result<bool, SourceError> {
        let url = source.url.as_deref().ok_or(SourceError::MissingField("url"))?;
        let url = interpolate(url, ctx)?;
        let dest = match source.extra.get("path").and_then(|v| v.as_str()) {
            Some(path) => interpolate(path, ctx)?,
            None => repository_name(&url),
        };

        let authed = match &source.token {
            Some(token) => with_token(&url, &interpolate(token, ctx)?),
            None => url.clone(),
        };

        let mut cmd = String::from("git clone");
        if let Some(branch) = &source.branch {
            cmd.push_str(&format!(" --branch {}", shell_quote(&interpolate(branch, ctx)?)));
        }
        let display = format!("{} {} {}", cmd, url, dest);
        cmd.push_str(&format!(" {} {}", shell_quote(&authed), shell_quote(&dest)));

        log.write_line(&format!("$ {}", display));
        let workspace = ctx.get_string("workspace");
        let cloned = transport.exec(&cmd, workspace.as_deref(), log).await?;
        if !cloned {
            tracing::warn!(url = %url, exit_code = ?transport.exit_code(), "git clone failed");
        }
        Ok(cloned)
    }
}

/// Directory git would pick for a clone of `url`
fn repository_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Embed an access token into an HTTPS clone URL
fn with_token(url: &str, token: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) if scheme.starts_with("http") => {
            format!("{}://{}@{}", scheme, token, rest)
        }
        _ => url.to_string(),
    }
}

/// Single-quote `value` for `sh`
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name() {
        assert_eq!(repository_name("https://github.com/acme/widget.git"), "widget");
        assert_eq!(repository_name("https://github.com/acme/widget/"), "widget");
        assert_eq!(repository_name("git@github.com:acme/widget.git"), "widget");
    }

    #[test]
    fn test_with_token() {
        assert_eq!(
            with_token("https://github.com/acme/widget.git", "abc"),
            "https://abc@github.com/acme/widget.git"
        );
        assert_eq!(
            with_token("git@github.com:acme/widget.git", "abc"),
            "git@github.com:acme/widget.git"
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
