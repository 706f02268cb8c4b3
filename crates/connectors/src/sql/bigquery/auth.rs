use crate::error::SourceError;
use std::fmt;
use tokio::process::Command;
use tracing::debug;

/// Where the OAuth bearer token for BigQuery comes from.
#[derive(Clone)]
pub enum TokenSource {
    /// A token supplied through configuration or the environment.
    Static(String),
    /// Ask the local `gcloud` CLI for the active account's token.
    Gcloud,
}

impl TokenSource {
    pub async fn token(&self) -> Result<String, SourceError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Gcloud => gcloud_token().await,
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(***)"),
            TokenSource::Gcloud => f.write_str("Gcloud"),
        }
    }
}

async fn gcloud_token() -> Result<String, SourceError> {
    debug!("Requesting access token from gcloud");
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| SourceError::Auth(format!("failed to run gcloud: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SourceError::Auth(format!(
            "gcloud exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(SourceError::Auth("gcloud returned an empty token".into()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let source = TokenSource::Static("ya29.token".into());
        assert_eq!(source.token().await.unwrap(), "ya29.token");
        assert_eq!(format!("{source:?}"), "Static(***)");
    }
}
