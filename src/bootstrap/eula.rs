use std::{path::Path, sync::LazyLock};

use regex::Regex;
use tokio::fs;

use crate::error::BootstrapError;

pub const EULA_FILE: &str = "eula.txt";

static REFUSED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)eula\s*=\s*false").unwrap());

/// Flips the refusal flag, leaving the rest of the file untouched.
pub fn accept_text(content: &str) -> String {
    REFUSED.replace_all(content, "eula=true").into_owned()
}

/// Accepts the license in `dir`. The server must already have written the
/// file; a missing file means the priming run did not get far enough.
pub async fn accept(dir: &Path) -> Result<(), BootstrapError> {
    let path = dir.join(EULA_FILE);

    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BootstrapError::MissingLicense(path));
        }
        Err(source) => return Err(BootstrapError::License { path, source }),
    };

    fs::write(&path, accept_text(&content))
        .await
        .map_err(|source| BootstrapError::License { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_refusal_and_keeps_comments() {
        let original = "#By changing the setting below to TRUE you are indicating your agreement to our EULA.\n#Mon Jan 01 00:00:00 UTC 2024\neula=false\n";
        let patched = accept_text(original);
        assert!(patched.ends_with("eula=true\n"));
        assert!(patched.starts_with("#By changing the setting below to TRUE"));
    }

    #[test]
    fn tolerates_spacing_and_case() {
        assert_eq!(accept_text("EULA = FALSE"), "eula=true");
        assert_eq!(accept_text("eula=true\n"), "eula=true\n");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        match accept(dir.path()).await {
            Err(BootstrapError::MissingLicense(path)) => {
                assert_eq!(path, dir.path().join(EULA_FILE))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepts_in_place() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(EULA_FILE), "eula=false\n")
            .await
            .unwrap();

        accept(dir.path()).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join(EULA_FILE))
            .await
            .unwrap();
        assert_eq!(content, "eula=true\n");
    }
}
