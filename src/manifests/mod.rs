pub mod fabric;
pub mod vanilla;

use serde::de::DeserializeOwned;

use crate::error::ManifestError;

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, ManifestError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|source| ManifestError::Network {
            url: url.to_string(),
            source,
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ManifestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    resp.json::<T>()
        .await
        .map_err(|source| ManifestError::Network {
            url: url.to_string(),
            source,
        })
}
