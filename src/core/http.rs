//! Blocking HTTP text fetches for candidate sources.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Error, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a client. `timeout` of `None` waits for as long as the server takes.
pub fn client(timeout: Option<Duration>) -> Result<Client> {
    Client::builder()
        .user_agent(format!("buildstep/{}", VERSION))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))
}

/// GET `url` and return the body. Transport errors and non-2xx responses are
/// reported as an unreachable `source`.
pub fn get_text(client: &Client, source: &str, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| Error::source_unreachable(source, url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::source_unreachable(
            source,
            url,
            format!("HTTP {}", status.as_u16()),
        ));
    }

    response
        .text()
        .map_err(|e| Error::source_unreachable(source, url, e.to_string()))
}
