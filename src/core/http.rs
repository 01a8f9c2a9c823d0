use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::{Client, ClientBuilder};

const APP_USER_AGENT: &str = concat!("Provisioner/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Longest silence tolerated on a connection before the attempt is retried.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client for every fetch task. Content is hashed as stored, so
/// transfer compression is disabled.
pub fn build_http_client(max_idle_per_host: usize) -> Result<Client, reqwest::Error> {
    client_builder(max_idle_per_host).build()
}

pub(crate) fn client_builder(max_idle_per_host: usize) -> ClientBuilder {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .pool_max_idle_per_host(max_idle_per_host)
}
