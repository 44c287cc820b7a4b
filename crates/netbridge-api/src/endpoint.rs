//! Event endpoint derivation from the REST API base address.
//!
//! `https://bridge.example.com/api/` becomes
//! `wss://bridge.example.com/ws?token=<session token>`: the scheme is
//! swapped for its streaming equivalent, everything from the last `api/`
//! segment on is replaced by `ws`, and the token rides along as a query
//! credential.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

const TOKEN_PARAM: &str = "token";

/// Stream endpoint without credentials. Also serves as validation of an
/// API base URL.
pub fn stream_base(api_base: &Url) -> Result<Url, Error> {
    let scheme = match api_base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let path = api_base.path();
    let prefix = path.rfind("api/").map_or(path, |idx| &path[..idx]);
    let mut stream_path = prefix.to_owned();
    if !stream_path.ends_with('/') {
        stream_path.push('/');
    }
    stream_path.push_str("ws");

    let mut url = api_base.clone();
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: api_base.scheme().to_owned(),
    })?;
    url.set_path(&stream_path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Full stream URL carrying `token` as a query credential.
pub fn stream_url(api_base: &Url, token: &SecretString) -> Result<Url, Error> {
    let mut url = stream_base(api_base)?;
    url.query_pairs_mut()
        .append_pair(TOKEN_PARAM, token.expose_secret());
    Ok(url)
}

/// Render a stream URL for logs with the token masked.
pub fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == TOKEN_PARAM { "****".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    if pairs.is_empty() {
        return masked.to_string();
    }

    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
