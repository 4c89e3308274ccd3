use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use super::error::QueryError;
use super::model::Sample;
use super::parser::parse_response;

const QUERY_PATH: &str = "/api/v1/query?query=";
const PROXY_PATH: &str = "proxy?url=";

/// Characters left untouched by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Builds the request target for an instant query.
///
/// Without a proxy the expression is encoded into the backend URL. With a
/// proxy the backend URL is built around the raw expression and the whole URL
/// is encoded into a relative `proxy?url=` reference.
pub fn query_url(expression: &str, origin: &str, use_proxy: bool) -> String {
    if use_proxy {
        let target = format!("{origin}{QUERY_PATH}{expression}");
        format!("{PROXY_PATH}{}", percent_encode(&target))
    } else {
        format!("{origin}{QUERY_PATH}{}", percent_encode(expression))
    }
}

/// Instant query client for a Prometheus compatible backend.
///
/// The proxy base is the URL the relative `proxy?url=` reference is resolved
/// against, i.e. the address of the dashboard server.
#[derive(Debug, Clone)]
pub struct PromClient {
    client: reqwest::Client,
    proxy_base: Option<Url>,
}

impl PromClient {
    pub fn new(client: reqwest::Client) -> PromClient {
        PromClient {
            client,
            proxy_base: None,
        }
    }

    pub fn with_proxy_base(mut self, proxy_base: Url) -> PromClient {
        self.proxy_base = Some(proxy_base);
        self
    }

    pub fn proxy_base(&self) -> Option<&Url> {
        self.proxy_base.as_ref()
    }

    /// Resolves the absolute URL a query is sent to.
    pub fn request_url(
        &self,
        expression: &str,
        origin: &str,
        use_proxy: bool,
    ) -> Result<Url, QueryError> {
        let target = query_url(expression, origin, use_proxy);
        if use_proxy {
            let base = self.proxy_base.as_ref().ok_or(QueryError::MissingProxyBase)?;
            Ok(base.join(&target)?)
        } else {
            Ok(Url::parse(&target)?)
        }
    }

    /// Runs one instant query.
    ///
    /// `Ok(None)` means the expression matched no series. A single GET is
    /// issued; there is no retry, timeout or caching.
    pub async fn query(
        &self,
        expression: &str,
        origin: &str,
        use_proxy: bool,
    ) -> Result<Option<Vec<Sample>>, QueryError> {
        let url = self.request_url(expression, origin, use_proxy)?;
        log::debug!("Querying {url}");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        log::debug!("Received {} bytes with HTTP status {status}", body.len());

        parse_response(&body)
    }
}

impl Default for PromClient {
    fn default() -> Self {
        PromClient::new(reqwest::Client::new())
    }
}
