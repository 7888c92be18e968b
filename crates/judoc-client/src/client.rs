use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{Body, Response, StatusCode, Url};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{ClientError, ClientResult};

/// Client for a judoc server.
///
/// Objects in the empty namespace go through the `/set`, `/get` and
/// `/delete` routes; every other namespace uses `/io/{namespace}/{key}`.
/// Each `/`-separated part of a key is percent-encoded on the way out.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    url: Url,
}

impl Client {
    /// Connect to the server at `url` with a pooled HTTP client.
    pub fn new(url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http(url, http)
    }

    pub fn with_http(url: impl Into<String>, http: reqwest::Client) -> ClientResult<Self> {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        let parsed = Url::parse(&url).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(url));
        }
        Ok(Self { http, url: parsed })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn endpoint(&self, route: &str, namespace: &str, key: &str) -> ClientResult<Url> {
        let mut url = self.url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ClientError::InvalidUrl(self.url.to_string()))?;
            segments.pop_if_empty();
            if namespace.is_empty() {
                segments.push(route);
            } else {
                segments.push("io").push(namespace);
            }
            for part in key.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }

    /// Store `body` under `namespace`/`key`, replacing any previous value.
    pub async fn set(&self, namespace: &str, key: &str, body: impl Into<Bytes>) -> ClientResult<()> {
        self.upload(namespace, key, Body::from(body.into())).await
    }

    /// Store everything `reader` yields, streamed rather than buffered.
    pub async fn set_reader<R>(&self, namespace: &str, key: &str, reader: R) -> ClientResult<()>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.upload(namespace, key, Body::wrap_stream(ReaderStream::new(reader)))
            .await
    }

    async fn upload(&self, namespace: &str, key: &str, body: Body) -> ClientResult<()> {
        let response = self
            .http
            .post(self.endpoint("set", namespace, key)?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        expect_ok(response).await
    }

    /// Stream the object's bytes. Fails before yielding anything if the
    /// server does not answer 200.
    pub async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> ClientResult<impl Stream<Item = ClientResult<Bytes>> + Send + 'static> {
        let response = self.http.get(self.endpoint("get", namespace, key)?).send().await?;
        let response = require_success(response).await?;
        Ok(response.bytes_stream().map_err(ClientError::from))
    }

    /// Fetch the whole object into memory.
    pub async fn get_bytes(&self, namespace: &str, key: &str) -> ClientResult<Bytes> {
        let response = self.http.get(self.endpoint("get", namespace, key)?).send().await?;
        Ok(require_success(response).await?.bytes().await?)
    }

    /// Copy the object into `out`, returning the number of bytes written.
    pub async fn download<W>(&self, namespace: &str, key: &str, out: &mut W) -> ClientResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = Box::pin(self.get(namespace, key).await?);
        let mut written = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }

    pub async fn delete(&self, namespace: &str, key: &str) -> ClientResult<()> {
        let response = self
            .http
            .delete(self.endpoint("delete", namespace, key)?)
            .send()
            .await?;
        expect_ok(require_success(response).await?).await
    }
}

async fn require_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), detail = %detail, "request refused");
    Err(ClientError::Unavailable {
        status: status.as_u16(),
        detail,
    })
}

async fn expect_ok(response: Response) -> ClientResult<()> {
    let body = response.text().await?;
    if body == "OK" {
        Ok(())
    } else {
        Err(ClientError::Unexpected(body))
    }
}
