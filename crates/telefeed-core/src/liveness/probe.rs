use std::time::Duration;

use async_trait::async_trait;

use crate::{errors::Error, Result};

/// Issues GETs against the service's own HTTP surface.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// GET `url`, returning the response status code.
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16>;
}

/// reqwest-backed probe.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("telefeed-liveness/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16> {
        let resp = self.http.get(url).timeout(timeout).send().await?;
        Ok(resp.status().as_u16())
    }
}
