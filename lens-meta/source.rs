use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::error::{FetchError, FetchResult};

/// Anything that can produce the wiki page of an item by name
pub trait MetadataSource: Send + Sync {
    fn fetch_page(&self, name: &str) -> FetchResult<String>;
}

impl<S: MetadataSource + ?Sized> MetadataSource for std::sync::Arc<S> {
    fn fetch_page(&self, name: &str) -> FetchResult<String> {
        (**self).fetch_page(name)
    }
}

/// Blocking HTTP source for a fandom-style wiki
pub struct WikiSource {
    agent: Agent,
    base_url: String,
}

impl WikiSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://bindingofisaacrebirth.fandom.com/wiki/";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into(),
        }
    }

    /// Article URL: spaces in the item name become underscores
    pub fn page_url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name.replace(' ', "_"))
    }
}

impl MetadataSource for WikiSource {
    fn fetch_page(&self, name: &str) -> FetchResult<String> {
        let url = self.page_url(name);
        debug!(%url, "fetching item page");

        let mut response = self.agent.get(&url).call()?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status));
        }
        Ok(response.body_mut().read_to_string()?)
    }
}
