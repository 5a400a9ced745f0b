use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Difficulty;
use crate::util::clean_passage;

static PASSAGE_DIR: Dir = include_dir!("src/passages");

/// Source of target text for a session.
///
/// `None` means "nothing usable"; callers fall back to [`StaticPassages`].
pub trait PassageProvider: Send + Sync {
    fn fetch_passage(&self, difficulty: Difficulty) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassageSource {
    Provider,
    Fallback,
}

/// Canned passages bundled into the binary, keyed by difficulty.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct StaticPassages {
    table: HashMap<Difficulty, Vec<String>>,
}

impl StaticPassages {
    pub fn embedded() -> Self {
        let file = PASSAGE_DIR
            .get_file("passages.json")
            .expect("Passage table not found");

        let contents = file
            .contents_utf8()
            .expect("Unable to interpret passage table as a string");

        serde_json::from_str(contents).expect("Unable to deserialize passage table")
    }

    pub fn passages(&self, difficulty: Difficulty) -> &[String] {
        self.table
            .get(&difficulty)
            .or_else(|| self.table.get(&Difficulty::Medium))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn pick<R: rand::Rng + ?Sized>(
        &self,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<String> {
        self.passages(difficulty).choose(rng).cloned()
    }
}

impl Default for StaticPassages {
    fn default() -> Self {
        Self::embedded()
    }
}

impl PassageProvider for StaticPassages {
    fn fetch_passage(&self, difficulty: Difficulty) -> Option<String> {
        self.pick(difficulty, &mut rand::thread_rng())
    }
}

/// Fetches generated passages from an HTTP endpoint:
/// `GET {url}?difficulty=<tier>`, answered with `{"text": ...}` or plain text.
#[derive(Debug, Clone)]
pub struct HttpPassageProvider {
    client: Client,
    url: String,
}

impl HttpPassageProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("typesprint/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// JSON bodies must carry a string `text`; anything else that parses as
    /// JSON is an error payload. Bodies that are not JSON are used as is.
    fn parse_body(body: &str) -> Option<String> {
        let text = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => match fields.get("text") {
                Some(Value::String(text)) => text.clone(),
                _ => return None,
            },
            Ok(Value::String(text)) => text,
            Ok(_) => return None,
            Err(_) => body.to_string(),
        };
        let text = clean_passage(&text);
        (!text.is_empty()).then_some(text)
    }
}

impl PassageProvider for HttpPassageProvider {
    fn fetch_passage(&self, difficulty: Difficulty) -> Option<String> {
        let response = match self
            .client
            .get(&self.url)
            .query(&[("difficulty", difficulty.to_string())])
            .send()
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %self.url, error = %e, "passage request failed");
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(url = %self.url, "passage provider rate limited");
            return None;
        }
        if !status.is_success() {
            warn!(url = %self.url, %status, "passage provider returned error status");
            return None;
        }

        match response.text() {
            Ok(body) => {
                let passage = Self::parse_body(&body);
                if passage.is_none() {
                    warn!(url = %self.url, "passage provider returned no usable text");
                }
                passage
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "unreadable passage body");
                None
            }
        }
    }
}

/// Asks `provider` first and falls back to the static table.
pub fn resolve_passage(
    provider: Option<&dyn PassageProvider>,
    fallback: &StaticPassages,
    difficulty: Difficulty,
) -> (String, PassageSource) {
    if let Some(text) = provider.and_then(|p| p.fetch_passage(difficulty)) {
        info!(%difficulty, "passage_source = provider");
        return (text, PassageSource::Provider);
    }

    info!(%difficulty, "passage_source = fallback_static");
    let text = fallback
        .fetch_passage(difficulty)
        .unwrap_or_else(|| String::from("The quick brown fox jumps over the lazy dog."));
    (text, PassageSource::Fallback)
}
