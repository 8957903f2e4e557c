use std::time::Duration;

use serde::Deserialize;

use crate::{agent, get_json, Result};

/// A ranked listing of package names, e.g. the top-PyPI-packages snapshot.
///
/// The popularity and size selections differ only in the feed URL.
#[derive(Debug, Clone)]
pub struct RankingFeed {
    url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct FeedDocument {
    rows: Vec<FeedRow>,
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    project: String,
}

impl RankingFeed {
    pub fn new(url: &str, timeout: Option<Duration>, user_agent: &str) -> Self {
        Self {
            url: url.to_owned(),
            agent: agent(timeout, user_agent),
        }
    }

    /// The first `n` project names, in feed order.
    pub fn top(&self, n: usize) -> Result<Vec<String>> {
        let document: FeedDocument = get_json(&self.agent, &self.url, None)?;
        let names: Vec<String> = document
            .rows
            .into_iter()
            .take(n)
            .map(|row| row.project)
            .collect();
        tracing::info!(
            target: "vintage.registry",
            feed = %self.url,
            requested = n,
            selected = names.len(),
            "loaded ranking feed"
        );
        Ok(names)
    }
}
