//! Candidate submission over HTTP
//!
//! A sealed block is posted back to the server the template came from. The
//! submitted key is the content hash of the payload, and broadcast is
//! requested so the server relays the block to its peers. Submission is
//! fire-and-forget: a rejected or failed post is logged and the miner moves
//! on, the network decides what counts.

use crate::crypto::Solution;
use crate::types::MiningContext;
use std::time::Duration;
use tracing::{info, warn};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP submitter, cheap to clone and share across workers
#[derive(Clone)]
pub struct Submitter {
    client: reqwest::Client,
}

impl Submitter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(SUBMIT_TIMEOUT)
                .build()
                .expect("default http client configuration"),
        }
    }

    /// Post a solved block to the origin server of its template.
    pub async fn submit(&self, context: &MiningContext, solution: Solution) {
        let url = submit_url(&context.origin, context.chain(), &solution);

        info!(
            chain = context.chain(),
            index = context.index(),
            key = %solution.hash,
            nonce = solution.nonce,
            "submitting block"
        );

        match self.client.post(&url).body(solution.payload).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!(chain = context.chain(), key = %solution.hash, "block accepted");
                } else {
                    let body = response.text().await.unwrap_or_default();
                    warn!(
                        chain = context.chain(),
                        key = %solution.hash,
                        status = %status,
                        "block rejected: {body}"
                    );
                }
            }
            Err(e) => warn!(
                chain = context.chain(),
                key = %solution.hash,
                "submission failed: {e}"
            ),
        }
    }
}

impl Default for Submitter {
    fn default() -> Self {
        Self::new()
    }
}

fn submit_url(origin: &str, chain: u64, solution: &Solution) -> String {
    format!(
        "http://{origin}/api/v1/{chain}/data?key={}&broadcast=true",
        solution.hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash;

    #[test]
    fn test_submit_url() {
        let solution = Solution {
            payload: Vec::new(),
            hash: Hash([0xab; 32]),
            nonce: 0,
        };
        let url = submit_url("node.example:9090", 2, &solution);
        assert_eq!(
            url,
            format!(
                "http://node.example:9090/api/v1/2/data?key={}&broadcast=true",
                "ab".repeat(32)
            )
        );
    }
}
