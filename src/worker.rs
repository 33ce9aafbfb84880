//! Nonce-search workers
//!
//! One long-lived task per (chain, thread). Each task repeatedly runs a
//! search episode: snapshot the chain's current mining context, pick a
//! random starting nonce, and grind through fixed-size nonce batches until
//! a candidate meets the difficulty limit or the template is superseded.
//!
//! Cancellation is cooperative. Workers poll the store's generation counter
//! between batches; the counter is a cheap cross-chain staleness hint, so an
//! observed bump only triggers abandonment after a per-chain index check
//! under the store lock confirms this chain's template actually changed. At
//! most one batch of work is wasted per replacement.

use crate::config::Config;
use crate::crypto::{Signer, Solution};
use crate::pow::hash_power;
use crate::store::TemplateStore;
use crate::submit::Submitter;
use crate::types::{BlockHeader, MiningContext};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Wait before re-polling an empty store slot
const IDLE_DELAY: Duration = Duration::from_millis(200);

struct Worker {
    store: Arc<TemplateStore>,
    signer: Arc<Signer>,
    submitter: Submitter,
    chain: u64,
    increment: u64,
    throttle: Option<Duration>,
    verify: bool,
}

/// Spawn the configured number of search tasks for every chain.
pub fn spawn_workers(
    config: &Config,
    store: Arc<TemplateStore>,
    signer: Arc<Signer>,
    submitter: Submitter,
) {
    let threads = config.effective_threads();
    for &chain in &config.chains {
        for thread in 0..threads {
            let worker = Worker {
                store: Arc::clone(&store),
                signer: Arc::clone(&signer),
                submitter: submitter.clone(),
                chain,
                increment: config.increment(),
                throttle: config.throttle(),
                verify: config.verify_candidates,
            };
            tokio::spawn(async move {
                debug!(chain, thread, "worker started");
                worker.run().await;
            });
        }
    }
}

impl Worker {
    async fn run(self) {
        loop {
            if let Some((context, solution)) = self.search_episode().await {
                // Bookkeeping already happened under the store lock; the
                // network round trip runs outside it.
                self.submitter.submit(&context, solution).await;
            }
        }
    }

    /// One search over a single template snapshot.
    ///
    /// Returns the qualifying solution together with the context it was
    /// mined against, or `None` when there is no template yet or the
    /// template was superseded mid-search.
    async fn search_episode(&self) -> Option<(Arc<MiningContext>, Solution)> {
        let Some(context) = self.store.get(self.chain) else {
            sleep(IDLE_DELAY).await;
            return None;
        };

        let mut header = context.header.encode();
        let mut nonce: u64 = rand::rng().random();
        let mut baseline = self.store.generation();
        let mut attempted = 0u64;

        loop {
            let generation = self.store.generation();
            if generation != baseline {
                match self.store.chain_index(self.chain) {
                    Some(index) if index == context.index() => baseline = generation,
                    _ => {
                        self.store.record_hashes(attempted);
                        debug!(
                            chain = self.chain,
                            index = context.index(),
                            attempted,
                            "template superseded, abandoning search"
                        );
                        return None;
                    }
                }
            }

            if let Some(delay) = self.throttle {
                sleep(delay).await;
            }

            BlockHeader::patch_nonce(&mut header, nonce);
            let solution =
                self.signer
                    .solve_batch(&header, &context.key, self.increment, context.limit);
            attempted += self.increment;
            nonce = nonce.wrapping_add(self.increment);

            let power = hash_power(solution.hash.as_bytes());
            if power >= context.limit {
                if self.verify {
                    self.verify_solution(&context, &solution);
                }
                self.store
                    .record_candidate(solution.hash, attempted, context.secondary);
                info!(
                    chain = self.chain,
                    index = context.index(),
                    power,
                    limit = context.limit,
                    nonce = solution.nonce,
                    "found qualifying candidate"
                );
                return Some((context, solution));
            }

            tokio::task::yield_now().await;
        }
    }

    /// Re-seal the winning nonce through the single-shot path and compare.
    /// A mismatch means the batched solver produced a payload we cannot
    /// trust, which is an integrity fault worth dying over.
    fn verify_solution(&self, context: &MiningContext, solution: &Solution) {
        let mut header = context.header.encode();
        BlockHeader::patch_nonce(&mut header, solution.nonce);
        let (payload, hash) = self.signer.seal(&header, &context.key);
        if payload != solution.payload || hash != solution.hash {
            error!(
                chain = self.chain,
                index = context.index(),
                nonce = solution.nonce,
                "batched solver disagrees with single-shot sealing, aborting"
            );
            std::process::exit(1);
        }
    }
}
