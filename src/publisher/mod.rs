//! HIT publishing.
//!
//! Posts one HIT to a task service, waits for it to propagate, reports where
//! it can be previewed and managed, then polls for submitted assignments.

pub mod hit;
pub mod poller;
pub mod service;

pub use hit::{load_question, Environment, EnvironmentPolicy, HitConfig, HitHandle};
pub use poller::{poll_assignments, NextAction, OperatorPrompt};
pub use service::{AssignmentListing, MturkService, TaskService};

use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

/// Settings for one publishing run.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub environment: &'static Environment,
    /// Pause between creation and reporting the HIT.
    pub propagation_delay: Duration,
    pub show_progress: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentPolicy::default().select(false),
            propagation_delay: Duration::from_secs(10),
            show_progress: true,
        }
    }
}

/// A HIT that has been created, with the links an operator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedHit {
    pub handle: HitHandle,
    pub preview_url: String,
    pub manage_url: String,
}

/// Posts a HIT and polls it on behalf of the operator.
pub struct Publisher<S: TaskService> {
    config: PublisherConfig,
    service: S,
}

impl<S: TaskService> Publisher<S> {
    pub fn new(config: PublisherConfig, service: S) -> Self {
        info!(
            "Publishing to the {} environment",
            config.environment.name
        );
        Self { config, service }
    }

    /// Create the HIT and wait for it to become available.
    pub async fn publish(&self, hit: &HitConfig) -> Result<PublishedHit> {
        let handle = self.service.create_hit(hit).await?;
        info!("Created HIT {} (type {})", handle.hit_id, handle.hit_type_id);

        self.wait_for_propagation().await;

        Ok(PublishedHit {
            preview_url: self.config.environment.preview_link(&handle.hit_type_id),
            manage_url: self.config.environment.manage_url.to_string(),
            handle,
        })
    }

    async fn wait_for_propagation(&self) {
        let delay = self.config.propagation_delay;
        if delay.is_zero() {
            return;
        }

        println!(
            "waiting {}s for HIT to become available...",
            delay.as_secs()
        );

        let spinner = if self.config.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message("propagating");
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        tokio::time::sleep(delay).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        debug!("Propagation wait of {:?} finished", delay);
    }

    /// Poll submitted assignments until `actions` says quit.
    pub async fn poll<A, F>(&self, hit_id: &str, actions: &mut A, on_listing: F) -> Result<usize>
    where
        A: NextAction,
        F: FnMut(&AssignmentListing),
    {
        poll_assignments(&self.service, hit_id, actions, on_listing).await
    }
}

/// Operator-facing description of a freshly created HIT.
pub fn describe_published(published: &PublishedHit) -> String {
    format!(
        "\nCreated HIT: {}\n\nYou can work the HIT here:\n{}\n\nAnd see results here:\n{}",
        published.handle.hit_id, published.preview_url, published.manage_url
    )
}
