//! Inbound `POST /api/instances` and the public listing.

use crate::domain::{FederationError, InstanceRecord};
use crate::ports::{AnnouncementResponse, FederationApi};
use crate::service::context::FederationContext;
use crate::service::crawler::FederationCrawler;
use crate::service::registry::{persist_instance, public_instances};
use crate::service::validator::RecordValidator;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Validates announcements with the crawler's pipeline, persists them and
/// queues a crawl of the announcing peer.
#[derive(Clone)]
pub struct InboundHandler {
    ctx: Arc<FederationContext>,
    validator: RecordValidator,
    crawler: FederationCrawler,
}

impl InboundHandler {
    pub fn new(ctx: Arc<FederationContext>, crawler: FederationCrawler) -> Self {
        Self {
            validator: RecordValidator::new(ctx.clone()),
            ctx,
            crawler,
        }
    }

    fn accept(&self, body: &Value) -> Result<String, FederationError> {
        if !self.ctx.config.enabled {
            return Err(FederationError::Disabled);
        }
        let validated = self.validator.validate(body)?;
        persist_instance(self.ctx.store.as_ref(), &validated.record)?;
        info!(
            domain = %validated.domain,
            nodes = validated.fresh_nodes,
            "accepted instance announcement"
        );

        let enqueued = self.crawler.enqueue_crawl(validated.domain.as_str());
        debug!(domain = %validated.domain, outcome = ?enqueued, "crawl after announcement");
        Ok(validated.domain.to_string())
    }
}

impl FederationApi for InboundHandler {
    fn handle_announcement(&self, body: &Value) -> AnnouncementResponse {
        match self.accept(body) {
            Ok(domain) => AnnouncementResponse::accepted(domain),
            Err(FederationError::Store(err)) => {
                error!(reason = %err, "failed to persist announced instance");
                AnnouncementResponse::rejected("store")
            }
            Err(err) => {
                debug!(reason = err.reason(), detail = %err, "rejected instance announcement");
                AnnouncementResponse::rejected(err.reason())
            }
        }
    }

    fn public_instances(&self) -> Vec<InstanceRecord> {
        if !self.ctx.config.enabled {
            return Vec::new();
        }
        match public_instances(self.ctx.store.as_ref(), self.ctx.now(), self.ctx.config.recent_window) {
            Ok(records) => records,
            Err(err) => {
                error!(reason = %err, "failed to list instances");
                Vec::new()
            }
        }
    }
}
