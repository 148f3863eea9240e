//! # Federation Services
//!
//! Wires domain logic to the driven ports:
//!
//! - [`DomainGuard`]: SSRF address filtering
//! - [`InstanceIdentity`]: who we are and how we sign
//! - [`RecordValidator`]: the shared acceptance pipeline
//! - [`FederationAnnouncer`] / [`FederationCrawler`]: outbound federation
//! - [`InboundHandler`]: the `FederationApi` for the web layer
//! - [`FederationRuntime`]: loop threads and shutdown

pub mod announcer;
pub mod context;
pub mod crawler;
pub mod guard;
pub mod identity;
pub mod inbound;
pub mod registry;
pub mod runtime;
pub mod validator;

pub use announcer::{AnnounceReport, FederationAnnouncer};
pub use context::FederationContext;
pub use crawler::{CrawlEnqueue, CrawlReport, FederationCrawler};
pub use guard::DomainGuard;
pub use identity::{resolve_instance_domain, DomainSource, InstanceIdentity, InstanceProfile};
pub use inbound::InboundHandler;
pub use registry::{persist_instance, public_instances};
pub use runtime::{FederationHandle, FederationRuntime};
pub use validator::{RecordValidator, ValidatedRecord};
