pub mod config;
pub mod domain {
    pub mod payment;
    pub mod webhook;
}
pub mod error;
pub mod events;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod checkout;
        pub mod ops;
        pub mod status;
        pub mod webhook;
    }
    pub mod router;
}
pub mod repo;
pub mod service {
    pub mod preference_service;
    pub mod status_query;
    pub mod webhook_processor;
}
pub mod signature;

use events::EventPublisher;
use gateways::PaymentProviderGateway;
use repo::PaymentStore;
use service::preference_service::{CheckoutSettings, PreferenceService};
use service::status_query::StatusQuery;
use service::webhook_processor::WebhookProcessor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub preference_service: PreferenceService,
    pub webhook_processor: WebhookProcessor,
    pub status_query: StatusQuery,
    pub store: Arc<dyn PaymentStore>,
    pub publisher: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentProviderGateway>,
        publisher: Arc<dyn EventPublisher>,
        checkout: CheckoutSettings,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            preference_service: PreferenceService {
                store: store.clone(),
                gateway: gateway.clone(),
                checkout,
            },
            webhook_processor: WebhookProcessor {
                store: store.clone(),
                gateway,
                publisher: publisher.clone(),
                webhook_secret,
            },
            status_query: StatusQuery { store: store.clone() },
            store,
            publisher,
        }
    }
}
