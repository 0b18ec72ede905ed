pub mod checkout;
pub mod orders;
pub mod payment_webhooks;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    payments::PaymentProcessor,
    services::{
        cart_validation::CartValidationService, checkout::CheckoutService,
        notifications::NotificationService, orders::OrderService,
        reconciliation::ReconciliationService,
    },
};
use std::sync::Arc;

/// Service container wired once at startup and shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub cart_validation: Arc<CartValidationService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let cart_validation = Arc::new(CartValidationService::new(db.clone(), config.clone()));
        let checkout = Arc::new(CheckoutService::new(
            cart_validation.clone(),
            processor,
            event_sender.clone(),
            config.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            db,
            event_sender.clone(),
            config.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(config.email.clone()));
        let reconciliation = Arc::new(ReconciliationService::new(
            orders.clone(),
            notifications.clone(),
            event_sender,
        ));

        Self {
            cart_validation,
            checkout,
            orders,
            reconciliation,
            notifications,
        }
    }
}
