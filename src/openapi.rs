use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Atelier Storefront API",
        version = "0.3.0",
        description = r#"
Checkout and order backend for the Atelier art storefront.

Carts are re-validated against the catalog on the server, payment intents
are created with processor-calculated tax, and orders are materialized from
signed payment webhooks. The confirmation page resolves the webhook race by
polling the order lookup endpoint.
        "#,
        contact(
            name = "Atelier Engineering",
            email = "engineering@atelier.gallery"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.atelier.gallery", description = "Production"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Cart validation and payment intent creation"),
        (name = "Payments", description = "Payment processor webhooks"),
        (name = "Orders", description = "Order lookup and administration"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::checkout::validate_cart,
        crate::handlers::checkout::create_payment_intent,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::orders::lookup_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::add_order_note,
        crate::handlers::orders::set_tracking_number,
    ),
    components(
        schemas(
            crate::handlers::checkout::ValidateCartRequest,
            crate::handlers::orders::UpdateStatusRequest,
            crate::handlers::orders::AddNoteRequest,
            crate::handlers::orders::SetTrackingRequest,
            crate::services::cart_validation::CartItemInput,
            crate::services::cart_validation::ValidatedCartItem,
            crate::services::cart_validation::ValidatedCart,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::PaymentIntentOutcome,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;
