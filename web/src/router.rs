use crate::{
    controller::health_check_controller, middleware::auth::require_auth, sse, AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::controller::{event_controller, notification_controller};

use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Mercurio Notification Broker API"
        ),
        paths(
            event_controller::unicast,
            event_controller::broadcast,
            sse::handler::stream,
            notification_controller::index,
            notification_controller::read,
            notification_controller::mark_read,
            notification_controller::mark_unread,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                broker::Event,
                broker::BroadcastEvent,
                crate::response::notification::EventAccepted,
                crate::response::notification::NotificationResponse,
                crate::response::notification::NotificationListResponse,
                crate::response::notification::MarkStatusResponse,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "mercurio", description = "Per-destination notification broker API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our bearer-token authentication requirement for gaining access to our
// API endpoints for OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(welcome_routes())
        .merge(health_routes())
        .merge(event_routes(app_state.clone()))
        .merge(client_notification_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn welcome_routes() -> Router {
    Router::new().route("/", get(health_check_controller::welcome))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/events/unicast", post(event_controller::unicast))
        .route("/api/events/broadcast", post(event_controller::broadcast))
        .route_layer(from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state)
}

fn client_notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/clients/:client_id/notifications/stream",
            get(sse::handler::stream),
        )
        .route(
            "/api/clients/:client_id/notifications",
            get(notification_controller::index),
        )
        .route(
            "/api/clients/:client_id/notifications/:notification_id",
            get(notification_controller::read),
        )
        .route(
            "/api/clients/:client_id/notifications/:notification_id/read",
            put(notification_controller::mark_read),
        )
        .route(
            "/api/clients/:client_id/notifications/:notification_id/unread",
            put(notification_controller::mark_unread),
        )
        .route_layer(from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state)
}
