use crate::{
    error::panic_response,
    handlers::*,
    middleware::x402_middleware_layer,
};
use axum::{
    extract::Request,
    middleware::{self as axum_middleware, Next},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// Full application router. The payment gate wraps every route; it lets
/// unpriced paths straight through.
pub fn build_router(state: AppState) -> Router {
    let gate = state.gate.clone();

    // Public endpoints (no payment required)
    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/info", get(server_info));

    // Protected endpoints: one exact route per priced path, so a request
    // only reaches tier content under the path the gate priced.
    for path in gate.pricing().paths() {
        router = router.route(&path, get(tier_content));
    }

    router
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum_middleware::from_fn(move |req: Request, next: Next| {
            let gate = gate.clone();
            async move { x402_middleware_layer(gate, req, next).await }
        }))
        // Headers stay out of spans: X-PAYMENT carries signed authorizations.
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CorsLayer::permissive())
}
