// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, course, document, exit_ticket, poll},
    state::AppState,
    utils::jwt::{auth_middleware, professor_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, courses, documents, polls, tickets).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Course creation shares its path with the list, so the professor
    // check for it lives in the handler.
    let course_routes = Router::new()
        .route("/", get(course::list_courses).post(course::create_course))
        .route("/join", post(course::join_course))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let document_routes = Router::new()
        .route(
            "/",
            get(document::list_documents).post(document::upload_document),
        )
        .route("/{id}", delete(document::delete_document))
        .route("/{id}/questions", get(document::list_generated_questions))
        .route("/{id}/review", post(document::review_question))
        // Double middleware protection: Auth first, then professor check
        .layer(middleware::from_fn(professor_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let poll_routes = Router::new()
        // Student-facing routes (answer devices carry no account)
        .route("/active", get(poll::get_active_poll))
        .route("/{id}", get(poll::get_poll))
        .route("/{id}/vote", post(poll::vote))
        .route("/{id}/results", get(poll::poll_results))
        // Instructor routes
        .merge(
            Router::new()
                .route("/", get(poll::list_polls).post(poll::create_poll))
                .route("/{id}/toggle", post(poll::toggle_poll_active))
                .route("/{id}/countdown", post(poll::start_countdown))
                .route("/{id}/delete", delete(poll::delete_poll))
                .layer(middleware::from_fn(professor_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let ticket_routes = Router::new()
        .route("/active", get(exit_ticket::get_active_ticket))
        .route("/{id}", get(exit_ticket::get_ticket))
        .route("/{id}/submit", post(exit_ticket::submit_ticket_response))
        .merge(
            Router::new()
                .route(
                    "/",
                    get(exit_ticket::list_tickets).post(exit_ticket::create_ticket),
                )
                .route("/{id}/results", get(exit_ticket::ticket_results))
                .route("/{id}/toggle", post(exit_ticket::toggle_ticket_active))
                .route("/{id}/delete", delete(exit_ticket::delete_ticket))
                .layer(middleware::from_fn(professor_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/documents", document_routes)
        .nest("/api/polls", poll_routes)
        .nest("/api/tickets", ticket_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
