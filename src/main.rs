use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizclash::event::EventBus;
use quizclash::game::handlers as game_handlers;
use quizclash::room::cleanup_task::{start_cleanup_task, CleanupConfig};
use quizclash::room::handlers as room_handlers;
use quizclash::room::repository::InMemoryRoomRepository;
use quizclash::shared::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizclash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting QuizClash game server");

    // Single-process authority: all room state lives in memory behind the
    // repository trait.
    let room_repository = Arc::new(InMemoryRoomRepository::new());
    let event_bus = EventBus::new();
    let app_state = AppState::new(room_repository.clone(), event_bus);

    // Expired rooms are reaped in the background
    tokio::spawn(start_cleanup_task(
        room_repository,
        Arc::clone(&app_state.controller),
        CleanupConfig::default(),
    ));

    let app = Router::new()
        .route("/rooms", post(room_handlers::create_room))
        .route("/rooms/:code", get(room_handlers::get_room))
        .route("/rooms/:code/leaderboard", get(room_handlers::get_leaderboard))
        .route("/rooms/:code/join", post(room_handlers::join_room))
        .route("/rooms/:code/kick", post(room_handlers::kick_player))
        .route("/rooms/:code/presence", post(room_handlers::set_presence))
        .route("/rooms/:code/writing", post(game_handlers::start_writing))
        .route("/rooms/:code/writing/end", post(game_handlers::end_writing))
        .route("/rooms/:code/questions", post(game_handlers::submit_question))
        .route(
            "/rooms/:code/questions/:question_id/delete",
            post(game_handlers::delete_question),
        )
        .route("/rooms/:code/quiz", post(game_handlers::start_quiz))
        .route("/rooms/:code/answers", post(game_handlers::submit_answer))
        .route("/rooms/:code/quiz/next", post(game_handlers::next_question))
        .route("/rooms/:code/reveal", post(game_handlers::advance_reveal))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind listener");
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await.expect("server error");
}
