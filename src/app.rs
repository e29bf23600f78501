use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/u", get(handlers::open_board))
        .route("/u/:owner", get(handlers::board_page))
        .route("/u/:owner/habits/:id/toggle", post(handlers::board_toggle))
        .route(
            "/api/habits",
            get(handlers::list_habits).post(handlers::create_habit),
        )
        .route(
            "/api/habits/:id",
            get(handlers::get_habit)
                .put(handlers::update_habit)
                .delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/toggle", post(handlers::toggle_habit))
        .route("/api/habits/:id/stats", get(handlers::get_habit_stats))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/stats/stream", get(handlers::stream_stats))
        .route("/api/dashboard/month", get(handlers::get_dashboard_month))
        .route(
            "/api/goals",
            get(handlers::list_goals).post(handlers::create_goal),
        )
        .route(
            "/api/goals/:id",
            get(handlers::get_goal)
                .put(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/posts/:id",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::put_profile),
        )
        .route(
            "/api/onboarding/survey",
            get(handlers::get_survey).put(handlers::put_survey),
        )
        .route("/api/onboarding/goal", post(handlers::goal_builder))
        .route(
            "/api/assessments",
            get(handlers::list_assessments).put(handlers::put_assessment),
        )
        .route("/api/coach", get(handlers::get_coach))
        .with_state(state)
}
