pub mod app;
pub mod changes;
pub mod coach;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod state;
pub mod stats;
pub mod storage;
pub mod streaks;
pub mod ui;
pub mod validation;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
pub use streaks::{HabitMetrics, compute_metrics};
