// Library interface for LiftRS modules
// This allows integration tests to access the core functionality

pub mod achievements;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod formulas;
pub mod history;
pub mod import;
pub mod logging;
pub mod models;
pub mod overload;
pub mod recovery;
pub mod store;

// Re-export commonly used types for convenience
pub use models::*;
pub use achievements::{AchievementEngine, LevelSummary, UserStats, WorkoutTotals};
pub use database::SqliteStore;
pub use engine::{TrainingEngine, WorkoutCompletion};
pub use error::{LiftRsError, Result};
pub use forecast::{PrPrediction, StrengthTrendForecaster};
pub use history::SetHistoryProvider;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use overload::{ProgressionSuggestion, ProgressiveOverloadAnalyzer};
pub use recovery::{MuscleRecoveryReport, MuscleRecoveryTracker, RecoveryStatus};
pub use store::{EngineStore, InMemoryStore, TrainingStore};
