use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of the user that owns a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HabitCategory {
    Health,
    Productivity,
    Finance,
    Relationships,
    Learning,
    #[serde(rename = "Spiritual/Mental")]
    SpiritualMental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeCategory {
    #[serde(rename = "18-25")]
    Age18To25,
    #[serde(rename = "26-35")]
    Age26To35,
    #[serde(rename = "36-45")]
    Age36To45,
    #[serde(rename = "46+")]
    Age46Plus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner: OwnerId,
    pub name: String,
    pub category: HabitCategory,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One "done" mark for a habit. Never updated, only inserted or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub id: Uuid,
    pub owner: OwnerId,
    pub habit_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub owner: OwnerId,
    pub name: String,
    pub importance: String,
    pub image_url: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A FlexBook journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner: OwnerId,
    pub title: String,
    pub caption: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub owner: OwnerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingSurvey {
    pub owner: OwnerId,
    pub age_category: AgeCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    OldMe,
    NewMe,
}

/// Onboarding self-assessment: who the user was ("old me") and who they want
/// to become ("new me").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assessment_type", rename_all = "snake_case")]
pub enum Assessment {
    OldMe {
        limiting_beliefs: String,
        bad_habits: String,
        time_wasters: String,
        energy_drainers: String,
        growth_blockers: String,
    },
    NewMe {
        new_beliefs: String,
        empowering_habits: String,
        time_investment: String,
        energy_gains: String,
        growth_areas: String,
    },
}

impl Assessment {
    pub fn kind(&self) -> AssessmentKind {
        match self {
            Assessment::OldMe { .. } => AssessmentKind::OldMe,
            Assessment::NewMe { .. } => AssessmentKind::NewMe,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAssessment {
    pub owner: OwnerId,
    pub assessment: Assessment,
    pub updated_at: DateTime<Utc>,
}

/// Everything the service persists, written to disk as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub completions: Vec<CompletionEvent>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub profiles: BTreeMap<OwnerId, Profile>,
    #[serde(default)]
    pub surveys: BTreeMap<OwnerId, OnboardingSurvey>,
    #[serde(default)]
    pub assessments: Vec<StoredAssessment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabitInput {
    pub name: String,
    pub category: HabitCategory,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub name: String,
    pub importance: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

impl GoalInput {
    /// Parsed expiry date; only meaningful after validation.
    pub fn expiry(&self) -> Option<NaiveDate> {
        self.expiry_date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub caption: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyInput {
    pub age_category: AgeCategory,
}

/// Onboarding step that creates a goal together with the habit serving it.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalBuilderInput {
    pub goal: GoalInput,
    pub habit: HabitInput,
}

#[derive(Debug, Serialize)]
pub struct GoalBuilderResponse {
    pub goal: Goal,
    pub habit: Habit,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub habit_id: Uuid,
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
    pub day: String,
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub name: String,
    pub completions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthProgress {
    pub month: String,
    pub days_in_month: u32,
    pub completed_days: u32,
    pub completion_rate_percent: u32,
    pub weeks: Vec<WeekBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitStats {
    pub habit_id: Uuid,
    pub name: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completion_rate: u32,
    pub weekly: Vec<DayProgress>,
    pub monthly: MonthProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachMessage {
    pub date: NaiveDate,
    pub text: String,
}
