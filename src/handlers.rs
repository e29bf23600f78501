use crate::changes::{Change, ChangeFilter, ChangeKind, Table};
use crate::coach::{CoachError, build_prompt};
use crate::errors::AppError;
use crate::extract::Owner;
use crate::models::{
    Assessment, CoachMessage, Goal, GoalBuilderInput, GoalBuilderResponse, GoalInput, Habit,
    HabitInput, HabitStats, MonthProgress, OnboardingSurvey, OwnerId, Post, PostInput, Profile,
    ProfileInput, SurveyInput, ToggleRequest, ToggleResponse,
};
use crate::repository::{GoalRepository, HabitRepository, PostRepository, ProfileRepository};
use crate::state::AppState;
use crate::stats::{all_habit_stats, dashboard_month, habit_stats, toggle_completion};
use crate::ui::{render_board, render_landing};
use crate::validation::{
    parse_day, validate_assessment, validate_goal, validate_habit, validate_post,
    validate_profile,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        Html, Redirect,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use futures_util::{Stream, StreamExt, stream};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn health() -> &'static str {
    "ok"
}

// ---- server-rendered pages ----

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct BoardToggleForm {
    pub date: String,
}

pub async fn index() -> Html<String> {
    Html(render_landing())
}

pub async fn open_board(Query(query): Query<BoardQuery>) -> Result<Redirect, AppError> {
    let owner = query.owner.trim();
    if owner.is_empty() {
        return Err(AppError::bad_request("owner must not be empty"));
    }
    Ok(Redirect::to(&format!("/u/{}", urlencoding::encode(owner))))
}

pub async fn board_page(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Html<String> {
    let owner = OwnerId::new(owner);
    let now = Utc::now();
    let data = state.data.lock().await;
    let stats = all_habit_stats(&*data, &owner, now);
    let month = dashboard_month(&*data, &owner, now);
    Html(render_board(&owner, now.date_naive(), &stats, &month))
}

pub async fn board_toggle(
    State(state): State<AppState>,
    Path((owner, habit_id)): Path<(String, Uuid)>,
    Form(form): Form<BoardToggleForm>,
) -> Result<Redirect, AppError> {
    let owner = OwnerId::new(owner);
    let day = parse_day(&form.date)?;
    apply_toggle(&state, &owner, habit_id, day).await?;
    Ok(Redirect::to(&format!("/u/{}", urlencoding::encode(owner.as_str()))))
}

// ---- habits ----

pub async fn list_habits(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Json<Vec<Habit>> {
    let data = state.data.lock().await;
    Json(data.list_habits(&owner))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, AppError> {
    let data = state.data.lock().await;
    data.get_habit(&owner, id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("habit"))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<HabitInput>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    validate_habit(&payload)?;

    let habit = state
        .mutate(|data| {
            let habit = data.create_habit(&owner, &payload, Utc::now());
            let change = Change::new(Table::Habits, ChangeKind::Insert, &owner, Some(habit.id));
            Ok((habit, vec![change]))
        })
        .await?;

    info!(%owner, habit_id = %habit.id, "created habit");
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    Json(payload): Json<HabitInput>,
) -> Result<Json<Habit>, AppError> {
    validate_habit(&payload)?;

    let habit = state
        .mutate(|data| {
            let habit = data
                .update_habit(&owner, id, &payload)
                .ok_or_else(|| AppError::not_found("habit"))?;
            let change = Change::new(Table::Habits, ChangeKind::Update, &owner, Some(id));
            Ok((habit, vec![change]))
        })
        .await?;

    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .mutate(|data| {
            if !data.delete_habit(&owner, id) {
                return Err(AppError::not_found("habit"));
            }
            let change = Change::new(Table::Habits, ChangeKind::Delete, &owner, Some(id));
            Ok(((), vec![change]))
        })
        .await?;

    info!(%owner, habit_id = %id, "deleted habit");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_habit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let day = parse_day(&payload.date)?;
    let response = apply_toggle(&state, &owner, id, day).await?;
    Ok(Json(response))
}

async fn apply_toggle(
    state: &AppState,
    owner: &OwnerId,
    habit_id: Uuid,
    day: chrono::NaiveDate,
) -> Result<ToggleResponse, AppError> {
    state
        .mutate(|data| {
            let (response, change) = toggle_completion(data, owner, habit_id, day)
                .ok_or_else(|| AppError::not_found("habit"))?;
            Ok((response, vec![change]))
        })
        .await
}

// ---- statistics ----

pub async fn get_habit_stats(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<HabitStats>, AppError> {
    let data = state.data.lock().await;
    let habit = data
        .get_habit(&owner, id)
        .ok_or_else(|| AppError::not_found("habit"))?;
    Ok(Json(habit_stats(&*data, &owner, &habit, Utc::now())))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Json<Vec<HabitStats>> {
    let data = state.data.lock().await;
    Json(all_habit_stats(&*data, &owner, Utc::now()))
}

pub async fn get_dashboard_month(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Json<MonthProgress> {
    let data = state.data.lock().await;
    Json(dashboard_month(&*data, &owner, Utc::now()))
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub habit_id: Option<Uuid>,
}

/// Sends the owner's stats once, then again after every completion change.
/// With `habit_id`, only that habit's stats and changes are streamed.
pub async fn stream_stats(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut filter = ChangeFilter::table(Table::Completions, owner.clone());
    if let Some(habit_id) = query.habit_id {
        let data = state.data.lock().await;
        data.get_habit(&owner, habit_id)
            .ok_or_else(|| AppError::not_found("habit"))?;
        filter = filter.habit(habit_id);
    }

    // Subscribe before the first snapshot so no change slips in between.
    let subscription = state.changes.subscribe(filter);
    let initial = stats_event(&state, &owner, query.habit_id).await;
    debug!(
        %owner,
        subscribers = state.changes.subscriber_count(),
        "stats stream opened"
    );

    let habit_id = query.habit_id;
    let updates = stream::unfold(
        (state, owner, subscription),
        move |(state, owner, mut subscription)| async move {
            let change = subscription.next().await?;
            debug!(%owner, habit_id = ?change.habit_id, "recomputing stats after change");
            let event = stats_event(&state, &owner, habit_id).await;
            Some((event, (state, owner, subscription)))
        },
    );

    let events = stream::iter([initial]).chain(updates).map(Ok);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn stats_event(state: &AppState, owner: &OwnerId, habit_id: Option<Uuid>) -> Event {
    let stats = {
        let data = state.data.lock().await;
        let mut stats = all_habit_stats(&*data, owner, Utc::now());
        if let Some(habit_id) = habit_id {
            stats.retain(|entry| entry.habit_id == habit_id);
        }
        stats
    };
    Event::default()
        .event("stats")
        .json_data(&stats)
        .unwrap_or_else(|err| {
            warn!("failed to encode stats event: {err}");
            Event::default().event("error").data(err.to_string())
        })
}

// ---- goals ----

pub async fn list_goals(State(state): State<AppState>, Owner(owner): Owner) -> Json<Vec<Goal>> {
    let data = state.data.lock().await;
    Json(data.list_goals(&owner))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Goal>, AppError> {
    let data = state.data.lock().await;
    data.get_goal(&owner, id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("goal"))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<GoalInput>,
) -> Result<(StatusCode, Json<Goal>), AppError> {
    validate_goal(&payload)?;

    let goal = state
        .mutate(|data| {
            let goal = data.create_goal(&owner, &payload, Utc::now());
            let change = Change::new(Table::Goals, ChangeKind::Insert, &owner, Some(goal.id));
            Ok((goal, vec![change]))
        })
        .await?;

    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalInput>,
) -> Result<Json<Goal>, AppError> {
    validate_goal(&payload)?;

    let goal = state
        .mutate(|data| {
            let goal = data
                .update_goal(&owner, id, &payload)
                .ok_or_else(|| AppError::not_found("goal"))?;
            let change = Change::new(Table::Goals, ChangeKind::Update, &owner, Some(id));
            Ok((goal, vec![change]))
        })
        .await?;

    Ok(Json(goal))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .mutate(|data| {
            if !data.delete_goal(&owner, id) {
                return Err(AppError::not_found("goal"));
            }
            let change = Change::new(Table::Goals, ChangeKind::Delete, &owner, Some(id));
            Ok(((), vec![change]))
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- FlexBook posts ----

pub async fn list_posts(State(state): State<AppState>, Owner(owner): Owner) -> Json<Vec<Post>> {
    let data = state.data.lock().await;
    Json(data.list_posts(&owner))
}

pub async fn get_post(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    let data = state.data.lock().await;
    data.get_post(&owner, id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("post"))
}

pub async fn create_post(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<PostInput>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    validate_post(&payload)?;

    let post = state
        .mutate(|data| {
            let post = data.create_post(&owner, &payload, Utc::now());
            let change = Change::new(Table::Posts, ChangeKind::Insert, &owner, Some(post.id));
            Ok((post, vec![change]))
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostInput>,
) -> Result<Json<Post>, AppError> {
    validate_post(&payload)?;

    let post = state
        .mutate(|data| {
            let post = data
                .update_post(&owner, id, &payload)
                .ok_or_else(|| AppError::not_found("post"))?;
            let change = Change::new(Table::Posts, ChangeKind::Update, &owner, Some(id));
            Ok((post, vec![change]))
        })
        .await?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .mutate(|data| {
            if !data.delete_post(&owner, id) {
                return Err(AppError::not_found("post"));
            }
            let change = Change::new(Table::Posts, ChangeKind::Delete, &owner, Some(id));
            Ok(((), vec![change]))
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- profile & onboarding ----

pub async fn get_profile(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Profile>, AppError> {
    let data = state.data.lock().await;
    data.get_profile(&owner)
        .map(Json)
        .ok_or_else(|| AppError::not_found("profile"))
}

pub async fn put_profile(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<ProfileInput>,
) -> Result<Json<Profile>, AppError> {
    validate_profile(&payload)?;

    let profile = state
        .mutate(|data| {
            let profile = data.upsert_profile(&owner, &payload, Utc::now());
            let change = Change::new(Table::Profiles, ChangeKind::Update, &owner, None);
            Ok((profile, vec![change]))
        })
        .await?;

    Ok(Json(profile))
}

pub async fn get_survey(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<OnboardingSurvey>, AppError> {
    let data = state.data.lock().await;
    data.get_survey(&owner)
        .map(Json)
        .ok_or_else(|| AppError::not_found("survey"))
}

pub async fn put_survey(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<SurveyInput>,
) -> Result<Json<OnboardingSurvey>, AppError> {
    let survey = state
        .mutate(|data| {
            let survey = data.upsert_survey(&owner, payload.age_category, Utc::now());
            let change = Change::new(Table::Profiles, ChangeKind::Update, &owner, None);
            Ok((survey, vec![change]))
        })
        .await?;
    Ok(Json(survey))
}

pub async fn list_assessments(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Json<Vec<Assessment>> {
    let data = state.data.lock().await;
    Json(data.list_assessments(&owner))
}

pub async fn put_assessment(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<Assessment>,
) -> Result<Json<Assessment>, AppError> {
    validate_assessment(&payload)?;

    state
        .mutate(|data| {
            data.upsert_assessment(&owner, payload.clone(), Utc::now());
            let change = Change::new(Table::Profiles, ChangeKind::Update, &owner, None);
            Ok(((), vec![change]))
        })
        .await?;
    Ok(Json(payload))
}

pub async fn goal_builder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<GoalBuilderInput>,
) -> Result<(StatusCode, Json<GoalBuilderResponse>), AppError> {
    let mut errors = match validate_goal(&payload.goal) {
        Ok(()) => Default::default(),
        Err(errors) => errors,
    };
    if let Err(habit_errors) = validate_habit(&payload.habit) {
        for (field, message) in habit_errors.fields {
            let field = match field {
                "name" => "habit_name",
                "description" => "habit_description",
                other => other,
            };
            errors.add(field, message);
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let now = Utc::now();
    let (goal, habit) = state
        .mutate(|data| {
            let goal = data.create_goal(&owner, &payload.goal, now);
            let habit = data.create_habit(&owner, &payload.habit, now);
            let changes = vec![
                Change::new(Table::Goals, ChangeKind::Insert, &owner, Some(goal.id)),
                Change::new(Table::Habits, ChangeKind::Insert, &owner, Some(habit.id)),
            ];
            Ok(((goal, habit), changes))
        })
        .await?;

    info!(%owner, goal_id = %goal.id, habit_id = %habit.id, "onboarding goal created");
    Ok((StatusCode::CREATED, Json(GoalBuilderResponse { goal, habit })))
}

// ---- coach ----

pub async fn get_coach(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<CoachMessage>, AppError> {
    state.coach.ensure_enabled()?;

    let today = Utc::now().date_naive();
    if let Some(message) = state.coach.cached(&owner, today).await {
        return Ok(Json(message));
    }

    let prompt = {
        let data = state.data.lock().await;
        let first_name = data
            .get_profile(&owner)
            .map(|profile| profile.first_name)
            .filter(|name| !name.is_empty())
            .ok_or(CoachError::ProfileIncomplete)?;
        build_prompt(
            &first_name,
            today,
            &data.list_goals(&owner),
            &data.list_assessments(&owner),
        )
    };

    let message = state.coach.generate(&owner, today, &prompt).await.map_err(|err| {
        warn!(%owner, "coach message failed: {err}");
        err
    })?;
    Ok(Json(message))
}
