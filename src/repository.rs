//! Owner-scoped access to stored rows.
//!
//! Each entity gets its own narrow trait so that the stats and coach logic can
//! run against any store. [`AppData`] implements all of them and is used both
//! by the server and as the in-memory fake in tests. Rows owned by someone
//! else are indistinguishable from missing rows.

use crate::models::{
    AgeCategory, AppData, Assessment, CompletionEvent, Goal, GoalInput, Habit, HabitInput,
    OnboardingSurvey, OwnerId, Post, PostInput, Profile, ProfileInput, StoredAssessment,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

/// Inclusive bounds on a completion timestamp. Open ends match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// The whole UTC calendar day.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self::between(start, start + Duration::days(1) - Duration::milliseconds(1))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

pub trait HabitRepository {
    fn list_habits(&self, owner: &OwnerId) -> Vec<Habit>;
    fn get_habit(&self, owner: &OwnerId, id: Uuid) -> Option<Habit>;
    fn create_habit(&mut self, owner: &OwnerId, input: &HabitInput, now: DateTime<Utc>) -> Habit;
    fn update_habit(&mut self, owner: &OwnerId, id: Uuid, input: &HabitInput) -> Option<Habit>;
    /// Also removes the habit's completion events.
    fn delete_habit(&mut self, owner: &OwnerId, id: Uuid) -> bool;
}

pub trait CompletionRepository {
    /// Events for one habit, oldest first.
    fn list_completions(&self, owner: &OwnerId, habit_id: Uuid, range: DateRange)
    -> Vec<CompletionEvent>;
    /// Events across all of the owner's habits, oldest first.
    fn list_owner_completions(&self, owner: &OwnerId, range: DateRange) -> Vec<CompletionEvent>;
    fn find_completion_on_day(
        &self,
        owner: &OwnerId,
        habit_id: Uuid,
        day: NaiveDate,
    ) -> Option<CompletionEvent>;
    fn insert_completion(
        &mut self,
        owner: &OwnerId,
        habit_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> CompletionEvent;
    fn delete_completion(&mut self, owner: &OwnerId, id: Uuid) -> bool;
}

pub trait GoalRepository {
    /// Newest first.
    fn list_goals(&self, owner: &OwnerId) -> Vec<Goal>;
    fn get_goal(&self, owner: &OwnerId, id: Uuid) -> Option<Goal>;
    fn create_goal(&mut self, owner: &OwnerId, input: &GoalInput, now: DateTime<Utc>) -> Goal;
    fn update_goal(&mut self, owner: &OwnerId, id: Uuid, input: &GoalInput) -> Option<Goal>;
    fn delete_goal(&mut self, owner: &OwnerId, id: Uuid) -> bool;
}

pub trait PostRepository {
    /// Newest first.
    fn list_posts(&self, owner: &OwnerId) -> Vec<Post>;
    fn get_post(&self, owner: &OwnerId, id: Uuid) -> Option<Post>;
    fn create_post(&mut self, owner: &OwnerId, input: &PostInput, now: DateTime<Utc>) -> Post;
    fn update_post(&mut self, owner: &OwnerId, id: Uuid, input: &PostInput) -> Option<Post>;
    fn delete_post(&mut self, owner: &OwnerId, id: Uuid) -> bool;
}

pub trait ProfileRepository {
    fn get_profile(&self, owner: &OwnerId) -> Option<Profile>;
    fn upsert_profile(&mut self, owner: &OwnerId, input: &ProfileInput, now: DateTime<Utc>)
    -> Profile;
    fn get_survey(&self, owner: &OwnerId) -> Option<OnboardingSurvey>;
    fn upsert_survey(
        &mut self,
        owner: &OwnerId,
        age_category: AgeCategory,
        now: DateTime<Utc>,
    ) -> OnboardingSurvey;
    fn list_assessments(&self, owner: &OwnerId) -> Vec<Assessment>;
    /// Replaces any stored assessment of the same kind.
    fn upsert_assessment(&mut self, owner: &OwnerId, assessment: Assessment, now: DateTime<Utc>);
}

impl HabitRepository for AppData {
    fn list_habits(&self, owner: &OwnerId) -> Vec<Habit> {
        self.habits
            .iter()
            .filter(|habit| &habit.owner == owner)
            .cloned()
            .collect()
    }

    fn get_habit(&self, owner: &OwnerId, id: Uuid) -> Option<Habit> {
        self.habits
            .iter()
            .find(|habit| habit.id == id && &habit.owner == owner)
            .cloned()
    }

    fn create_habit(&mut self, owner: &OwnerId, input: &HabitInput, now: DateTime<Utc>) -> Habit {
        let habit = Habit {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            name: input.name.trim().to_string(),
            category: input.category,
            description: input.description.trim().to_string(),
            created_at: now,
        };
        self.habits.push(habit.clone());
        habit
    }

    fn update_habit(&mut self, owner: &OwnerId, id: Uuid, input: &HabitInput) -> Option<Habit> {
        let habit = self
            .habits
            .iter_mut()
            .find(|habit| habit.id == id && &habit.owner == owner)?;
        habit.name = input.name.trim().to_string();
        habit.category = input.category;
        habit.description = input.description.trim().to_string();
        Some(habit.clone())
    }

    fn delete_habit(&mut self, owner: &OwnerId, id: Uuid) -> bool {
        let before = self.habits.len();
        self.habits
            .retain(|habit| !(habit.id == id && &habit.owner == owner));
        if self.habits.len() == before {
            return false;
        }
        self.completions
            .retain(|event| !(event.habit_id == id && &event.owner == owner));
        true
    }
}

impl CompletionRepository for AppData {
    fn list_completions(
        &self,
        owner: &OwnerId,
        habit_id: Uuid,
        range: DateRange,
    ) -> Vec<CompletionEvent> {
        let mut events: Vec<_> = self
            .completions
            .iter()
            .filter(|event| {
                event.habit_id == habit_id
                    && &event.owner == owner
                    && range.contains(event.completed_at)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.completed_at);
        events
    }

    fn list_owner_completions(&self, owner: &OwnerId, range: DateRange) -> Vec<CompletionEvent> {
        let mut events: Vec<_> = self
            .completions
            .iter()
            .filter(|event| &event.owner == owner && range.contains(event.completed_at))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.completed_at);
        events
    }

    fn find_completion_on_day(
        &self,
        owner: &OwnerId,
        habit_id: Uuid,
        day: NaiveDate,
    ) -> Option<CompletionEvent> {
        let range = DateRange::day(day);
        self.completions
            .iter()
            .find(|event| {
                event.habit_id == habit_id
                    && &event.owner == owner
                    && range.contains(event.completed_at)
            })
            .cloned()
    }

    fn insert_completion(
        &mut self,
        owner: &OwnerId,
        habit_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> CompletionEvent {
        let event = CompletionEvent {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            habit_id,
            completed_at,
        };
        self.completions.push(event.clone());
        event
    }

    fn delete_completion(&mut self, owner: &OwnerId, id: Uuid) -> bool {
        let before = self.completions.len();
        self.completions
            .retain(|event| !(event.id == id && &event.owner == owner));
        self.completions.len() != before
    }
}

impl GoalRepository for AppData {
    fn list_goals(&self, owner: &OwnerId) -> Vec<Goal> {
        let mut goals: Vec<_> = self
            .goals
            .iter()
            .filter(|goal| &goal.owner == owner)
            .cloned()
            .collect();
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        goals
    }

    fn get_goal(&self, owner: &OwnerId, id: Uuid) -> Option<Goal> {
        self.goals
            .iter()
            .find(|goal| goal.id == id && &goal.owner == owner)
            .cloned()
    }

    fn create_goal(&mut self, owner: &OwnerId, input: &GoalInput, now: DateTime<Utc>) -> Goal {
        let goal = Goal {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            name: input.name.trim().to_string(),
            importance: input.importance.trim().to_string(),
            image_url: non_blank(input.image_url.as_deref()),
            expiry_date: input.expiry(),
            created_at: now,
        };
        self.goals.push(goal.clone());
        goal
    }

    fn update_goal(&mut self, owner: &OwnerId, id: Uuid, input: &GoalInput) -> Option<Goal> {
        let goal = self
            .goals
            .iter_mut()
            .find(|goal| goal.id == id && &goal.owner == owner)?;
        goal.name = input.name.trim().to_string();
        goal.importance = input.importance.trim().to_string();
        goal.image_url = non_blank(input.image_url.as_deref());
        goal.expiry_date = input.expiry();
        Some(goal.clone())
    }

    fn delete_goal(&mut self, owner: &OwnerId, id: Uuid) -> bool {
        let before = self.goals.len();
        self.goals
            .retain(|goal| !(goal.id == id && &goal.owner == owner));
        self.goals.len() != before
    }
}

impl PostRepository for AppData {
    fn list_posts(&self, owner: &OwnerId) -> Vec<Post> {
        let mut posts: Vec<_> = self
            .posts
            .iter()
            .filter(|post| &post.owner == owner)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }

    fn get_post(&self, owner: &OwnerId, id: Uuid) -> Option<Post> {
        self.posts
            .iter()
            .find(|post| post.id == id && &post.owner == owner)
            .cloned()
    }

    fn create_post(&mut self, owner: &OwnerId, input: &PostInput, now: DateTime<Utc>) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            title: input.title.trim().to_string(),
            caption: input.caption.trim().to_string(),
            image_url: non_blank(input.image_url.as_deref()),
            created_at: now,
        };
        self.posts.push(post.clone());
        post
    }

    fn update_post(&mut self, owner: &OwnerId, id: Uuid, input: &PostInput) -> Option<Post> {
        let post = self
            .posts
            .iter_mut()
            .find(|post| post.id == id && &post.owner == owner)?;
        post.title = input.title.trim().to_string();
        post.caption = input.caption.trim().to_string();
        post.image_url = non_blank(input.image_url.as_deref());
        Some(post.clone())
    }

    fn delete_post(&mut self, owner: &OwnerId, id: Uuid) -> bool {
        let before = self.posts.len();
        self.posts
            .retain(|post| !(post.id == id && &post.owner == owner));
        self.posts.len() != before
    }
}

impl ProfileRepository for AppData {
    fn get_profile(&self, owner: &OwnerId) -> Option<Profile> {
        self.profiles.get(owner).cloned()
    }

    fn upsert_profile(
        &mut self,
        owner: &OwnerId,
        input: &ProfileInput,
        now: DateTime<Utc>,
    ) -> Profile {
        let profile = self
            .profiles
            .entry(owner.clone())
            .or_insert_with(|| Profile {
                owner: owner.clone(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                created_at: now,
                updated_at: now,
            });
        profile.first_name = input.first_name.trim().to_string();
        profile.last_name = input.last_name.trim().to_string();
        profile.email = input.email.trim().to_string();
        profile.updated_at = now;
        profile.clone()
    }

    fn get_survey(&self, owner: &OwnerId) -> Option<OnboardingSurvey> {
        self.surveys.get(owner).cloned()
    }

    fn upsert_survey(
        &mut self,
        owner: &OwnerId,
        age_category: AgeCategory,
        now: DateTime<Utc>,
    ) -> OnboardingSurvey {
        let survey = self
            .surveys
            .entry(owner.clone())
            .or_insert_with(|| OnboardingSurvey {
                owner: owner.clone(),
                age_category,
                created_at: now,
                updated_at: now,
            });
        survey.age_category = age_category;
        survey.updated_at = now;
        survey.clone()
    }

    fn list_assessments(&self, owner: &OwnerId) -> Vec<Assessment> {
        self.assessments
            .iter()
            .filter(|stored| &stored.owner == owner)
            .map(|stored| stored.assessment.clone())
            .collect()
    }

    fn upsert_assessment(&mut self, owner: &OwnerId, assessment: Assessment, now: DateTime<Utc>) {
        let kind = assessment.kind();
        match self
            .assessments
            .iter_mut()
            .find(|stored| &stored.owner == owner && stored.assessment.kind() == kind)
        {
            Some(stored) => {
                stored.assessment = assessment;
                stored.updated_at = now;
            }
            None => self.assessments.push(StoredAssessment {
                owner: owner.clone(),
                assessment,
                updated_at: now,
            }),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
