use crate::models::{Assessment, GoalInput, HabitInput, PostInput, ProfileInput};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Per-field messages for a rejected form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&mut self, field: &'static str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.fields.keys().copied().collect();
        write!(f, "validation failed for {}", names.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_habit(input: &HabitInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require("name", &input.name, "Habit name is required");
    errors.require("description", &input.description, "Habit description is required");
    errors.into_result()
}

pub fn validate_goal(input: &GoalInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require("name", &input.name, "Goal name is required");
    errors.require("importance", &input.importance, "Tell us why this goal matters");
    if let Some(expiry) = input.expiry_date.as_deref().map(str::trim) {
        if !expiry.is_empty() && parse_day(expiry).is_err() {
            errors.add("expiry_date", "Expiry date must be YYYY-MM-DD");
        }
    }
    check_image_url(&mut errors, input.image_url.as_deref());
    errors.into_result()
}

pub fn validate_post(input: &PostInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require("title", &input.title, "Title is required");
    errors.require("caption", &input.caption, "Caption is required");
    check_image_url(&mut errors, input.image_url.as_deref());
    errors.into_result()
}

pub fn validate_profile(input: &ProfileInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require("first_name", &input.first_name, "First name is required");
    errors.require("last_name", &input.last_name, "Last name is required");
    if !is_email(input.email.trim()) {
        errors.add("email", "Invalid email address");
    }
    errors.into_result()
}

pub fn validate_assessment(assessment: &Assessment) -> Result<(), ValidationErrors> {
    const REQUIRED: &str = "This field is required";
    let mut errors = ValidationErrors::default();
    match assessment {
        Assessment::OldMe {
            limiting_beliefs,
            bad_habits,
            time_wasters,
            energy_drainers,
            growth_blockers,
        } => {
            errors.require("limiting_beliefs", limiting_beliefs, REQUIRED);
            errors.require("bad_habits", bad_habits, REQUIRED);
            errors.require("time_wasters", time_wasters, REQUIRED);
            errors.require("energy_drainers", energy_drainers, REQUIRED);
            errors.require("growth_blockers", growth_blockers, REQUIRED);
        }
        Assessment::NewMe {
            new_beliefs,
            empowering_habits,
            time_investment,
            energy_gains,
            growth_areas,
        } => {
            errors.require("new_beliefs", new_beliefs, REQUIRED);
            errors.require("empowering_habits", empowering_habits, REQUIRED);
            errors.require("time_investment", time_investment, REQUIRED);
            errors.require("energy_gains", energy_gains, REQUIRED);
            errors.require("growth_areas", growth_areas, REQUIRED);
        }
    }
    errors.into_result()
}

/// Parses a `YYYY-MM-DD` calendar day.
pub fn parse_day(value: &str) -> Result<NaiveDate, ValidationErrors> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationErrors::single("date", "Date must be YYYY-MM-DD"))
}

fn check_image_url(errors: &mut ValidationErrors, url: Option<&str>) {
    let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
        return;
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.add("image_url", "Image URL must start with http:// or https://");
    }
}

fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}
