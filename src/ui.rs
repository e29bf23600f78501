use crate::models::{HabitStats, MonthProgress, OwnerId};
use chrono::NaiveDate;
use std::fmt::Write;

pub fn render_landing() -> String {
    LANDING_HTML.replace("{{STYLE}}", STYLE)
}

pub fn render_board(
    owner: &OwnerId,
    today: NaiveDate,
    stats: &[HabitStats],
    month: &MonthProgress,
) -> String {
    let owner_path = urlencoding::encode(owner.as_str());

    let cards = if stats.is_empty() {
        r#"<p class="empty">No habits yet. Create one through <code>POST /api/habits</code>.</p>"#
            .to_string()
    } else {
        stats
            .iter()
            .map(|habit| render_card(&owner_path, today, habit))
            .collect::<Vec<_>>()
            .join("\n")
    };

    BOARD_HTML
        .replace("{{STYLE}}", STYLE)
        .replace("{{OWNER}}", &escape_html(owner.as_str()))
        .replace("{{DATE}}", &today.to_string())
        .replace("{{MONTH}}", &escape_html(&month.month))
        .replace("{{MONTH_DONE}}", &month.completed_days.to_string())
        .replace("{{MONTH_DAYS}}", &month.days_in_month.to_string())
        .replace("{{MONTH_RATE}}", &month.completion_rate_percent.to_string())
        .replace("{{CARDS}}", &cards)
}

fn render_card(owner_path: &str, today: NaiveDate, habit: &HabitStats) -> String {
    let mut week = String::new();
    for day in &habit.weekly {
        let class = match (day.completed, day.date == today) {
            (true, _) => "day done",
            (false, true) => "day today",
            (false, false) => "day",
        };
        let _ = write!(
            week,
            r#"<form method="post" action="/u/{owner_path}/habits/{id}/toggle">
          <input type="hidden" name="date" value="{date}" />
          <button class="{class}" type="submit" title="{date}">{mark}<span>{label}</span></button>
        </form>"#,
            id = habit.habit_id,
            date = day.date,
            mark = if day.completed { "&#10003;" } else { "" },
            label = day.day,
        );
    }

    format!(
        r#"<section class="card">
      <h2>{name}</h2>
      <div class="metrics">
        <div><span class="label">Current streak</span><span class="value">{current} days</span></div>
        <div><span class="label">Completion rate</span><span class="value">{rate}%</span></div>
        <div><span class="label">Best streak</span><span class="value">{longest} days</span></div>
      </div>
      <div class="week">
        {week}
      </div>
    </section>"#,
        name = escape_html(&habit.name),
        current = habit.current_streak,
        rate = habit.completion_rate,
        longest = habit.longest_streak,
    )
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const STYLE: &str = r#"
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');

    :root {
      --bg-1: #f8f3e6;
      --bg-2: #c9e4d6;
      --ink: #2b2a28;
      --accent: #2f9e6e;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #e9f5ee 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      place-items: start center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(860px, 100%);
      display: grid;
      gap: 24px;
    }

    h1 {
      font-family: "Fraunces", "Georgia", serif;
      font-size: clamp(2rem, 4vw, 2.6rem);
      margin: 0;
    }

    .subtitle { margin: 4px 0 0; color: #5f5c57; }

    .card {
      background: var(--card);
      backdrop-filter: blur(12px);
      border-radius: 24px;
      box-shadow: var(--shadow);
      padding: 24px 28px;
      display: grid;
      gap: 18px;
    }

    .card h2 { margin: 0; font-size: 1.3rem; }

    .metrics {
      display: grid;
      grid-template-columns: repeat(3, 1fr);
      gap: 12px;
    }

    .metrics div {
      background: #f5f5f2;
      border-radius: 16px;
      padding: 14px;
      display: grid;
      gap: 4px;
      text-align: center;
    }

    .label { font-size: 0.85rem; color: #6b6862; }
    .value { font-size: 1.2rem; font-weight: 600; }

    .week { display: grid; grid-template-columns: repeat(7, 1fr); gap: 8px; }
    .week form { margin: 0; }

    .day {
      width: 100%;
      aspect-ratio: 1;
      border: none;
      border-radius: 50%;
      background: #ecebe6;
      color: var(--accent);
      font: inherit;
      font-size: 1.1rem;
      cursor: pointer;
      display: grid;
      place-items: center;
    }

    .day span { display: block; font-size: 0.7rem; color: #6b6862; }
    .day.done { background: #d3f0e1; }
    .day.today { outline: 2px solid var(--accent-2); }

    .empty { color: #6b6862; }

    input[type="text"] {
      font: inherit;
      padding: 10px 14px;
      border-radius: 12px;
      border: 1px solid #d8d6cf;
    }

    .primary {
      font: inherit;
      padding: 10px 18px;
      border: none;
      border-radius: 12px;
      background: var(--accent);
      color: white;
      cursor: pointer;
    }
"#;

const LANDING_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Habit Tracker</title>
  <style>{{STYLE}}</style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Habit Tracker</h1>
      <p class="subtitle">Small steps, every day.</p>
    </header>
    <section class="card">
      <form method="get" action="/u">
        <input type="text" name="owner" placeholder="Your user id" required />
        <button class="primary" type="submit">Open my habits</button>
      </form>
    </section>
  </main>
</body>
</html>
"#;

const BOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Habits for {{OWNER}}</title>
  <style>{{STYLE}}</style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Habits for {{OWNER}}</h1>
      <p class="subtitle">{{DATE}} &middot; {{MONTH}}: {{MONTH_DONE}} of {{MONTH_DAYS}} days ({{MONTH_RATE}}%)</p>
    </header>
    {{CARDS}}
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayProgress, WeekBucket};
    use uuid::Uuid;

    fn month() -> MonthProgress {
        MonthProgress {
            month: "March".to_string(),
            days_in_month: 31,
            completed_days: 4,
            completion_rate_percent: 13,
            weeks: vec![WeekBucket {
                name: "Week 1".to_string(),
                completions: 4,
            }],
        }
    }

    #[test]
    fn board_escapes_user_content() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let stats = vec![HabitStats {
            habit_id: Uuid::new_v4(),
            name: "<script>alert(1)</script>".to_string(),
            current_streak: 2,
            longest_streak: 7,
            completion_rate: 40,
            weekly: vec![DayProgress {
                day: "Wed".to_string(),
                date: today,
                completed: true,
            }],
            monthly: month(),
        }];
        let html = render_board(&OwnerId::new("a b"), today, &stats, &month());

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("/u/a%20b/habits/"));
        assert!(html.contains("7 days"));
        assert!(html.contains("4 of 31 days (13%)"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn empty_board_explains_next_step() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let html = render_board(&OwnerId::new("alice"), today, &[], &month());
        assert!(html.contains("No habits yet"));
    }

    #[test]
    fn toggle_links_percent_encode_the_owner() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let stats = vec![HabitStats {
            habit_id: Uuid::nil(),
            name: "Walk".to_string(),
            current_streak: 0,
            longest_streak: 0,
            completion_rate: 0,
            weekly: vec![DayProgress {
                day: "Wed".to_string(),
                date: today,
                completed: false,
            }],
            monthly: month(),
        }];

        let html = render_board(&OwnerId::new("a/b?é"), today, &stats, &month());
        assert!(html.contains(&format!("/u/a%2Fb%3F%C3%A9/habits/{}/toggle", Uuid::nil())));

        let html = render_board(&OwnerId::new("alice-01_x.y~z"), today, &stats, &month());
        assert!(html.contains("/u/alice-01_x.y~z/habits/"));
    }
}
