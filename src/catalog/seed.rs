//! Built-in catalog content
//!
//! The demo users, templates and prompts the client ships with.

use super::schema::{GuidedTemplate, Prompt, TemplateStep, User};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn user(id: &str, name: &str, username: &str, avatar: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        username: username.to_string(),
        avatar: avatar.to_string(),
    }
}

fn step(
    id: &str,
    order: u32,
    title: &str,
    description: &str,
    emoji: &str,
    duration_seconds: u32,
    is_optional: bool,
) -> TemplateStep {
    TemplateStep {
        id: id.to_string(),
        order,
        title: title.to_string(),
        description: description.to_string(),
        emoji: emoji.to_string(),
        duration_seconds,
        is_optional,
    }
}

fn template(id: &str, title: &str, estimated: u32, steps: Vec<TemplateStep>) -> GuidedTemplate {
    GuidedTemplate {
        id: id.to_string(),
        title: title.to_string(),
        steps,
        estimated_duration_seconds: estimated,
    }
}

fn jan_15(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

pub fn users() -> Vec<User> {
    vec![
        user("1", "Justin Chen", "justin", "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=150&h=150&fit=crop&crop=face"),
        user("2", "Amy Rodriguez", "amy", "https://images.unsplash.com/photo-1494790108755-2616b612b786?w=150&h=150&fit=crop&crop=face&auto=format&q=80"),
        user("3", "Maya Patel", "maya", "https://images.unsplash.com/photo-1438761681033-6461ffad8d80?w=150&h=150&fit=crop&crop=face"),
        user("4", "Piper Thompson", "piper", "https://images.unsplash.com/photo-1534528741775-53994a69daeb?w=150&h=150&fit=crop&crop=face&auto=format&q=80"),
    ]
}

pub fn templates() -> Vec<GuidedTemplate> {
    vec![
        template(
            "morning-routine",
            "Morning Routine",
            45,
            vec![
                step("step1", 1, "Wake Up", "Show us what you look like when you wake up", "😴", 10, false),
                step("step2", 2, "Breakfast", "What's for breakfast?", "🍳", 15, false),
                step("step3", 3, "OOTD", "OOTD, let's see the fit!", "👗", 12, false),
                step("step4", 4, "Looking Forward", "Say one thing you're looking forward to today", "💬", 8, false),
            ],
        ),
        template(
            "work-day",
            "Day at Work",
            57,
            vec![
                step("step1", 1, "Commute", "Show us your commute to work", "🚇", 15, true),
                step("step2", 2, "Workspace", "Give us a tour of your workspace", "💼", 20, false),
                step("step3", 3, "Lunch Break", "What are you having for lunch?", "🥪", 12, true),
                step("step4", 4, "Work Highlight", "Share one highlight from your work day", "✨", 10, false),
            ],
        ),
        template(
            "gym-session",
            "Gym Session",
            45,
            vec![
                step("step1", 1, "Pre-Workout", "Show us your pre-workout routine", "💪", 12, true),
                step("step2", 2, "Workout", "Film your main workout exercise", "🏋️", 25, false),
                step("step3", 3, "Post-Workout", "How do you feel after your workout?", "😅", 8, false),
            ],
        ),
        template(
            "night-routine",
            "Night Routine",
            53,
            vec![
                step("step1", 1, "Evening Wind Down", "Show us how you start winding down for the night", "🌙", 12, false),
                step("step2", 2, "Skincare Routine", "What's your evening skincare routine?", "🧴", 15, true),
                step("step3", 3, "Pajamas", "Show us your cozy pajamas!", "🛏️", 8, false),
                step("step4", 4, "Bedtime Story", "What are you reading or watching before bed?", "📚", 10, true),
                step("step5", 5, "Goodnight", "Say goodnight and share one thing you're grateful for today", "😴", 8, false),
            ],
        ),
    ]
}

pub fn prompts(users: &[User], templates: &[GuidedTemplate]) -> Vec<Prompt> {
    let entries = [
        ("1", "Justin wants to see your morning routine", "Justin is curious about how you start your day!", 0, 1, (8, 0)),
        ("2", "Amy wants to see your day at work", "Amy wants to know what your work day looks like!", 1, 2, (9, 30)),
        ("3", "Maya wants to see your gym session", "Maya is inspired by your fitness journey!", 2, 0, (10, 15)),
        ("4", "Piper wants to see your night routine", "Piper wants to know how you wind down for the night!", 3, 0, (11, 0)),
    ];

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, (id, title, description, from, to, (hour, minute)))| {
            let created_at = jan_15(*hour, *minute);
            Some(Prompt {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                from_user: users.get(*from)?.clone(),
                to_user: users.get(*to)?.clone(),
                created_at,
                expires_at: Some(created_at + Duration::days(1)),
                is_completed: false,
                template: templates.get(index).cloned(),
            })
        })
        .collect()
}
