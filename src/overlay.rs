use anyhow::{Context, Result};
use base64::Engine;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::analyzer::{AnalysisRow, EventKind};
use crate::merchandise::{default_jersey, MerchandiseMatcher};

/// Seconds a goal advertisement stays on screen.
pub const AD_DURATION_SECS: u32 = 6;

const PLAYER_TEMPLATE_NAME: &str = "player.html";
const PLAYER_TEMPLATE: &str = include_str!("../static/player.html");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalEvent {
    pub timestamp: String,
    pub description: String,
}

impl GoalEvent {
    pub fn new(timestamp: &str, description: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            description: description.to_string(),
        }
    }
}

/// Goal moments found in analysed commentary.
pub fn goal_events(rows: &[AnalysisRow]) -> Vec<GoalEvent> {
    rows.iter()
        .filter(|row| row.has_event(EventKind::Goal))
        .map(|row| GoalEvent::new(&row.time, &row.context))
        .collect()
}

/// Placeholder goals used when the commentary mentions none.
pub fn demo_goal_events() -> Vec<GoalEvent> {
    vec![
        GoalEvent::new("0:30", "Amazing goal by Messi"),
        GoalEvent::new("1:45", "Brilliant strike by Ronaldo"),
    ]
}

/// Video offset for a goal timestamp. Only clock readings map onto the
/// recording; anything else is spread out one minute apart by position.
pub fn timestamp_seconds(raw: &str, index: usize) -> u32 {
    let fallback = (index as u32) * 60;
    let parts: Option<Vec<u32>> = raw
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u32>().ok())
        .collect();

    match parts.as_deref() {
        Some([m, s]) => m * 60 + s,
        Some([h, m, s]) => h * 3600 + m * 60 + s,
        _ => fallback,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalAd {
    pub time: u32,
    pub duration: u32,
    pub timestamp: String,
    pub player: String,
    pub team: String,
    pub price: f64,
    pub description: String,
    pub goal_description: String,
}

pub enum VideoSource {
    Url(String),
    Inline(Vec<u8>),
}

impl VideoSource {
    fn src(&self) -> String {
        match self {
            VideoSource::Url(url) => url.clone(),
            VideoSource::Inline(bytes) => format!(
                "data:video/mp4;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        }
    }
}

/// One line of the goal timeline under the player.
#[derive(Debug, Clone, Serialize)]
struct TimelineEntry<'a> {
    timestamp: &'a str,
    description: &'a str,
    player: &'a str,
    price: String,
}

/// Renders the goal-ad player page. The template is HTML auto-escaped.
pub struct OverlayPlayer {
    matcher: MerchandiseMatcher,
    env: Environment<'static>,
}

impl OverlayPlayer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(PLAYER_TEMPLATE_NAME, PLAYER_TEMPLATE)
            .context("failed to add player template")?;
        Ok(Self {
            matcher: MerchandiseMatcher::new()?,
            env,
        })
    }

    pub fn build_goal_ads(&self, events: &[GoalEvent]) -> Vec<GoalAd> {
        events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let jersey = self
                    .matcher
                    .extract_player(&event.description)
                    .unwrap_or_else(default_jersey);
                GoalAd {
                    time: timestamp_seconds(&event.timestamp, i),
                    duration: AD_DURATION_SECS,
                    timestamp: event.timestamp.clone(),
                    player: jersey.name.to_string(),
                    team: jersey.team.to_string(),
                    price: jersey.price,
                    description: jersey.description.to_string(),
                    goal_description: event.description.clone(),
                }
            })
            .collect()
    }

    /// Renders a standalone page: the video, the pop-up card and a goal timeline.
    pub fn render(&self, source: &VideoSource, events: &[GoalEvent], demo: bool) -> Result<String> {
        let ads = self.build_goal_ads(events);

        let notice = if demo {
            "No goals detected in the commentary, showing demo advertisements.".to_string()
        } else {
            format!(
                "Found {} goal moments - jersey ads will appear automatically during goals!",
                ads.len()
            )
        };

        let timeline: Vec<TimelineEntry<'_>> = ads
            .iter()
            .map(|ad| TimelineEntry {
                timestamp: &ad.timestamp,
                description: &ad.goal_description,
                player: &ad.player,
                price: format!("{:.2}", ad.price),
            })
            .collect();

        let page = self
            .env
            .get_template(PLAYER_TEMPLATE_NAME)?
            .render(context! {
                notice,
                video_src => source.src(),
                timeline,
                goal_ads => &ads,
            })
            .context("player render failed")?;
        Ok(page)
    }
}
