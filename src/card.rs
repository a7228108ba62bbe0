//! Goal card payload and social caption.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::generator::{Dimensions, RenderRequest};

/// Template used for goal cards.
pub const GOAL_TEMPLATE: &str = "goal";

/// Competition shown when the card carries none.
const DEFAULT_COMPETITION: &str = "Premier League";

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"))
}

/// Everything the goal template needs to draw one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalCard {
    /// Event identifier.
    pub id: u64,
    /// Card kind, e.g. `goal`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// Gameweek code.
    pub gw: String,
    pub data: GoalData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalData {
    pub home_team: Team,
    pub away_team: Team,
    /// Name of the team that scored.
    pub goal_scored_team: String,
    #[serde(default)]
    pub club_name: Option<String>,
    #[serde(default)]
    pub club_logo: String,
    #[serde(default = "default_goals")]
    pub goals: u32,
    #[serde(default)]
    pub scorers: Vec<Scorer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorer {
    pub name: String,
    /// Match minute; stoppage time is kept as text (`90+3`).
    #[serde(deserialize_with = "minute_from_number_or_text")]
    pub minute: String,
}

fn default_title() -> String {
    "GOAL!".to_string()
}

fn default_goals() -> u32 {
    1
}

fn minute_from_number_or_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Minute {
        Number(u64),
        Text(String),
    }

    Ok(match Minute::deserialize(d)? {
        Minute::Number(n) => n.to_string(),
        Minute::Text(s) => s,
    })
}

impl GoalCard {
    /// Build the render request for this card.
    pub fn render_request(&self, dimensions: Dimensions) -> Result<RenderRequest, serde_json::Error> {
        RenderRequest::new(GOAL_TEMPLATE, self, dimensions)
    }

    /// Output file name, `<type>-<id>.png`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.png", self.kind, self.id)
    }

    /// Social media caption for this card.
    pub fn caption(&self) -> String {
        Caption(self).to_string()
    }
}

struct Caption<'a>(&'a GoalCard);

impl fmt::Display for Caption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let card = self.0;
        let data = &card.data;

        let title = if card.title.is_empty() {
            "GOAL!"
        } else {
            card.title.as_str()
        };
        write!(f, "{} ⚽\n\n", title)?;

        match data.scorers.last() {
            Some(scorer) => writeln!(f, "{} ({}') finds the net! 🔥", scorer.name, scorer.minute)?,
            None => writeln!(f, "{} scores! 🔥", data.goal_scored_team)?,
        }

        write!(f, "\n{} vs {}\n", data.home_team.name, data.away_team.name)?;

        let competition = data
            .club_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_COMPETITION);
        write!(f, "GW {} • {}\n\n", card.gw, competition)?;

        let hashtag = whitespace().replace_all(&data.goal_scored_team, "");
        write!(f, "#{} #PremierLeague #Goal #Football", hashtag)
    }
}
