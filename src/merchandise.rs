use anyhow::Result;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::analyzer::AnalysisRow;

/// A player's official jersey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Jersey {
    pub key: &'static str,
    pub name: &'static str,
    pub team: &'static str,
    pub price: f64,
    pub image_url: &'static str,
    pub description: &'static str,
}

/// Merchandise offered when no player can be matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericItem {
    pub name: &'static str,
    pub price: f64,
    pub image_url: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Merchandise {
    Jersey(Jersey),
    Generic(GenericItem),
}

/// The item advertised next to one analysed moment of the match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAdvertisement {
    pub time: String,
    pub event_type: String,
    pub merchandise: Merchandise,
}

pub const JERSEYS: [Jersey; 4] = [
    Jersey {
        key: "messi",
        name: "Lionel Messi",
        team: "Inter Miami",
        price: 89.99,
        image_url: "https://via.placeholder.com/200x250/ff69b4/ffffff?text=Messi+Jersey",
        description: "Official Inter Miami Messi #10 Jersey",
    },
    Jersey {
        key: "ronaldo",
        name: "Cristiano Ronaldo",
        team: "Al Nassr",
        price: 79.99,
        image_url: "https://via.placeholder.com/200x250/ffd700/000000?text=Ronaldo+Jersey",
        description: "Official Al Nassr Ronaldo #7 Jersey",
    },
    Jersey {
        key: "mbappe",
        name: "Kylian Mbappé",
        team: "Real Madrid",
        price: 94.99,
        image_url: "https://via.placeholder.com/200x250/ffffff/000000?text=Mbappe+Jersey",
        description: "Official Real Madrid Mbappé #9 Jersey",
    },
    Jersey {
        key: "haaland",
        name: "Erling Haaland",
        team: "Manchester City",
        price: 89.99,
        image_url: "https://via.placeholder.com/200x250/87ceeb/000000?text=Haaland+Jersey",
        description: "Official Manchester City Haaland #9 Jersey",
    },
];

pub const SOCCER_BALL: GenericItem = GenericItem {
    name: "Premium Soccer Ball",
    price: 29.99,
    image_url: "https://via.placeholder.com/200x250/32cd32/ffffff?text=Soccer+Ball",
    description: "Professional Match Quality Soccer Ball",
};

pub const CLEATS: GenericItem = GenericItem {
    name: "Soccer Cleats",
    price: 119.99,
    image_url: "https://via.placeholder.com/200x250/ff4500/ffffff?text=Soccer+Cleats",
    description: "Premium Performance Soccer Cleats",
};

pub const TEAM_SCARF: GenericItem = GenericItem {
    name: "Team Scarf",
    price: 24.99,
    image_url: "https://via.placeholder.com/200x250/800080/ffffff?text=Team+Scarf",
    description: "Official Team Supporter Scarf",
};

/// Phrases that name the scorer, tried in order.
const SCORER_PATTERNS: [&str; 5] = [
    r"(?:goal by|scored by|assist by)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
    r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s+(?:scores|goal|assist)",
    r"([A-Z][a-z]+)\s+(?:with the goal|finds the net)",
    r"([A-Z][a-z]+)\s+(?:strikes|nets|converts)",
    r"(?:brilliant|amazing|incredible)\s+(?:goal|strike|finish)\s+(?:by|from)\s+([A-Z][a-z]+)",
];

/// The jersey shown when a goal cannot be attributed to a known player.
pub fn default_jersey() -> &'static Jersey {
    &JERSEYS[0]
}

pub struct MerchandiseMatcher {
    scorer_patterns: Vec<Regex>,
}

impl MerchandiseMatcher {
    pub fn new() -> Result<Self> {
        let scorer_patterns = SCORER_PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { scorer_patterns })
    }

    /// Finds the catalog jersey of the player an event description is about.
    pub fn extract_player(&self, event_text: &str) -> Option<&'static Jersey> {
        self.scorer_patterns.iter().find_map(|re| {
            let player = re.captures(event_text)?.get(1)?.as_str().trim().to_lowercase();
            JERSEYS
                .iter()
                .find(|j| player.contains(j.key) || j.name.to_lowercase().contains(&player))
        })
    }

    pub fn merchandise_for_event(&self, event_text: &str, event_type: &str) -> Merchandise {
        if let Some(jersey) = self.extract_player(event_text) {
            return Merchandise::Jersey(jersey.clone());
        }

        let event_type = event_type.to_lowercase();
        let item = if event_type.contains("goal") || event_type.contains("score") {
            SOCCER_BALL
        } else if event_type.contains("card") {
            TEAM_SCARF
        } else {
            CLEATS
        };
        Merchandise::Generic(item)
    }

    /// One advertisement per row that carries an event, keyed on its first event.
    pub fn advertisements(&self, rows: &[AnalysisRow]) -> Vec<EventAdvertisement> {
        rows.iter()
            .filter_map(|row| {
                let event_type = row.event_types.first()?.label();
                Some(EventAdvertisement {
                    time: row.time.clone(),
                    event_type: event_type.to_string(),
                    merchandise: self.merchandise_for_event(&row.context, event_type),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_scorer_phrases_to_catalog_jerseys() {
        let matcher = MerchandiseMatcher::new().unwrap();
        assert_eq!(
            matcher.extract_player("Amazing goal by Messi").map(|j| j.key),
            Some("messi")
        );
        assert_eq!(
            matcher.extract_player("Haaland strikes from distance").map(|j| j.key),
            Some("haaland")
        );
        assert_eq!(
            matcher.extract_player("Brilliant strike by Ronaldo").map(|j| j.key),
            Some("ronaldo")
        );
    }

    #[test]
    fn accented_names_resolve_through_the_full_name() {
        let matcher = MerchandiseMatcher::new().unwrap();
        assert_eq!(
            matcher.extract_player("Goal by Mbappé from the spot").map(|j| j.key),
            Some("mbappe")
        );
    }

    #[test]
    fn unknown_player_is_none() {
        let matcher = MerchandiseMatcher::new().unwrap();
        assert!(matcher.extract_player("Goal by Smith").is_none());
        assert!(matcher.extract_player("a quiet spell of possession").is_none());
    }

    #[test]
    fn generic_items_follow_event_type() {
        let matcher = MerchandiseMatcher::new().unwrap();
        assert_eq!(
            matcher.merchandise_for_event("what a finish", "goal"),
            Merchandise::Generic(SOCCER_BALL)
        );
        assert_eq!(
            matcher.merchandise_for_event("booked", "yellow_card"),
            Merchandise::Generic(TEAM_SCARF)
        );
        assert_eq!(
            matcher.merchandise_for_event("nice pass", "assist"),
            Merchandise::Generic(CLEATS)
        );
        assert_eq!(
            matcher.merchandise_for_event("goal by Messi", "card"),
            Merchandise::Jersey(JERSEYS[0].clone())
        );
    }

    #[test]
    fn advertisements_cover_rows_with_events() {
        use crate::analyzer::SoccerAnalyzer;
        use crate::language::Language;

        let analyzer = SoccerAnalyzer::new(Language::English).unwrap();
        let text = format!(
            "10' Haaland scores low{}30' yellow card for the defender{}50' quiet spell",
            " ".repeat(80),
            " ".repeat(80)
        );
        let rows = analyzer.analyze(&text);
        assert_eq!(rows.len(), 3);

        let ads = MerchandiseMatcher::new().unwrap().advertisements(&rows);
        assert_eq!(ads.len(), 2);
        assert_eq!(ads[0].time, "10'");
        assert_eq!(ads[0].merchandise, Merchandise::Jersey(JERSEYS[3].clone()));
        assert_eq!(ads[1].event_type, "yellow_card");
        assert_eq!(ads[1].merchandise, Merchandise::Generic(TEAM_SCARF));
    }
}
