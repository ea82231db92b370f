use anyhow::Result;
use log::debug;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;

use crate::language::Language;

/// Characters on either side of a timestamp that count as "near" it.
pub const CONTEXT_WINDOW: usize = 50;
const CONTEXT_LIMIT: usize = 100;
pub const GENERAL_MENTION: &str = "General mention";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Goal,
    Assist,
    YellowCard,
    RedCard,
    Substitution,
    Corner,
    FreeKick,
    Penalty,
    Offside,
    Foul,
    Save,
    Shot,
    Header,
    Tackle,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Goal => "goal",
            EventKind::Assist => "assist",
            EventKind::YellowCard => "yellow_card",
            EventKind::RedCard => "red_card",
            EventKind::Substitution => "substitution",
            EventKind::Corner => "corner",
            EventKind::FreeKick => "free_kick",
            EventKind::Penalty => "penalty",
            EventKind::Offside => "offside",
            EventKind::Foul => "foul",
            EventKind::Save => "save",
            EventKind::Shot => "shot",
            EventKind::Header => "header",
            EventKind::Tackle => "tackle",
        }
    }
}

const EVENT_PATTERNS_EN: [(EventKind, &str); 14] = [
    (EventKind::Goal, r"\b(?:goal|scores?|scored|scoring|nets?|finds?\s+the\s+net|back\s+of\s+the\s+net)\b"),
    (EventKind::Assist, r"\b(?:assist|assists|assisted|sets?\s+up|crosses?|passes?)\b"),
    (EventKind::YellowCard, r"\b(?:yellow\s+card|booked|cautioned|warning)\b"),
    (EventKind::RedCard, r"\b(?:red\s+card|sent\s+off|dismissed|ejected)\b"),
    (EventKind::Substitution, r"\b(?:substitut\w+|sub\w+|replaces?|comes?\s+on|off\s+for)\b"),
    (EventKind::Corner, r"\b(?:corner|corner\s+kick)\b"),
    (EventKind::FreeKick, r"\b(?:free\s+kick|direct\s+kick|indirect\s+kick)\b"),
    (EventKind::Penalty, r"\b(?:penalty|penalty\s+kick|from\s+the\s+spot)\b"),
    (EventKind::Offside, r"\b(?:offside|offside\s+trap)\b"),
    (EventKind::Foul, r"\b(?:foul|fouled|commits?\s+a\s+foul)\b"),
    (EventKind::Save, r"\b(?:save|saves?|saved|blocks?|stopped)\b"),
    (EventKind::Shot, r"\b(?:shot|shoots?|shooting|attempt)\b"),
    (EventKind::Header, r"\b(?:header|heads?|heading)\b"),
    (EventKind::Tackle, r"\b(?:tackle|tackles?|tackled)\b"),
];

const EVENT_PATTERNS_ES: [(EventKind, &str); 14] = [
    (EventKind::Goal, r"\b(?:gol|goles|marca|anota|anotó|anotando|convierte|convertir)\b"),
    (EventKind::Assist, r"\b(?:asistencia|asiste|pase|habilitación|habilita|centro|centrar)\b"),
    (EventKind::YellowCard, r"\b(?:tarjeta\s+amarilla|amarilla|amonestado|amonestación|advertencia)\b"),
    (EventKind::RedCard, r"\b(?:tarjeta\s+roja|roja|expulsado|expulsión|echado)\b"),
    (EventKind::Substitution, r"\b(?:sustitución|cambio|sustituye|reemplaza|entra|sale|ingresa)\b"),
    (EventKind::Corner, r"\b(?:córner|corner|saque\s+de\s+esquina|tiro\s+de\s+esquina)\b"),
    (EventKind::FreeKick, r"\b(?:tiro\s+libre|libre|falta|directo|indirecto)\b"),
    (EventKind::Penalty, r"\b(?:penalty|penalti|penal|desde\s+los\s+once\s+metros)\b"),
    (EventKind::Offside, r"\b(?:fuera\s+de\s+juego|offside|posición\s+adelantada)\b"),
    (EventKind::Foul, r"\b(?:falta|infracción|comete\s+falta|golpe)\b"),
    (EventKind::Save, r"\b(?:atajada|parada|ataja|para|detiene|bloquea)\b"),
    (EventKind::Shot, r"\b(?:disparo|tiro|remate|intento|lanza|patea)\b"),
    (EventKind::Header, r"\b(?:cabezazo|cabecea|de\s+cabeza|remate\s+de\s+cabeza)\b"),
    (EventKind::Tackle, r"\b(?:entrada|barrida|anticipo|recupera|quita)\b"),
];

const PLAYERS_EN: &[&str] = &[
    "Messi", "Ronaldo", "Neymar", "Mbappe", "Mbappé", "Benzema", "Modric", "Ramos", "Pique",
    "Iniesta", "Xavi", "Busquets", "Griezmann", "Haaland", "Lewandowski", "Salah", "Kane",
    "Sterling", "De Bruyne", "Mahrez", "Giroud", "Casemiro", "Kroos", "Bale", "Suarez", "Alba",
    "Ter Stegen",
];

const PLAYERS_ES: &[&str] = &[
    "Messi", "Ronaldo", "Neymar", "Mbappé", "Benzema", "Modrić", "Ramos", "Piqué", "Iniesta",
    "Xavi", "Busquets", "Griezmann", "Haaland", "Lewandowski", "Salah", "Kane", "Sterling",
    "De Bruyne", "Mahrez", "Giroud", "Casemiro", "Kroos", "Bale", "Suárez", "Alba", "Ter Stegen",
    "Vinicius", "Pedri", "Gavi", "Ansu Fati", "Rodrygo", "Valverde", "Camavinga", "Tchouaméni",
    "Bellingham", "Luka Modrić", "Toni Kroos",
];

const TEAMS_EN: &[&str] = &[
    "Barcelona", "Real Madrid", "PSG", "Manchester United", "Manchester City", "Liverpool",
    "Chelsea", "Arsenal", "Tottenham", "Bayern Munich", "Borussia Dortmund", "Juventus",
    "AC Milan", "Inter Milan", "Atletico Madrid",
];

const TEAMS_ES: &[&str] = &[
    "Barcelona", "Real Madrid", "Atlético Madrid", "Sevilla", "Valencia", "Athletic Bilbao",
    "Real Sociedad", "Villarreal", "Betis", "Getafe", "Boca Juniors", "River Plate",
    "Independiente", "Racing", "San Lorenzo", "América", "Chivas", "Cruz Azul", "Pumas", "Tigres",
];

/// Capitalised words the name heuristic must never report as a person.
const HEURISTIC_STOP_WORDS: &[&str] = &[
    "Goal", "Card", "Free", "Corner", "Penalty", "The", "And", "But", "After", "Great", "Yellow",
    "Red", "Full", "Substitution", "Brilliant", "Amazing", "Gran", "Tarjeta", "Silbato",
];

const CAPITALISED_NAME: &str = r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum TimestampKind {
    MinuteSecond { minutes: u32, seconds: u32 },
    HourMinuteSecond { hours: u32, minutes: u32, seconds: u32 },
    MatchMinute { minute: u32, added: Option<u32> },
}

#[derive(Debug, Clone, Copy)]
enum TimestampFormat {
    HourMinuteSecond,
    MinuteSecond,
    Stoppage,
    Apostrophe,
    Minutes,
}

const TIMESTAMP_PATTERNS: [(TimestampFormat, &str); 5] = [
    (TimestampFormat::HourMinuteSecond, r"\b(\d{1,2}):(\d{2}):(\d{2})\b"),
    (TimestampFormat::MinuteSecond, r"\b(\d{1,2}):(\d{2})\b"),
    (TimestampFormat::Stoppage, r"\b(\d{1,3})\+(\d{1,2})['’]"),
    (TimestampFormat::Apostrophe, r"\b(\d{1,3})['’]"),
    (TimestampFormat::Minutes, r"\b(\d{1,3})\s*min\b"),
];

/// A time reference found in commentary. Offsets are in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timestamp {
    pub raw: String,
    pub start: usize,
    pub end: usize,
    pub kind: TimestampKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityLabel {
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "ORG")]
    Org,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

/// Events and entities found around one timestamp.
#[derive(Debug, Clone)]
pub struct NearbyElements<'a> {
    pub timestamp: &'a Timestamp,
    pub events: Vec<&'a Event>,
    pub entities: Vec<&'a Entity>,
    pub context: String,
}

/// One line of the analysis table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub time: String,
    pub tags: String,
    pub event_types: Vec<EventKind>,
    pub players: Vec<String>,
    pub teams: Vec<String>,
    pub context: String,
}

impl AnalysisRow {
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.event_types
            .iter()
            .map(|kind| kind.label())
            .chain(self.players.iter().map(String::as_str))
            .chain(self.teams.iter().map(String::as_str))
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.event_types.contains(&kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_events: usize,
    pub unique_event_types: usize,
    pub player_mentions: usize,
}

/// Maps between byte offsets (what `regex` reports) and character offsets.
struct TextIndex<'a> {
    text: &'a str,
    char_starts: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            char_starts: text.char_indices().map(|(i, _)| i).collect(),
        }
    }

    fn len(&self) -> usize {
        self.char_starts.len()
    }

    fn char_offset(&self, byte: usize) -> usize {
        match self.char_starts.binary_search(&byte) {
            Ok(i) | Err(i) => i,
        }
    }

    fn byte_offset(&self, ch: usize) -> usize {
        self.char_starts.get(ch).copied().unwrap_or(self.text.len())
    }

    fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.text[self.byte_offset(from)..self.byte_offset(to)]
    }
}

pub struct SoccerAnalyzer {
    event_patterns: Vec<(EventKind, Regex)>,
    players: Vec<Regex>,
    teams: Vec<Regex>,
    timestamps: Vec<(TimestampFormat, Regex)>,
    capitalised: Regex,
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn gazetteer(names: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    names
        .iter()
        .map(|name| case_insensitive(&format!(r"\b{}\b", regex::escape(name))))
        .collect()
}

impl SoccerAnalyzer {
    pub fn new(language: Language) -> Result<Self> {
        let (events, players, teams) = match language {
            Language::English => (&EVENT_PATTERNS_EN, PLAYERS_EN, TEAMS_EN),
            Language::Spanish => (&EVENT_PATTERNS_ES, PLAYERS_ES, TEAMS_ES),
        };

        let event_patterns = events
            .iter()
            .map(|(kind, pattern)| Ok((*kind, case_insensitive(pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        let timestamps = TIMESTAMP_PATTERNS
            .iter()
            .map(|(format, pattern)| Ok((*format, case_insensitive(pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            event_patterns,
            players: gazetteer(players)?,
            teams: gazetteer(teams)?,
            timestamps,
            capitalised: Regex::new(CAPITALISED_NAME)?,
        })
    }

    /// Timestamps in text order. A match overlapping an earlier (or longer) one is dropped.
    pub fn extract_timestamps(&self, text: &str) -> Vec<Timestamp> {
        self.timestamps_in(&TextIndex::new(text))
    }

    pub fn extract_events(&self, text: &str) -> Vec<Event> {
        self.events_in(&TextIndex::new(text))
    }

    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        self.entities_in(&TextIndex::new(text))
    }

    fn timestamps_in(&self, index: &TextIndex<'_>) -> Vec<Timestamp> {
        let mut found = Vec::new();
        for (format, re) in &self.timestamps {
            for caps in re.captures_iter(index.text) {
                let Some(whole) = caps.get(0) else { continue };
                let number = |i: usize| {
                    caps.get(i)
                        .and_then(|m| m.as_str().parse::<u32>().ok())
                        .unwrap_or_default()
                };
                let kind = match format {
                    TimestampFormat::HourMinuteSecond => TimestampKind::HourMinuteSecond {
                        hours: number(1),
                        minutes: number(2),
                        seconds: number(3),
                    },
                    TimestampFormat::MinuteSecond => TimestampKind::MinuteSecond {
                        minutes: number(1),
                        seconds: number(2),
                    },
                    TimestampFormat::Stoppage => TimestampKind::MatchMinute {
                        minute: number(1),
                        added: Some(number(2)),
                    },
                    TimestampFormat::Apostrophe | TimestampFormat::Minutes => {
                        TimestampKind::MatchMinute {
                            minute: number(1),
                            added: None,
                        }
                    }
                };
                found.push(Timestamp {
                    raw: whole.as_str().to_string(),
                    start: index.char_offset(whole.start()),
                    end: index.char_offset(whole.end()),
                    kind,
                });
            }
        }

        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut kept: Vec<Timestamp> = Vec::with_capacity(found.len());
        for ts in found {
            if kept.last().is_some_and(|last| ts.start < last.end) {
                continue;
            }
            kept.push(ts);
        }
        kept
    }

    fn events_in(&self, index: &TextIndex<'_>) -> Vec<Event> {
        let mut events = Vec::new();
        for (kind, re) in &self.event_patterns {
            for m in re.find_iter(index.text) {
                events.push(Event {
                    kind: *kind,
                    text: m.as_str().to_string(),
                    start: index.char_offset(m.start()),
                    end: index.char_offset(m.end()),
                });
            }
        }
        events
    }

    fn entities_in(&self, index: &TextIndex<'_>) -> Vec<Entity> {
        let mut entities = Vec::new();
        let gazetteers = [
            (&self.players, EntityLabel::Person),
            (&self.teams, EntityLabel::Org),
        ];
        for (patterns, label) in gazetteers {
            for re in patterns {
                for m in re.find_iter(index.text) {
                    entities.push(Entity {
                        text: m.as_str().to_string(),
                        label,
                        start: index.char_offset(m.start()),
                        end: index.char_offset(m.end()),
                    });
                }
            }
        }

        for m in self.capitalised.find_iter(index.text) {
            let name = m.as_str();
            if HEURISTIC_STOP_WORDS.contains(&name) {
                continue;
            }
            let lowered = name.to_lowercase();
            if entities.iter().any(|e| e.text.to_lowercase() == lowered) {
                continue;
            }
            entities.push(Entity {
                text: name.to_string(),
                label: EntityLabel::Person,
                start: index.char_offset(m.start()),
                end: index.char_offset(m.end()),
            });
        }
        entities
    }

    /// Groups events and entities around each timestamp.
    pub fn find_nearby<'a>(
        &self,
        timestamps: &'a [Timestamp],
        events: &'a [Event],
        entities: &'a [Entity],
        text: &str,
        window: usize,
    ) -> Vec<NearbyElements<'a>> {
        let index = TextIndex::new(text);
        timestamps
            .iter()
            .map(|ts| {
                let near = |start: usize, end: usize| {
                    start.abs_diff(ts.start) <= window || end.abs_diff(ts.end) <= window
                };
                let context_start = ts.start.saturating_sub(window);
                let context_end = (ts.end + window).min(index.len());
                NearbyElements {
                    timestamp: ts,
                    events: events.iter().filter(|e| near(e.start, e.end)).collect(),
                    entities: entities.iter().filter(|e| near(e.start, e.end)).collect(),
                    context: index.slice(context_start, context_end).trim().to_string(),
                }
            })
            .collect()
    }

    /// Builds one tagged row per timestamp found in the commentary.
    pub fn analyze(&self, text: &str) -> Vec<AnalysisRow> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let index = TextIndex::new(text);
        let timestamps = self.timestamps_in(&index);
        let events = self.events_in(&index);
        let entities = self.entities_in(&index);
        debug!(
            "commentary scan: {} timestamps, {} events, {} entities",
            timestamps.len(),
            events.len(),
            entities.len()
        );

        self.find_nearby(&timestamps, &events, &entities, text, CONTEXT_WINDOW)
            .into_iter()
            .map(build_row)
            .collect()
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn build_row(nearby: NearbyElements<'_>) -> AnalysisRow {
    let mut event_types = Vec::new();
    for event in &nearby.events {
        push_unique(&mut event_types, event.kind);
    }

    let mut players = Vec::new();
    let mut teams = Vec::new();
    for entity in &nearby.entities {
        match entity.label {
            EntityLabel::Person => push_unique(&mut players, entity.text.clone()),
            EntityLabel::Org => push_unique(&mut teams, entity.text.clone()),
        }
    }

    let context = if nearby.context.chars().count() > CONTEXT_LIMIT {
        let cut: String = nearby.context.chars().take(CONTEXT_LIMIT).collect();
        format!("{cut}...")
    } else {
        nearby.context
    };

    let mut row = AnalysisRow {
        time: nearby.timestamp.raw.clone(),
        tags: String::new(),
        event_types,
        players,
        teams,
        context,
    };
    let tags = {
        let tags: Vec<&str> = row.tag_list().collect();
        if tags.is_empty() {
            GENERAL_MENTION.to_string()
        } else {
            tags.join(", ")
        }
    };
    row.tags = tags;
    row
}

/// Title case in the sense of "every cased run starts upper and continues lower".
fn is_title_case(s: &str) -> bool {
    let mut previous_cased = false;
    let mut any_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else {
            previous_cased = false;
        }
    }
    any_cased
}

pub fn summarize(rows: &[AnalysisRow]) -> Summary {
    let unique: HashSet<&str> = rows.iter().flat_map(|row| row.tag_list()).collect();
    let player_mentions = rows
        .iter()
        .filter(|row| {
            row.tag_list()
                .any(|tag| is_title_case(tag) && tag.split_whitespace().count() <= 2)
        })
        .count();

    Summary {
        total_events: rows.len(),
        unique_event_types: unique.len(),
        player_mentions,
    }
}

const EXAMPLE_EN: &str = "15' Great shot by Ronaldo, but the goalkeeper makes an excellent save
23' GOAL! Messi scores a brilliant goal after a perfect assist from Neymar
31' Yellow card for Ramos after a hard tackle on the midfielder
45' Corner kick for Barcelona, Pique heads it just wide
67' Substitution: Benzema comes on for Giroud
78' Penalty! Mbappé is fouled in the box
79' GOAL! Mbappé converts the penalty to make it 2-0
85' Red card! Casemiro is sent off for a dangerous tackle
90' Full time whistle, Barcelona wins 2-0";

const EXAMPLE_ES: &str = "15' Gran disparo de Ronaldo, pero el portero hace una excelente atajada
23' ¡GOL! Messi anota un gol brillante después de una perfecta asistencia de Neymar
31' Tarjeta amarilla para Ramos después de una fuerte entrada al mediocampista
45' Córner para el Barcelona, Piqué cabecea pero se va desviado
67' Sustitución: Benzema entra por Giroud
78' ¡Penalty! Mbappé es derribado en el área
79' ¡GOL! Mbappé convierte el penal para hacer el 2-0
85' ¡Tarjeta roja! Casemiro es expulsado por una entrada peligrosa
90' Silbato final, el Barcelona gana 2-0";

pub fn example_commentary(language: Language) -> &'static str {
    match language {
        Language::English => EXAMPLE_EN,
        Language::Spanish => EXAMPLE_ES,
    }
}
