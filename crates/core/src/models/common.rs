use serde::{Deserialize, Serialize};
use std::fmt;

/// Movie or show. Fixed for the lifetime of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(MediaKind::Movie),
            "show" => Some(MediaKind::Show),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "Movie"),
            MediaKind::Show => write!(f, "Show"),
        }
    }
}

/// Personal rating in half-star steps, stored as 0..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StarRating {
    #[default]
    NoRating,
    Half,
    One,
    OneAndHalf,
    Two,
    TwoAndHalf,
    Three,
    ThreeAndHalf,
    Four,
    FourAndHalf,
    Five,
}

impl StarRating {
    pub const ALL: [StarRating; 11] = [
        StarRating::NoRating,
        StarRating::Half,
        StarRating::One,
        StarRating::OneAndHalf,
        StarRating::Two,
        StarRating::TwoAndHalf,
        StarRating::Three,
        StarRating::ThreeAndHalf,
        StarRating::Four,
        StarRating::FourAndHalf,
        StarRating::Five,
    ];

    /// Position on the 0..=10 half-star scale.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn stars(self) -> f32 {
        f32::from(self.value()) / 2.0
    }

    pub fn is_rated(self) -> bool {
        self != StarRating::NoRating
    }
}

impl TryFrom<u8> for StarRating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        StarRating::from_value(value).ok_or_else(|| format!("invalid star rating {value}"))
    }
}

impl From<StarRating> for u8 {
    fn from(rating: StarRating) -> Self {
        rating.value()
    }
}

/// Production status as reported by TMDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Planned,
    InProduction,
    ReturningSeries,
    Canceled,
    Pilot,
    Ended,
    Rumored,
    PostProduction,
    Released,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Planned => "planned",
            MediaStatus::InProduction => "in_production",
            MediaStatus::ReturningSeries => "returning_series",
            MediaStatus::Canceled => "canceled",
            MediaStatus::Pilot => "pilot",
            MediaStatus::Ended => "ended",
            MediaStatus::Rumored => "rumored",
            MediaStatus::PostProduction => "post_production",
            MediaStatus::Released => "released",
        }
    }

    /// Unknown strings map to `None` so a new upstream value never breaks decoding.
    pub fn from_tmdb(value: &str) -> Option<Self> {
        match value {
            "Planned" => Some(MediaStatus::Planned),
            "In Production" => Some(MediaStatus::InProduction),
            "Returning Series" => Some(MediaStatus::ReturningSeries),
            "Canceled" | "Cancelled" => Some(MediaStatus::Canceled),
            "Pilot" => Some(MediaStatus::Pilot),
            "Ended" => Some(MediaStatus::Ended),
            "Rumored" => Some(MediaStatus::Rumored),
            "Post Production" => Some(MediaStatus::PostProduction),
            "Released" => Some(MediaStatus::Released),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowType {
    Documentary,
    News,
    Miniseries,
    Reality,
    Scripted,
    TalkShow,
    Video,
}

impl ShowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowType::Documentary => "documentary",
            ShowType::News => "news",
            ShowType::Miniseries => "miniseries",
            ShowType::Reality => "reality",
            ShowType::Scripted => "scripted",
            ShowType::TalkShow => "talk_show",
            ShowType::Video => "video",
        }
    }

    pub fn from_tmdb(value: &str) -> Option<Self> {
        match value {
            "Documentary" => Some(ShowType::Documentary),
            "News" => Some(ShowType::News),
            "Miniseries" => Some(ShowType::Miniseries),
            "Reality" => Some(ShowType::Reality),
            "Scripted" => Some(ShowType::Scripted),
            "Talk Show" => Some(ShowType::TalkShow),
            "Video" => Some(ShowType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

impl Genre {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
