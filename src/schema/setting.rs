use serde::{Deserialize, Serialize};
use std::fmt;

/// The season in which a story takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
        }
    }

    /// Returns the tag string for this season (e.g., "season:winter").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Spring => "season:spring",
            Self::Summer => "season:summer",
            Self::Autumn => "season:autumn",
            Self::Winter => "season:winter",
        }
    }

    /// Calendar months (1-12) covered by the season, in order.
    ///
    /// Winter starts in December of the story year and runs into the next.
    pub fn months(&self) -> [u32; 3] {
        match self {
            Self::Spring => [3, 4, 5],
            Self::Summer => [6, 7, 8],
            Self::Autumn => [9, 10, 11],
            Self::Winter => [12, 1, 2],
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and when the story happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub location: String,
    pub season: Season,
    pub time_period: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_tags() {
        assert_eq!(Season::Spring.tag(), "season:spring");
        assert_eq!(Season::Winter.tag(), "season:winter");
    }

    #[test]
    fn winter_wraps_the_year() {
        assert_eq!(Season::Winter.months(), [12, 1, 2]);
        assert_eq!(Season::Autumn.months()[0], 9);
    }

    #[test]
    fn setting_serializes_season_lowercase() {
        let setting = Setting {
            location: "Bath".to_string(),
            season: Season::Autumn,
            time_period: "the year 1810".to_string(),
        };
        let json = serde_json::to_value(&setting).unwrap();
        assert_eq!(json["season"], "autumn");
        assert_eq!(json["location"], "Bath");
    }
}
