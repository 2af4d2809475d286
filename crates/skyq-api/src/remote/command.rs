//! Remote-control button table.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A button on the Sky Q remote.
///
/// Each variant maps to the code the box expects. Several keywords share a
/// code (e.g. `backup` and `dismiss`); [`RemoteCommand::from_str`] accepts all
/// of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum RemoteCommand {
    Power,
    Select,
    Backup,
    ChannelUp,
    ChannelDown,
    Interactive,
    Help,
    Services,
    TvGuide,
    I,
    Text,
    Up,
    Down,
    Left,
    Right,
    Red,
    Green,
    Yellow,
    Blue,
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Play,
    Pause,
    Stop,
    Record,
    FastForward,
    Rewind,
    BoxOffice,
    Sky,
}

/// Keyword table: `(keyword, command)`. Aliases follow their primary keyword.
const KEYWORDS: &[(&str, RemoteCommand)] = &[
    ("power", RemoteCommand::Power),
    ("select", RemoteCommand::Select),
    ("backup", RemoteCommand::Backup),
    ("dismiss", RemoteCommand::Backup),
    ("channelup", RemoteCommand::ChannelUp),
    ("channeldown", RemoteCommand::ChannelDown),
    ("interactive", RemoteCommand::Interactive),
    ("sidebar", RemoteCommand::Interactive),
    ("help", RemoteCommand::Help),
    ("services", RemoteCommand::Services),
    ("search", RemoteCommand::Services),
    ("tvguide", RemoteCommand::TvGuide),
    ("home", RemoteCommand::TvGuide),
    ("i", RemoteCommand::I),
    ("text", RemoteCommand::Text),
    ("up", RemoteCommand::Up),
    ("down", RemoteCommand::Down),
    ("left", RemoteCommand::Left),
    ("right", RemoteCommand::Right),
    ("red", RemoteCommand::Red),
    ("green", RemoteCommand::Green),
    ("yellow", RemoteCommand::Yellow),
    ("blue", RemoteCommand::Blue),
    ("zero", RemoteCommand::Zero),
    ("one", RemoteCommand::One),
    ("two", RemoteCommand::Two),
    ("three", RemoteCommand::Three),
    ("four", RemoteCommand::Four),
    ("five", RemoteCommand::Five),
    ("six", RemoteCommand::Six),
    ("seven", RemoteCommand::Seven),
    ("eight", RemoteCommand::Eight),
    ("nine", RemoteCommand::Nine),
    ("play", RemoteCommand::Play),
    ("pause", RemoteCommand::Pause),
    ("stop", RemoteCommand::Stop),
    ("record", RemoteCommand::Record),
    ("fastforward", RemoteCommand::FastForward),
    ("rewind", RemoteCommand::Rewind),
    ("boxoffice", RemoteCommand::BoxOffice),
    ("sky", RemoteCommand::Sky),
];

impl RemoteCommand {
    /// Code sent to the box for this button.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Power => 0,
            Self::Select => 1,
            Self::Backup => 2,
            Self::ChannelUp => 6,
            Self::ChannelDown => 7,
            Self::Interactive => 8,
            Self::Help => 9,
            Self::Services => 10,
            Self::TvGuide => 11,
            Self::I => 14,
            Self::Text => 15,
            Self::Up => 16,
            Self::Down => 17,
            Self::Left => 18,
            Self::Right => 19,
            Self::Red => 32,
            Self::Green => 33,
            Self::Yellow => 34,
            Self::Blue => 35,
            Self::Zero => 48,
            Self::One => 49,
            Self::Two => 50,
            Self::Three => 51,
            Self::Four => 52,
            Self::Five => 53,
            Self::Six => 54,
            Self::Seven => 55,
            Self::Eight => 56,
            Self::Nine => 57,
            Self::Play => 64,
            Self::Pause => 65,
            Self::Stop => 66,
            Self::Record => 67,
            Self::FastForward => 69,
            Self::Rewind => 71,
            Self::BoxOffice => 240,
            Self::Sky => 241,
        }
    }

    /// Primary keyword for this button.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, cmd)| *cmd == self)
            .map_or("", |(kw, _)| kw)
    }

    /// All accepted keywords, aliases included, in table order.
    pub fn keywords() -> impl Iterator<Item = (&'static str, Self)> {
        KEYWORDS.iter().copied()
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for RemoteCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == needle)
            .map(|(_, cmd)| *cmd)
            .ok_or_else(|| Error::InvalidCommand(String::from(s)))
    }
}
