use serde::de::{Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize, Serializer};

/// Identifier suffixes matched against the tail of raw sender/room ids.
///
/// Deserializes from a YAML sequence or from a single space-separated string.
/// Any other shape yields an empty list, so a bad value never blocks startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixList(Vec<String>);

impl SuffixList {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn parse(joined: &str) -> Self {
        Self::new(joined.split_whitespace())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, id: &str) -> bool {
        self.0.iter().any(|suffix| id.ends_with(suffix.as_str()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSuffixList {
    Joined(String),
    Items(Vec<String>),
    Invalid(IgnoredAny),
}

impl<'de> Deserialize<'de> for SuffixList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSuffixList::deserialize(deserializer)? {
            RawSuffixList::Joined(s) => SuffixList::parse(&s),
            RawSuffixList::Items(items) => SuffixList::new(items),
            RawSuffixList::Invalid(_) => SuffixList::default(),
        })
    }
}

impl Serialize for SuffixList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Process-wide reply policy. Built once from config and shared read-only.
#[derive(Debug, Clone)]
pub struct Policy {
    pub sender_blacklist: SuffixList,
    pub sender_whitelist: SuffixList,
    pub room_blacklist: SuffixList,
    pub room_whitelist: SuffixList,
    pub ignore_non_text: bool,
    pub stale_threshold_ms: i64,
    pub context_window_size: usize,
    pub context_recency_ms: i64,
    pub threading_enabled: bool,
    pub rich_text_enabled: bool,
    pub system_prompt: String,
    pub typing_timeout_ms: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            sender_blacklist: SuffixList::default(),
            sender_whitelist: SuffixList::default(),
            room_blacklist: SuffixList::default(),
            room_whitelist: SuffixList::default(),
            ignore_non_text: false,
            stale_threshold_ms: 50_000,
            context_window_size: 100,
            context_recency_ms: 90 * 60 * 1000,
            threading_enabled: true,
            rich_text_enabled: true,
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            typing_timeout_ms: 180_000,
        }
    }
}
