//! Log tags, one per engine subsystem

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Engine,
    Indicators,
    Regime,
    Risk,
    Tracker,
    Capital,
    Storage,
    Feed,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Engine => "ENGINE",
            LogTag::Indicators => "INDICATORS",
            LogTag::Regime => "REGIME",
            LogTag::Risk => "RISK",
            LogTag::Tracker => "TRACKER",
            LogTag::Capital => "CAPITAL",
            LogTag::Storage => "STORAGE",
            LogTag::Feed => "FEED",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
