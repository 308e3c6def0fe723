//! Survey variants and their wire spellings.

use std::fmt;

use serde::Deserialize;

/// The survey variants the service knows about.
///
/// Each variant keys its own CSV feed, link template, field map, and
/// record-service table. Two spellings exist on the wire: the dispatch tag
/// (`"Pre-Renew"`, carried in invitation links and the `?type=` filter) and
/// the submission slug (`"preRenewal"`, posted by the hosted forms).
/// Parsing accepts either, case-insensitively; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum SurveyType {
    Thirty,
    Ninety,
    PreRenew,
    Yearly,
}

impl SurveyType {
    pub const ALL: [SurveyType; 4] = [
        SurveyType::Thirty,
        SurveyType::Ninety,
        SurveyType::PreRenew,
        SurveyType::Yearly,
    ];

    /// Dispatch tag, as carried in invitation links and the dispatch filter.
    pub fn tag(self) -> &'static str {
        match self {
            SurveyType::Thirty => "Thirty",
            SurveyType::Ninety => "Ninety",
            SurveyType::PreRenew => "Pre-Renew",
            SurveyType::Yearly => "Yearly",
        }
    }

    /// Submission slug, as posted by the hosted forms.
    pub fn slug(self) -> &'static str {
        match self {
            SurveyType::Thirty => "thirtyDay",
            SurveyType::Ninety => "ninetyDay",
            SurveyType::PreRenew => "preRenewal",
            SurveyType::Yearly => "yearly",
        }
    }

    /// Parse either spelling, ignoring case, whitespace, and punctuation
    /// (`"Pre-Renew"`, `"preRenewal"`, and `"pre_renew"` all resolve).
    pub fn parse(raw: &str) -> Option<SurveyType> {
        let norm: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "thirty" | "thirtyday" | "30" | "30day" => Some(SurveyType::Thirty),
            "ninety" | "ninetyday" | "90" | "90day" => Some(SurveyType::Ninety),
            "prerenew" | "prerenewal" => Some(SurveyType::PreRenew),
            "yearly" => Some(SurveyType::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for SurveyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl TryFrom<String> for SurveyType {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        SurveyType::parse(&raw).ok_or_else(|| format!("Unknown survey type: {raw}"))
    }
}
