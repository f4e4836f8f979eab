use serde::{Deserialize, Serialize};

/// The six fixed section kinds of a composite test. Each kind owns an equal
/// 1/6 share of the overall 100-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SectionKind {
    Vocabulary,
    Grammar,
    Reading,
    Listening,
    Speaking,
    Writing,
}

impl SectionKind {
    pub(crate) const ALL: [SectionKind; 6] = [
        SectionKind::Vocabulary,
        SectionKind::Grammar,
        SectionKind::Reading,
        SectionKind::Listening,
        SectionKind::Speaking,
        SectionKind::Writing,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SectionKind::Vocabulary => "vocabulary",
            SectionKind::Grammar => "grammar",
            SectionKind::Reading => "reading",
            SectionKind::Listening => "listening",
            SectionKind::Speaking => "speaking",
            SectionKind::Writing => "writing",
        }
    }

    /// Reading passages, listening exercises and speaking parts are
    /// containers whose child question ids need one level of expansion.
    pub(crate) fn is_compound(self) -> bool {
        matches!(self, SectionKind::Reading | SectionKind::Listening | SectionKind::Speaking)
    }

    /// Position in the fixed navigation order.
    pub(crate) fn order(self) -> usize {
        SectionKind::ALL.iter().position(|kind| *kind == self).unwrap_or(usize::MAX)
    }
}

/// What a submission is attached to. Competitions carry a hard end time;
/// practice tests stay open indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AttemptKind {
    Test,
    Competition,
}

impl AttemptKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AttemptKind::Test => "test",
            AttemptKind::Competition => "competition",
        }
    }
}
