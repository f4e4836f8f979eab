use std::collections::BTreeMap;

/// Per-question "has the student answered this" map driving navigation UI.
/// Purely derived state; never consulted by the scorers.
#[derive(Debug, Clone, Default)]
pub(crate) struct AnsweredState {
    map: BTreeMap<String, bool>,
}

impl AnsweredState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the answered flag for a question. Returns whether the map
    /// actually changed; setting the same value twice is a no-op, so callers
    /// can use the return value to skip redundant UI refreshes.
    pub(crate) fn update(&mut self, question_id: &str, answered: bool) -> bool {
        match self.map.get(question_id) {
            Some(current) if *current == answered => false,
            _ => {
                self.map.insert(question_id.to_string(), answered);
                true
            }
        }
    }

    /// Fold a freshly fetched set of answered question ids in. Ids absent
    /// from the map stay absent unless listed; reports whether anything
    /// changed.
    pub(crate) fn absorb<'a>(&mut self, answered_ids: impl IntoIterator<Item = &'a str>) -> bool {
        let mut changed = false;
        for id in answered_ids {
            changed |= self.update(id, true);
        }
        changed
    }

    pub(crate) fn is_answered(&self, question_id: &str) -> bool {
        self.map.get(question_id).copied().unwrap_or(false)
    }
}
