use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::clients::backend::StudyApi;
use crate::model::types::SectionKind;
use crate::model::{ChoiceQuestion, SpeakingQuestion, TestPart, WritingQuestion};

/// The resolved question set of one test part, in part order.
#[derive(Debug, Clone)]
pub(crate) struct SectionQuestions {
    pub(crate) kind: SectionKind,
    pub(crate) items: SectionItems,
}

#[derive(Debug, Clone)]
pub(crate) enum SectionItems {
    Choice(Vec<ChoiceQuestion>),
    Speaking(Vec<SpeakingQuestion>),
    Writing(Vec<WritingQuestion>),
}

impl SectionQuestions {
    pub(crate) fn len(&self) -> usize {
        match &self.items {
            SectionItems::Choice(questions) => questions.len(),
            SectionItems::Speaking(questions) => questions.len(),
            SectionItems::Writing(questions) => questions.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn question_ids(&self) -> Vec<String> {
        match &self.items {
            SectionItems::Choice(questions) => {
                questions.iter().map(|question| question.id.clone()).collect()
            }
            SectionItems::Speaking(questions) => {
                questions.iter().map(|question| question.id.clone()).collect()
            }
            SectionItems::Writing(questions) => {
                questions.iter().map(|question| question.id.clone()).collect()
            }
        }
    }
}

/// One entry of the flat cross-section question list driving navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionRef {
    pub(crate) id: String,
    pub(crate) kind: SectionKind,
    pub(crate) order: usize,
}

/// Resolve a test part into its terminal questions. One level of container
/// expansion for the compound kinds; inactive items are dropped. An empty
/// part resolves to an empty list, never an error.
pub(crate) async fn collect_section_questions(
    api: &dyn StudyApi,
    part: &TestPart,
) -> Result<SectionQuestions> {
    let terminal_ids = if part.kind.is_compound() {
        expand_containers(api, part).await?
    } else {
        part.item_ids.clone()
    };

    let items = match part.kind {
        SectionKind::Vocabulary | SectionKind::Grammar | SectionKind::Reading
        | SectionKind::Listening => {
            let questions = api
                .choice_questions(&terminal_ids)
                .await
                .with_context(|| format!("Failed to fetch {} questions", part.kind.as_str()))?;
            SectionItems::Choice(in_id_order(&terminal_ids, questions, |q| &q.id, |q| q.active))
        }
        SectionKind::Speaking => {
            let questions = api
                .speaking_questions(&terminal_ids)
                .await
                .context("Failed to fetch speaking questions")?;
            SectionItems::Speaking(in_id_order(&terminal_ids, questions, |q| &q.id, |q| q.active))
        }
        SectionKind::Writing => {
            let questions = api
                .writing_questions(&terminal_ids)
                .await
                .context("Failed to fetch writing questions")?;
            SectionItems::Writing(in_id_order(&terminal_ids, questions, |q| &q.id, |q| q.active))
        }
    };

    Ok(SectionQuestions { kind: part.kind, items })
}

async fn expand_containers(api: &dyn StudyApi, part: &TestPart) -> Result<Vec<String>> {
    let containers = api
        .containers(part.kind, &part.item_ids)
        .await
        .with_context(|| format!("Failed to fetch {} containers", part.kind.as_str()))?;

    let by_id: HashMap<&str, _> = containers
        .iter()
        .filter(|container| container.active)
        .map(|container| (container.id.as_str(), container))
        .collect();

    // Child ids follow the part's container order, not fetch order.
    let mut question_ids = Vec::new();
    for container_id in &part.item_ids {
        if let Some(container) = by_id.get(container_id.as_str()) {
            question_ids.extend(container.question_ids.iter().cloned());
        }
    }

    Ok(question_ids)
}

/// Reorder fetched records to the requested id order, dropping missing ids
/// and inactive records.
fn in_id_order<T>(
    ids: &[String],
    records: Vec<T>,
    id_of: impl Fn(&T) -> &str,
    is_active: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut by_id: HashMap<String, T> = records
        .into_iter()
        .filter(|record| is_active(record))
        .map(|record| (id_of(&record).to_string(), record))
        .collect();

    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Flatten resolved sections into the ordered navigation list. Sections come
/// in already sorted by the caller (fixed kind order).
pub(crate) fn flatten(sections: &[SectionQuestions]) -> Vec<QuestionRef> {
    let mut refs = Vec::new();
    for section in sections {
        for id in section.question_ids() {
            refs.push(QuestionRef { id, kind: section.kind, order: refs.len() });
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerOption;

    fn question(id: &str, active: bool) -> ChoiceQuestion {
        ChoiceQuestion {
            id: id.to_string(),
            content: format!("question {id}"),
            options: vec![AnswerOption {
                id: format!("{id}-a"),
                content: "a".to_string(),
                correct: true,
            }],
            active,
        }
    }

    #[test]
    fn in_id_order_preserves_requested_order_and_drops_inactive() {
        let ids =
            vec!["q3".to_string(), "q1".to_string(), "q2".to_string(), "missing".to_string()];
        let fetched = vec![question("q1", true), question("q2", false), question("q3", true)];

        let ordered = in_id_order(&ids, fetched, |q| &q.id, |q| q.active);
        let ordered_ids: Vec<&str> = ordered.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ordered_ids, vec!["q3", "q1"]);
    }

    #[test]
    fn flatten_numbers_across_sections() {
        let sections = vec![
            SectionQuestions {
                kind: SectionKind::Vocabulary,
                items: SectionItems::Choice(vec![question("v1", true), question("v2", true)]),
            },
            SectionQuestions {
                kind: SectionKind::Reading,
                items: SectionItems::Choice(vec![question("r1", true)]),
            },
        ];

        let flat = flatten(&sections);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].id, "v1");
        assert_eq!(flat[0].order, 0);
        assert_eq!(flat[2].id, "r1");
        assert_eq!(flat[2].kind, SectionKind::Reading);
        assert_eq!(flat[2].order, 2);
    }
}
