pub(crate) mod aggregate;
pub(crate) mod answered;
pub(crate) mod answers;
pub(crate) mod lifecycle;
pub(crate) mod question_groups;
pub(crate) mod scoring;
