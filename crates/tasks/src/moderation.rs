//! Moderation results and the moderation task
//!
//! Field names follow the moderation endpoint exactly (`hate/threatening`,
//! `self-harm`, ...), so cached entries use the API's own vocabulary.

use crate::task::Task;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task name for moderation requests
pub const MODERATION_TASK: &str = "moderation";

/// Moderation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// `hate`
    Hate,
    /// `hate/threatening`
    HateThreatening,
    /// `self-harm`
    SelfHarm,
    /// `sexual`
    Sexual,
    /// `sexual/minors`
    SexualMinors,
    /// `violence`
    Violence,
    /// `violence/graphic`
    ViolenceGraphic,
}

impl Category {
    /// Every category, in API order
    pub const ALL: [Self; 7] = [
        Self::Hate,
        Self::HateThreatening,
        Self::SelfHarm,
        Self::Sexual,
        Self::SexualMinors,
        Self::Violence,
        Self::ViolenceGraphic,
    ];

    /// Name used by the API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hate => "hate",
            Self::HateThreatening => "hate/threatening",
            Self::SelfHarm => "self-harm",
            Self::Sexual => "sexual",
            Self::SexualMinors => "sexual/minors",
            Self::Violence => "violence",
            Self::ViolenceGraphic => "violence/graphic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per moderation category
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryMap<T> {
    /// `hate`
    pub hate: T,
    /// `hate/threatening`
    #[serde(rename = "hate/threatening")]
    pub hate_threatening: T,
    /// `self-harm`
    #[serde(rename = "self-harm")]
    pub self_harm: T,
    /// `sexual`
    pub sexual: T,
    /// `sexual/minors`
    #[serde(rename = "sexual/minors")]
    pub sexual_minors: T,
    /// `violence`
    pub violence: T,
    /// `violence/graphic`
    #[serde(rename = "violence/graphic")]
    pub violence_graphic: T,
}

impl<T: Copy> CategoryMap<T> {
    /// Value for `category`
    #[must_use]
    pub fn get(&self, category: Category) -> T {
        match category {
            Category::Hate => self.hate,
            Category::HateThreatening => self.hate_threatening,
            Category::SelfHarm => self.self_harm,
            Category::Sexual => self.sexual,
            Category::SexualMinors => self.sexual_minors,
            Category::Violence => self.violence,
            Category::ViolenceGraphic => self.violence_graphic,
        }
    }

    /// `(category, value)` pairs in API order
    pub fn iter(&self) -> impl Iterator<Item = (Category, T)> + '_ {
        Category::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}

/// Whether each category was flagged
pub type Categories = CategoryMap<bool>;

/// Score reported for each category
pub type CategoryScores = CategoryMap<f64>;

/// Moderation result for a single text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    /// Whether each category is flagged
    pub categories: Categories,
    /// Score for each category
    pub category_scores: CategoryScores,
    /// Whether any category is flagged
    pub flagged: bool,
}

impl ModerationResult {
    /// Categories flagged in this result, in API order
    #[must_use]
    pub fn flagged_categories(&self) -> Vec<Category> {
        self.categories
            .iter()
            .filter_map(|(c, flagged)| flagged.then_some(c))
            .collect()
    }

    /// Category with the highest score; ties go to the earlier category
    ///
    /// Scores are ordered with [`f64::total_cmp`], so a positive NaN score ranks
    /// above every number and the returned score is always one of the reported ones.
    #[must_use]
    pub fn top_category(&self) -> (Category, f64) {
        let first = (Category::Hate, self.category_scores.hate);
        self.category_scores
            .iter()
            .skip(1)
            .fold(first, |best, (c, score)| {
                if score.total_cmp(&best.1).is_gt() {
                    (c, score)
                } else {
                    best
                }
            })
    }
}

/// Moderation task over a remote client
pub struct ModerationTask<F> {
    client: F,
}

impl<F> ModerationTask<F> {
    /// Wrap a client returning one result per text
    pub fn new(client: F) -> Self {
        Self { client }
    }
}

impl<F> fmt::Debug for ModerationTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModerationTask").finish_non_exhaustive()
    }
}

impl<F, E> Task for ModerationTask<F>
where
    F: Fn(&[String]) -> std::result::Result<Vec<ModerationResult>, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = Vec<ModerationResult>;
    type Error = Error;

    fn name(&self) -> &str {
        MODERATION_TASK
    }

    fn compute(&self, texts: &[String]) -> Result<Vec<ModerationResult>> {
        tracing::info!(texts = texts.len(), "Querying moderation endpoint");
        let results = (self.client)(texts).map_err(|e| Error::remote(MODERATION_TASK, e))?;
        self.check_output(texts, &results)?;
        Ok(results)
    }

    fn check_output(&self, texts: &[String], output: &Vec<ModerationResult>) -> Result<()> {
        if output.len() != texts.len() {
            return Err(Error::shape(
                MODERATION_TASK,
                format!("{} results for {} texts", output.len(), texts.len()),
            ));
        }
        Ok(())
    }
}
