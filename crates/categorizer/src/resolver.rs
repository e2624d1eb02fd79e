/// Category resolution: turn a validated verdict plus the category snapshot into the
/// category an entry is filed under.
///
/// The resolver holds no mutable state. All shared state lives in the store, accessed as
/// a snapshot read followed by a constraint-checked write. Concurrent creation of the
/// same title is settled by the store's uniqueness constraint plus a single re-read.
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::color::{is_hex_color, random_pastel};
use crate::error::{ResolutionError, StoreError};
use crate::model::{Category, ResolvedCategory};
use crate::store::CategoryStore;
use crate::verdict::{ClassificationVerdict, VerdictAction};

pub const DEFAULT_CATEGORY_TITLE: &str = "General";

#[derive(Debug, Clone)]
pub struct ResolverPolicy {
    /// When the classifier names an id that does not exist, create a category from that
    /// value instead of failing. Keeps the save path available at the cost of accuracy.
    pub recovery_creation: bool,
    /// Title used when the classifier supplies none.
    pub default_title: String,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            recovery_creation: true,
            default_title: DEFAULT_CATEGORY_TITLE.to_string(),
        }
    }
}

pub struct CategoryResolver {
    store: Arc<dyn CategoryStore>,
    policy: ResolverPolicy,
}

impl CategoryResolver {
    pub fn new(store: Arc<dyn CategoryStore>, policy: ResolverPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn resolve(
        &self,
        verdict: &ClassificationVerdict,
        known: &[Category],
    ) -> Result<ResolvedCategory, ResolutionError> {
        match verdict.action {
            VerdictAction::Existing => self.resolve_existing(verdict, known).await,
            VerdictAction::New => {
                let title = self.title_or_default(verdict.new_title.as_deref());
                let color = match verdict.new_color.as_deref() {
                    Some(c) if is_hex_color(c.trim()) => c.trim().to_string(),
                    Some(c) => {
                        warn!(color = c, "classifier proposed a non-hex color, using pastel");
                        random_pastel()
                    }
                    None => random_pastel(),
                };
                let category = self.get_or_create(&title, &color).await?;
                Ok(ResolvedCategory::from(&category))
            }
        }
    }

    async fn resolve_existing(
        &self,
        verdict: &ClassificationVerdict,
        known: &[Category],
    ) -> Result<ResolvedCategory, ResolutionError> {
        let category_id = verdict
            .category_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let Some(category_id) = category_id else {
            // The model sometimes puts the title where the id belongs.
            let wanted = verdict.new_title.as_deref().map(str::trim);
            return match wanted.and_then(|t| known.iter().find(|c| c.title == t)) {
                Some(category) => {
                    info!(title = %category.title, "matched existing category by title");
                    Ok(ResolvedCategory::from(category))
                }
                None => Err(ResolutionError::MissingCategoryReference),
            };
        };

        if let Some(category) = known.iter().find(|c| c.id == category_id) {
            return Ok(ResolvedCategory::from(category));
        }

        if !self.policy.recovery_creation {
            warn!(category_id, "classifier selected a non-existent category id");
            return Err(ResolutionError::MissingCategoryReference);
        }

        warn!(
            category_id,
            "classifier selected a non-existent category id, falling back to creating it"
        );
        let title = self.title_or_default(Some(category_id));
        let category = self.get_or_create(&title, &random_pastel()).await?;
        Ok(ResolvedCategory::from(&category))
    }

    /// Fetch the category titled `title`, creating it with `color` if absent.
    ///
    /// An existing category is returned unmodified, whatever `color` says. A uniqueness
    /// violation on insert means another request created the title first; the lookup and
    /// insert are retried exactly once. A second violation is `StoreInconsistent`.
    pub async fn get_or_create(&self, title: &str, color: &str) -> Result<Category, ResolutionError> {
        let title = title.trim();
        if let Some(category) = self.create_or_fetch(title, color).await? {
            return Ok(category);
        }

        warn!(title, "category title taken concurrently, re-reading");
        if let Some(category) = self.create_or_fetch(title, color).await? {
            return Ok(category);
        }

        error!(title, "category title violated uniqueness twice");
        Err(ResolutionError::StoreInconsistent {
            title: title.to_string(),
        })
    }

    /// `Ok(None)` when the insert hit the uniqueness constraint.
    async fn create_or_fetch(&self, title: &str, color: &str) -> Result<Option<Category>, StoreError> {
        if let Some(existing) = self.store.find_by_title(title).await? {
            return Ok(Some(existing));
        }
        match self.store.create(title, Some(color)).await {
            Ok(category) => {
                info!(id = %category.id, title, color, "created category");
                Ok(Some(category))
            }
            Err(StoreError::DuplicateTitle(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn title_or_default(&self, title: Option<&str>) -> String {
        title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.policy.default_title)
            .to_string()
    }
}
