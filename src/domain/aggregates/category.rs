//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::CatalogError;
use crate::domain::events::{CategoryEvent, DomainEvent};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) images: Vec<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// "Ethnic Wear" becomes "ethnic-wear".
fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase).collect::<Vec<_>>().join("-")
}

impl Category {
    pub fn create(name: &str, images: Vec<String>) -> Result<Self, CatalogError> {
        let name = name.trim();
        if slugify(name).is_empty() { return Err(CatalogError::MissingName); }
        let now = Utc::now();
        let mut category = Self {
            id: Uuid::now_v7(), name: name.to_string(), slug: slugify(name),
            images: images.into_iter().filter(|i| !i.trim().is_empty()).collect(),
            created_at: now, updated_at: now, events: vec![],
        };
        category.raise_event(DomainEvent::Category(CategoryEvent::Created { category_id: category.id, slug: category.slug.clone() }));
        Ok(category)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn slug(&self) -> &str { &self.slug }
    pub fn images(&self) -> &[String] { &self.images }

    pub fn rename(&mut self, name: &str, images: Vec<String>) -> Result<(), CatalogError> {
        let name = name.trim();
        if slugify(name).is_empty() { return Err(CatalogError::MissingName); }
        self.name = name.to_string();
        self.slug = slugify(name);
        self.images = images.into_iter().filter(|i| !i.trim().is_empty()).collect();
        self.touch();
        self.raise_event(DomainEvent::Category(CategoryEvent::Updated { category_id: self.id, slug: self.slug.clone() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
