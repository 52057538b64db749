//! Product and category administration and storefront browsing.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Category, Product, ProductDraft};
use crate::domain::events::{CategoryEvent, DomainEvent, ProductEvent};
use crate::services::EventPublisher;
use crate::store::{CategoryStore, ProductFilter, ProductPage, ProductStore};
use crate::{CheckoutError, Result};

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
    categories: Arc<dyn CategoryStore>,
    publisher: EventPublisher,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>, categories: Arc<dyn CategoryStore>, publisher: EventPublisher) -> Self {
        Self { products, categories, publisher }
    }

    pub async fn products(&self, filter: &ProductFilter) -> Result<ProductPage> { self.products.list(filter).await }

    /// The newest `count` featured products.
    pub async fn featured(&self, count: u32) -> Result<Vec<Product>> {
        let filter = ProductFilter { featured: Some(true), ..ProductFilter::page(Some(1), Some(count)) };
        Ok(self.products.list(&filter).await?.products)
    }

    pub async fn product(&self, id: Uuid) -> Result<Product> {
        self.products.get(id).await?.ok_or(CheckoutError::ProductNotFound)
    }

    pub async fn product_count(&self) -> Result<u64> { self.products.count().await }

    async fn require_category(&self, id: Uuid) -> Result<()> {
        match self.categories.get(id).await? {
            Some(_) => Ok(()),
            None => Err(CheckoutError::InvalidCategory),
        }
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        self.require_category(draft.category_id).await?;
        let mut product = Product::create(draft)?;
        self.products.insert(&product).await?;
        tracing::info!(product = %product.id(), name = product.name(), "product created");
        self.publisher.publish(product.take_events()).await;
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, draft: ProductDraft) -> Result<Product> {
        let mut product = self.product(id).await?;
        if draft.category_id != product.category_id() {
            self.require_category(draft.category_id).await?;
        }
        product.update(draft)?;
        self.products.update(&product).await?;
        tracing::info!(product = %id, price = %product.price(), "product updated");
        self.publisher.publish(product.take_events()).await;
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        let product = self.products.delete(id).await?.ok_or(CheckoutError::ProductNotFound)?;
        tracing::info!(product = %id, name = product.name(), "product deleted");
        self.publisher.publish(vec![DomainEvent::Product(ProductEvent::Deleted { product_id: id })]).await;
        Ok(())
    }

    pub async fn categories(&self) -> Result<Vec<Category>> { self.categories.list().await }

    pub async fn category(&self, id: Uuid) -> Result<Category> {
        self.categories.get(id).await?.ok_or(CheckoutError::CategoryNotFound)
    }

    pub async fn create_category(&self, name: &str, images: Vec<String>) -> Result<Category> {
        let mut category = Category::create(name, images)?;
        self.categories.insert(&category).await?;
        tracing::info!(category = %category.id(), slug = category.slug(), "category created");
        self.publisher.publish(category.take_events()).await;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, name: &str, images: Vec<String>) -> Result<Category> {
        let mut category = self.category(id).await?;
        category.rename(name, images)?;
        self.categories.update(&category).await?;
        tracing::info!(category = %id, slug = category.slug(), "category updated");
        self.publisher.publish(category.take_events()).await;
        Ok(category)
    }

    /// Refused while any product is still filed under the category.
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if self.products.count_in_category(id).await? > 0 { return Err(CheckoutError::CategoryInUse); }
        let category = self.categories.delete(id).await?.ok_or(CheckoutError::CategoryNotFound)?;
        tracing::info!(category = %id, slug = category.slug(), "category deleted");
        self.publisher.publish(vec![DomainEvent::Category(CategoryEvent::Deleted { category_id: id })]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product_draft;
    use crate::domain::value_objects::Money;
    use crate::store::{MemoryCategoryStore, MemoryProductStore};

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryProductStore::new()), Arc::new(MemoryCategoryStore::new()), EventPublisher::disabled())
    }

    #[tokio::test]
    async fn test_products_need_a_real_category() {
        let svc = service();
        let err = svc.create_product(product_draft("Kurta", Uuid::now_v7(), 999)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidCategory));
        assert_eq!(err.to_string(), "Invalid Category");

        let ethnic = svc.create_category("Ethnic", vec![]).await.unwrap();
        let p = svc.create_product(product_draft("Kurta", ethnic.id(), 999)).await.unwrap();
        let err = svc.update_product(p.id(), product_draft("Kurta", Uuid::now_v7(), 999)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidCategory));

        let updated = svc.update_product(p.id(), product_draft("Kurta", ethnic.id(), 799)).await.unwrap();
        assert_eq!(svc.product(p.id()).await.unwrap().price(), Money::rupees(799));
        assert_eq!(updated.price(), Money::rupees(799));
        assert_eq!(svc.product_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_category_in_use_cannot_be_deleted() {
        let svc = service();
        let ethnic = svc.create_category("Ethnic", vec![]).await.unwrap();
        let p = svc.create_product(product_draft("Kurta", ethnic.id(), 999)).await.unwrap();
        assert!(matches!(svc.delete_category(ethnic.id()).await, Err(CheckoutError::CategoryInUse)));

        svc.delete_product(p.id()).await.unwrap();
        assert!(matches!(svc.delete_product(p.id()).await, Err(CheckoutError::ProductNotFound)));
        svc.delete_category(ethnic.id()).await.unwrap();
        assert!(matches!(svc.category(ethnic.id()).await, Err(CheckoutError::CategoryNotFound)));
    }

    #[tokio::test]
    async fn test_featured_newest_first() {
        let svc = service();
        let c = svc.create_category("Western", vec![]).await.unwrap();
        for name in ["Denim", "Blazer", "Shirt"] {
            let mut d = product_draft(name, c.id(), 1500);
            d.is_featured = name != "Blazer";
            svc.create_product(d).await.unwrap();
        }
        let featured = svc.featured(5).await.unwrap();
        let names: Vec<&str> = featured.iter().map(Product::name).collect();
        assert_eq!(names, ["Shirt", "Denim"]);
        assert_eq!(svc.featured(1).await.unwrap().len(), 1);
    }
}
