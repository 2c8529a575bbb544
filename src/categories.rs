use crate::error::ApiError;
use crate::models::{Category, CategoryInput, CategoryWithCount, Id};
use crate::repo::Repo;

fn normalize(mut input: CategoryInput) -> Result<CategoryInput, ApiError> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(ApiError::validation("Category name is required"));
    }
    Ok(input)
}

pub async fn list_categories(repo: &dyn Repo) -> Result<Vec<CategoryWithCount>, ApiError> {
    Ok(repo.list_categories().await?)
}

pub async fn get_category(repo: &dyn Repo, id: Id) -> Result<CategoryWithCount, ApiError> {
    Ok(repo.get_category(id).await?)
}

pub async fn create_category(repo: &dyn Repo, input: CategoryInput) -> Result<Category, ApiError> {
    let category = repo.create_category(normalize(input)?).await?;
    log::info!("category {} ({}) created", category.id, category.name);
    Ok(category)
}

pub async fn update_category(repo: &dyn Repo, id: Id, input: CategoryInput) -> Result<Category, ApiError> {
    Ok(repo.update_category(id, normalize(input)?).await?)
}

/// Refused with a conflict while any post is still tagged with the category.
pub async fn delete_category(repo: &dyn Repo, id: Id) -> Result<(), ApiError> {
    repo.delete_category(id).await?;
    log::info!("category {id} deleted");
    Ok(())
}
