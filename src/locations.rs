use crate::error::ApiError;
use crate::models::{Location, NewLocation};
use crate::repo::Repo;

pub const SEARCH_LIMIT: i64 = 20;
const UNKNOWN_LOCATION: &str = "Unknown Location";

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Name or address search. A blank query matches nothing.
pub async fn search_locations(repo: &dyn Repo, query: &str) -> Result<Vec<Location>, ApiError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    Ok(repo.search_locations(query, SEARCH_LIMIT).await?)
}

/// Resolve a picked place to a stored location, creating it on first use.
/// Returns the row and whether it was created by this call.
pub async fn find_or_create_location(repo: &dyn Repo, mut new: NewLocation) -> Result<(Location, bool), ApiError> {
    if !new.latitude.is_finite() || !(-90.0..=90.0).contains(&new.latitude) {
        return Err(ApiError::validation("Latitude must be between -90 and 90"));
    }
    if !new.longitude.is_finite() || !(-180.0..=180.0).contains(&new.longitude) {
        return Err(ApiError::validation("Longitude must be between -180 and 180"));
    }
    new.name = Some(trimmed(new.name).unwrap_or_else(|| UNKNOWN_LOCATION.to_string()));
    new.place_id = trimmed(new.place_id);
    new.address = trimmed(new.address);
    new.country = trimmed(new.country);
    new.region = trimmed(new.region);

    let (location, created) = repo.find_or_create_location(new).await?;
    if created {
        log::info!("location {} created ({})", location.id, location.name);
    }
    Ok((location, created))
}
