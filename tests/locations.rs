#![cfg(feature = "inmem-store")]

mod common;

use pinmap::auth::Caller;
use pinmap::error::ApiError;
use pinmap::locations::{find_or_create_location, search_locations, SEARCH_LIMIT};
use pinmap::models::{NewLocation, UpdatePost};
use pinmap::posts;

fn spot(name: &str, lat: f64, lng: f64) -> NewLocation {
    NewLocation { name: Some(name.to_string()), latitude: lat, longitude: lng, ..Default::default() }
}

#[tokio::test]
async fn find_or_create_matches_place_id_then_coordinates() {
    let (_state, repo) = common::state();

    let mut falls = spot("  Multnomah Falls ", 45.5762, -122.1158);
    falls.place_id = Some("g-falls".into());
    let (first, created) = find_or_create_location(&repo, falls.clone()).await.unwrap();
    assert!(created);
    assert_eq!(first.name, "Multnomah Falls");

    // same place id, different name and coordinates
    let mut renamed = spot("Falls", 1.0, 1.0);
    renamed.place_id = Some("g-falls".into());
    let (same, created) = find_or_create_location(&repo, renamed).await.unwrap();
    assert!(!created);
    assert_eq!(same.id, first.id);

    // no place id, identical coordinates
    let (by_coords, created) = find_or_create_location(&repo, spot("", 45.5762, -122.1158)).await.unwrap();
    assert!(!created);
    assert_eq!(by_coords.id, first.id);

    let (unnamed, created) = find_or_create_location(&repo, NewLocation { latitude: 10.0, longitude: 20.0, ..Default::default() }).await.unwrap();
    assert!(created);
    assert_eq!(unnamed.name, "Unknown Location");
    assert_eq!(unnamed.place_id, None);
}

#[tokio::test]
async fn coordinates_out_of_range_are_rejected() {
    let (_state, repo) = common::state();
    for (lat, lng) in [(90.5, 0.0), (-91.0, 0.0), (0.0, 180.5), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
        let err = find_or_create_location(&repo, spot("x", lat, lng)).await;
        assert!(matches!(err, Err(ApiError::Validation(_))), "{lat},{lng}");
    }
}

#[tokio::test]
async fn search_matches_name_or_address_case_insensitively() {
    let (_state, repo) = common::state();
    let mut pier = spot("Santa Monica Pier", 34.0094, -118.4973);
    pier.address = Some("200 Santa Monica Pier, CA".into());
    find_or_create_location(&repo, pier).await.unwrap();
    let mut griffith = spot("Griffith Observatory", 34.1184, -118.3004);
    griffith.address = Some("2800 E Observatory Rd, Los Angeles".into());
    find_or_create_location(&repo, griffith).await.unwrap();

    let names = |v: Vec<pinmap::models::Location>| v.into_iter().map(|l| l.name).collect::<Vec<_>>();
    assert_eq!(names(search_locations(&repo, "  PIER ").await.unwrap()), vec!["Santa Monica Pier"]);
    assert_eq!(names(search_locations(&repo, "los angeles").await.unwrap()), vec!["Griffith Observatory"]);
    assert_eq!(names(search_locations(&repo, "34").await.unwrap()), Vec::<String>::new());
    assert!(search_locations(&repo, "   ").await.unwrap().is_empty());

    for i in 0..SEARCH_LIMIT + 5 {
        find_or_create_location(&repo, spot(&format!("Overlook {i}"), 1.0 + i as f64 * 0.01, 2.0)).await.unwrap();
    }
    assert_eq!(search_locations(&repo, "overlook").await.unwrap().len() as i64, SEARCH_LIMIT);
}

#[tokio::test]
async fn posts_reference_existing_locations() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let me = Caller { id: a.id, role: a.role };
    let p = common::post(&repo, &a, true).await;
    let lake = common::location(&repo, "Crater Lake").await;

    let moved = posts::update_post(&state, &me, p.id, UpdatePost { location_id: Some(lake.id), ..Default::default() }).await.unwrap();
    assert_eq!(moved.post.location_id, lake.id);
    assert_eq!(moved.location.name, "Crater Lake");

    let missing = posts::update_post(&state, &me, p.id, UpdatePost { location_id: Some(999_999), ..Default::default() }).await;
    assert!(matches!(missing, Err(ApiError::Validation(_))));
    assert_eq!(posts::get_post(&state, None, p.id).await.unwrap().detail.location.id, lake.id);
}
