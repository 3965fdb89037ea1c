//! Database-backed store tests.
//!
//! **Requirements:**
//! - PostgreSQL running at DATABASE_URL
//! - Run with `cargo test --test store_pg -- --ignored`
//!
//! Each test seeds its own route/POI/user under a random tag, so repeated
//! runs against the same database do not collide.

use arrowtower::models::checkin::{CheckinStatus, NewCheckin};
use arrowtower::models::route::PoiRow;
use arrowtower::store::postgres::PgStore;
use uuid::Uuid;

async fn connect() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for store tests");
    let store = PgStore::connect(&url).await.expect("database connection");
    store.migrate().await.expect("migrations");
    store
}

struct Fixture {
    user_id: Uuid,
    route_id: String,
    poi_id: String,
}

async fn seed_pair(store: &PgStore) -> Fixture {
    let tag = Uuid::new_v4().simple().to_string();
    let route_id = format!("route_{tag}");
    let poi_id = format!("poi_{tag}");

    store
        .insert_route(&route_id, "测试路线", None, 30)
        .await
        .unwrap();
    store
        .insert_poi(&PoiRow {
            id: poi_id.clone(),
            route_id: route_id.clone(),
            name: "测试点位".to_string(),
            ordinal: 1,
            latitude: 39.9163,
            longitude: 116.3972,
            task_prompt: None,
        })
        .await
        .unwrap();
    let user_id = store
        .upsert_user(&format!("0x00000000{tag}"), None)
        .await
        .unwrap();

    Fixture {
        user_id,
        route_id,
        poi_id,
    }
}

fn new_checkin(f: &Fixture) -> NewCheckin {
    NewCheckin {
        user_id: f.user_id,
        route_id: f.route_id.clone(),
        poi_id: f.poi_id.clone(),
        status: CheckinStatus::Approved,
        signature: "0xsig".to_string(),
        message: "arrow-tower-checkin".to_string(),
        task_data: None,
    }
}

/// Two simultaneous submissions for the same (user, POI) must resolve to one
/// stored row, with the loser reported as a duplicate rather than erroring
/// on the unique constraint.
#[tokio::test]
#[ignore = "requires a postgres instance via DATABASE_URL"]
async fn test_concurrent_duplicate_checkins_insert_exactly_once() {
    let store = connect().await;
    let fixture = seed_pair(&store).await;

    let checkin_a = new_checkin(&fixture);
    let checkin_b = new_checkin(&fixture);
    let (a, b) = tokio::join!(
        store.insert_checkin(&checkin_a),
        store.insert_checkin(&checkin_b),
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(
        store
            .count_checkins(Some(&fixture.route_id), Some(&fixture.poi_id), None)
            .await
            .unwrap(),
        1
    );
}

/// A plain resubmission after the first check-in landed reports the
/// duplicate the same way.
#[tokio::test]
#[ignore = "requires a postgres instance via DATABASE_URL"]
async fn test_repeated_checkin_returns_none() {
    let store = connect().await;
    let fixture = seed_pair(&store).await;

    let first = store.insert_checkin(&new_checkin(&fixture)).await.unwrap();
    assert!(first.is_some());

    let second = store.insert_checkin(&new_checkin(&fixture)).await.unwrap();
    assert!(second.is_none());
}
