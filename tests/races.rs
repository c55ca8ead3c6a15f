use std::{collections::HashSet, net::SocketAddr};

use ecoshift::{
    auth::{self, SignupRequest},
    config::{AppConfig, Backend},
    db,
    error::AppError,
    models::{
        study_group::StudyGroupDraft,
        trip::TripDraft,
        user::{User, UserRole},
    },
    services::{rides, study},
    state::AppState,
};
use tempfile::TempDir;

struct TestState {
    app: AppState,
    _root: TempDir,
}

async fn test_state() -> TestState {
    let root = TempDir::new().expect("temp dir");
    let db_path = root.path().join("races.sqlite");
    let config = AppConfig {
        database_url: format!("sqlite://{}", db_path.to_string_lossy()),
        backend: Backend::Sqlite,
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        static_dir: root.path().join("static"),
        cookie_secret: "races-secret".into(),
    };
    let repo = db::connect(config.backend, &config.database_url)
        .await
        .expect("connect");
    TestState {
        app: AppState::new(config, repo),
        _root: root,
    }
}

async fn add_user(state: &AppState, id: &str) -> User {
    let user = User {
        id: id.into(),
        name: id.split('@').next().unwrap_or(id).into(),
        role: UserRole::Both,
        skills: Vec::new(),
        accessibility_needs: Vec::new(),
        credits: 0,
        password_hash: None,
    };
    state.repo.upsert_user(&user).await.expect("upsert user");
    user
}

async fn offer(state: &AppState, driver: &str, seats: i64) -> String {
    let draft = TripDraft {
        id: None,
        driver_id: driver.into(),
        driver_name: "Ada".into(),
        from: "Imola".into(),
        to: "Bologna".into(),
        departure_time: "2026-10-19T08:00".into(),
        seats_available: seats,
        distance_km: 10.0,
        co2_saved: None,
        tutoring_subject: None,
        assistance_offered: false,
        special_equipment: Vec::new(),
        passenger_ids: Vec::new(),
    };
    rides::offer(state, draft).await.expect("offer").trip.id
}

async fn credits_of(state: &AppState, id: &str) -> i64 {
    state
        .repo
        .find_user(id)
        .await
        .expect("find user")
        .expect("user exists")
        .credits
}

#[tokio::test]
async fn stale_trip_update_is_refused_and_leaves_row_alone() {
    let test = test_state().await;
    let state = &test.app;
    add_user(state, "ada@uni.it").await;
    let bob = add_user(state, "bob@uni.it").await;
    let carla = add_user(state, "carla@uni.it").await;
    let trip_id = offer(state, "ada@uni.it", 3).await;

    let snapshot = state.repo.find_trip(&trip_id).await.unwrap().unwrap();
    let bob_plan = rides::plan_booking(&snapshot, &bob, 1).unwrap();
    let carla_plan = rides::plan_booking(&snapshot, &carla, 2).unwrap();

    assert!(state.repo.apply_trip_update(&bob_plan).await.unwrap());
    assert!(!state.repo.apply_trip_update(&carla_plan).await.unwrap());

    let trip = state.repo.find_trip(&trip_id).await.unwrap().unwrap();
    assert_eq!(trip.seats_available, 2);
    assert_eq!(trip.passenger_ids, vec!["bob@uni.it".to_string()]);
    assert_eq!(credits_of(state, "carla@uni.it").await, 0);
    assert!(state
        .repo
        .list_credit_logs("carla@uni.it")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        state.repo.list_notifications("ada@uni.it").await.unwrap().len(),
        1
    );

    // The workflow replans against the fresh row and gets through.
    let receipt = rides::book(state, &trip_id, "carla@uni.it", 2).await.unwrap();
    assert_eq!(receipt.trip.seats_available, 0);
    assert_eq!(receipt.trip.passenger_ids.len(), 2);
}

#[tokio::test]
async fn stale_trip_removal_is_refused() {
    let test = test_state().await;
    let state = &test.app;
    add_user(state, "ada@uni.it").await;
    add_user(state, "bob@uni.it").await;
    let trip_id = offer(state, "ada@uni.it", 3).await;

    let snapshot = state.repo.find_trip(&trip_id).await.unwrap().unwrap();
    let removal = rides::plan_trip_cancel(&snapshot);
    rides::book(state, &trip_id, "bob@uni.it", 1).await.unwrap();

    assert!(!state.repo.apply_trip_removal(&removal).await.unwrap());
    let trip = state.repo.find_trip(&trip_id).await.unwrap();
    assert!(trip.is_some());
    assert_eq!(credits_of(state, "ada@uni.it").await, rides::OFFER_BONUS);

    // Replanned removal notifies the passenger who joined in between.
    rides::cancel_trip(state, &trip_id, Some("ada@uni.it"))
        .await
        .unwrap();
    let notified = state.repo.list_notifications("bob@uni.it").await.unwrap();
    assert_eq!(notified.len(), 1);
}

#[tokio::test]
async fn stale_member_list_is_refused() {
    let test = test_state().await;
    let state = &test.app;
    let group = study::create(state, group_draft(4)).await.unwrap();

    let expected = group.members.clone();
    let mut first = expected.clone();
    first.push("bob@uni.it".into());
    let mut second = expected.clone();
    second.push("carla@uni.it".into());

    assert!(state
        .repo
        .replace_group_members(&group.id, &expected, &first)
        .await
        .unwrap());
    assert!(!state
        .repo
        .replace_group_members(&group.id, &expected, &second)
        .await
        .unwrap());

    let stored = state.repo.find_study_group(&group.id).await.unwrap().unwrap();
    assert_eq!(stored.members, first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_oversell() {
    const SEATS: i64 = 4;
    let test = test_state().await;
    let state = test.app.clone();
    add_user(&state, "ada@uni.it").await;
    let trip_id = offer(&state, "ada@uni.it", SEATS).await;

    let passengers: Vec<String> = (0..11).map(|n| format!("p{n}@uni.it")).collect();
    for id in &passengers {
        add_user(&state, id).await;
    }

    let handles: Vec<_> = passengers
        .iter()
        .cloned()
        .map(|id| {
            let state = state.clone();
            let trip_id = trip_id.clone();
            tokio::spawn(async move { rides::book(&state, &trip_id, &id, 1).await })
        })
        .collect();

    let mut booked = 0usize;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => booked += 1,
            Err(err) => assert!(matches!(err, AppError::Conflict(_)), "{err:?}"),
        }
    }

    let trip = state.repo.find_trip(&trip_id).await.unwrap().unwrap();
    assert!(booked >= 1);
    assert_eq!(trip.passenger_ids.len(), booked);
    assert_eq!(trip.seats_available + trip.passenger_ids.len() as i64, SEATS);
    let unique: HashSet<_> = trip.passenger_ids.iter().collect();
    assert_eq!(unique.len(), booked);

    let mut credited = 0usize;
    for id in &passengers {
        if credits_of(&state, id).await > 0 {
            credited += 1;
            assert!(trip.has_passenger(id));
        }
    }
    assert_eq!(credited, booked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_of_one_seat_charge_once() {
    let test = test_state().await;
    let state = test.app.clone();
    add_user(&state, "ada@uni.it").await;
    add_user(&state, "bob@uni.it").await;
    let trip_id = offer(&state, "ada@uni.it", 3).await;
    rides::book(&state, &trip_id, "bob@uni.it", 1).await.unwrap();
    let before = credits_of(&state, "bob@uni.it").await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let trip_id = trip_id.clone();
            tokio::spawn(
                async move { rides::cancel_participation(&state, &trip_id, "bob@uni.it").await },
            )
        })
        .collect();
    let mut cancelled = 0;
    for handle in handles {
        if handle.await.expect("task").is_ok() {
            cancelled += 1;
        }
    }

    assert_eq!(cancelled, 1);
    assert_eq!(
        credits_of(&state, "bob@uni.it").await,
        before + rides::PARTICIPATION_CANCEL_PENALTY
    );
    let trip = state.repo.find_trip(&trip_id).await.unwrap().unwrap();
    assert_eq!(trip.seats_available, 3);
    assert!(trip.passenger_ids.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_respect_the_member_cap() {
    let test = test_state().await;
    let state = test.app.clone();
    let mut draft = group_draft(4);
    draft.members = vec!["ada@uni.it".into(), "bob@uni.it".into()];
    let group = study::create(&state, draft).await.unwrap();

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let state = state.clone();
            let group_id = group.id.clone();
            tokio::spawn(async move {
                study::join(&state, &group_id, &format!("s{n}@uni.it")).await
            })
        })
        .collect();

    let mut joined = 0usize;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(outcome) => {
                assert_eq!(outcome.message(), "Joined group");
                joined += 1;
            }
            Err(err) => assert!(
                matches!(err, AppError::BadRequest(_) | AppError::Conflict(_)),
                "{err:?}"
            ),
        }
    }

    let stored = state.repo.find_study_group(&group.id).await.unwrap().unwrap();
    assert!(stored.members.len() as i64 <= stored.max_members);
    assert_eq!(stored.members.len(), 2 + joined);
    assert!(joined >= 1);
    let unique: HashSet<_> = stored.members.iter().collect();
    assert_eq!(unique.len(), stored.members.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signups_for_one_email_keep_the_first_account() {
    let test = test_state().await;
    let state = test.app.clone();

    let handles: Vec<_> = ["first-pass", "second-pass"]
        .into_iter()
        .map(|password| {
            let state = state.clone();
            tokio::spawn(async move {
                let request = SignupRequest {
                    email: "x@uni.it".into(),
                    name: "X".into(),
                    role: UserRole::Passenger,
                    password: password.into(),
                };
                (password, auth::register_user(&state, request).await)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (password, result) = handle.await.expect("task");
        match result {
            Ok(_) => winners.push(password),
            Err(err) => assert!(matches!(err, AppError::Conflict(_)), "{err:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let winner = winners[0];
    let loser = if winner == "first-pass" {
        "second-pass"
    } else {
        "first-pass"
    };
    assert!(auth::authenticate_user(&state, "x@uni.it", winner).await.is_ok());
    assert!(matches!(
        auth::authenticate_user(&state, "x@uni.it", loser).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn inserting_an_existing_user_is_a_conflict() {
    let test = test_state().await;
    let state = &test.app;
    let user = add_user(state, "ada@uni.it").await;
    let err = state.repo.insert_user(&user).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn offering_as_an_unknown_driver_writes_nothing() {
    let test = test_state().await;
    let state = &test.app;
    let draft = TripDraft {
        id: None,
        driver_id: "ghost@uni.it".into(),
        driver_name: "Ghost".into(),
        from: "Imola".into(),
        to: "Bologna".into(),
        departure_time: "2026-10-19T08:00".into(),
        seats_available: 3,
        distance_km: 10.0,
        co2_saved: None,
        tutoring_subject: None,
        assistance_offered: false,
        special_equipment: Vec::new(),
        passenger_ids: Vec::new(),
    };

    let err = rides::offer(state, draft).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(state.repo.list_trips().await.unwrap().is_empty());
    assert!(state
        .repo
        .list_credit_logs("ghost@uni.it")
        .await
        .unwrap()
        .is_empty());
}

fn group_draft(max_members: i64) -> StudyGroupDraft {
    StudyGroupDraft {
        id: None,
        train_number: "RV 2112".into(),
        train_line: "Bologna - Rimini".into(),
        departure_time: "08:12".into(),
        subject: "Analisi 2".into(),
        from: "Bologna Centrale".into(),
        creator_id: "ada@uni.it".into(),
        members: Vec::new(),
        max_members: Some(max_members),
    }
}
