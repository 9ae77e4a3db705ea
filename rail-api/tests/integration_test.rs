mod common;

use axum::http::{Method, StatusCode};
use common::{create_trip, get, post, register, seed_route, send, test_state, test_state_with, PASSWORD};
use rail_api::app;
use serde_json::json;

#[tokio::test]
async fn test_register_and_login() {
    let app = app(test_state());

    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "asha", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "asha");
    assert_eq!(body["role"], "user");
    assert!(body["token"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "asha", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "bala", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "asha", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = get(&app, "/stations", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "asha", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn test_admin_self_registration_is_gated() {
    let app = app(test_state_with(false, 5_000));

    let (status, _) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "root", "password": PASSWORD, "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = app(test_state());

    let (status, body) = send(&app, Method::GET, "/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = get(&app, "/trips", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_writes_require_admin() {
    let app = app(test_state());
    let user = register(&app, "asha", "user").await;

    let (status, _) = post(&app, "/stations", &user, json!({ "name": "Pune" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, "/trains/11039", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_catalog_crud_keeps_references_intact() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let trip_id = seed_route(&app, &admin, 40).await;

    // Duplicate station
    let (status, _) = post(&app, "/stations", &admin, json!({ "name": "Pune" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // In use by train 11039
    let (status, _) = send(&app, Method::DELETE, "/stations/Pune", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/stations/Pune",
        Some(&admin),
        Some(json!({ "name": "Pune Junction" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Pune Junction");

    let (_, train) = get(&app, "/trains/11039", &admin).await;
    assert_eq!(train["source"], "Pune Junction");

    let (status, _) = post(
        &app,
        "/trains",
        &admin,
        json!({ "no": "12139", "name": "Sewagram Express", "source": "Mumbai", "destination": "Nagpur" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, trip) = get(&app, &format!("/trips/{trip_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["train"], "11039");
    assert_eq!(trip["free_seats"], 40);
    assert_eq!(trip["available_seats"], 40);

    let (status, _) = get(&app, "/trips/9999", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trip_validation() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    seed_route(&app, &admin, 10).await;

    let (status, _) = post(
        &app,
        "/trips",
        &admin,
        json!({
            "train": "11039",
            "starting_time_date": "2030-04-01T06:00:00Z",
            "ending_time_date": "2030-04-01T05:00:00Z",
            "total_seats": 10,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        "/trips",
        &admin,
        json!({
            "train": "11039",
            "starting_time_date": "2030-04-01T06:00:00Z",
            "ending_time_date": "2030-04-01T20:00:00Z",
            "total_seats": 0,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Clients cannot seed free_seats.
    let (status, body) = post(
        &app,
        "/trips",
        &admin,
        json!({
            "train": "11039",
            "starting_time_date": "2030-04-01T06:00:00Z",
            "ending_time_date": "2030-04-01T20:00:00Z",
            "total_seats": 12,
            "free_seats": 500,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["free_seats"], 12);

    let (status, _) = post(
        &app,
        "/trips",
        &admin,
        json!({
            "train": "00000",
            "starting_time_date": "2030-05-01T06:00:00Z",
            "ending_time_date": "2030-05-01T20:00:00Z",
            "total_seats": 12,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_train_search_and_ordering() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    seed_route(&app, &admin, 10).await;
    let (status, _) = post(
        &app,
        "/trains",
        &admin,
        json!({ "no": "12105", "name": "Vidarbha Express", "source": "Nagpur", "destination": "Pune" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app, "/trains?ordering=-no", &admin).await;
    let numbers: Vec<&str> = body.as_array().unwrap().iter().map(|t| t["no"].as_str().unwrap()).collect();
    assert_eq!(numbers, vec!["12105", "11039"]);

    let (_, body) = get(&app, "/trains?search=vidarbha", &admin).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["no"], "12105");

    let (_, body) = get(&app, "/trains?source=Pune", &admin).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["no"], "11039");
}

#[tokio::test]
async fn test_availability_filters_by_route_and_date() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let first = seed_route(&app, &admin, 10).await;
    let second = create_trip(&app, &admin, "2030-03-05T06:00:00Z", "2030-03-06T00:30:00Z", 10).await;

    let (status, body) = get(&app, "/availability?source=Pune&destination=Nagpur", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body.as_array().unwrap().iter().map(|t| t["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![first, second]);

    let (_, body) = get(&app, "/availability?date=2030-03-05", &admin).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], second);

    let (_, body) = get(&app, "/availability?date_to=2030-03-02", &admin).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], first);

    let (_, body) = get(&app, "/availability?source=Nagpur", &admin).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = get(&app, "/availability?date_from=2030-03-06&date_to=2030-03-01", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_seat_flow() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let user = register(&app, "asha", "user").await;
    let trip_id = seed_route(&app, &admin, 6).await;

    let (status, body) = post(&app, "/book-seat", &user, json!({ "trip_id": trip_id, "seat_count": 2 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Seats booked successfully!");
    assert_eq!(body["trip_id"], trip_id);
    assert_eq!(body["seat_count"], 2);
    assert_eq!(body["remaining_free_seats"], 4);
    let booking_id = body["booking_id"].clone();

    // A repeat request grows the same booking.
    let (status, body) = post(&app, "/book-seat", &user, json!({ "trip_id": trip_id, "seat_count": 3 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking_id"], booking_id);
    assert_eq!(body["seat_count"], 5);
    assert_eq!(body["remaining_free_seats"], 1);

    let (status, body) = post(&app, "/book-seat", &user, json!({ "trip_id": trip_id, "seat_count": 2 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not enough seats available.");

    for bad in [0, -1] {
        let (status, _) = post(&app, "/book-seat", &user, json!({ "trip_id": trip_id, "seat_count": bad })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = post(&app, "/book-seat", &user, json!({ "trip_id": 9999, "seat_count": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app, "/my-bookings", &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user"], "asha");
    assert_eq!(body[0]["trip"], trip_id);
    assert_eq!(body[0]["seat_count"], 5);

    let (status, body) = get(&app, &format!("/my-bookings/{trip_id}"), &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], booking_id);

    // Bookings are private to their owner.
    let (status, body) = get(&app, &format!("/my-bookings/{trip_id}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No booking found for this trip and user.");

    let (_, trip) = get(&app, &format!("/trips/{trip_id}"), &user).await;
    assert_eq!(trip["free_seats"], 1);

    // Booked trips and their trains cannot be removed.
    let (status, _) = send(&app, Method::DELETE, &format!("/trips/{trip_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, Method::DELETE, "/trains/11039", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_trip_update_keeps_capacity() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let user = register(&app, "asha", "user").await;
    let trip_id = seed_route(&app, &admin, 8).await;
    post(&app, "/book-seat", &user, json!({ "trip_id": trip_id, "seat_count": 3 })).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/trips/{trip_id}"),
        Some(&admin),
        Some(json!({
            "train": "11039",
            "starting_time_date": "2030-03-01T07:00:00Z",
            "ending_time_date": "2030-03-02T01:30:00Z",
            "total_seats": 100,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["starting_time_date"], "2030-03-01T07:00:00Z");
    assert_eq!(body["total_seats"], 8);
    assert_eq!(body["free_seats"], 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_over_http_never_oversell() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let trip_id = seed_route(&app, &admin, 5).await;

    let mut tokens = Vec::new();
    for i in 0..12 {
        tokens.push(register(&app, &format!("rider{i}"), "user").await);
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let app = app.clone();
            tokio::spawn(async move {
                post(&app, "/book-seat", &token, json!({ "trip_id": trip_id, "seat_count": 1 }))
                    .await
                    .0
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }
    assert_eq!(created, 5);

    let (_, trip) = get(&app, &format!("/trips/{trip_id}"), &admin).await;
    assert_eq!(trip["free_seats"], 0);
}

#[tokio::test]
async fn test_busy_trip_times_out() {
    let state = test_state_with(true, 50);
    let engine = state.engine.clone();
    let app = app(state);
    let admin = register(&app, "admin", "admin").await;
    let trip_id = seed_route(&app, &admin, 4).await;

    let held = engine.locks().acquire(trip_id).await;
    let (status, body) = post(&app, "/book-seat", &admin, json!({ "trip_id": trip_id, "seat_count": 1 })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
    drop(held);

    let (_, trip) = get(&app, &format!("/trips/{trip_id}"), &admin).await;
    assert_eq!(trip["free_seats"], 4);

    let (status, _) = post(&app, "/book-seat", &admin, json!({ "trip_id": trip_id, "seat_count": 1 })).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let app = app(test_state());
    let admin = register(&app, "admin", "admin").await;
    let trip_id = seed_route(&app, &admin, 4).await;

    let bodies = [
        json!({ "seat_count": 1 }),
        json!({ "trip_id": trip_id, "seat_count": 1.5 }),
        json!({ "trip_id": trip_id, "seat_count": "2" }),
    ];
    for body in bodies {
        let (status, response) = post(&app, "/book-seat", &admin, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].is_string(), "{body}");
    }

    let (status, response) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());

    let (status, response) = get(&app, "/availability?date=not-a-date", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());

    let (_, trip) = get(&app, &format!("/trips/{trip_id}"), &admin).await;
    assert_eq!(trip["free_seats"], 4);
}
