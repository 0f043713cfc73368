mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use common::{create_task, init_app, register_user};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[actix_rt::test]
async fn test_user_analytics_is_self_only() {
    let app = init_app().await;
    let ann = register_user(&app, "Analytics Ann", "ann@example.com")
        .await
        .unwrap();
    let bob = register_user(&app, "Analytics Bob", "bob@example.com")
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/analytics/users/{}", ann.id))
        .insert_header(ann.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(
        body["task_stats"],
        json!([{ "is_completed": false, "count": 3 }])
    );
    let recent = body["recent_tasks"].as_array().unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.iter().all(|t| t["user_name"] == "Analytics Ann"));

    let weeks = body["weekly_progress"].as_array().unwrap();
    assert_eq!(weeks.len(), 1);
    assert_eq!(weeks[0]["count"], 3);
    let week_start =
        NaiveDate::parse_from_str(weeks[0]["week_start"].as_str().unwrap(), "%Y-%m-%d").unwrap();
    assert_eq!(week_start.weekday(), Weekday::Sun);
    assert!(week_start <= Utc::now().date_naive());

    let req = test::TestRequest::get()
        .uri(&format!("/api/analytics/users/{}", ann.id))
        .insert_header(bob.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri("/api/analytics/users/not-a-number")
        .insert_header(ann.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_rt::test]
async fn test_users_with_stats() {
    let app = init_app().await;
    let ann = register_user(&app, "Stats Ann", "stats_ann@example.com")
        .await
        .unwrap();
    register_user(&app, "Stats Bob", "stats_bob@example.com")
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/analytics/users")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get()
        .uri("/api/analytics/users?page=1&limit=1")
        .insert_header(ann.bearer())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);

    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], "Stats Bob", "newest user comes first");
    assert_eq!(users[0]["task_count"], 3);
    assert_eq!(users[0]["pending_task_ids"].as_array().unwrap().len(), 3);
    assert!(users[0].get("password_hash").is_none());
}

#[actix_rt::test]
async fn test_search_tasks() {
    let app = init_app().await;
    let user = register_user(&app, "Search User", "search@example.com")
        .await
        .unwrap();
    let other = register_user(&app, "Other User", "other@example.com")
        .await
        .unwrap();

    create_task(&app, &user, json!({ "title": "Groceries" })).await;
    create_task(&app, &user, json!({ "title": "Buy groceries" })).await;
    create_task(&app, &user, json!({ "title": "Groceries for the party" })).await;
    create_task(&app, &other, json!({ "title": "Groceries" })).await;

    let req = test::TestRequest::get()
        .uri("/api/analytics/search?q=groceries")
        .insert_header(user.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["query"], "groceries");
    assert_eq!(body["count"], 3);
    let titles: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec!["Groceries", "Groceries for the party", "Buy groceries"]
    );
    assert!(body["results"]
        .as_array()
        .unwrap()
        .iter()
        .all(|t| t["user_name"] == "Search User"));

    let req = test::TestRequest::get()
        .uri("/api/analytics/search?q=groceries&limit=1")
        .insert_header(user.bearer())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);

    for uri in ["/api/analytics/search?q=g", "/api/analytics/search"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(user.bearer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "Search query must be at least 2 characters long"
        );
    }
}
