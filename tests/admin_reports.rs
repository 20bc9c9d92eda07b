#[macro_use]
mod common;

use actix_web::http::{StatusCode, header};
use actix_web::test;
use serde_json::{Value, json};

use common::{ADMIN_PASSPHRASE, STORE_LAT, STORE_LON, bearer, env, env_with, get, post};

macro_rules! admin_token {
    ($app:expr) => {{
        let resp = test::call_service(
            &$app,
            post("/auth/admin/login")
                .set_json(json!({ "passphrase": ADMIN_PASSPHRASE }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        body["token"].as_str().unwrap().to_string()
    }};
}

/// Runs the device flow once at the reference point; yields the user id.
macro_rules! checked_in_user {
    ($app:expr) => {{
        let (user, token) = issue_identity!($app);
        for (uri, body) in [
            ("/api/attendance/session", None),
            (
                "/api/attendance/location",
                Some(json!({ "outcome": "fix", "latitude": STORE_LAT, "longitude": STORE_LON })),
            ),
            ("/api/attendance/check-in", None),
        ] {
            let req = post(uri).insert_header(bearer(&token));
            let req = match body {
                Some(body) => req.set_json(body),
                None => req,
            };
            let resp = test::call_service(&$app, req.to_request()).await;
            assert!(resp.status().is_success(), "{uri}: {}", resp.status());
        }
        user
    }};
}

#[actix_web::test]
async fn wrong_passphrase_is_rejected_inline() {
    let env = env();
    let app = test_app!(env);

    let resp = test::call_service(
        &app,
        post("/auth/admin/login")
            .set_json(json!({ "passphrase": "nope" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Wrong passphrase");
}

#[actix_web::test]
async fn admin_routes_are_gated() {
    let env = env();
    let app = test_app!(env);

    let resp = test::call_service(&app, get("/api/admin/users").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (_, device) = issue_identity!(app);
    let resp = test::call_service(
        &app,
        get("/api/admin/users").insert_header(bearer(&device)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let admin = admin_token!(app);
    let resp = test::call_service(
        &app,
        get("/api/admin/users").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // and an admin token cannot record attendance
    let resp = test::call_service(
        &app,
        post("/api/attendance/check-in").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn logout_ends_the_admin_session() {
    let env = env();
    let app = test_app!(env);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        post("/auth/admin/logout").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        get("/api/admin/users").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn monthly_report_lists_records_and_statistics() {
    let env = env();
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        get("/api/admin/users").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["users"], json!([user]));

    let resp = test::call_service(
        &app,
        get(&format!("/api/admin/reports/{user}?year=2026&month=3"))
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "March 2026");
    assert_eq!(body["stats"]["present_days"], 1);
    assert_eq!(body["stats"]["days_in_month"], 31);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    // defaults to the current month
    let resp = test::call_service(
        &app,
        get(&format!("/api/admin/reports/{user}")).insert_header(bearer(&admin)).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["month"], 3);
}

#[actix_web::test]
async fn invalid_month_and_user_are_bad_requests() {
    let env = env();
    let app = test_app!(env);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        get("/api/admin/reports/not-a-uuid").insert_header(bearer(&admin)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        get("/api/admin/reports/7b0d2a4e-3f7a-4d55-9a8e-0c1b2d3e4f50?year=2026&month=13")
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn empty_month_has_nothing_to_export() {
    let env = env();
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    for format in ["csv", "xlsx", "pdf"] {
        let resp = test::call_service(
            &app,
            get(&format!("/api/admin/reports/{user}/export?year=2026&month=2&format={format}"))
                .insert_header(bearer(&admin))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{format}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "nothing to export");
    }
}

#[actix_web::test]
async fn csv_export_downloads_with_summary_line() {
    let env = env();
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        get(&format!("/api/admin/reports/{user}/export?year=2026&month=3&format=csv"))
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"attendance-3-2026.csv\""
    );
    let bytes = test::read_body(resp).await;
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.starts_with("\"Day\",\"Date\""));
    assert!(text.contains("\"Monday\",\"2026-03-02\",\"08:15:42\""));
    assert!(text.ends_with("\nTotal present days: 1\n"));
}

#[actix_web::test]
async fn pdf_and_xlsx_exports_render() {
    let env = env();
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    for (format, magic) in [("pdf", &b"%PDF"[..]), ("xlsx", &b"PK"[..])] {
        let resp = test::call_service(
            &app,
            get(&format!("/api/admin/reports/{user}/export?year=2026&month=3&format={format}"))
                .insert_header(bearer(&admin))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK, "{format}");
        let bytes = test::read_body(resp).await;
        assert!(bytes.starts_with(magic), "{format}");
    }
}

#[actix_web::test]
async fn summary_without_api_key_is_not_configured() {
    let env = env();
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        post(&format!("/api/admin/reports/{user}/summary?year=2026&month=3"))
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "summary generation is not configured");
}

#[actix_web::test]
async fn summary_is_fetched_from_the_text_service() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/gemini-test:generateContent")
        .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Attendance is regular."}]}}]}"#)
        .create_async()
        .await;

    let url = server.url();
    let env = env_with(&[
        ("SUMMARY_API_URL", url.as_str()),
        ("SUMMARY_MODEL", "gemini-test"),
        ("SUMMARY_API_KEY", "test-key"),
    ]);
    let app = test_app!(env);
    let user = checked_in_user!(app);
    let admin = admin_token!(app);

    let resp = test::call_service(
        &app,
        post(&format!("/api/admin/reports/{user}/summary?year=2026&month=3"))
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["text"], "Attendance is regular.");
    assert_eq!(body["title"], "Attendance Summary - March 2026");
    mock.assert_async().await;
}
