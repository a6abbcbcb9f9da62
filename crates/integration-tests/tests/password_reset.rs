//! Password reset over HTTP: request, validate, complete.

use grocery_integration_tests::{PASSWORD, TestContext};
use reqwest::StatusCode;
use serde_json::json;

/// Split a reset link into its `uidb64` and token segments.
fn link_parts(link: &str) -> (String, String) {
    let mut segments = link.rsplit('/');
    let token = segments.next().unwrap().to_owned();
    let uidb64 = segments.next().unwrap().to_owned();
    (uidb64, token)
}

#[tokio::test]
async fn test_full_password_reset() {
    let ctx = TestContext::new().await;
    ctx.signup("alice@example.com", "alice").await;

    let (status, body) = ctx
        .post(
            "/request-password-reset",
            None,
            json!({"email": "alice@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["success"],
        "We have sent you a link to reset your password"
    );

    let link = ctx.latest_link("alice@example.com", "/validate-password-reset/");
    let (uidb64, token) = link_parts(&link);

    let (status, body) = ctx.get(&link, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Credentials Valid",
            "uidb64": uidb64,
            "token": token,
        })
    );

    let (status, body) = ctx
        .patch(
            "/complete-password-reset",
            None,
            json!({"password": "new-password-1", "token": token, "uidb64": uidb64}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password reset success");

    let (status, _) = ctx.login("alice@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.login("alice@example.com", "new-password-1").await;
    assert_eq!(status, StatusCode::OK);

    // The link is spent once the password changes
    let (status, body) = ctx.get(&link, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token is not valid, please request a new one");
}

#[tokio::test]
async fn test_reset_for_unknown_email() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .post(
            "/request-password-reset",
            None,
            json!({"email": "nobody@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No account is registered with this email");
    assert!(ctx.outbox.messages().is_empty());
}

#[tokio::test]
async fn test_complete_reset_checks_password_first() {
    let ctx = TestContext::new().await;
    ctx.signup("alice@example.com", "alice").await;
    ctx.post(
        "/request-password-reset",
        None,
        json!({"email": "alice@example.com"}),
    )
    .await;
    let link = ctx.latest_link("alice@example.com", "/validate-password-reset/");
    let (uidb64, token) = link_parts(&link);

    let (status, body) = ctx
        .patch(
            "/complete-password-reset",
            None,
            json!({"password": "abc", "token": token, "uidb64": uidb64}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["password"].is_array());

    // A failed attempt leaves the link usable
    let (status, _) = ctx.get(&link, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_reset_link_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.signup("alice@example.com", "alice").await;
    ctx.post(
        "/request-password-reset",
        None,
        json!({"email": "alice@example.com"}),
    )
    .await;
    let link = ctx.latest_link("alice@example.com", "/validate-password-reset/");
    let (uidb64, _) = link_parts(&link);

    let (status, _) = ctx
        .get(&format!("/validate-password-reset/{uidb64}/abc-0000"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .patch(
            "/complete-password-reset",
            None,
            json!({"password": "new-password-1", "token": "abc-0000", "uidb64": uidb64}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
