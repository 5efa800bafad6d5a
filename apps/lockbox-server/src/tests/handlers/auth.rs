//! Auth handler tests.

use lockbox_proto as proto;

use crate::error::ServiceError;
use crate::handlers;
use crate::tests::common::*;

#[tokio::test]
async fn registration_round_trip() {
    let server = create_test_server().await;

    let response = handlers::auth::register(
        &server,
        proto::RegisterRequest {
            username: "alice".to_string(),
            password: "hunter22".to_string(),
        },
    )
    .await
    .unwrap();

    assert!(!response.token.is_empty());
    assert!(response.expires_at > chrono::Utc::now());
    assert_eq!(response.user.username, "alice");

    // The issued token resolves back to the same principal.
    let claims = server.credentials.validate_token(&response.token).unwrap();
    assert_eq!(claims.sub, response.user.id);
    assert_eq!(claims.username, "alice");
}

#[tokio::test]
async fn registration_rejects_bad_arguments() {
    let server = create_test_server().await;

    let cases = [
        ("al", "hunter22"),
        ("", "hunter22"),
        ("alice", "short"),
        ("alice", ""),
    ];
    for (username, password) in cases {
        let result = handlers::auth::register(
            &server,
            proto::RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
            },
        )
        .await;
        assert!(
            matches!(result, Err(ServiceError::InvalidArgument(_))),
            "expected InvalidArgument for {username:?}/{password:?}"
        );
    }

    let long_username = "a".repeat(51);
    let result = handlers::auth::register(
        &server,
        proto::RegisterRequest {
            username: long_username,
            password: "hunter22".to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let server = create_test_server().await;
    register_user(&server, "alice").await;

    let result = handlers::auth::register(
        &server,
        proto::RegisterRequest {
            username: "alice".to_string(),
            password: "different".to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn login_succeeds_with_the_right_password() {
    let server = create_test_server().await;
    let (registered, _) = register_user(&server, "alice").await;

    let response = handlers::auth::login(
        &server,
        proto::LoginRequest {
            username: "alice".to_string(),
            password: "hunter22".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.user.id, registered.user.id);
    let claims = server.credentials.validate_token(&response.token).unwrap();
    assert_eq!(claims.sub, registered.user.id);
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let server = create_test_server().await;
    register_user(&server, "alice").await;

    // Wrong password and unknown user must be indistinguishable.
    let wrong_password = handlers::auth::login(
        &server,
        proto::LoginRequest {
            username: "alice".to_string(),
            password: "wrong-password".to_string(),
        },
    )
    .await
    .unwrap_err();
    let unknown_user = handlers::auth::login(
        &server,
        proto::LoginRequest {
            username: "mallory".to_string(),
            password: "hunter22".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(wrong_password, ServiceError::Unauthenticated(_)));
    assert!(matches!(unknown_user, ServiceError::Unauthenticated(_)));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

#[tokio::test]
async fn refresh_reissues_for_the_same_principal() {
    let server = create_test_server().await;
    let (registered, _) = register_user(&server, "alice").await;

    let refreshed = handlers::auth::refresh_token(
        &server,
        proto::RefreshTokenRequest {
            token: registered.token.clone(),
        },
    )
    .await
    .unwrap();

    assert_eq!(refreshed.user.id, registered.user.id);
    let claims = server.credentials.validate_token(&refreshed.token).unwrap();
    assert_eq!(claims.sub, registered.user.id);
}

#[tokio::test]
async fn refresh_rejects_missing_and_garbage_tokens() {
    let server = create_test_server().await;

    let empty = handlers::auth::refresh_token(
        &server,
        proto::RefreshTokenRequest {
            token: String::new(),
        },
    )
    .await;
    assert!(matches!(empty, Err(ServiceError::InvalidArgument(_))));

    let garbage = handlers::auth::refresh_token(
        &server,
        proto::RefreshTokenRequest {
            token: "not.a.jwt".to_string(),
        },
    )
    .await;
    assert!(matches!(garbage, Err(ServiceError::Unauthenticated(_))));
}

#[tokio::test]
async fn gate_rejects_broken_authorization_headers() {
    let server = create_test_server().await;
    let (registered, _) = register_user(&server, "alice").await;

    let good = format!("Bearer {}", registered.token);
    assert!(server.authenticate_bearer(Some(&good)).is_ok());

    for bad in [
        None,
        Some(""),
        Some("Bearer "),
        Some("Basic dXNlcjpwYXNz"),
        Some(registered.token.as_str()),
        Some("Bearer not.a.jwt"),
    ] {
        assert!(
            matches!(
                server.authenticate_bearer(bad),
                Err(ServiceError::Unauthenticated(_))
            ),
            "expected rejection for header {bad:?}"
        );
    }
}
