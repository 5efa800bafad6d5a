//! TOTP handler tests.

use lockbox_proto as proto;

use crate::error::ServiceError;
use crate::handlers;

#[test]
fn enroll_produces_a_usable_secret() {
    let response = handlers::otp::enroll(proto::OtpEnrollRequest {
        issuer: "GophKeeper".to_string(),
        account_name: "alice@x".to_string(),
    })
    .unwrap();

    assert!(response
        .enrollment_uri
        .starts_with("otpauth://totp/GophKeeper:alice%40x?secret="));
    assert!(response.enrollment_uri.contains("algorithm=SHA1"));
    assert!(response.enrollment_uri.contains("digits=6"));
    assert!(response.enrollment_uri.contains("period=30"));
    assert_eq!(response.backup_codes.len(), 10);

    // The secret round-trips through code derivation and verification.
    let code = lockbox_otp::derive_code(&response.secret, chrono::Utc::now()).unwrap();
    assert_eq!(code.len(), 6);
    assert!(lockbox_otp::verify_code(&response.secret, &code));
}

#[test]
fn enroll_requires_issuer_and_account() {
    let missing_issuer = handlers::otp::enroll(proto::OtpEnrollRequest {
        issuer: String::new(),
        account_name: "alice@x".to_string(),
    });
    assert!(matches!(
        missing_issuer,
        Err(ServiceError::InvalidArgument(_))
    ));

    let missing_account = handlers::otp::enroll(proto::OtpEnrollRequest {
        issuer: "GophKeeper".to_string(),
        account_name: String::new(),
    });
    assert!(matches!(
        missing_account,
        Err(ServiceError::InvalidArgument(_))
    ));
}

#[test]
fn generate_derives_a_code_with_step_metadata() {
    let enrolled = handlers::otp::enroll(proto::OtpEnrollRequest {
        issuer: "GophKeeper".to_string(),
        account_name: "alice@x".to_string(),
    })
    .unwrap();

    let response = handlers::otp::generate(proto::OtpGenerateRequest {
        secret: enrolled.secret.clone(),
    })
    .unwrap();

    assert_eq!(response.code.len(), 6);
    assert!(response.code.chars().all(|c| c.is_ascii_digit()));
    assert!((1..=30).contains(&response.time_remaining));
    assert!(response.expires_at > chrono::Utc::now());
    assert!(lockbox_otp::verify_code(&enrolled.secret, &response.code));
}

#[test]
fn generate_rejects_missing_or_malformed_secrets() {
    let empty = handlers::otp::generate(proto::OtpGenerateRequest {
        secret: String::new(),
    });
    assert!(matches!(empty, Err(ServiceError::InvalidArgument(_))));

    let malformed = handlers::otp::generate(proto::OtpGenerateRequest {
        secret: "!!definitely not base32!!".to_string(),
    });
    assert!(matches!(malformed, Err(ServiceError::InvalidArgument(_))));
}
