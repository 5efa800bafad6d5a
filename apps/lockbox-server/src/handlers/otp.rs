//! TOTP handlers: enrollment and code derivation.

use chrono::{Duration, Utc};

use lockbox_otp::OtpError;
use lockbox_proto::{
    OtpEnrollRequest, OtpEnrollResponse, OtpGenerateRequest, OtpGenerateResponse,
};

use crate::error::ServiceError;

pub fn enroll(req: OtpEnrollRequest) -> Result<OtpEnrollResponse, ServiceError> {
    if req.issuer.is_empty() {
        return Err(ServiceError::invalid("issuer is required"));
    }
    if req.account_name.is_empty() {
        return Err(ServiceError::invalid("account name is required"));
    }

    let secret = lockbox_otp::generate_secret().map_err(|e| {
        tracing::error!(error = %e, "failed to generate TOTP secret");
        ServiceError::Internal
    })?;
    let enrollment_uri = lockbox_otp::enrollment_uri(&secret, &req.issuer, &req.account_name);
    let backup_codes =
        lockbox_otp::generate_backup_codes(lockbox_otp::DEFAULT_BACKUP_CODES).map_err(|e| {
            tracing::error!(error = %e, "failed to generate backup codes");
            ServiceError::Internal
        })?;

    Ok(OtpEnrollResponse {
        secret,
        enrollment_uri,
        backup_codes,
    })
}

pub fn generate(req: OtpGenerateRequest) -> Result<OtpGenerateResponse, ServiceError> {
    if req.secret.is_empty() {
        return Err(ServiceError::invalid("secret is required"));
    }

    let code = lockbox_otp::derive_code(&req.secret, Utc::now()).map_err(|e| match e {
        OtpError::SecretMalformed => ServiceError::invalid("secret is not valid base32"),
        other => {
            tracing::error!(error = %other, "failed to derive TOTP code");
            ServiceError::Internal
        }
    })?;

    let time_remaining = lockbox_otp::seconds_until_next_step();
    Ok(OtpGenerateResponse {
        code,
        expires_at: Utc::now() + Duration::seconds(time_remaining),
        time_remaining,
    })
}
