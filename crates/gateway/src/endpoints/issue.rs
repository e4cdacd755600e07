//! # POST /api/issue
//!
//! スコープ付きAPIキーを発行する（管理者用）。

use std::sync::Arc;
use std::time::Duration;

use attest_crypto::{Credential, CredentialError};
use attest_types::{IssueRequest, IssueResponse, DEFAULT_DAYS_VALID, DEFAULT_SCOPE};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::config::GatewayState;
use crate::error::GatewayError;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// 発行リクエストの既定値を補完した結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IssueParams {
    pub subject: String,
    pub scope: String,
    pub validity: Duration,
}

impl IssueParams {
    /// `scope` が空なら `"verify"`、`days_valid` が0以下なら30日。
    ///
    /// `subject` は空白のみなら拒否し、それ以外は加工せずに使う。
    pub(crate) fn from_request(request: IssueRequest) -> Result<Self, GatewayError> {
        if request.subject.trim().is_empty() {
            return Err(GatewayError::BadRequest("Missing 'subject' field".to_string()));
        }
        let subject = request.subject;

        let scope = match request.scope.trim() {
            "" => DEFAULT_SCOPE.to_string(),
            s => s.to_string(),
        };

        let days = if request.days_valid <= 0 {
            DEFAULT_DAYS_VALID
        } else {
            request.days_valid
        };
        let validity = u64::try_from(days)
            .ok()
            .and_then(|d| d.checked_mul(SECS_PER_DAY))
            .map(Duration::from_secs)
            .ok_or_else(|| GatewayError::BadRequest("Invalid 'days_valid' value".to_string()))?;

        Ok(Self {
            subject,
            scope,
            validity,
        })
    }
}

/// POST /api/issue: APIキー発行。
pub async fn handle_issue(
    State(state): State<Arc<GatewayState>>,
    Extension(admin): Extension<Credential>,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>, GatewayError> {
    let params = IssueParams::from_request(super::json_body(body)?)?;

    let issued = state
        .issuer
        .issue(&params.subject, &params.scope, params.validity)
        .map_err(|e| match e {
            CredentialError::EmptySubject => {
                GatewayError::BadRequest("Missing 'subject' field".to_string())
            }
            CredentialError::InvalidValidity(_) => {
                GatewayError::BadRequest("Invalid 'days_valid' value".to_string())
            }
            other => GatewayError::Internal(other.to_string()),
        })?;

    tracing::info!(
        issued_by = %admin.subject,
        subject = %issued.credential.subject,
        scope = %issued.credential.scope,
        jti = %issued.credential.id,
        expires = %issued.credential.expires_rfc3339(),
        "APIキーを発行"
    );

    Ok(Json(IssueResponse {
        token: issued.token,
        expires: issued.credential.expires_rfc3339(),
        subject: issued.credential.subject,
        scope: issued.credential.scope,
    }))
}
