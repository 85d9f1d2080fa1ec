// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registration, login, token refresh and password flows.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use keygate_cache::CacheKeys;
use keygate_core::model::normalize_email;
use keygate_core::{
    ApprovalStatus, CoreError, EmailJob, EnrichedUser, PermissionSet, User, UserId, UserProfile,
};

use super::{Mailer, ServiceContext};
use crate::auth::JwtManager;
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::otp::OtpIssuer;
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::session::SessionManager;

// =============================================================================
// Requests and responses
// =============================================================================

/// Self-service registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Requested role name.
    pub role: String,
}

impl RegisterRequest {
    fn validate(&self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }
        if !is_plausible_email(&self.email) {
            errors.add("email", "Invalid email address");
        }
        if self.role.trim().is_empty() {
            errors.add("role", "Role is required");
        }
        errors.into_result(())
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    /// New user.
    pub user: UserProfile,
    /// Whether the OTP email was queued.
    pub otp_sent: bool,
}

/// Email and password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Tokens and the enriched user returned by login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token bound to the session.
    pub refresh_token: String,
    /// The user with effective permissions.
    pub user: EnrichedUser,
}

/// New access token issued by refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Short-lived access token.
    pub access_token: String,
}

/// Password reset by OTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// Login email.
    pub email: String,
    /// Code received by email.
    pub otp: String,
    /// Replacement password.
    pub new_password: String,
}

/// Authenticated password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Current password.
    pub current_password: String,
    /// Replacement password.
    pub new_password: String,
}

/// Profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Public profile.
    pub user: UserProfile,
    /// Role name.
    pub role_name: String,
    /// Effective permissions.
    pub permissions: PermissionSet,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

// =============================================================================
// AuthService
// =============================================================================

/// Credential handling collaborators.
#[derive(Clone)]
pub struct Credentials {
    /// Token signer.
    pub jwt: JwtManager,
    /// Single-device sessions.
    pub sessions: SessionManager,
    /// Password hasher.
    pub hasher: Arc<dyn PasswordHasher>,
    /// OTP issuer.
    pub otp: OtpIssuer,
    /// Password rules.
    pub password_policy: PasswordPolicy,
}

/// Account lifecycle operations.
#[derive(Clone)]
pub struct AuthService {
    ctx: ServiceContext,
    credentials: Credentials,
    mailer: Mailer,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("ctx", &self.ctx)
            .field("mailer", &self.mailer)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Creates the service.
    pub fn new(ctx: ServiceContext, credentials: Credentials, mailer: Mailer) -> Self {
        Self {
            ctx,
            credentials,
            mailer,
        }
    }

    /// Token signer in use.
    pub fn jwt(&self) -> &JwtManager {
        &self.credentials.jwt
    }

    /// Session manager in use.
    pub fn sessions(&self) -> &SessionManager {
        &self.credentials.sessions
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers an account and sends a verification code.
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<RegisterOutcome> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if let Some(mut existing) = self.ctx.store.find_user_by_email(&email).await? {
            if existing.is_banned {
                return Err(ApiError::forbidden("Your account is banned"));
            }
            if existing.is_email_verified {
                return Err(ApiError::bad_request("Account already exists. Please login.")
                    .with_field_error("email", "Email is already registered"));
            }

            let code = self.refresh_otp(&mut existing).await?;
            self.mailer
                .send(EmailJob::RegisterOtp {
                    email: existing.email.clone(),
                    name: existing.name.clone(),
                    otp: code,
                })
                .await;
            return Err(ApiError::bad_request(
                "Account exists but not verified. OTP sent again",
            )
            .with_field_error("email", "Please verify the OTP sent to your email"));
        }

        let role_name = request.role.trim().to_lowercase();
        let role = match self.ctx.store.find_role_by_name(&role_name).await? {
            Some(role) if !role.is_admin() => role,
            _ => {
                return Err(ApiError::bad_request("Invalid role selected")
                    .with_field_error("role", "Invalid role selected"));
            }
        };

        self.credentials.password_policy.check("password", &request.password)?;
        let hash = self.credentials.hasher.hash(&request.password)?;

        let otp = self.credentials.otp.issue();
        let mut user = User::new(request.name.trim(), email, hash, role.id.clone());
        user.approval_status = if role.requires_approval() {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        };
        user.otp = Some(otp.challenge);

        let user = self.ctx.store.create_user(user).await?;
        self.ctx.invalidation.invalidate_user_list().await;

        let otp_sent = self
            .mailer
            .send(EmailJob::RegisterOtp {
                email: user.email.clone(),
                name: user.name.clone(),
                otp: otp.code,
            })
            .await;

        info!(
            user_id = %user.id,
            role = %role.name,
            approval = user.approval_status.as_str(),
            "User registered"
        );

        Ok(RegisterOutcome {
            user: UserProfile::from_user(&user)?,
            otp_sent,
        })
    }

    /// Re-sends the registration code to an unverified account.
    pub async fn send_register_otp(&self, email: &str) -> ApiResult<()> {
        let mut user = self.user_by_email(email).await?;
        if user.is_email_verified {
            return Err(ApiError::bad_request("Email is already verified"));
        }
        if user.is_banned {
            return Err(ApiError::forbidden("Your account is banned"));
        }

        let code = self.refresh_otp(&mut user).await?;
        self.mailer
            .send(EmailJob::RegisterOtp {
                email: user.email.clone(),
                name: user.name.clone(),
                otp: code,
            })
            .await;
        Ok(())
    }

    /// Confirms the registration code and marks the email verified.
    pub async fn verify_register_otp(&self, email: &str, otp: &str) -> ApiResult<UserProfile> {
        let mut user = self.user_by_email(email).await?;
        if user.is_banned {
            return Err(ApiError::forbidden("Your account is banned"));
        }
        if user.is_email_verified {
            return Err(ApiError::bad_request("Email is already verified"));
        }

        self.credentials.otp.verify(user.otp.as_ref(), otp, Utc::now())?;
        user.is_email_verified = true;
        user.otp = None;
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;

        info!(user_id = %user.id, "Email verified");
        Ok(UserProfile::from_user(&user)?)
    }

    // =========================================================================
    // Login and tokens
    // =========================================================================

    /// Authenticates by password and opens a session.
    ///
    /// Any earlier session of the same user is replaced, which revokes its
    /// refresh token.
    pub async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse> {
        let user = self.user_by_email(&request.email).await?;

        if !user.is_email_verified {
            return Err(ApiError::bad_request("Email is not verified")
                .with_field_error("email", "Email is not verified"));
        }
        if user.is_banned {
            return Err(ApiError::forbidden("Your account is banned"));
        }
        match user.approval_status {
            ApprovalStatus::Approved => {}
            ApprovalStatus::Pending => {
                return Err(ApiError::forbidden("Your account is pending approval"));
            }
            ApprovalStatus::Rejected => {
                return Err(ApiError::forbidden("Your account has been rejected"));
            }
        }

        if !self
            .credentials
            .hasher
            .verify(&request.password, &user.password_hash)?
        {
            return Err(ApiError::bad_request("Invalid password")
                .with_field_error("password", "Invalid password"));
        }

        let enriched = self.ctx.permissions.for_user(&user).await?;
        let access_token = self.credentials.jwt.issue_access_token(
            &user.id,
            &enriched.role_name,
            &enriched.user.role_id,
            enriched.effective_permissions.clone(),
        )?;
        let refresh_token = self.credentials.jwt.issue_refresh_token(&user.id)?;

        self.credentials
            .sessions
            .create_session(&user.id, &refresh_token)
            .await?;

        info!(user_id = %user.id, role = %enriched.role_name, "User logged in");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: enriched,
        })
    }

    /// Issues a new access token for a live session.
    ///
    /// The permission snapshot in the new token is recomputed.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<RefreshResponse> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(ApiError::unauthorized("Refresh token missing"));
        }

        let claims = self.credentials.jwt.verify_refresh(refresh_token)?;
        let user_id = claims.user_id();

        if !self
            .credentials
            .sessions
            .validate_session(&user_id, refresh_token)
            .await?
        {
            warn!(user_id = %user_id, "Refresh token does not match the active session");
            return Err(ApiError::unauthorized("Session invalid"));
        }

        let user = self
            .ctx
            .store
            .find_user(&user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Session invalid"))?;
        if user.is_banned {
            return Err(ApiError::forbidden("Your account is banned"));
        }

        let enriched = self.ctx.permissions.for_user(&user).await?;
        let access_token = self.credentials.jwt.issue_access_token(
            &user.id,
            &enriched.role_name,
            &enriched.user.role_id,
            enriched.effective_permissions,
        )?;
        Ok(RefreshResponse { access_token })
    }

    /// Ends the user's session.
    pub async fn logout(&self, user_id: &UserId) -> ApiResult<()> {
        self.credentials.sessions.delete_session(user_id).await?;
        self.ctx.invalidation.invalidate_user(user_id).await;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Sends a password reset code.
    pub async fn send_reset_password_otp(&self, email: &str) -> ApiResult<()> {
        let mut user = self.user_by_email(email).await?;
        ensure_usable(&user)?;

        let code = self.refresh_otp(&mut user).await?;
        self.mailer
            .send(EmailJob::ResetPassOtp {
                email: user.email.clone(),
                name: user.name.clone(),
                otp: code,
            })
            .await;
        Ok(())
    }

    /// Resets the password with a reset code and ends the session.
    pub async fn verify_reset_password_otp(&self, request: ResetPasswordRequest) -> ApiResult<()> {
        let mut user = self.user_by_email(&request.email).await?;
        ensure_usable(&user)?;

        self.credentials
            .otp
            .verify(user.otp.as_ref(), &request.otp, Utc::now())?;
        self.credentials
            .password_policy
            .check("newPassword", &request.new_password)?;

        user.password_hash = self.credentials.hasher.hash(&request.new_password)?;
        user.otp = None;
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        self.credentials.sessions.delete_session(&user.id).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Changes the password of an authenticated user and ends the session.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        request: ChangePasswordRequest,
    ) -> ApiResult<()> {
        let mut user = self.user_by_id(user_id).await?;
        if user.is_banned {
            return Err(ApiError::forbidden("Your account is banned"));
        }

        if !self
            .credentials
            .hasher
            .verify(&request.current_password, &user.password_hash)?
        {
            return Err(ApiError::bad_request("Current password is incorrect")
                .with_field_error("currentPassword", "Current password is incorrect"));
        }
        self.credentials
            .password_policy
            .check("newPassword", &request.new_password)?;

        user.password_hash = self.credentials.hasher.hash(&request.new_password)?;
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        self.credentials.sessions.delete_session(&user.id).await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Profile and effective permissions of the caller.
    pub async fn current_user(&self, user_id: &UserId) -> ApiResult<CurrentUser> {
        let profile: UserProfile = self
            .ctx
            .cache
            .get_or_load(&CacheKeys::user(user_id), self.ctx.ttls.user_ttl, || async {
                let user = self
                    .ctx
                    .store
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("user", user_id.as_str()))?;
                UserProfile::from_user(&user)
            })
            .await?;
        let enriched = self.ctx.permissions.for_user_id(user_id).await?;

        Ok(CurrentUser {
            user: profile,
            role_name: enriched.role_name,
            permissions: enriched.effective_permissions,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn user_by_email(&self, email: &str) -> ApiResult<User> {
        self.ctx
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| {
                ApiError::not_found("User not found")
                    .with_field_error("email", "No account is associated with this email")
            })
    }

    async fn user_by_id(&self, user_id: &UserId) -> ApiResult<User> {
        self.ctx
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Stores a new OTP challenge on `user` and returns the plaintext code.
    async fn refresh_otp(&self, user: &mut User) -> ApiResult<String> {
        let otp = self.credentials.otp.issue();
        user.otp = Some(otp.challenge);
        user.touch();
        *user = self.ctx.store.update_user(user.clone()).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        Ok(otp.code)
    }
}

fn ensure_usable(user: &User) -> ApiResult<()> {
    if !user.is_email_verified {
        return Err(ApiError::bad_request("Email is not verified")
            .with_field_error("email", "Email is not verified"));
    }
    if user.is_banned {
        return Err(ApiError::forbidden("Your account is banned"));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::otp::OtpConfig;
    use crate::session::SessionConfig;
    use axum::http::StatusCode;
    use keygate_cache::{CacheConfig, CacheGuard, MemoryCache};
    use keygate_core::{
        AuthStore, ChannelDispatcher, JobEnvelope, MemoryStore, Permission, RetryPolicy, Role,
        RolePermission, ADMIN_ROLE,
    };
    use tokio::sync::mpsc;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> ApiResult<String> {
            Ok(format!("plain${password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> ApiResult<bool> {
            Ok(hash == format!("plain${password}"))
        }
    }

    struct Fixture {
        service: AuthService,
        store: Arc<MemoryStore>,
        jobs: mpsc::Receiver<JobEnvelope>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let student = store.create_role(Role::new("student", "")).await.unwrap();
        store.create_role(Role::new("instructor", "")).await.unwrap();
        store.create_role(Role::new(ADMIN_ROLE, "")).await.unwrap();
        let read = store
            .create_permission(Permission::new("course:read", ""))
            .await
            .unwrap();
        store
            .create_role_permission(RolePermission::new(student.id, read.id))
            .await
            .unwrap();

        let cache = Arc::new(MemoryCache::new());
        let config = CacheConfig::for_testing();
        let ctx = ServiceContext::new(
            store.clone(),
            CacheGuard::new(cache.clone(), &config),
            config,
        );
        let credentials = Credentials {
            jwt: JwtManager::new(JwtConfig::new(
                "access-secret-access-secret-access-secret",
                "refresh-secret-refresh-secret-refresh-secret",
            ))
            .unwrap(),
            sessions: SessionManager::new(cache, SessionConfig::default()),
            hasher: Arc::new(PlainHasher),
            otp: OtpIssuer::new(OtpConfig::default()),
            password_policy: PasswordPolicy::default(),
        };
        let (dispatcher, jobs) = ChannelDispatcher::channel(16);
        let mailer = Mailer::new(Arc::new(dispatcher), RetryPolicy::default());

        Fixture {
            service: AuthService::new(ctx, credentials, mailer),
            store,
            jobs,
        }
    }

    fn register_request(email: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ann".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            role: role.to_string(),
        }
    }

    async fn next_otp(jobs: &mut mpsc::Receiver<JobEnvelope>) -> String {
        match jobs.recv().await.unwrap().email_job().unwrap() {
            EmailJob::RegisterOtp { otp, .. } | EmailJob::ResetPassOtp { otp, .. } => otp,
        }
    }

    async fn verified_user(f: &mut Fixture, email: &str) -> UserProfile {
        f.service.register(register_request(email, "student")).await.unwrap();
        let otp = next_otp(&mut f.jobs).await;
        f.service.verify_register_otp(email, &otp).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_sends_otp() {
        let mut f = fixture().await;
        let outcome = f
            .service
            .register(register_request(" Ann@Example.com ", "student"))
            .await
            .unwrap();

        assert!(outcome.otp_sent);
        assert_eq!(outcome.user.email, "ann@example.com");
        assert_eq!(outcome.user.approval_status, ApprovalStatus::Approved);
        assert!(!outcome.user.is_email_verified);

        let otp = next_otp(&mut f.jobs).await;
        let stored = f.store.find_user(&outcome.user.id).await.unwrap().unwrap();
        assert_ne!(stored.otp.unwrap().code_hash, otp);
    }

    #[tokio::test]
    async fn test_register_approval_and_roles() {
        let f = fixture().await;
        let outcome = f
            .service
            .register(register_request("i@example.com", "Instructor"))
            .await
            .unwrap();
        assert_eq!(outcome.user.approval_status, ApprovalStatus::Pending);

        for role in ["ghost", ADMIN_ROLE] {
            let err = f
                .service
                .register(register_request("x@example.com", role))
                .await
                .unwrap_err();
            assert_eq!(err.user_message(), "Invalid role selected");
        }
    }

    #[tokio::test]
    async fn test_register_existing_accounts() {
        let mut f = fixture().await;
        f.service.register(register_request("a@example.com", "student")).await.unwrap();
        next_otp(&mut f.jobs).await;

        let err = f
            .service
            .register(register_request("a@example.com", "student"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Account exists but not verified. OTP sent again");
        let resent = next_otp(&mut f.jobs).await;
        f.service.verify_register_otp("a@example.com", &resent).await.unwrap();

        let err = f
            .service
            .register(register_request("a@example.com", "student"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.user_message().starts_with("Account already exists"));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let f = fixture().await;
        let mut request = register_request("not-an-email", "student");
        request.name = " ".to_string();
        let err = f.service.register(request).await.unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.get("email").is_some());
        assert!(fields.get("name").is_some());
    }

    #[tokio::test]
    async fn test_verify_register_otp_errors() {
        let mut f = fixture().await;
        f.service.register(register_request("b@example.com", "student")).await.unwrap();
        let otp = next_otp(&mut f.jobs).await;

        let wrong = if otp == "000000" { "111111" } else { "000000" };
        let err = f.service.verify_register_otp("b@example.com", wrong).await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid OTP");

        f.service.verify_register_otp("b@example.com", &otp).await.unwrap();
        let err = f.service.verify_register_otp("b@example.com", &otp).await.unwrap_err();
        assert_eq!(err.user_message(), "Email is already verified");

        let err = f.service.send_register_otp("nobody@example.com").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_refresh_logout() {
        let mut f = fixture().await;
        let profile = verified_user(&mut f, "c@example.com").await;

        let login = f
            .service
            .login(LoginRequest {
                email: "c@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert!(login.user.has_permission("course:read"));

        let claims = f.service.jwt().verify_access(&login.access_token).unwrap();
        assert_eq!(claims.role, "student");
        assert!(claims.has_permission("course:read"));

        let refreshed = f.service.refresh(&login.refresh_token).await.unwrap();
        assert!(f.service.jwt().verify_access(&refreshed.access_token).is_ok());

        f.service.logout(&profile.id).await.unwrap();
        let err = f.service.refresh(&login.refresh_token).await.unwrap_err();
        assert_eq!(err.user_message(), "Session invalid");
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let mut f = fixture().await;
        f.service.register(register_request("d@example.com", "student")).await.unwrap();
        let otp = next_otp(&mut f.jobs).await;

        let login = |password: &str| LoginRequest {
            email: "d@example.com".to_string(),
            password: password.to_string(),
        };

        let err = f.service.login(login("secret1")).await.unwrap_err();
        assert_eq!(err.user_message(), "Email is not verified");

        let profile = f.service.verify_register_otp("d@example.com", &otp).await.unwrap();
        let err = f.service.login(login("wrong")).await.unwrap_err();
        assert_eq!(err.field_errors().unwrap().get("password"), Some("Invalid password"));

        let mut user = f.store.find_user(&profile.id).await.unwrap().unwrap();
        user.is_banned = true;
        f.store.update_user(user).await.unwrap();
        let err = f.service.login(login("secret1")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.user_message(), "Your account is banned");

        let err = f
            .service
            .login(LoginRequest {
                email: "ghost@example.com".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("email").is_some());
    }

    #[tokio::test]
    async fn test_refresh_token_errors() {
        let f = fixture().await;
        assert_eq!(
            f.service.refresh("").await.unwrap_err().user_message(),
            "Refresh token missing"
        );
        assert_eq!(
            f.service.refresh("garbage").await.unwrap_err().user_message(),
            "Invalid token"
        );
    }

    #[tokio::test]
    async fn test_reset_password_ends_session() {
        let mut f = fixture().await;
        verified_user(&mut f, "e@example.com").await;
        let login = f
            .service
            .login(LoginRequest {
                email: "e@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();

        f.service.send_reset_password_otp("e@example.com").await.unwrap();
        let otp = next_otp(&mut f.jobs).await;
        f.service
            .verify_reset_password_otp(ResetPasswordRequest {
                email: "e@example.com".to_string(),
                otp,
                new_password: "newsecret".to_string(),
            })
            .await
            .unwrap();

        assert!(f.service.refresh(&login.refresh_token).await.is_err());
        assert!(f
            .service
            .login(LoginRequest {
                email: "e@example.com".to_string(),
                password: "newsecret".to_string(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let mut f = fixture().await;
        let profile = verified_user(&mut f, "g@example.com").await;

        let err = f
            .service
            .change_password(
                &profile.id,
                ChangePasswordRequest {
                    current_password: "nope".to_string(),
                    new_password: "another1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("currentPassword").is_some());

        f.service
            .change_password(
                &profile.id,
                ChangePasswordRequest {
                    current_password: "secret1".to_string(),
                    new_password: "another1".to_string(),
                },
            )
            .await
            .unwrap();
        let stored = f.store.find_user(&profile.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "plain$another1");
    }

    #[tokio::test]
    async fn test_current_user() {
        let mut f = fixture().await;
        let profile = verified_user(&mut f, "h@example.com").await;

        let me = f.service.current_user(&profile.id).await.unwrap();
        assert_eq!(me.user, profile);
        assert_eq!(me.role_name, "student");
        assert!(me.permissions.contains("course:read"));
    }
}
