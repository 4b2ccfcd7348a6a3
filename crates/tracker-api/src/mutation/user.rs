//! Account lifecycle: sign-up, sign-in, two-factor, profile and closure.

use chrono::{Duration, Utc};
use surrealdb::Connection;
use tracing::{error, info, warn};
use tracker_auth::error::AuthError;
use tracker_auth::password::{self, PolicyViolation};
use tracker_auth::{crypto, tfa, token};
use tracker_core::error::{TrackerError, TrackerResult};
use tracker_core::global_id::{USER_TYPE, key_of};
use tracker_core::models::audit::{
    AuditAction, AuditStatus, AuditTarget, CreateAuditLogEntry, ResourceType,
};
use tracker_core::models::permission::Permission;
use tracker_core::models::user::{
    Language, NewUser, RefreshInfo, TfaSendMethod, UpdateUser, User,
};
use tracker_core::mutation::{ErrorMessage, MutationError, MutationResult};
use tracker_core::repository::AffiliationRepository;
use tracker_core::transaction::{Statement, TransactionEngine};
use tracker_db::statement::{edge, user as user_stmt};
use uuid::Uuid;

use super::reject;
use crate::context::RequestContext;
use crate::error::OrUnableTo;
use crate::notify::Notification;
use crate::payload::{AuthResult, SignInPayload, StatusPayload, TfaSignIn, UserPayload, UserSummary};
use crate::service::Mutations;

#[derive(Debug, Clone, Default)]
pub struct SignUpInput {
    pub display_name: String,
    pub user_name: String,
    pub password: String,
    pub confirm_password: String,
    pub preferred_lang: Language,
    /// Invite token from an organization invitation email.
    pub sign_up_token: Option<String>,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SignInInput {
    pub user_name: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AuthenticateInput {
    pub authenticate_token: String,
    pub tfa_code: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserPasswordInput {
    pub current_password: String,
    pub updated_password: String,
    pub updated_password_confirm: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserProfileInput {
    pub display_name: Option<String>,
    pub preferred_lang: Option<Language>,
    pub tfa_send_method: Option<TfaSendMethod>,
}

impl<C: Connection, E: TransactionEngine> Mutations<C, E> {
    fn refresh_session(&self, remember_me: bool) -> RefreshInfo {
        let lifetime = if remember_me {
            self.config.remember_me_lifetime_secs
        } else {
            self.config.refresh_token_lifetime_secs
        };
        RefreshInfo {
            refresh_id: token::generate_refresh_id(),
            expires_at: Utc::now() + Duration::seconds(lifetime as i64),
            remember_me,
        }
    }

    fn issue_tokens(&self, user: &User, session: &RefreshInfo, action: &str) -> TrackerResult<AuthResult> {
        let lifetime = (session.expires_at - Utc::now()).num_seconds().max(0) as u64;
        Ok(AuthResult {
            access_token: token::issue_access_token(user.key, &self.config).or_unable_to(action)?,
            refresh_token: token::issue_refresh_token(
                user.key,
                &session.refresh_id,
                lifetime,
                &self.config,
            )
            .or_unable_to(action)?,
            user: UserSummary::from(user),
        })
    }

    async fn reload_user(&self, ctx: &RequestContext<C>, key: Uuid, action: &str) -> TrackerResult<User> {
        ctx.loaders.user_by_key.clear(&key).await;
        ctx.loaders
            .user_by_key
            .load(key)
            .await
            .or_unable_to(action)?
            .ok_or_else(|| {
                error!(user_key = %key, "User missing after commit");
                TrackerError::unable_to(action)
            })
    }

    async fn find_user_by_name(
        &self,
        ctx: &RequestContext<C>,
        user_name: &str,
        action: &str,
    ) -> TrackerResult<Option<User>> {
        ctx.loaders
            .user_by_user_name
            .load(user_name.trim().to_lowercase())
            .await
            .or_unable_to(action)
    }

    /// Create an account. An invite token adds the invited affiliation
    /// in the same transaction and counts as proof of the email address.
    pub async fn sign_up(
        &self,
        ctx: &RequestContext<C>,
        input: SignUpInput,
    ) -> MutationResult<AuthResult> {
        const ACTION: &str = "sign up";
        let user_name = input.user_name.trim().to_lowercase();

        match password::check_policy(
            &input.password,
            &input.confirm_password,
            self.config.min_password_length,
        ) {
            Ok(()) => {}
            Err(PolicyViolation::TooShort) => {
                warn!(user_name = %user_name, "User attempted to sign up with a password that is too short");
                return reject(MutationError::bad_request(ErrorMessage::PasswordTooShort));
            }
            Err(PolicyViolation::Mismatch) => {
                warn!(user_name = %user_name, "User attempted to sign up with mismatched passwords");
                return reject(MutationError::bad_request(ErrorMessage::PasswordMismatch));
            }
        }

        if self.find_user_by_name(ctx, &user_name, ACTION).await?.is_some() {
            warn!(user_name = %user_name, "User attempted to sign up with a user name in use");
            return reject(MutationError::bad_request(ErrorMessage::UserNameInUse));
        }

        let invite = match &input.sign_up_token {
            Some(raw) => {
                let claims = match token::decode_sign_up_token(raw, &self.config) {
                    Ok(claims) if claims.user_name == user_name => claims,
                    Ok(_) => {
                        warn!(user_name = %user_name, "User attempted to sign up with an invite for another user");
                        return reject(MutationError::bad_request(ErrorMessage::InviteTokenMismatch));
                    }
                    Err(e) => {
                        warn!(user_name = %user_name, error = %e, "User attempted to sign up with an invalid invite token");
                        return reject(MutationError::bad_request(ErrorMessage::InviteTokenMismatch));
                    }
                };
                let org = ctx
                    .loaders
                    .org_by_key
                    .load(claims.org_key)
                    .await
                    .or_unable_to(ACTION)?;
                if org.is_none() {
                    warn!(user_name = %user_name, org_key = %claims.org_key, "User attempted to sign up with an invite to an unknown organization");
                    return reject(MutationError::bad_request(ErrorMessage::InviteTokenMismatch));
                }
                Some(claims)
            }
            None => None,
        };

        let password_hash = password::hash_password(&input.password, self.config.pepper.as_deref())
            .or_unable_to(ACTION)?;
        let key = Uuid::new_v4();
        let session = self.refresh_session(input.remember_me);

        let mut steps: Vec<Statement> = vec![user_stmt::insert(&NewUser {
            key,
            user_name: user_name.clone(),
            display_name: input.display_name.trim().to_owned(),
            password_hash,
            preferred_lang: input.preferred_lang,
        })];
        steps.extend(user_stmt::update(
            key,
            &UpdateUser {
                email_validated: invite.is_some().then_some(true),
                refresh_info: Some(Some(session.clone())),
                ..Default::default()
            },
        ));
        if let Some(claims) = &invite {
            steps.push(edge::relate_affiliation(claims.org_key, key, claims.requested_role));
        }
        self.write(steps, ACTION).await?;

        let user = self.reload_user(ctx, key, ACTION).await?;
        let result = self.issue_tokens(&user, &session, ACTION)?;

        if invite.is_none() {
            match token::issue_verify_token(user.key, &self.config) {
                Ok(verify_token) => {
                    self.notify(Notification::Verification {
                        user_name: user.user_name.clone(),
                        verify_token,
                        language: user.preferred_lang,
                    })
                    .await
                }
                Err(e) => error!(error = %e, user_key = %user.key, "Unable to issue verification token"),
            }
        }

        info!(user_key = %user.key, invited = invite.is_some(), "User signed up");
        Ok(Ok(result))
    }

    /// Mark the email address as validated using the mailed token.
    pub async fn verify_account(
        &self,
        ctx: &RequestContext<C>,
        verify_token: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "verify account";
        let key = match token::decode_verify_token(verify_token, &self.config) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "User attempted to verify account with an invalid token");
                return reject(MutationError::bad_request(ErrorMessage::VerifyAccountInvalidToken));
            }
        };
        let found = ctx.loaders.user_by_key.load(key).await.or_unable_to(ACTION)?;
        let Some(user) = found else {
            warn!(user_key = %key, "User attempted to verify an account that no longer exists");
            return reject(MutationError::bad_request(ErrorMessage::VerifyAccountInvalidToken));
        };

        if !user.email_validated {
            let steps = user_stmt::update(
                user.key,
                &UpdateUser {
                    email_validated: Some(true),
                    ..Default::default()
                },
            );
            self.write(steps.into_iter().collect(), ACTION).await?;
            ctx.loaders.clear_user(&user).await;
        }

        info!(user_key = %user.key, "User verified account");
        Ok(Ok(StatusPayload::new("Successfully email verified account.")))
    }

    /// Check credentials. Two-factor users get a code sent and an
    /// authenticate token; everyone else gets tokens straight away.
    pub async fn sign_in(
        &self,
        ctx: &RequestContext<C>,
        input: SignInInput,
    ) -> MutationResult<SignInPayload> {
        const ACTION: &str = "sign in";
        let Some(user) = self.find_user_by_name(ctx, &input.user_name, ACTION).await? else {
            warn!(user_name = %input.user_name, "User attempted to sign in with an unknown user name");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectCredentials));
        };

        if user.failed_login_attempts >= self.config.max_failed_login_attempts {
            warn!(user_key = %user.key, attempts = user.failed_login_attempts, "User attempted to sign in with too many failed attempts");
            return reject(MutationError::unauthorized(ErrorMessage::TooManyFailedAttempts));
        }

        let matches = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )
        .or_unable_to(ACTION)?;
        if !matches {
            let steps = user_stmt::update(
                user.key,
                &UpdateUser {
                    failed_login_attempts: Some(user.failed_login_attempts + 1),
                    ..Default::default()
                },
            );
            self.write(steps.into_iter().collect(), ACTION).await?;
            ctx.loaders.clear_user(&user).await;
            warn!(user_key = %user.key, attempts = user.failed_login_attempts + 1, "User attempted to sign in with an incorrect password");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectCredentials));
        }

        if user.tfa_send_method == TfaSendMethod::None {
            let session = self.refresh_session(input.remember_me);
            let steps = user_stmt::update(
                user.key,
                &UpdateUser {
                    failed_login_attempts: Some(0),
                    refresh_info: Some(Some(session.clone())),
                    ..Default::default()
                },
            );
            self.write(steps.into_iter().collect(), ACTION).await?;
            let user = self.reload_user(ctx, user.key, ACTION).await?;
            let result = self.issue_tokens(&user, &session, ACTION)?;
            info!(user_key = %user.key, "User signed in");
            return Ok(Ok(SignInPayload::Authenticated(result)));
        }

        // Resolve the delivery target before writing so a broken phone
        // record fails the sign-in without touching the user.
        let code = tfa::generate_code();
        let notification = match user.tfa_send_method {
            TfaSendMethod::Phone => Notification::TfaCodeText {
                phone_number: self.phone_number(&user, ACTION)?,
                code: code.clone(),
            },
            _ => Notification::TfaCodeEmail {
                user_name: user.user_name.clone(),
                code: code.clone(),
                language: user.preferred_lang,
            },
        };

        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                failed_login_attempts: Some(0),
                tfa_code: Some(Some(code)),
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        ctx.loaders.clear_user(&user).await;

        let authenticate_token =
            token::issue_authenticate_token(user.key, &self.config).or_unable_to(ACTION)?;
        self.notify(notification).await;

        info!(user_key = %user.key, method = %user.tfa_send_method, "User signed in, awaiting two-factor code");
        Ok(Ok(SignInPayload::Tfa(TfaSignIn {
            send_method: user.tfa_send_method,
            authenticate_token,
        })))
    }

    fn phone_number(&self, user: &User, action: &str) -> TrackerResult<String> {
        let key = self.config.phone_encryption_key.as_ref().ok_or_else(|| {
            error!(user_key = %user.key, "Phone encryption key is not configured");
            TrackerError::from(AuthError::PhoneEncryptionDisabled)
        })?;
        let encrypted = user.phone_details.as_deref().ok_or_else(|| {
            error!(user_key = %user.key, "Phone two-factor user has no phone number");
            TrackerError::unable_to(action)
        })?;
        crypto::decrypt(key, encrypted).or_unable_to(action)
    }

    /// Second sign-in step: exchange the mailed or texted code for tokens.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext<C>,
        input: AuthenticateInput,
    ) -> MutationResult<AuthResult> {
        const ACTION: &str = "authenticate";
        let key = match token::decode_authenticate_token(&input.authenticate_token, &self.config) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "User attempted to authenticate with an invalid token");
                return reject(MutationError::bad_request(ErrorMessage::IncorrectTfaCode));
            }
        };
        let found = ctx.loaders.user_by_key.load(key).await.or_unable_to(ACTION)?;
        let Some(user) = found else {
            warn!(user_key = %key, "Unknown user attempted to authenticate");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectTfaCode));
        };
        if user.failed_login_attempts >= self.config.max_failed_login_attempts {
            warn!(user_key = %user.key, attempts = user.failed_login_attempts, "User attempted to authenticate with too many failed attempts");
            return reject(MutationError::unauthorized(ErrorMessage::TooManyFailedAttempts));
        }
        if !tfa::code_matches(user.tfa_code.as_deref(), &input.tfa_code) {
            let steps = user_stmt::update(
                user.key,
                &UpdateUser {
                    failed_login_attempts: Some(user.failed_login_attempts + 1),
                    ..Default::default()
                },
            );
            self.write(steps.into_iter().collect(), ACTION).await?;
            ctx.loaders.clear_user(&user).await;
            warn!(user_key = %user.key, attempts = user.failed_login_attempts + 1, "User attempted to authenticate with an incorrect code");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectTfaCode));
        }

        let session = self.refresh_session(input.remember_me);
        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                failed_login_attempts: Some(0),
                tfa_code: Some(None),
                refresh_info: Some(Some(session.clone())),
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        let user = self.reload_user(ctx, user.key, ACTION).await?;
        let result = self.issue_tokens(&user, &session, ACTION)?;

        info!(user_key = %user.key, "User authenticated");
        Ok(Ok(result))
    }

    /// Rotate the refresh session and hand out a fresh token pair.
    pub async fn refresh_tokens(
        &self,
        ctx: &RequestContext<C>,
        refresh_token: &str,
    ) -> MutationResult<AuthResult> {
        const ACTION: &str = "refresh tokens";
        let (key, claims) = match token::decode_refresh_token(refresh_token, &self.config) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "User attempted to refresh with an invalid token");
                return reject(MutationError::bad_request(ErrorMessage::InvalidRefreshToken));
            }
        };
        let found = ctx.loaders.user_by_key.load(key).await.or_unable_to(ACTION)?;
        let Some(user) = found else {
            warn!(user_key = %key, "Unknown user attempted to refresh tokens");
            return reject(MutationError::bad_request(ErrorMessage::InvalidRefreshToken));
        };
        let Some(current) = user
            .refresh_info
            .as_ref()
            .filter(|info| info.refresh_id == claims.refresh_id && info.expires_at > Utc::now())
        else {
            warn!(user_key = %user.key, "User attempted to refresh a stale session");
            return reject(MutationError::bad_request(ErrorMessage::InvalidRefreshToken));
        };

        let session = self.refresh_session(current.remember_me);
        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                refresh_info: Some(Some(session.clone())),
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        let user = self.reload_user(ctx, user.key, ACTION).await?;
        let result = self.issue_tokens(&user, &session, ACTION)?;

        info!(user_key = %user.key, "User refreshed tokens");
        Ok(Ok(result))
    }

    pub async fn update_user_password(
        &self,
        ctx: &RequestContext<C>,
        input: UpdateUserPasswordInput,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "update password";
        let user = self.current_user(ctx).await?;

        let matches = password::verify_password(
            &input.current_password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )
        .or_unable_to(ACTION)?;
        if !matches {
            warn!(user_key = %user.key, "User attempted to update password with an incorrect current password");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectCurrentPassword));
        }

        match password::check_policy(
            &input.updated_password,
            &input.updated_password_confirm,
            self.config.min_password_length,
        ) {
            Ok(()) => {}
            Err(PolicyViolation::TooShort) => {
                warn!(user_key = %user.key, "User attempted to update password to one that is too short");
                return reject(MutationError::bad_request(ErrorMessage::NewPasswordTooShort));
            }
            Err(PolicyViolation::Mismatch) => {
                warn!(user_key = %user.key, "User attempted to update password with mismatched confirmation");
                return reject(MutationError::bad_request(ErrorMessage::NewPasswordMismatch));
            }
        }

        let password_hash =
            password::hash_password(&input.updated_password, self.config.pepper.as_deref())
                .or_unable_to(ACTION)?;
        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                password_hash: Some(password_hash),
                failed_login_attempts: Some(0),
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        ctx.loaders.clear_user(&user).await;

        self.notify(Notification::PasswordChanged {
            user_name: user.user_name.clone(),
            language: user.preferred_lang,
        })
        .await;

        info!(user_key = %user.key, "User updated password");
        Ok(Ok(StatusPayload::new("Password was successfully updated.")))
    }

    pub async fn update_user_profile(
        &self,
        ctx: &RequestContext<C>,
        input: UpdateUserProfileInput,
    ) -> MutationResult<UserPayload> {
        const ACTION: &str = "update profile";
        let user = self.current_user(ctx).await?;

        match input.tfa_send_method {
            Some(TfaSendMethod::Phone) if !user.phone_validated => {
                warn!(user_key = %user.key, "User attempted phone two-factor without a validated phone");
                return reject(MutationError::bad_request(ErrorMessage::TfaPhoneNotValidated));
            }
            Some(TfaSendMethod::Email) if !user.email_validated => {
                warn!(user_key = %user.key, "User attempted email two-factor without a validated email");
                return reject(MutationError::bad_request(ErrorMessage::TfaEmailNotValidated));
            }
            _ => {}
        }

        let update = UpdateUser {
            display_name: input
                .display_name
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty() && *name != user.display_name),
            preferred_lang: input.preferred_lang.filter(|lang| *lang != user.preferred_lang),
            tfa_send_method: input
                .tfa_send_method
                .filter(|method| *method != user.tfa_send_method),
            ..Default::default()
        };
        let Some(step) = user_stmt::update(user.key, &update) else {
            return Ok(Ok(UserPayload {
                status: "Profile successfully updated.".into(),
                user: UserSummary::from(&user),
            }));
        };
        self.write(vec![step], ACTION).await?;
        ctx.loaders.clear_user(&user).await;
        let updated = self.reload_user(ctx, user.key, ACTION).await?;

        info!(user_key = %user.key, "User updated profile");
        Ok(Ok(UserPayload {
            status: "Profile successfully updated.".into(),
            user: UserSummary::from(&updated),
        }))
    }

    /// Store an encrypted phone number and text a code to confirm it.
    /// The number stays unvalidated until `verify_phone_number`.
    pub async fn set_phone_number(
        &self,
        ctx: &RequestContext<C>,
        phone_number: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "set phone number";
        let user = self.current_user(ctx).await?;

        let Some(normalized) = crypto::normalize_phone_number(phone_number) else {
            warn!(user_key = %user.key, "User attempted to set an invalid phone number");
            return reject(MutationError::bad_request(ErrorMessage::InvalidPhoneNumber));
        };
        let Some(key) = self.config.phone_encryption_key.as_ref() else {
            error!(user_key = %user.key, "Phone encryption key is not configured");
            return Err(AuthError::PhoneEncryptionDisabled.into());
        };
        let encrypted = crypto::encrypt(key, &normalized).or_unable_to(ACTION)?;
        let code = tfa::generate_code();

        // A phone user falls back to email (or nothing) until the new
        // number is confirmed.
        let fallback = (user.tfa_send_method == TfaSendMethod::Phone).then(|| {
            if user.email_validated {
                TfaSendMethod::Email
            } else {
                TfaSendMethod::None
            }
        });
        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                phone_details: Some(Some(encrypted)),
                phone_validated: Some(false),
                tfa_code: Some(Some(code.clone())),
                tfa_send_method: fallback,
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        ctx.loaders.clear_user(&user).await;

        self.notify(Notification::TfaCodeText {
            phone_number: normalized,
            code,
        })
        .await;

        info!(user_key = %user.key, "User set phone number");
        Ok(Ok(StatusPayload::new(
            "Two factor code has been successfully sent, you will receive a text message shortly.",
        )))
    }

    pub async fn verify_phone_number(
        &self,
        ctx: &RequestContext<C>,
        code: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "verify phone number";
        let user = self.current_user(ctx).await?;

        if user.phone_details.is_none() || !tfa::code_matches(user.tfa_code.as_deref(), code) {
            warn!(user_key = %user.key, "User attempted to verify phone with an incorrect code");
            return reject(MutationError::bad_request(ErrorMessage::IncorrectPhoneCode));
        }

        let steps = user_stmt::update(
            user.key,
            &UpdateUser {
                phone_validated: Some(true),
                tfa_code: Some(None),
                tfa_send_method: Some(TfaSendMethod::Phone),
                ..Default::default()
            },
        );
        self.write(steps.into_iter().collect(), ACTION).await?;
        ctx.loaders.clear_user(&user).await;

        info!(user_key = %user.key, "User verified phone number");
        Ok(Ok(StatusPayload::new(
            "Successfully verified phone number, and set TFA send method to text.",
        )))
    }

    /// Delete an account with its affiliations and favourites. Closing
    /// someone else's account takes super admin.
    pub async fn close_account(
        &self,
        ctx: &RequestContext<C>,
        user_id: Option<&str>,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "close account";
        let user = self.current_user(ctx).await?;

        let target = match user_id {
            None => user.clone(),
            Some(id) => {
                let found = match key_of(id, USER_TYPE) {
                    Some(key) => ctx.loaders.user_by_key.load(key).await.or_unable_to(ACTION)?,
                    None => None,
                };
                let Some(target) = found else {
                    warn!(user_key = %user.key, user_id = id, "User attempted to close an unknown account");
                    return reject(MutationError::bad_request(ErrorMessage::CloseAccountUnknownUser));
                };
                target
            }
        };

        let is_super_admin = self
            .resolver
            .check_super_admin(user.key)
            .await
            .or_unable_to(ACTION)?;
        if target.key != user.key && !is_super_admin {
            warn!(user_key = %user.key, target_key = %target.key, "User attempted to close another account");
            return reject(MutationError::forbidden(ErrorMessage::CloseAccountNeedsSuperAdmin));
        }

        let affiliations = self
            .resolver
            .affiliations()
            .list_for_user(target.key)
            .await
            .or_unable_to(ACTION)?;
        for affiliation in affiliations.iter().filter(|a| a.permission == Permission::Owner) {
            let owners = self
                .resolver
                .affiliations()
                .count_with_permission(affiliation.org_key, Permission::Owner)
                .await
                .or_unable_to(ACTION)?;
            if owners <= 1 {
                warn!(
                    user_key = %user.key,
                    target_key = %target.key,
                    org_key = %affiliation.org_key,
                    "User attempted to close the account of an organization's only owner"
                );
                return reject(MutationError::bad_request(ErrorMessage::CloseAccountLastOwner));
            }
        }

        self.write(
            vec![
                user_stmt::delete_affiliations(target.key),
                user_stmt::delete_favourites(target.key),
                user_stmt::delete(target.key),
            ],
            ACTION,
        )
        .await?;
        ctx.loaders.clear_user(&target).await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(
                    ctx,
                    &user,
                    is_super_admin.then_some(Permission::SuperAdmin),
                ),
                action: AuditAction::Delete,
                target: AuditTarget {
                    resource: target.user_name.clone(),
                    organization: None,
                    resource_type: ResourceType::User,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, target_key = %target.key, "User closed account");
        Ok(Ok(StatusPayload::new("Successfully closed account.")))
    }
}
