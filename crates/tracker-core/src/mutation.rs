//! The tagged business-error channel shared by every mutation.
//!
//! A mutation returns [`MutationResult<T>`]: the outer `Result` carries
//! infrastructure faults ([`TrackerError`]), the inner one carries the
//! expected, client-visible rejections ([`MutationError`]).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::TrackerError;

pub type MutationResult<T> = Result<Result<T, MutationError>, TrackerError>;

/// A business-rule rejection: a numeric code plus a message key that
/// the presentation layer localizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "_type", rename = "error")]
pub struct MutationError {
    pub code: u16,
    #[serde(rename = "description", serialize_with = "describe")]
    pub message: ErrorMessage,
}

fn describe<S: Serializer>(message: &ErrorMessage, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(message)
}

impl MutationError {
    pub const fn bad_request(message: ErrorMessage) -> Self {
        Self { code: 400, message }
    }

    pub const fn unauthorized(message: ErrorMessage) -> Self {
        Self { code: 401, message }
    }

    pub const fn forbidden(message: ErrorMessage) -> Self {
        Self { code: 403, message }
    }

    pub fn description(&self) -> String {
        self.message.to_string()
    }
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MutationError {}

/// Message keys for every business rejection. The `Display` text is the
/// English catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorMessage {
    // -- affiliations ---------------------------------------------------
    #[error("Unable to invite yourself to an org.")]
    InviteSelf,
    #[error("Unable to invite user to unknown organization.")]
    InviteUnknownOrg,
    #[error("Permission Denied: Please contact organization admin for help with user invitations.")]
    InviteNeedsAdmin,
    #[error("Permission Denied: Please contact super admin for help with user invitations.")]
    InviteNeedsSuperAdmin,
    #[error(
        "Unable to invite user to organization. User is already affiliated with organization."
    )]
    InviteAlreadyAffiliated,
    #[error("Unable to assign an invalid role.")]
    InvalidRole,
    #[error("Unable to request invite to unknown organization.")]
    RequestUnknownOrg,
    #[error("Unable to request invite to organization with which you are already affiliated.")]
    RequestAlreadyAffiliated,
    #[error("Unable to request invite to organization with which you have already requested to join.")]
    RequestAlreadyPending,
    #[error("Unable to remove user from unknown organization.")]
    RemoveUserUnknownOrg,
    #[error("Permission Denied: Please contact organization admin for help with removing users.")]
    RemoveUserNeedsAdmin,
    #[error("Unable to remove unknown user from organization.")]
    RemoveUserUnknownUser,
    #[error("Unable to remove a user that already does not belong to this organization.")]
    RemoveUserNotAffiliated,
    #[error("Permission Denied: Please contact super admin for help with removing users.")]
    RemoveUserNeedsSuperAdmin,
    #[error("Unable to update your own role.")]
    UpdateOwnRole,
    #[error("Unable to update role: user unknown.")]
    UpdateRoleUnknownUser,
    #[error("Unable to update role: organization unknown.")]
    UpdateRoleUnknownOrg,
    #[error(
        "Permission Denied: Please contact organization admin for help with user role changes."
    )]
    UpdateRoleNeedsAdmin,
    #[error("Unable to update role: user does not belong to this organization.")]
    UpdateRoleNotAffiliated,
    #[error("Permission Denied: Please contact super admin for help with user role changes.")]
    UpdateRoleNeedsSuperAdmin,
    #[error("Unable to transfer ownership of unknown organization.")]
    TransferUnknownOrg,
    #[error("Permission Denied: Please contact organization owner for help with ownership transfer.")]
    TransferNeedsOwner,
    #[error("Unable to transfer ownership to unknown user.")]
    TransferUnknownUser,
    #[error("Unable to transfer ownership to a user outside the organization.")]
    TransferNotAffiliated,
    #[error("Unable to transfer ownership to yourself.")]
    TransferToSelf,
    #[error("Unable to leave unknown organization.")]
    LeaveUnknownOrg,
    #[error("Unable to leave an organization you do not belong to.")]
    LeaveNotAffiliated,
    #[error("Unable to leave organization: you are its only owner. Transfer ownership first.")]
    LeaveLastOwner,

    // -- organizations --------------------------------------------------
    #[error("Organization name already in use. Please try again with a different name.")]
    OrgNameInUse,
    #[error("Unable to save organization: a name is required in both English and French.")]
    OrgNameRequired,
    #[error("Unable to update unknown organization.")]
    UpdateOrgUnknown,
    #[error(
        "Permission Denied: Please contact organization admin for help with updating organization."
    )]
    UpdateOrgNeedsAdmin,
    #[error("Permission Denied: Please contact super admin for help with external organization settings.")]
    UpdateOrgExternalNeedsSuperAdmin,
    #[error("Unable to verify unknown organization.")]
    VerifyOrgUnknown,
    #[error("Permission Denied: Please contact super admin for help with verifying this organization.")]
    VerifyOrgNeedsSuperAdmin,
    #[error("Organization has already been verified.")]
    VerifyOrgAlreadyVerified,
    #[error("Unable to archive unknown organization.")]
    ArchiveOrgUnknown,
    #[error(
        "Permission Denied: Please contact organization admin for help with archiving organization."
    )]
    ArchiveOrgNeedsOwner,
    #[error("Permission Denied: Please contact super admin for help with archiving organization.")]
    ArchiveVerifiedOrgNeedsSuperAdmin,
    #[error("Unable to remove unknown organization.")]
    RemoveOrgUnknown,
    #[error(
        "Permission Denied: Please contact organization admin for help with removing organization."
    )]
    RemoveOrgNeedsOwner,
    #[error("Permission Denied: Please contact super admin for help with removing organization.")]
    RemoveVerifiedOrgNeedsSuperAdmin,

    // -- domains --------------------------------------------------------
    #[error("Unable to create domain in unknown organization.")]
    CreateDomainUnknownOrg,
    #[error("Permission Denied: Please contact organization user for help with creating domain.")]
    CreateDomainNeedsPermission,
    #[error("Unable to create domain, organization has already claimed it.")]
    CreateDomainAlreadyClaimed,
    #[error("Unable to use an invalid domain name.")]
    InvalidDomainName,
    #[error("Unable to update unknown domain.")]
    UpdateDomainUnknownDomain,
    #[error("Unable to update domain in an unknown org.")]
    UpdateDomainUnknownOrg,
    #[error("Permission Denied: Please contact organization user for help with updating this domain.")]
    UpdateDomainNeedsPermission,
    #[error("Unable to update domain that does not belong to the given organization.")]
    UpdateDomainNotClaimed,
    #[error("Unable to update domain: another domain with this name already exists.")]
    DomainNameInUse,
    #[error("Permission Denied: Please contact super admin for help with archiving domain.")]
    ArchiveDomainNeedsSuperAdmin,
    #[error("Unable to archive a domain claimed by multiple organizations.")]
    ArchiveSharedDomain,
    #[error("Unable to remove unknown domain.")]
    RemoveDomainUnknownDomain,
    #[error("Unable to remove domain from unknown organization.")]
    RemoveDomainUnknownOrg,
    #[error("Permission Denied: Please contact organization admin for help with removing domain.")]
    RemoveDomainNeedsAdmin,
    #[error("Permission Denied: Please contact super admin for help with removing domain.")]
    RemoveDomainNeedsSuperAdmin,
    #[error("Unable to remove domain. Domain is not part of organization.")]
    RemoveDomainNotClaimed,
    #[error("Unable to add domains in unknown organization.")]
    BulkDomainsUnknownOrg,
    #[error("Permission Denied: Please contact organization admin for help with managing domains.")]
    BulkDomainsNeedsAdmin,
    #[error("Permission Denied: Please contact super admin for help with removing domains.")]
    BulkDomainsNeedsSuperAdmin,
    #[error("Unable to request a scan on an unknown domain.")]
    ScanUnknownDomain,
    #[error("Permission Denied: Please contact organization user for help with scanning this domain.")]
    ScanNeedsPermission,
    #[error("Unable to favourite unknown domain.")]
    FavouriteUnknownDomain,
    #[error("Unable to favourite domain, user has already favourited it.")]
    FavouriteAlreadyExists,
    #[error("Unable to unfavourite domain, domain is not favourited.")]
    FavouriteNotFound,

    // -- users ----------------------------------------------------------
    #[error("Password does not meet requirements.")]
    PasswordTooShort,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Email already in use.")]
    UserNameInUse,
    #[error("Unable to sign up, invite token does not match this email. Please request a new invite.")]
    InviteTokenMismatch,
    #[error("Incorrect username or password. Please try again.")]
    IncorrectCredentials,
    #[error("Too many failed login attempts, please reset your password, and try again.")]
    TooManyFailedAttempts,
    #[error("Incorrect TFA code. Please sign in again.")]
    IncorrectTfaCode,
    #[error("Unable to refresh tokens, please sign in.")]
    InvalidRefreshToken,
    #[error("Unable to update password, current password does not match. Please try again.")]
    IncorrectCurrentPassword,
    #[error("Unable to update password, passwords do not match requirements. Please try again.")]
    NewPasswordTooShort,
    #[error("Unable to update password, new passwords do not match. Please try again.")]
    NewPasswordMismatch,
    #[error("Unable to use phone for two-factor authentication: phone number is not verified.")]
    TfaPhoneNotValidated,
    #[error("Unable to use email for two-factor authentication: email is not verified.")]
    TfaEmailNotValidated,
    #[error("Unable to set phone number: number is not valid.")]
    InvalidPhoneNumber,
    #[error("Two factor code is incorrect. Please try again.")]
    IncorrectPhoneCode,
    #[error("Unable to verify account. Please request a new email.")]
    VerifyAccountInvalidToken,
    #[error("Permission Denied: Please contact super admin for help with closing account.")]
    CloseAccountNeedsSuperAdmin,
    #[error("Unable to close account of an unknown user.")]
    CloseAccountUnknownUser,
    #[error("Unable to close account: user is the only owner of an organization.")]
    CloseAccountLastOwner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_codes() {
        assert_eq!(MutationError::bad_request(ErrorMessage::InviteSelf).code, 400);
        assert_eq!(
            MutationError::unauthorized(ErrorMessage::TooManyFailedAttempts).code,
            401
        );
        assert_eq!(MutationError::forbidden(ErrorMessage::InviteNeedsAdmin).code, 403);
    }

    #[test]
    fn serializes_as_tagged_error() {
        let err = MutationError::bad_request(ErrorMessage::InviteSelf);
        let json = serde_json::to_value(err).unwrap();
        assert_eq!(json["_type"], "error");
        assert_eq!(json["code"], 400);
        assert_eq!(json["description"], "Unable to invite yourself to an org.");
    }
}
