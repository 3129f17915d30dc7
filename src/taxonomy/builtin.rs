use crate::classify::ErrorCategory::{
    self, Authentication, Business, Cms, License, Network, Permission, Points, Server, Tenant,
    User, Validation,
};

use super::GuidanceKind::{Modal, Redirect};
use super::Severity::{Critical, High, Low, Medium};
use super::{Severity, TaxonomyEntry};

fn entry(category: ErrorCategory, severity: Severity, message: &str) -> TaxonomyEntry {
    TaxonomyEntry::new(category, severity, message)
}

/// `(numeric code, stable identifier, entry)` for every documented backend error.
pub(super) fn entries() -> Vec<(Option<i32>, &'static str, TaxonomyEntry)> {
    vec![
        // Authentication 4001-4004
        (
            Some(4001),
            "AUTH_NOT_AUTHENTICATED",
            entry(Authentication, High, "Your session has expired, please sign in again")
                .clears_session()
                .with_guidance("Sign in", Some("/login"), Redirect),
        ),
        (
            Some(4002),
            "AUTH_TOKEN_INVALID",
            entry(Authentication, High, "Your credentials are invalid, please sign in again")
                .clears_session(),
        ),
        (
            Some(4003),
            "AUTH_PERMISSION_DENIED",
            entry(Permission, Medium, "You do not have permission to perform this action")
                .with_guidance("Contact administrator", None, Modal),
        ),
        (
            Some(4004),
            "AUTH_TOKEN_EXPIRED",
            entry(Authentication, High, "Your session has expired, please sign in again")
                .clears_session()
                .with_guidance("Sign in", Some("/login"), Redirect),
        ),
        // Tenants 4100-4199
        (
            Some(4101),
            "TENANT_NOT_FOUND",
            entry(Tenant, Medium, "This tenant does not exist, please return to the list")
                .with_guidance("Back to list", Some("/tenants"), Modal),
        ),
        (
            Some(4102),
            "TENANT_INACTIVE",
            entry(Tenant, Medium, "The tenant account is disabled, please contact an administrator"),
        ),
        (
            Some(4103),
            "TENANT_QUOTA_EXCEEDED",
            entry(Tenant, Medium, "Quota exhausted, upgrade the plan or contact an administrator"),
        ),
        (
            Some(4104),
            "TENANT_ACCESS_DENIED",
            entry(Tenant, Medium, "You cannot access this tenant's resources"),
        ),
        // Licenses 4200-4299
        (
            Some(4201),
            "LICENSE_EXPIRED",
            entry(License, Medium, "The license has expired, renew it to keep using the product")
                .with_guidance("Renew now", Some("/licenses/renew"), Modal),
        ),
        (
            Some(4202),
            "LICENSE_NOT_FOUND",
            entry(License, Medium, "License not found"),
        ),
        (
            Some(4203),
            "LICENSE_QUOTA_EXCEEDED",
            entry(License, Medium, "License quota exhausted, please upgrade the plan")
                .with_guidance("Upgrade plan", Some("/upgrade"), Modal),
        ),
        (
            Some(4204),
            "LICENSE_INVALID",
            entry(License, Medium, "The license is invalid"),
        ),
        (
            Some(4205),
            "LICENSE_REVOKED",
            entry(License, Medium, "The license has been revoked"),
        ),
        (
            Some(4206),
            "LICENSE_ALREADY_ASSIGNED",
            entry(License, Medium, "You already hold a license for this product")
                .with_guidance("View my licenses", Some("/licenses/my"), Modal),
        ),
        (
            Some(4207),
            "LICENSE_MACHINE_LIMIT_EXCEEDED",
            entry(License, Medium, "The machine binding limit has been reached"),
        ),
        // Users 4300-4399
        (
            Some(4301),
            "USER_NOT_FOUND",
            entry(User, Medium, "User not found"),
        ),
        (
            Some(4302),
            "USER_INACTIVE",
            entry(User, Medium, "The user account is disabled, please contact an administrator"),
        ),
        (
            Some(4303),
            "USER_PERMISSION_DENIED",
            entry(
                Permission,
                Medium,
                "You do not have permission to perform this action, contact an administrator if needed",
            )
            .with_guidance("Contact administrator", None, Modal),
        ),
        (
            Some(4304),
            "USER_ALREADY_EXISTS",
            entry(User, Medium, "The user already exists"),
        ),
        (
            Some(4305),
            "USER_INVALID_CREDENTIALS",
            entry(User, Medium, "Incorrect username or password"),
        ),
        // Points 4400-4499
        (
            Some(4401),
            "POINTS_INSUFFICIENT",
            entry(Points, Medium, "Not enough points, complete tasks to earn more")
                .with_guidance("Earn points", Some("/points/earn"), Modal),
        ),
        (
            Some(4402),
            "POINTS_EXPIRED",
            entry(Points, Medium, "Your points have expired"),
        ),
        (
            Some(4403),
            "POINTS_INVALID_OPERATION",
            entry(Points, Medium, "Invalid points operation"),
        ),
        (
            Some(4404),
            "POINTS_DAILY_LIMIT_EXCEEDED",
            entry(Points, Medium, "Daily points limit reached, come back tomorrow"),
        ),
        // Content 4500-4599
        (
            Some(4501),
            "CONTENT_NOT_FOUND",
            entry(Cms, Medium, "Content not found"),
        ),
        (
            Some(4502),
            "CONTENT_ACCESS_DENIED",
            entry(Cms, Medium, "You cannot access this content"),
        ),
        (
            Some(4503),
            "CONTENT_PUBLISH_FAILED",
            entry(Cms, Medium, "Publishing the content failed"),
        ),
        // Validation
        (
            Some(4000),
            "VALIDATION_ERROR",
            entry(Validation, Low, "Please check your input"),
        ),
        // Generic HTTP 404
        (
            Some(4040),
            "RESOURCE_NOT_FOUND",
            entry(Business, Medium, "The requested resource does not exist"),
        ),
        // Server 5000-5099
        (
            Some(5000),
            "INTERNAL_SERVER_ERROR",
            entry(Server, Critical, "The server is temporarily unavailable, please try again later")
                .retryable()
                .with_guidance("Retry", None, Modal),
        ),
        (
            Some(5001),
            "REQUEST_TIMEOUT",
            entry(Network, Critical, "The request timed out, please try again later").retryable(),
        ),
        (
            Some(5002),
            "NETWORK_ERROR",
            entry(Network, Critical, "Network connection failed, please check your network settings")
                .retryable()
                .with_guidance("Retry", None, Modal),
        ),
        (
            Some(5003),
            "DATABASE_ERROR",
            entry(Server, Medium, "The database is unavailable, please try again later").retryable(),
        ),
        (
            Some(5004),
            "EXTERNAL_SERVICE_ERROR",
            entry(Server, Medium, "An external service is unavailable, please try again later")
                .retryable(),
        ),
    ]
}
