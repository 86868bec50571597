use crate::{AuthError, AuthOutcome, Principal, Requirement};

/// Route-level authorization over a bound principal.
///
/// Passes when the principal meets at least one requirement (roles and
/// permissions are checked against their own sets). An empty requirement
/// list means the route only needs an authenticated caller.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, required: &[Requirement]) -> Result<(), AuthError> {
    if required.is_empty() || principal.has_any(required) {
        return Ok(());
    }

    let wanted = required
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    tracing::debug!(subject = %principal.subject_id, required = %wanted, "authorization denied");
    Err(AuthError::AuthorizationDenied(wanted))
}

/// Same as [`authorize`], starting from the authenticator's outcome.
/// An unbound request fails with `Unauthenticated`.
pub fn authorize_outcome(outcome: &AuthOutcome, required: &[Requirement]) -> Result<(), AuthError> {
    let principal = outcome.principal().ok_or(AuthError::Unauthenticated)?;
    authorize(principal, required)
}

#[cfg(test)]
mod tests {
    use tollgate_core::SubjectId;

    use super::*;
    use crate::{PassThroughReason, PermissionCode, RoleCode};

    fn principal() -> Principal {
        Principal {
            subject_id: SubjectId::new(3),
            username: "test".into(),
            email: "test@example.com".into(),
            roles: [RoleCode::new("TESTER")].into_iter().collect(),
            permissions: [PermissionCode::new("user:view"), PermissionCode::new("user:create")]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn any_matching_authority_grants() {
        let p = principal();
        assert!(authorize(&p, &[Requirement::permission("user:create")]).is_ok());
        assert!(
            authorize(
                &p,
                &[Requirement::permission("user:admin"), Requirement::permission("user:view")]
            )
            .is_ok()
        );
        assert!(authorize(&p, &[Requirement::parse("ROLE_TESTER")]).is_ok());
        assert!(authorize(&p, &[]).is_ok());
    }

    #[test]
    fn missing_authority_is_denied_with_the_requirements() {
        let err = authorize(&principal(), &[Requirement::role("ADMIN"), Requirement::permission("user:delete")])
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthorizationDenied("ROLE_ADMIN, user:delete".into())
        );
    }

    #[test]
    fn unbound_outcome_is_unauthenticated() {
        let outcome = AuthOutcome::PassThrough(PassThroughReason::NoCredentials);
        assert_eq!(
            authorize_outcome(&outcome, &[]),
            Err(AuthError::Unauthenticated)
        );

        let bound = AuthOutcome::Bound(principal());
        assert!(authorize_outcome(&bound, &[Requirement::role("TESTER")]).is_ok());
    }
}
