//! Role-based authorization.
//!
//! Pure functions over the caller's claims. Missing claims are
//! `Unauthenticated`; a role outside the allow-list is `PermissionDenied`.

use crate::auth::claims::Claims;
use crate::errors::LendingError;
use crate::models::Role;

/// Operations guarded by role allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProposeLoan,
    ApproveLoan,
    InvestInLoan,
    DisburseLoan,
    CloseAccount,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ProposeLoan => "propose_loan",
            Operation::ApproveLoan => "approve_loan",
            Operation::InvestInLoan => "invest_in_loan",
            Operation::DisburseLoan => "disburse_loan",
            Operation::CloseAccount => "close_account",
        }
    }

    /// Roles allowed to perform this operation.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::ProposeLoan => &[Role::Superadmin, Role::Admin, Role::Borrower],
            Operation::ApproveLoan => &[Role::Superadmin, Role::Admin, Role::FieldValidator],
            Operation::InvestInLoan => &[Role::Superadmin, Role::Admin, Role::Investor],
            Operation::DisburseLoan => &[Role::Superadmin, Role::Admin],
            Operation::CloseAccount => &[
                Role::Superadmin,
                Role::Admin,
                Role::FieldValidator,
                Role::Investor,
                Role::Borrower,
            ],
        }
    }
}

/// Require authenticated claims whose role may perform `operation`.
pub fn authorize(claims: Option<&Claims>, operation: Operation) -> Result<&Claims, LendingError> {
    let claims = claims.ok_or(LendingError::Unauthenticated)?;

    if !operation.allowed_roles().contains(&claims.role()) {
        tracing::debug!(
            target: "lending.auth.guard",
            operation = operation.as_str(),
            role = ?claims.role(),
            "Role not allowed"
        );
        return Err(LendingError::PermissionDenied);
    }

    Ok(claims)
}

/// Roles a caller may create through registration.
pub fn creatable_roles(caller: Role) -> &'static [Role] {
    match caller {
        Role::Superadmin => &[Role::Superadmin, Role::Admin],
        Role::Admin => &[Role::Admin],
        Role::FieldValidator | Role::Investor | Role::Borrower => &[],
    }
}

/// Resolve the role a new user is registered with.
///
/// Self-registration (no caller) always yields BORROWER whatever was
/// requested. An authenticated caller must be SUPERADMIN or ADMIN and may
/// only create roles from [`creatable_roles`].
pub fn registration_role(caller: Option<&Claims>, requested: u8) -> Result<Role, LendingError> {
    let Some(caller) = caller else {
        return Ok(Role::Borrower);
    };

    let creatable = creatable_roles(caller.role());
    if creatable.is_empty() {
        return Err(LendingError::PermissionDenied);
    }

    let requested = Role::try_from(requested)
        .map_err(|_| LendingError::Validation("role_id is invalid.".to_string()))?;

    if !creatable.contains(&requested) {
        tracing::debug!(
            target: "lending.auth.guard",
            caller_role = ?caller.role(),
            requested_role = ?requested,
            "Registration role not permitted"
        );
        return Err(LendingError::PermissionDenied);
    }

    Ok(requested)
}
