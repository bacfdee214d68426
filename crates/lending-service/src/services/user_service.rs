//! Account lookups and closure.

use crate::auth::{authorize, Claims, Operation};
use crate::errors::LendingError;
use crate::models::{CloseAccountResponse, IsUserExistRequest, IsUserExistResponse, UserIdType};
use crate::repositories::UserStore;
use crate::validation::{is_valid_email, meaningful_phone, phone_with_country_code};
use std::sync::Arc;
use tracing::instrument;

/// Check which of `email` / `phone_number` already belong to an ACTIVE
/// user. Empty values are skipped. Both lookups run concurrently.
///
/// Values are expected to be validated and normalised already.
pub async fn existence_reasons(
    users: &dyn UserStore,
    email: &str,
    phone_number: &str,
) -> Result<Vec<String>, LendingError> {
    let email_check = async {
        if email.is_empty() {
            Ok(false)
        } else {
            users.user_exists(UserIdType::Email, email).await
        }
    };
    let phone_check = async {
        if phone_number.is_empty() {
            Ok(false)
        } else {
            users.user_exists(UserIdType::PhoneNumber, phone_number).await
        }
    };

    let (email_taken, phone_taken) = tokio::try_join!(email_check, phone_check)?;

    let mut reasons = Vec::new();
    if email_taken {
        reasons.push(format!(
            "user with {} {email} already exist",
            UserIdType::Email.label()
        ));
    }
    if phone_taken {
        reasons.push(format!(
            "user with {} {phone_number} already exist",
            UserIdType::PhoneNumber.label()
        ));
    }
    Ok(reasons)
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    default_country_code: String,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, default_country_code: String) -> Self {
        Self {
            users,
            default_country_code,
        }
    }

    #[instrument(skip_all)]
    pub async fn is_user_exist(
        &self,
        request: IsUserExistRequest,
    ) -> Result<IsUserExistResponse, LendingError> {
        let email = request.email.trim();
        let phone = meaningful_phone(request.phone_number.trim()).unwrap_or_default();

        if email.is_empty() && phone.is_empty() {
            return Err(LendingError::NoArgument);
        }
        if !email.is_empty() && !is_valid_email(email) {
            return Err(LendingError::MalformedEmail);
        }

        let phone = phone_with_country_code(phone, &self.default_country_code);
        let reasons = existence_reasons(self.users.as_ref(), email, &phone).await?;

        Ok(IsUserExistResponse {
            is_exist: !reasons.is_empty(),
            reasons,
        })
    }

    /// Close the caller's own account.
    #[instrument(skip_all)]
    pub async fn close_account(
        &self,
        claims: Option<&Claims>,
    ) -> Result<CloseAccountResponse, LendingError> {
        let claims = authorize(claims, Operation::CloseAccount)?;
        let user = self
            .users
            .close_account(claims.user_id, claims.user_id)
            .await?;

        tracing::info!(target: "lending.user", user_id = user.id, "Account closed");

        Ok(CloseAccountResponse {
            user_id: user.id,
            status: user.status,
        })
    }
}
