use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::{
    error::{AppError, AppResult},
    model::role::Role,
};

/// Caller identity placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing token".into())),
        )
    }
}

impl AuthUser {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_hr_or_admin(&self) -> AppResult<()> {
        if self.has_role(&[Role::Admin, Role::Hr]) {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only".into()))
        }
    }

    /// Returns true if the user is plain staff
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// Employee id for self-service endpoints; accounts without one cannot clock in
    /// or file corrections.
    pub fn employee_id_required(&self) -> AppResult<u64> {
        self.employee_id.ok_or_else(|| {
            AppError::Forbidden(format!("user {} is not linked to an employee", self.username))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "someone".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, None).require_admin().is_ok());
        assert!(user(Role::Hr, None).require_admin().is_err());
        assert!(user(Role::Hr, None).require_hr_or_admin().is_ok());

        let err = user(Role::Staff, Some(3)).require_hr_or_admin().unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn employee_link_is_required_for_self_service() {
        assert_eq!(user(Role::Staff, Some(3)).employee_id_required().unwrap(), 3);
        assert!(user(Role::Admin, None).employee_id_required().is_err());
    }

    #[actix_web::test]
    async fn extractor_reads_request_extensions() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(
            AuthUser::extract(&req).await.unwrap_err().kind(),
            "unauthorized"
        );

        req.extensions_mut().insert(user(Role::Staff, Some(3)));
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.employee_id, Some(3));
    }
}
