use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use configs::AuthConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header as JwtHeader, Validation};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::domain::{AuthSession, AuthUser, Claims, LoginInput};
use super::errors::AuthError;
use super::password::verify_password_blocking;
use crate::query::Filter;
use crate::resources::{Role, User, UserResource};
use crate::storage::EntityStore;

/// Auth business service independent of web framework
pub struct AuthService {
    users: Arc<dyn EntityStore<User>>,
    roles: Arc<dyn EntityStore<Role>>,
    cfg: AuthConfig,
}

impl AuthService {
    pub fn new(users: Arc<dyn EntityStore<User>>, roles: Arc<dyn EntityStore<Role>>, cfg: AuthConfig) -> Self {
        Self { users, roles, cfg }
    }

    /// Authenticate a user by email and password and issue a token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation("email and password are required".into()));
        }
        let user = UserResource::find_by_email(self.users.as_ref(), input.email.trim())
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let ok = verify_password_blocking(input.password, user.password_hash.clone())
            .await
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        if !ok {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::Unauthorized);
        }

        let principal = AuthUser {
            id: user.id,
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            roles: self.role_names(&user.role_ids).await?,
        };
        let (token, expires_at) = self.issue(&principal)?;
        info!(user_id = %principal.id, roles = ?principal.roles, "user_logged_in");
        Ok(AuthSession { user: principal, token, expires_at })
    }

    /// Validate signature, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.cfg.issuer]);
        validation.set_audience(&[&self.cfg.audience]);
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.cfg.jwt_secret.as_bytes()), &validation)
            .map_err(|e| AuthError::TokenError(e.to_string()))?;
        let c = data.claims;
        let id = Uuid::parse_str(&c.uid).map_err(|e| AuthError::TokenError(e.to_string()))?;
        Ok(AuthUser { id, email: c.sub, user_name: c.name, roles: c.roles })
    }

    /// Like [`AuthService::verify`] but also requires `role`.
    pub fn authorize(&self, token: &str, role: &str) -> Result<AuthUser, AuthError> {
        let user = self.verify(token)?;
        if user.has_role(role) { Ok(user) } else { Err(AuthError::Forbidden) }
    }

    fn issue(&self, user: &AuthUser) -> Result<(String, i64), AuthError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.cfg.token_ttl_hours)).timestamp();
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id.to_string(),
            name: user.user_name.clone(),
            roles: user.roles.clone(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            iat: now.timestamp(),
            exp,
        };
        let token = encode(&JwtHeader::default(), &claims, &EncodingKey::from_secret(self.cfg.jwt_secret.as_bytes()))
            .map_err(|e| AuthError::TokenError(e.to_string()))?;
        Ok((token, exp))
    }

    async fn role_names(&self, ids: &[Uuid]) -> Result<Vec<String>, AuthError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let all: HashMap<Uuid, String> = self
            .roles
            .list(&Filter::new())
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        Ok(ids.iter().filter_map(|id| all.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpContext;
    use crate::resources::role::ADMIN;
    use crate::test_support::{auth_config, user_form, Fixture};

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let fx = Fixture::new().await;
        let form = user_form("root@example.com").with("roles", "admin");
        assert!(fx.services.users.create(&OpContext::new(), &form, vec![]).await.succeeded);

        let session = fx
            .services
            .auth
            .login(LoginInput { email: "ROOT@example.com".into(), password: "secret1".into() })
            .await
            .unwrap();
        assert_eq!(session.user.roles, vec![ADMIN.to_string()]);
        let verified = fx.services.auth.authorize(&session.token, ADMIN).unwrap();
        assert_eq!(verified, session.user);
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_unauthorized() {
        let fx = Fixture::new().await;
        fx.services.users.create(&OpContext::new(), &user_form("u@example.com"), vec![]).await;
        let bad = fx.services.auth.login(LoginInput { email: "u@example.com".into(), password: "nope".into() }).await;
        assert!(matches!(bad, Err(AuthError::Unauthorized)));
        let ghost = fx.services.auth.login(LoginInput { email: "ghost@example.com".into(), password: "secret1".into() }).await;
        assert!(matches!(ghost, Err(AuthError::Unauthorized)));
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn plain_user_is_forbidden_from_admin_role() {
        let fx = Fixture::new().await;
        fx.services.users.create(&OpContext::new(), &user_form("p@example.com"), vec![]).await;
        let s = fx.services.auth.login(LoginInput { email: "p@example.com".into(), password: "secret1".into() }).await.unwrap();
        assert!(matches!(fx.services.auth.authorize(&s.token, ADMIN), Err(AuthError::Forbidden)));
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let fx = Fixture::new().await;
        let mut other = auth_config();
        other.jwt_secret = "another-secret-of-length".into();
        let foreign = AuthService::new(fx.stores.users.clone(), fx.stores.roles.clone(), other);
        let (token, _) = foreign
            .issue(&AuthUser { id: Uuid::new_v4(), email: "x@y.z".into(), user_name: "x".into(), roles: vec![ADMIN.into()] })
            .unwrap();
        assert!(matches!(fx.services.auth.verify(&token), Err(AuthError::TokenError(_))));
        fx.cleanup().await;
    }
}
