//! Startup seeding: base roles and the initial admin account.

use anyhow::{anyhow, Result};
use configs::SeedConfig;
use tracing::info;

use crate::context::OpContext;
use crate::form::FormFields;
use crate::registry::Services;
use crate::resources::role::{ADMIN, USER};
use crate::resources::{RoleResource, UserResource};

pub async fn seed(services: &Services, cfg: &SeedConfig) -> Result<()> {
    let ctx = OpContext::new();
    for name in [ADMIN, USER] {
        if RoleResource::find_by_name(services.roles.store().as_ref(), name).await?.is_some() {
            continue;
        }
        let res = services.roles.create(&ctx, &FormFields::new().with("name", name), Vec::new()).await;
        if !res.succeeded {
            return Err(anyhow!("seeding role '{}' failed: {:?}", name, res.message));
        }
        info!(role = name, "role_seeded");
    }

    let (Some(email), Some(password)) = (&cfg.admin_email, &cfg.admin_password) else {
        return Ok(());
    };
    if UserResource::find_by_email(services.users.store().as_ref(), email).await?.is_some() {
        return Ok(());
    }
    let form = FormFields::new()
        .with("email", email.as_str())
        .with("password", password.as_str())
        .with("emailConfirmed", "true")
        .with("roles", ADMIN);
    let res = services.users.create(&ctx, &form, Vec::new()).await;
    if !res.succeeded {
        return Err(anyhow!("seeding admin '{}' failed: {:?} {:?}", email, res.message, res.errors));
    }
    info!(%email, "admin_seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::domain::LoginInput;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn seeding_is_idempotent_and_admin_can_log_in() -> anyhow::Result<()> {
        let fx = Fixture::empty().await;
        let cfg = SeedConfig { admin_email: Some("admin@cars.local".into()), admin_password: Some("changeme".into()) };
        seed(&fx.services, &cfg).await?;
        seed(&fx.services, &cfg).await?;
        assert_eq!(fx.stores.roles.len().await, 2);
        assert_eq!(fx.stores.users.len().await, 1);
        let s = fx
            .services
            .auth
            .login(LoginInput { email: "admin@cars.local".into(), password: "changeme".into() })
            .await?;
        assert!(s.user.has_role(ADMIN));
        fx.cleanup().await;
        Ok(())
    }
}
