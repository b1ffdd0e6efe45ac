//! Shared fixtures for service tests

use std::sync::Arc;
use wd_core::config::AppConfig;
use wd_core::Role;
use wd_db::Stores;
use wd_models::CreateUser;

use crate::notifier::MemoryNotifier;
use crate::Services;

pub const STRONG_PASSWORD: &str = "Str0ng!Pass";

pub struct Fixture {
    pub services: Services,
    pub stores: Stores,
    pub notifier: Arc<MemoryNotifier>,
}

pub fn fixture() -> Fixture {
    fixture_with(AppConfig::default())
}

pub fn fixture_with(config: AppConfig) -> Fixture {
    fixture_over(config, Stores::memory())
}

pub fn fixture_over(config: AppConfig, stores: Stores) -> Fixture {
    let notifier = Arc::new(MemoryNotifier::default());
    let services = Services::new(config, stores.clone(), notifier.clone())
        .expect("services build from default config");
    Fixture {
        services,
        stores,
        notifier,
    }
}

pub fn create_input(email: &str) -> CreateUser {
    CreateUser {
        email: email.to_string(),
        first_name: "Test".into(),
        last_name: "User".into(),
        role: Role::User,
        is_active: true,
        password: STRONG_PASSWORD.into(),
        confirm_password: STRONG_PASSWORD.into(),
    }
}
