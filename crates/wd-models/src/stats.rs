//! Aggregate statistics for dashboards

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub verified_users: i64,
    pub locked_users: i64,
    /// Role name -> number of users
    pub users_by_role: BTreeMap<String, i64>,
    /// Registered in the last 30 days
    pub recent_registrations: i64,
    /// Logged in during the last 30 days
    pub recent_logins: i64,
}

/// Per-tier administrator counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub admin1_count: i64,
    pub admin2_count: i64,
    pub admin3_count: i64,
    pub active_admin1: i64,
    pub active_admin2: i64,
    pub active_admin3: i64,
}

impl AdminStats {
    pub fn total(&self) -> i64 {
        self.admin1_count + self.admin2_count + self.admin3_count
    }

    pub fn total_active(&self) -> i64 {
        self.active_admin1 + self.active_admin2 + self.active_admin3
    }
}
