//! Who is running the command

use clap::Args;

use crate::domain::{Actor, Role};
use crate::storage::GlobalConfig;

/// Identity flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ActorArgs {
    /// Actor ID recorded on forms and history
    #[arg(long, global = true, env = "CENSUS_ACTOR")]
    pub actor: Option<String>,

    /// Display name for the actor
    #[arg(long, global = true, env = "CENSUS_ACTOR_NAME")]
    pub actor_name: Option<String>,

    /// Role: recorder, approver or admin
    #[arg(long, global = true, env = "CENSUS_ROLE")]
    pub role: Option<Role>,
}

impl ActorArgs {
    /// Resolves the acting identity: flags and environment, then global
    /// config, then `$USER` as a recorder
    pub fn resolve(&self, global: &GlobalConfig) -> Actor {
        let id = self
            .actor
            .clone()
            .or_else(|| global.actor_id.clone())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "anonymous".to_string());
        let name = self
            .actor_name
            .clone()
            .or_else(|| global.actor_name.clone())
            .unwrap_or_else(|| id.clone());
        let role = self.role.or(global.role).unwrap_or_default();

        Actor::new(id, name, role)
    }
}
