//! The catalog store boundary (see SPEC_FULL.md §3, §6, §10.5).
//!
//! The relay core only ever reads through [`CatalogStore`]; accounts,
//! agents, spaces and memberships are owned and mutated by the admin API
//! collaborator this repository does not implement. [`MemoryCatalog`] is a
//! dashmap-backed stand-in so the core is runnable and testable without a
//! real store wired up, not meant to back a production deployment.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::ids::{AccountId, AgentId, SpaceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    pub account: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub token: String,
    pub account: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Membership {
    pub agent: AgentId,
    pub space: SpaceId,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no account named {0:?}")]
    UnknownAccount(String),
    #[error("no agent with id {0}")]
    UnknownAgent(AgentId),
    #[error("account {0} has no self agent")]
    NoSelfAgent(AccountId),
    #[error("no space named {0:?} in this account")]
    UnknownSpace(String),
}

/// The store API the relay core consumes. Implementations back this with
/// whatever the admin API actually persists to; the core never mutates
/// accounts, agents, or spaces directly, it only follows memberships.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn agent_by_token(&self, token: &str) -> Option<Agent>;

    async fn account_by_name(&self, name: &str) -> Result<Account, CatalogError>;

    /// The account's "own" agent: the identity the account itself relays
    /// as, distinct from any agent that merely belongs to the account.
    async fn space_agent_of(&self, account: AccountId) -> Result<Agent, CatalogError>;

    async fn spaces_of(&self, agent: AgentId) -> Vec<Space>;

    /// Resolve space names to spaces, scoped to `account`. Unknown names
    /// are silently omitted rather than erroring (see SPEC_FULL.md §4.6).
    async fn spaces_where(&self, names: &[String], account: AccountId) -> Vec<Space>;

    async fn agent_join_space(
        &self,
        agent: AgentId,
        space_name: &str,
    ) -> Result<(), CatalogError>;

    async fn agent_leave_space(
        &self,
        agent: AgentId,
        space_name: &str,
    ) -> Result<(), CatalogError>;
}

/// In-memory `CatalogStore`, keyed the way this codebase's process-wide
/// registries are: one `DashMap` per entity kind plus a membership set.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    accounts: DashMap<AccountId, Account>,
    accounts_by_name: DashMap<String, AccountId>,
    agents: DashMap<AgentId, Agent>,
    agents_by_token: DashMap<String, AgentId>,
    spaces: DashMap<SpaceId, Space>,
    memberships: DashMap<AgentId, std::collections::HashSet<SpaceId>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, name: impl Into<String>) -> Account {
        let name = name.into();
        let account = Account {
            id: AccountId::rand(),
            name: name.clone(),
        };
        self.accounts.insert(account.id, account.clone());
        self.accounts_by_name.insert(name, account.id);
        account
    }

    pub fn insert_agent(
        &self,
        name: impl Into<String>,
        token: impl Into<String>,
        account: AccountId,
    ) -> Agent {
        let token = token.into();
        let agent = Agent {
            id: AgentId::rand(),
            name: name.into(),
            token: token.clone(),
            account,
        };
        self.agents.insert(agent.id, agent.clone());
        self.agents_by_token.insert(token, agent.id);
        agent
    }

    pub fn insert_space(&self, name: impl Into<String>, account: AccountId) -> Space {
        let space = Space {
            id: SpaceId::rand(),
            name: name.into(),
            account,
        };
        self.spaces.insert(space.id, space.clone());
        space
    }

    fn space_by_name(&self, name: &str, account: AccountId) -> Option<Space> {
        self.spaces
            .iter()
            .map(|entry| entry.value().clone())
            .find(|space| space.name == name && space.account == account)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn agent_by_token(&self, token: &str) -> Option<Agent> {
        let id = *self.agents_by_token.get(token)?;
        self.agents.get(&id).map(|entry| entry.value().clone())
    }

    async fn account_by_name(&self, name: &str) -> Result<Account, CatalogError> {
        let id = *self
            .accounts_by_name
            .get(name)
            .ok_or_else(|| CatalogError::UnknownAccount(name.to_string()))?;
        self.accounts
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CatalogError::UnknownAccount(name.to_string()))
    }

    async fn space_agent_of(&self, account: AccountId) -> Result<Agent, CatalogError> {
        self.agents
            .iter()
            .map(|entry| entry.value().clone())
            .find(|agent| agent.account == account && agent.name == "self")
            .ok_or(CatalogError::NoSelfAgent(account))
    }

    async fn spaces_of(&self, agent: AgentId) -> Vec<Space> {
        let Some(space_ids) = self.memberships.get(&agent) else {
            return Vec::new();
        };
        space_ids
            .iter()
            .filter_map(|id| self.spaces.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    async fn spaces_where(&self, names: &[String], account: AccountId) -> Vec<Space> {
        names
            .iter()
            .filter_map(|name| self.space_by_name(name, account))
            .collect()
    }

    async fn agent_join_space(
        &self,
        agent: AgentId,
        space_name: &str,
    ) -> Result<(), CatalogError> {
        let account = self
            .agents
            .get(&agent)
            .map(|entry| entry.value().account)
            .ok_or(CatalogError::UnknownAgent(agent))?;
        let space = self
            .space_by_name(space_name, account)
            .ok_or_else(|| CatalogError::UnknownSpace(space_name.to_string()))?;
        self.memberships.entry(agent).or_default().insert(space.id);
        Ok(())
    }

    async fn agent_leave_space(
        &self,
        agent: AgentId,
        space_name: &str,
    ) -> Result<(), CatalogError> {
        let account = self
            .agents
            .get(&agent)
            .map(|entry| entry.value().account)
            .ok_or(CatalogError::UnknownAgent(agent))?;
        let space = self
            .space_by_name(space_name, account)
            .ok_or_else(|| CatalogError::UnknownSpace(space_name.to_string()))?;
        if let Some(mut spaces) = self.memberships.get_mut(&agent) {
            spaces.remove(&space.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn agent_by_token_finds_the_right_agent() {
        let catalog = MemoryCatalog::new();
        let account = catalog.insert_account("acme");
        let agent = catalog.insert_agent("bot", "secret-token", account.id);

        let found = catalog.agent_by_token("secret-token").await.unwrap();
        assert_eq!(found.id, agent.id);
        assert!(catalog.agent_by_token("wrong-token").await.is_none());
    }

    #[tokio::test]
    async fn join_then_spaces_of_reflects_the_membership() {
        let catalog = MemoryCatalog::new();
        let account = catalog.insert_account("acme");
        let agent = catalog.insert_agent("bot", "t", account.id);
        catalog.insert_space("control", account.id);

        catalog.agent_join_space(agent.id, "control").await.unwrap();
        let spaces = catalog.spaces_of(agent.id).await;
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].name, "control");
    }

    #[tokio::test]
    async fn leave_removes_the_membership_and_is_idempotent() {
        let catalog = MemoryCatalog::new();
        let account = catalog.insert_account("acme");
        let agent = catalog.insert_agent("bot", "t", account.id);
        catalog.insert_space("control", account.id);
        catalog.agent_join_space(agent.id, "control").await.unwrap();

        catalog.agent_leave_space(agent.id, "control").await.unwrap();
        assert!(catalog.spaces_of(agent.id).await.is_empty());
        // leaving again must not raise
        catalog.agent_leave_space(agent.id, "control").await.unwrap();
    }

    #[tokio::test]
    async fn spaces_where_silently_omits_unknown_names() {
        let catalog = MemoryCatalog::new();
        let account = catalog.insert_account("acme");
        catalog.insert_space("control", account.id);

        let names = vec!["control".to_string(), "does-not-exist".to_string()];
        let spaces = catalog.spaces_where(&names, account.id).await;
        assert_eq!(spaces.len(), 1);
    }

    #[tokio::test]
    async fn spaces_where_is_scoped_to_the_account() {
        let catalog = MemoryCatalog::new();
        let acme = catalog.insert_account("acme");
        let other = catalog.insert_account("other");
        catalog.insert_space("control", acme.id);

        let names = vec!["control".to_string()];
        assert_eq!(catalog.spaces_where(&names, acme.id).await.len(), 1);
        assert!(catalog.spaces_where(&names, other.id).await.is_empty());
    }
}
