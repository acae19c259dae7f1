//! Role queries
//!
//! Answered from the role graphs, which reflect the grouping rules as of the
//! last rebuild.

use super::management::DEFAULT_GROUPING_TYPE;
use super::Enforcer;
use crate::error::Result;

impl Enforcer {
    /// Whether `child` reaches `parent` through grouping ptype `ptype`
    ///
    /// True when `child == parent`.
    pub fn has_link(
        &self,
        ptype: &str,
        child: &str,
        parent: &str,
        domain: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .state
            .read()
            .role_manager(ptype)?
            .has_link(child, parent, domain))
    }

    /// Roles `user` holds directly or transitively under `g`
    pub fn get_roles_for_user(&self, user: &str) -> Result<Vec<String>> {
        self.get_named_roles_for_user(DEFAULT_GROUPING_TYPE, user, None)
    }

    /// Roles `user` holds inside `domain` under `g`
    pub fn get_roles_for_user_in_domain(&self, user: &str, domain: &str) -> Result<Vec<String>> {
        self.get_named_roles_for_user(DEFAULT_GROUPING_TYPE, user, Some(domain))
    }

    /// Roles `user` holds under grouping ptype `ptype`, sorted
    pub fn get_named_roles_for_user(
        &self,
        ptype: &str,
        user: &str,
        domain: Option<&str>,
    ) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .role_manager(ptype)?
            .get_roles(user, domain)
            .into_iter()
            .collect())
    }

    /// Roles `user` holds directly under `g`, sorted
    pub fn get_direct_roles_for_user(&self, user: &str, domain: Option<&str>) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .role_manager(DEFAULT_GROUPING_TYPE)?
            .get_direct_roles(user, domain)
            .into_iter()
            .collect())
    }

    /// Identities holding `role` directly or transitively under `g`
    pub fn get_users_for_role(&self, role: &str) -> Result<Vec<String>> {
        self.get_named_users_for_role(DEFAULT_GROUPING_TYPE, role, None)
    }

    /// Identities holding `role` inside `domain` under `g`
    pub fn get_users_for_role_in_domain(&self, role: &str, domain: &str) -> Result<Vec<String>> {
        self.get_named_users_for_role(DEFAULT_GROUPING_TYPE, role, Some(domain))
    }

    /// Identities holding `role` under grouping ptype `ptype`, sorted
    pub fn get_named_users_for_role(
        &self,
        ptype: &str,
        role: &str,
        domain: Option<&str>,
    ) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .role_manager(ptype)?
            .get_users(role, domain)
            .into_iter()
            .collect())
    }

    /// Domains in which `user` takes part in a `g` link, sorted
    pub fn get_domains_for_user(&self, user: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .role_manager(DEFAULT_GROUPING_TYPE)?
            .get_domains(user)
            .into_iter()
            .collect())
    }
}
