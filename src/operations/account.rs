// Account Linking
// Pluggable policy deciding which destination account a migrated lead points at

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::connector::{ConnectorError, CrmConnector};
use crate::constants::{ACCOUNT_ID_FIELD, NAME_FIELD};
use crate::core::{ObjectKind, Record};

/// How a written lead is linked to an account in the destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AccountPolicy {
    /// Leads are written without an account link
    #[default]
    None,
    /// Every lead points at one pre-existing destination account
    AssignDummyAccount { account_id: String },
    /// The source lead's account is matched by name in the destination, or created there
    CreateAccount,
}

impl AccountPolicy {
    /// Build a policy from its mode name, as used by compiled defaults
    pub fn from_mode(mode: &str, account_id: Option<&str>) -> Result<Self, String> {
        match mode {
            "none" => Ok(AccountPolicy::None),
            "create-account" => Ok(AccountPolicy::CreateAccount),
            "assign-dummy-account" => match account_id {
                Some(id) if !id.trim().is_empty() => Ok(AccountPolicy::AssignDummyAccount {
                    account_id: id.to_string(),
                }),
                _ => Err("assign-dummy-account requires an account_id".to_string()),
            },
            other => Err(format!("unknown account policy mode: {other}")),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            AccountPolicy::None => "none",
            AccountPolicy::AssignDummyAccount { .. } => "assign-dummy-account",
            AccountPolicy::CreateAccount => "create-account",
        }
    }

    /// Set or clear `AccountId` on an outgoing lead.
    ///
    /// `source_lead` is the lead as fetched from the source, so its
    /// `AccountId` still refers to the source organization.
    pub async fn link(
        &self,
        outgoing: &mut Record,
        source_lead: &Record,
        source: &dyn CrmConnector,
        destination: &dyn CrmConnector,
        system_fields: &[String],
    ) -> Result<(), ConnectorError> {
        match self {
            AccountPolicy::None => {
                outgoing.remove(ACCOUNT_ID_FIELD);
            }
            AccountPolicy::AssignDummyAccount { account_id } => {
                outgoing.insert(ACCOUNT_ID_FIELD, account_id.as_str());
            }
            AccountPolicy::CreateAccount => {
                match resolve_account(source_lead, source, destination, system_fields).await? {
                    Some(account_id) => {
                        outgoing.insert(ACCOUNT_ID_FIELD, account_id);
                    }
                    None => {
                        outgoing.remove(ACCOUNT_ID_FIELD);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Destination account id for the source lead's account, creating it if needed
async fn resolve_account(
    source_lead: &Record,
    source: &dyn CrmConnector,
    destination: &dyn CrmConnector,
    system_fields: &[String],
) -> Result<Option<String>, ConnectorError> {
    let Some(source_account_id) = source_lead.get(ACCOUNT_ID_FIELD) else {
        return Ok(None);
    };

    let Some(account) = source.get(ObjectKind::Account, source_account_id).await? else {
        debug!(org = source.org(), account = source_account_id, "source account no longer exists");
        return Ok(None);
    };

    if let Some(name) = account.get(NAME_FIELD) {
        if let Some(existing) = destination
            .find_by_field(ObjectKind::Account, NAME_FIELD, name)
            .await?
        {
            if let Some(id) = existing.id() {
                return Ok(Some(id.to_string()));
            }
        }
    }

    let saved = destination
        .create_or_update(ObjectKind::Account, account.without_fields(system_fields))
        .await?;
    info!(org = destination.org(), account = %saved.id, "created account");

    Ok(Some(saved.id))
}
