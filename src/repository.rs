//! Organization profile repository
//!
//! Profiles live in a JSON document keyed first by organization type, then by slug:
//! `{"ip": {"ip_angarhaeva": {..., "bank": {...}}}}`.
//! The store is read on every lookup, so edits are picked up without a restart.

use crate::error::DocsError;
use crate::models::{Bank, Organization};
use crate::Result;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

enum ProfileSource {
    File(PathBuf),
    Inline(Value),
}

pub struct OrganizationRepository {
    source: ProfileSource,
}

/// One profile as stored. `org_type` and `slug` come from the lookup keys.
#[derive(Debug, Deserialize)]
struct ProfileRecord {
    name: String,
    full_name: String,
    address: String,
    inn: String,
    #[serde(default)]
    kpp: Option<String>,
    #[serde(default)]
    ogrn: Option<String>,
    #[serde(default)]
    okpo: Option<String>,
    #[serde(default)]
    okato: Option<String>,
    #[serde(default)]
    okogu: Option<String>,
    #[serde(default)]
    okved: Option<String>,
    signatory: String,
    #[serde(default)]
    accountant: Option<String>,
    account: String,
    work_phone: String,
    #[serde(default)]
    mobile_phone: Option<String>,
    email: String,
    bank: BankRecord,
}

/// Bank block as stored. `inn` may be null but the key must be present.
#[derive(Debug, Deserialize)]
struct BankRecord {
    name: String,
    bic: String,
    #[serde(deserialize_with = "nullable")]
    inn: Option<String>,
    address: String,
    correspondent_account: String,
}

impl From<BankRecord> for Bank {
    fn from(record: BankRecord) -> Self {
        Bank {
            name: record.name,
            bic: record.bic,
            inn: record.inn,
            address: record.address,
            correspondent_account: record.correspondent_account,
        }
    }
}

fn nullable<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

impl ProfileRecord {
    fn into_organization(self, org_type: &str, slug: &str) -> Organization {
        Organization {
            org_type: org_type.to_string(),
            slug: slug.to_string(),
            name: self.name,
            full_name: self.full_name,
            address: self.address,
            inn: self.inn,
            kpp: self.kpp,
            ogrn: self.ogrn,
            okpo: self.okpo,
            okato: self.okato,
            okogu: self.okogu,
            okved: self.okved,
            signatory: self.signatory,
            accountant: self.accountant,
            account: self.account,
            work_phone: self.work_phone,
            mobile_phone: self.mobile_phone,
            email: self.email,
            bank: self.bank.into(),
        }
    }
}

impl OrganizationRepository {
    /// Repository backed by a JSON file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ProfileSource::File(path.into()),
        }
    }

    /// Repository backed by an already parsed document
    pub fn from_value(document: Value) -> Self {
        Self {
            source: ProfileSource::Inline(document),
        }
    }

    pub fn load(&self, org_type: &str, slug: &str) -> Result<Organization> {
        let document = self.read_document()?;

        let raw = document
            .get(org_type)
            .and_then(|by_slug| by_slug.get(slug))
            .ok_or_else(|| DocsError::NotFound {
                org_type: org_type.to_string(),
                slug: slug.to_string(),
            })?;

        let record = ProfileRecord::deserialize(raw).map_err(|e| {
            DocsError::MalformedRecord(format!("{}/{}: {}", org_type, slug, e))
        })?;

        debug!(org_type, slug, "Organization profile loaded");

        Ok(record.into_organization(org_type, slug))
    }

    fn read_document(&self) -> Result<std::borrow::Cow<'_, Value>> {
        match &self.source {
            ProfileSource::Inline(document) => Ok(std::borrow::Cow::Borrowed(document)),
            ProfileSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    DocsError::MalformedRecord(format!(
                        "cannot read profile store {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                let document: Value = serde_json::from_str(&text).map_err(|e| {
                    DocsError::MalformedRecord(format!(
                        "profile store {} is not valid JSON: {}",
                        path.display(),
                        e
                    ))
                })?;

                Ok(std::borrow::Cow::Owned(document))
            }
        }
    }
}
