//! Core data models for document generation

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Document Types =================
//

/// Closed set of documents the generator can produce.
///
/// Classification outcomes are `Option<DocumentType>`: `None` is the
/// "unknown" result and is never an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Act,
    #[serde(rename = "org_card")]
    OrganizationCard,
}

impl DocumentType {
    /// Every document type, in keyword priority order.
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Act,
        DocumentType::Invoice,
        DocumentType::OrganizationCard,
    ];

    /// Human-facing label, also used in the classifier prompt.
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Invoice => "Счёт",
            DocumentType::Act => "Акт",
            DocumentType::OrganizationCard => "Карточка организации",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Act => "act",
            DocumentType::OrganizationCard => "org_card",
        }
    }

    /// File name of the JSON payload read by the template.
    pub fn payload_file(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice_temp.json",
            DocumentType::Act => "act_temp.json",
            DocumentType::OrganizationCard => "org_card.json",
        }
    }

    pub fn template_file(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice.typ",
            DocumentType::Act => "act.typ",
            DocumentType::OrganizationCard => "org_card.typ",
        }
    }

    pub fn output_file(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice.pdf",
            DocumentType::Act => "act.pdf",
            DocumentType::OrganizationCard => "org_card.pdf",
        }
    }

    /// Whether payload, templates and output live under `<org_type>/<slug>/`.
    pub fn is_organization_scoped(self) -> bool {
        !matches!(self, DocumentType::Invoice)
    }

    /// Match a label or slug, case-insensitively.
    pub fn from_name(name: &str) -> Option<DocumentType> {
        let name = name.trim().to_lowercase();
        DocumentType::ALL.into_iter().find(|doc_type| {
            name == doc_type.slug() || name == doc_type.label().to_lowercase()
        })
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

//
// ================= Parties =================
//

/// Banking details of a party
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bank {
    pub name: String,
    pub bic: String,
    #[serde(default)]
    pub inn: Option<String>,
    pub address: String,
    pub correspondent_account: String,
}

/// The issuing business entity.
///
/// `org_type` and `slug` together identify the organization and the
/// template namespace (`<typst_root>/<org_type>/<slug>/`) it renders from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub org_type: String,
    pub slug: String,
    pub name: String,
    pub full_name: String,
    pub address: String,
    pub inn: String,
    pub kpp: Option<String>,
    pub ogrn: Option<String>,
    pub okpo: Option<String>,
    pub okato: Option<String>,
    pub okogu: Option<String>,
    pub okved: Option<String>,
    /// Head of the organization or the entrepreneur
    pub signatory: String,
    pub accountant: Option<String>,

    pub account: String,
    pub work_phone: String,
    pub mobile_phone: Option<String>,
    pub email: String,

    pub bank: Bank,
}

/// The counterparty a document is issued to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub slug: String,
    pub inn: String,
    #[serde(default)]
    pub ogrn: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signatory: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub kpp: String,
    #[serde(default)]
    pub bank: Option<Bank>,
}

impl Customer {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, inn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            inn: inn.into(),
            ogrn: String::new(),
            address: String::new(),
            signatory: String::new(),
            phone: String::new(),
            kpp: String::new(),
            bank: None,
        }
    }

    pub fn with_ogrn(self, ogrn: impl Into<String>) -> Self {
        Self { ogrn: ogrn.into(), ..self }
    }

    pub fn with_address(self, address: impl Into<String>) -> Self {
        Self { address: address.into(), ..self }
    }

    pub fn with_signatory(self, signatory: impl Into<String>) -> Self {
        Self { signatory: signatory.into(), ..self }
    }

    pub fn with_phone(self, phone: impl Into<String>) -> Self {
        Self { phone: phone.into(), ..self }
    }

    pub fn with_kpp(self, kpp: impl Into<String>) -> Self {
        Self { kpp: kpp.into(), ..self }
    }

    pub fn with_bank(self, bank: Bank) -> Self {
        Self { bank: Some(bank), ..self }
    }
}

//
// ================= Work Items =================
//

fn default_quantity() -> u32 {
    1
}

/// One billable line: service name, unit price, quantity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub task: String,
    /// Unit price in whole currency units
    pub price: u64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl WorkItem {
    pub fn new(task: impl Into<String>, price: u64, quantity: u32) -> Self {
        Self {
            task: task.into(),
            price,
            quantity,
        }
    }

    /// Line total, `None` on overflow. Derived only, the payload never carries it.
    pub fn total(&self) -> Option<u64> {
        self.price.checked_mul(u64::from(self.quantity))
    }
}

//
// ================= Orders =================
//

/// Customer plus work items for an invoice or an act
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub customer: Customer,
    pub jobs: Vec<WorkItem>,
}
