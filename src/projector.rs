//! Template-data projection
//!
//! Turns domain records into the JSON each typst template reads and writes it
//! to a fixed location under the typst root. Same document type, same path:
//! later calls overwrite earlier ones.

use crate::error::DocsError;
use crate::models::{Customer, DocumentType, Organization, WorkItem};
use crate::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const PAYLOAD_DIR: &str = "templates_json";

/// Data for one document, one variant per document type
#[derive(Debug, Clone, Copy)]
pub enum DocumentRequest<'a> {
    Invoice {
        customer: &'a Customer,
        jobs: &'a [WorkItem],
    },
    Act {
        customer: &'a Customer,
        jobs: &'a [WorkItem],
        organization: &'a Organization,
    },
    OrganizationCard {
        organization: &'a Organization,
    },
}

impl<'a> DocumentRequest<'a> {
    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentRequest::Invoice { .. } => DocumentType::Invoice,
            DocumentRequest::Act { .. } => DocumentType::Act,
            DocumentRequest::OrganizationCard { .. } => DocumentType::OrganizationCard,
        }
    }

    pub fn organization(&self) -> Option<&'a Organization> {
        match *self {
            DocumentRequest::Invoice { .. } => None,
            DocumentRequest::Act { organization, .. }
            | DocumentRequest::OrganizationCard { organization } => Some(organization),
        }
    }
}

/// `{"customer": {...}, "jobs": [...]}` for invoices and acts
#[derive(Serialize)]
struct JobsPayload<'a> {
    customer: &'a Customer,
    jobs: &'a [WorkItem],
}

/// A payload written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub document_type: DocumentType,
    pub payload: String,
    pub path: PathBuf,
    /// SHA-256 of the payload, hex encoded
    pub digest: String,
}

pub struct TemplateDataProjector {
    templates_root: PathBuf,
}

impl TemplateDataProjector {
    pub fn new(templates_root: impl Into<PathBuf>) -> Self {
        Self {
            templates_root: templates_root.into(),
        }
    }

    /// Serialize the request, write it and report where it went.
    pub fn project(&self, request: &DocumentRequest<'_>) -> Result<Projection> {
        let document_type = request.document_type();
        let payload = serialize_payload(request)?;
        let path = self.destination(document_type, request.organization())?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| DocsError::persistence(dir, e))?;
        }
        fs::write(&path, payload.as_bytes()).map_err(|e| DocsError::persistence(&path, e))?;

        let digest = hex::encode(Sha256::digest(payload.as_bytes()));

        info!(
            document = document_type.slug(),
            path = %path.display(),
            digest = %digest,
            "Template payload written"
        );

        Ok(Projection {
            document_type,
            payload,
            path,
            digest,
        })
    }

    /// Where the payload for a document type lands.
    pub fn destination(
        &self,
        document_type: DocumentType,
        organization: Option<&Organization>,
    ) -> Result<PathBuf> {
        let base = if document_type.is_organization_scoped() {
            let org = organization.ok_or_else(|| {
                DocsError::InvalidRequest(format!(
                    "{} requires an organization",
                    document_type.label()
                ))
            })?;
            organization_dir(&self.templates_root, org)?
        } else {
            self.templates_root.clone()
        };

        Ok(base.join(PAYLOAD_DIR).join(document_type.payload_file()))
    }
}

fn serialize_payload(request: &DocumentRequest<'_>) -> Result<String> {
    let payload = match *request {
        DocumentRequest::Invoice { customer, jobs }
        | DocumentRequest::Act { customer, jobs, .. } => {
            serde_json::to_string_pretty(&JobsPayload { customer, jobs })?
        }
        DocumentRequest::OrganizationCard { organization } => {
            serde_json::to_string_pretty(organization)?
        }
    };
    Ok(payload)
}

/// `<root>/<org_type>/<slug>`, refusing segments that would leave `root`.
pub fn organization_dir(root: &Path, organization: &Organization) -> Result<PathBuf> {
    let org_type = safe_segment(&organization.org_type)
        .map_err(|e| DocsError::persistence(root, e))?;
    let slug = safe_segment(&organization.slug).map_err(|e| DocsError::persistence(root, e))?;
    Ok(root.join(org_type).join(slug))
}

fn safe_segment(segment: &str) -> std::io::Result<&str> {
    let unsafe_segment = segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(['/', '\\', '\0'])
        || segment.contains("..");

    if unsafe_segment {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path segment '{}' escapes the template root", segment),
        ))
    } else {
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bank;
    use serde_json::Value;
    use tempfile::TempDir;

    fn organization(org_type: &str, slug: &str) -> Organization {
        Organization {
            org_type: org_type.to_string(),
            slug: slug.to_string(),
            name: "ИП Ангархаева".to_string(),
            full_name: "Индивидуальный предприниматель Ангархаева".to_string(),
            address: "Улан-Удэ".to_string(),
            inn: "032300000000".to_string(),
            kpp: None,
            ogrn: Some("300000000000000".to_string()),
            okpo: None,
            okato: None,
            okogu: None,
            okved: None,
            signatory: "Ангархаева А.А.".to_string(),
            accountant: None,
            account: "40802810000000000000".to_string(),
            work_phone: "8-900-000-00-00".to_string(),
            mobile_phone: None,
            email: "ip@example.ru".to_string(),
            bank: Bank {
                name: "Бурятское отделение".to_string(),
                bic: "048142604".to_string(),
                inn: None,
                address: "Улан-Удэ".to_string(),
                correspondent_account: "30101810400000000604".to_string(),
            },
        }
    }

    fn customer() -> Customer {
        Customer::new("МАУ \"СС\"", "mau_ss", "0323347497")
            .with_ogrn("1030300123456")
            .with_kpp("032301001")
    }

    #[test]
    fn test_invoice_payload_shape() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());
        let jobs = vec![WorkItem::new("A", 600, 10)];
        let customer = customer();

        let projection = projector
            .project(&DocumentRequest::Invoice {
                customer: &customer,
                jobs: &jobs,
            })
            .unwrap();

        assert_eq!(
            projection.path,
            dir.path().join("templates_json").join("invoice_temp.json")
        );

        let json: Value = serde_json::from_str(&projection.payload).unwrap();
        let jobs_json = json["jobs"].as_array().unwrap();
        assert_eq!(jobs_json.len(), 1);
        assert!(jobs_json[0].get("total").is_none());

        let total = jobs_json[0]["price"].as_u64().unwrap() * jobs_json[0]["quantity"].as_u64().unwrap();
        assert_eq!(total, 6000);
        assert_eq!(json["customer"]["inn"], "0323347497");
        assert_eq!(json["customer"]["bank"], Value::Null);
    }

    #[test]
    fn test_jobs_keep_input_order() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());
        let jobs = vec![
            WorkItem::new("Второе", 100, 1),
            WorkItem::new("Первое", 50, 2),
            WorkItem::new("Второе", 100, 1),
        ];
        let customer = customer();
        let org = organization("ip", "ip_angarhaeva");

        let projection = projector
            .project(&DocumentRequest::Act {
                customer: &customer,
                jobs: &jobs,
                organization: &org,
            })
            .unwrap();

        let json: Value = serde_json::from_str(&projection.payload).unwrap();
        let parsed: Vec<WorkItem> = serde_json::from_value(json["jobs"].clone()).unwrap();
        assert_eq!(parsed, jobs);
        assert_eq!(
            projection.path,
            dir.path()
                .join("ip")
                .join("ip_angarhaeva")
                .join("templates_json")
                .join("act_temp.json")
        );
    }

    #[test]
    fn test_projection_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());
        let org = organization("ip", "ip_angarhaeva");
        let request = DocumentRequest::OrganizationCard { organization: &org };

        let first = projector.project(&request).unwrap();
        let first_bytes = fs::read(&first.path).unwrap();
        let second = projector.project(&request).unwrap();
        let second_bytes = fs::read(&second.path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_org_card_payload_is_readable_utf8() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());
        let org = organization("ip", "ip_angarhaeva");

        let projection = projector
            .project(&DocumentRequest::OrganizationCard { organization: &org })
            .unwrap();

        let written = fs::read_to_string(&projection.path).unwrap();
        assert!(written.contains("ИП Ангархаева"));
        assert!(!written.contains("\\u04"));
        assert!(written.contains("\n  \"org_type\": \"ip\""));

        let parsed: Organization = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, org);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());
        let customer = customer();
        let first_jobs = vec![WorkItem::new("A", 1, 1)];
        let second_jobs = vec![WorkItem::new("B", 2, 2)];

        projector
            .project(&DocumentRequest::Invoice { customer: &customer, jobs: &first_jobs })
            .unwrap();
        let second = projector
            .project(&DocumentRequest::Invoice { customer: &customer, jobs: &second_jobs })
            .unwrap();

        assert_eq!(fs::read_to_string(&second.path).unwrap(), second.payload);
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let projector = TemplateDataProjector::new(dir.path());

        for (org_type, slug) in [("ip", "../escape"), ("..", "x"), ("ip", ""), ("ip", "a/b")] {
            let org = organization(org_type, slug);
            let result = projector.project(&DocumentRequest::OrganizationCard { organization: &org });
            assert!(
                matches!(result, Err(DocsError::PersistenceError { .. })),
                "{}/{}",
                org_type,
                slug
            );
        }
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();

        let projector = TemplateDataProjector::new(&blocker);
        let customer = customer();
        let jobs = vec![WorkItem::new("A", 1, 1)];

        let result = projector.project(&DocumentRequest::Invoice {
            customer: &customer,
            jobs: &jobs,
        });
        assert!(matches!(result, Err(DocsError::PersistenceError { .. })));
    }
}
