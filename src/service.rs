//! Document service - the operations a driver calls
//!
//! TEXT → RESOLVE → (LOAD ORGANIZATION) → PROJECT → RENDER → PDF

use crate::classifier::{DocumentTypeResolver, KeywordResolver, LlmResolver};
use crate::config::{AppConfig, ResolverStrategy};
use crate::error::DocsError;
use crate::llm::AnthropicClient;
use crate::models::{Customer, DocumentType, Order, Organization, WorkItem};
use crate::projector::{DocumentRequest, TemplateDataProjector};
use crate::renderer::{ProcessRunner, RenderInvoker, SystemRunner};
use crate::repository::OrganizationRepository;
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// A rendered document
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub request_id: Uuid,
    pub document_type: DocumentType,
    pub pdf_path: PathBuf,
    pub payload_path: PathBuf,
    pub organization_name: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl fmt::Display for GeneratedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pdf = self.pdf_path.display();
        match (self.document_type, &self.organization_name) {
            (DocumentType::Invoice, _) => write!(f, "PDF счёт успешно создан: {}", pdf),
            (DocumentType::Act, _) => write!(f, "PDF акт успешно создан: {}", pdf),
            (DocumentType::OrganizationCard, Some(name)) => {
                write!(f, "PDF карточка организации {} создана: {}", name, pdf)
            }
            (DocumentType::OrganizationCard, None) => {
                write!(f, "PDF карточка организации создана: {}", pdf)
            }
        }
    }
}

pub struct DocumentService<R = SystemRunner> {
    resolver: Box<dyn DocumentTypeResolver>,
    repository: OrganizationRepository,
    projector: TemplateDataProjector,
    invoker: RenderInvoker<R>,
}

impl DocumentService<SystemRunner> {
    /// Wire every component from the process configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let resolver: Box<dyn DocumentTypeResolver> = match config.resolver {
            ResolverStrategy::Keyword => Box::new(KeywordResolver),
            ResolverStrategy::Llm => {
                let llm = config.llm.as_ref().ok_or_else(|| {
                    DocsError::ConfigError("Missing or invalid env vars: ANTHROPIC_API_KEY".to_string())
                })?;
                Box::new(LlmResolver::new(AnthropicClient::new(llm)?))
            }
        };

        info!(resolver = %config.resolver, "Document service configured");

        Ok(Self::new(
            resolver,
            OrganizationRepository::from_file(&config.org_profiles),
            TemplateDataProjector::new(&config.typst_root),
            RenderInvoker::new(config),
        ))
    }
}

impl<R: ProcessRunner> DocumentService<R> {
    pub fn new(
        resolver: Box<dyn DocumentTypeResolver>,
        repository: OrganizationRepository,
        projector: TemplateDataProjector,
        invoker: RenderInvoker<R>,
    ) -> Self {
        Self {
            resolver,
            repository,
            projector,
            invoker,
        }
    }

    pub async fn resolve_document_type(&self, text: &str) -> Option<DocumentType> {
        self.resolver.resolve(text).await
    }

    pub fn load_organization(&self, org_type: &str, slug: &str) -> Result<Organization> {
        self.repository.load(org_type, slug)
    }

    pub async fn generate_invoice(
        &self,
        customer: &Customer,
        jobs: &[WorkItem],
    ) -> Result<GeneratedDocument> {
        ensure_jobs(DocumentType::Invoice, jobs)?;
        self.produce(DocumentRequest::Invoice { customer, jobs }).await
    }

    pub async fn generate_act(
        &self,
        customer: &Customer,
        jobs: &[WorkItem],
        org_type: &str,
        slug: &str,
    ) -> Result<GeneratedDocument> {
        ensure_jobs(DocumentType::Act, jobs)?;
        let organization = self.load_organization(org_type, slug)?;
        self.produce(DocumentRequest::Act {
            customer,
            jobs,
            organization: &organization,
        })
        .await
    }

    pub async fn generate_organization_card(
        &self,
        org_type: &str,
        slug: &str,
    ) -> Result<GeneratedDocument> {
        let organization = self.load_organization(org_type, slug)?;
        self.produce(DocumentRequest::OrganizationCard {
            organization: &organization,
        })
        .await
    }

    /// Dispatch on the resolved type. Invoices and acts need an order.
    pub async fn generate(
        &self,
        document_type: DocumentType,
        order: Option<&Order>,
        org_type: &str,
        slug: &str,
    ) -> Result<GeneratedDocument> {
        match document_type {
            DocumentType::Invoice => {
                let order = require_order(document_type, order)?;
                self.generate_invoice(&order.customer, &order.jobs).await
            }
            DocumentType::Act => {
                let order = require_order(document_type, order)?;
                self.generate_act(&order.customer, &order.jobs, org_type, slug)
                    .await
            }
            DocumentType::OrganizationCard => {
                self.generate_organization_card(org_type, slug).await
            }
        }
    }

    async fn produce(&self, request: DocumentRequest<'_>) -> Result<GeneratedDocument> {
        let request_id = Uuid::new_v4();
        let document_type = request.document_type();
        let span = info_span!("generate", %request_id, document = document_type.slug());

        async move {
            let projection = self.projector.project(&request)?;
            let organization = request.organization();

            let pdf_path = self
                .invoker
                .render(document_type, &projection.path, organization)
                .await?;

            Ok::<_, DocsError>(GeneratedDocument {
                request_id,
                document_type,
                pdf_path,
                payload_path: projection.path,
                organization_name: organization.map(|org| org.name.clone()),
                generated_at: Utc::now(),
            })
        }
        .instrument(span)
        .await
    }
}

fn ensure_jobs(document_type: DocumentType, jobs: &[WorkItem]) -> Result<()> {
    if jobs.is_empty() {
        return Err(DocsError::InvalidRequest(format!(
            "{}: no work items supplied",
            document_type.label()
        )));
    }
    Ok(())
}

fn require_order(document_type: DocumentType, order: Option<&Order>) -> Result<&Order> {
    order.ok_or_else(|| {
        DocsError::InvalidRequest(format!(
            "{}: customer and work items are required",
            document_type.label()
        ))
    })
}
