//! Company outreach wizard: find companies, pick some, generate drafts,
//! review and edit them, then hand them to the send queue.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::{Company, GeneratedEmail};
use crate::services::emails;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    FindCompanies,
    Select,
    Generate,
    Review,
    Send,
}

#[async_trait]
pub trait GenerationApi: Send + Sync {
    async fn find_companies(
        &self,
        resume_id: &str,
        query: Option<&str>,
    ) -> Result<Vec<Company>, ClientError>;

    async fn generate_emails(
        &self,
        resume_id: &str,
        companies: &[Company],
    ) -> Result<Vec<GeneratedEmail>, ClientError>;
}

#[async_trait]
impl GenerationApi for ApiClient {
    async fn find_companies(
        &self,
        resume_id: &str,
        query: Option<&str>,
    ) -> Result<Vec<Company>, ClientError> {
        emails::find_companies(self, resume_id, query).await
    }

    async fn generate_emails(
        &self,
        resume_id: &str,
        companies: &[Company],
    ) -> Result<Vec<GeneratedEmail>, ClientError> {
        emails::generate_emails(self, resume_id, companies).await
    }
}

pub struct EmailWizard {
    api: Arc<dyn GenerationApi>,
    resume_id: String,
    step: WizardStep,
    companies: Vec<Company>,
    selected: BTreeSet<usize>,
    emails: Vec<GeneratedEmail>,
}

impl EmailWizard {
    pub fn new(api: Arc<dyn GenerationApi>, resume_id: impl Into<String>) -> Self {
        Self {
            api,
            resume_id: resume_id.into(),
            step: WizardStep::FindCompanies,
            companies: Vec::new(),
            selected: BTreeSet::new(),
            emails: Vec::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn emails(&self) -> &[GeneratedEmail] {
        &self.emails
    }

    pub fn selected(&self) -> Vec<&Company> {
        self.selected
            .iter()
            .filter_map(|&i| self.companies.get(i))
            .collect()
    }

    /// Runs a company search. An empty result keeps the wizard on the search step.
    pub async fn find_companies(&mut self, query: Option<&str>) -> Result<usize, ClientError> {
        let companies = self.api.find_companies(&self.resume_id, query).await?;
        self.selected.clear();
        self.emails.clear();
        self.companies = companies;
        self.step = if self.companies.is_empty() {
            WizardStep::FindCompanies
        } else {
            WizardStep::Select
        };
        debug!("Wizard at {:?} with {} companies", self.step, self.companies.len());
        Ok(self.companies.len())
    }

    /// Flips selection of the company at `index`; returns whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ClientError> {
        self.expect_step(WizardStep::Select)?;
        if index >= self.companies.len() {
            return Err(ClientError::Validation(format!("No company at position {}", index + 1)));
        }
        if self.selected.remove(&index) {
            Ok(false)
        } else {
            self.selected.insert(index);
            Ok(true)
        }
    }

    pub fn select_all(&mut self) -> Result<(), ClientError> {
        self.expect_step(WizardStep::Select)?;
        self.selected = (0..self.companies.len()).collect();
        Ok(())
    }

    /// Generates one draft per selected company and moves to review.
    /// On failure the wizard returns to selection with its picks intact.
    pub async fn generate(&mut self) -> Result<&[GeneratedEmail], ClientError> {
        self.expect_step(WizardStep::Select)?;
        let chosen: Vec<Company> = self.selected().into_iter().cloned().collect();
        if chosen.is_empty() {
            return Err(ClientError::Validation(
                "Please select at least one company".to_string(),
            ));
        }

        self.step = WizardStep::Generate;
        match self.api.generate_emails(&self.resume_id, &chosen).await {
            Ok(emails) => {
                info!("Generated {} drafts for review", emails.len());
                self.emails = emails;
                self.step = WizardStep::Review;
                Ok(&self.emails)
            }
            Err(e) => {
                self.step = WizardStep::Select;
                Err(e)
            }
        }
    }

    pub fn edit(&mut self, index: usize, subject: &str, content: &str) -> Result<(), ClientError> {
        self.expect_step(WizardStep::Review)?;
        if subject.trim().is_empty() || content.trim().is_empty() {
            return Err(ClientError::Validation(
                "Subject and content cannot be empty".to_string(),
            ));
        }
        let email = self
            .emails
            .get_mut(index)
            .ok_or_else(|| ClientError::Validation(format!("No email at position {}", index + 1)))?;
        email.subject = subject.to_string();
        email.content = content.to_string();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<GeneratedEmail, ClientError> {
        self.expect_step(WizardStep::Review)?;
        if index >= self.emails.len() {
            return Err(ClientError::Validation(format!("No email at position {}", index + 1)));
        }
        Ok(self.emails.remove(index))
    }

    /// Finishes review; the drafts go to the send queue.
    pub fn proceed_to_send(&mut self) -> Result<Vec<GeneratedEmail>, ClientError> {
        self.expect_step(WizardStep::Review)?;
        if self.emails.is_empty() {
            return Err(ClientError::Validation("There are no emails to send".to_string()));
        }
        self.step = WizardStep::Send;
        Ok(self.emails.clone())
    }

    pub fn back(&mut self) {
        self.step = match self.step {
            WizardStep::FindCompanies | WizardStep::Select => WizardStep::FindCompanies,
            WizardStep::Generate | WizardStep::Review => WizardStep::Select,
            WizardStep::Send => WizardStep::Review,
        };
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), ClientError> {
        if self.step != expected {
            return Err(ClientError::Validation(format!(
                "Not available at this step ({:?})",
                self.step
            )));
        }
        Ok(())
    }
}
