use serde::{Deserialize, Serialize};

/// Fixed identity of the technical professional signing the report.
/// Copied verbatim into the evaluation sheet, independent of inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub display_name: String,
    pub company_name: String,
    pub company_tax_id: String,
    #[serde(default)]
    pub owner_tax_id: Option<String>,
    pub signer_name: String,
    pub signer_tax_id: String,
    pub registration_number: String,
}

/// Registry columns a template cell can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfessionalField {
    CompanyName,
    CompanyTaxId,
    OwnerTaxId,
    SignerName,
    SignerTaxId,
    RegistrationNumber,
}

impl ProfessionalProfile {
    pub fn field(&self, field: ProfessionalField) -> &str {
        match field {
            ProfessionalField::CompanyName => &self.company_name,
            ProfessionalField::CompanyTaxId => &self.company_tax_id,
            ProfessionalField::OwnerTaxId => self.owner_tax_id.as_deref().unwrap_or(""),
            ProfessionalField::SignerName => &self.signer_name,
            ProfessionalField::SignerTaxId => &self.signer_tax_id,
            ProfessionalField::RegistrationNumber => &self.registration_number,
        }
    }
}
