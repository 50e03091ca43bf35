//! Billing and invoicing configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::SupplierInfo;

/// Billing configuration (supplier identity and invoice defaults)
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Supplier legal name printed on invoices
    pub supplier_name: String,

    /// Supplier postal address
    pub supplier_address: String,

    /// Company registration number
    pub supplier_registration_number: String,

    /// VAT number, absent for non-VAT-registered suppliers
    pub supplier_vat_number: Option<String>,

    /// Bank account printed on invoices
    pub supplier_bank_account: Option<String>,

    /// Billing contact email
    pub supplier_email: String,

    /// VAT rate applied to line items, in percent
    #[serde(default = "default_tax_rate")]
    pub tax_rate_percent: u8,

    /// Days until an issued invoice is due
    #[serde(default = "default_due_days")]
    pub due_days: u16,
}

impl BillingConfig {
    /// Build the supplier block stamped onto every invoice
    pub fn supplier(&self) -> SupplierInfo {
        SupplierInfo {
            name: self.supplier_name.clone(),
            address: self.supplier_address.clone(),
            registration_number: self.supplier_registration_number.clone(),
            vat_number: self.supplier_vat_number.clone(),
            bank_account: self.supplier_bank_account.clone(),
            email: self.supplier_email.clone(),
        }
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.supplier_name.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__SUPPLIER_NAME"));
        }
        if self.supplier_registration_number.is_empty() {
            return Err(ValidationError::MissingRequired(
                "BILLING__SUPPLIER_REGISTRATION_NUMBER",
            ));
        }
        if self.supplier_email.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__SUPPLIER_EMAIL"));
        }
        if self.tax_rate_percent >= 100 {
            return Err(ValidationError::InvalidTaxRate);
        }
        if self.due_days == 0 || self.due_days > 90 {
            return Err(ValidationError::InvalidDueDays);
        }
        Ok(())
    }
}

fn default_tax_rate() -> u8 {
    21
}

fn default_due_days() -> u16 {
    14
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BillingConfig {
        BillingConfig {
            supplier_name: "VowDay s.r.o.".to_string(),
            supplier_address: "Svatební 12, 110 00 Praha".to_string(),
            supplier_registration_number: "12345678".to_string(),
            supplier_vat_number: Some("CZ12345678".to_string()),
            supplier_bank_account: Some("123456789/0100".to_string()),
            supplier_email: "fakturace@vowday.cz".to_string(),
            tax_rate_percent: default_tax_rate(),
            due_days: default_due_days(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_supplier_block() {
        let supplier = valid_config().supplier();
        assert_eq!(supplier.name, "VowDay s.r.o.");
        assert_eq!(supplier.vat_number.as_deref(), Some("CZ12345678"));
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut config = valid_config();
        config.supplier_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_tax_rate_rejected() {
        let mut config = valid_config();
        config.tax_rate_percent = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_due_days_rejected() {
        let mut config = valid_config();
        config.due_days = 0;
        assert!(config.validate().is_err());
    }
}
