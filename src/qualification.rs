//! Document qualifications: the label a file is tagged with, plus the purpose
//! and source it implies.

use serde::{Deserialize, Serialize};

use crate::app_error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
}

struct KnownQualification {
    label: &'static str,
    purpose: Option<&'static str>,
    source_category: Option<&'static str>,
    source_sub_category: Option<&'static str>,
    subjects: &'static [&'static str],
}

const fn known(
    label: &'static str,
    purpose: Option<&'static str>,
    source_category: Option<&'static str>,
    source_sub_category: Option<&'static str>,
    subjects: &'static [&'static str],
) -> KnownQualification {
    KnownQualification {
        label,
        purpose,
        source_category,
        source_sub_category,
        subjects,
    }
}

const KNOWN_QUALIFICATIONS: &[KnownQualification] = &[
    known("identity_photo", Some("attestation"), None, None, &["identity"]),
    known("national_id_card", Some("attestation"), Some("gov"), None, &["identity"]),
    known("passport", Some("attestation"), Some("gov"), None, &["identity"]),
    known("residence_permit", Some("attestation"), Some("gov"), None, &["permit", "identity"]),
    known("driver_license", Some("attestation"), Some("gov"), None, &["permit", "driving"]),
    known("health_invoice", Some("invoice"), Some("health"), None, &[]),
    known("health_certificate", Some("attestation"), Some("health"), None, &[]),
    known("pay_sheet", Some("attestation"), Some("employer"), None, &["revenues"]),
    known("tax_notice", Some("attestation"), Some("gov"), Some("tax"), &["tax"]),
    known("phone_invoice", Some("invoice"), Some("telecom"), Some("mobile"), &["subscription"]),
    known("isp_invoice", Some("invoice"), Some("telecom"), Some("internet"), &["subscription"]),
    known("energy_invoice", Some("invoice"), Some("energy"), None, &["subscription"]),
    known("bank_details", Some("attestation"), Some("bank"), None, &["bank_account"]),
    known("other_identity_document", None, None, None, &["identity"]),
];

impl Qualification {
    /// Looks a qualification up by its label.
    pub fn by_label(label: &str) -> Result<Self, AppError> {
        KNOWN_QUALIFICATIONS
            .iter()
            .find(|known| known.label == label)
            .map(|known| Qualification {
                label: known.label.to_string(),
                purpose: known.purpose.map(str::to_string),
                source_category: known.source_category.map(str::to_string),
                source_sub_category: known.source_sub_category.map(str::to_string),
                subjects: if known.subjects.is_empty() {
                    None
                } else {
                    Some(known.subjects.iter().map(|s| s.to_string()).collect())
                },
            })
            .ok_or_else(|| AppError::Validation(format!("Unknown qualification label: {label}")))
    }

    pub fn labels() -> impl Iterator<Item = &'static str> {
        KNOWN_QUALIFICATIONS.iter().map(|known| known.label)
    }
}
