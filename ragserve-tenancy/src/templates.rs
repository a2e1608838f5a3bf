//! Built-in provisioning templates, seeded at startup.

use ragserve_core::model::template::{DomainType, Template};
use serde_json::json;
use std::collections::HashMap;

/// The built-in template catalog: one per supported domain plus a blank
/// custom template. Seeded idempotently at startup; operators may add more
/// through administrative correction.
#[must_use]
pub fn builtin_templates() -> Vec<Template> {
    vec![
        Template::new(
            "fintech-advisor",
            DomainType::Fintech,
            "Financial advisory knowledge base with strict audit posture",
        )
        .with_compliance(vec![
            "SOC2".to_string(),
            "PCI-DSS".to_string(),
            "data-residency".to_string(),
        ])
        .with_defaults(HashMap::from([
            ("embedding_model".to_string(), json!("all-MiniLM-L6-v2")),
            ("embedding_dimension".to_string(), json!(384)),
            ("llm_model".to_string(), json!("gpt-4o")),
            ("audit_logging".to_string(), json!(true)),
        ]))
        .with_customization(vec![
            "embedding_model".to_string(),
            "llm_model".to_string(),
        ]),
        Template::new(
            "healthcare-assistant",
            DomainType::Healthcare,
            "Clinical documentation assistant with PHI handling controls",
        )
        .with_compliance(vec!["HIPAA".to_string(), "audit-trail".to_string()])
        .with_defaults(HashMap::from([
            ("embedding_model".to_string(), json!("all-MiniLM-L6-v2")),
            ("embedding_dimension".to_string(), json!(384)),
            ("llm_model".to_string(), json!("gpt-4o")),
            ("audit_logging".to_string(), json!(true)),
        ]))
        .with_customization(vec!["llm_model".to_string()]),
        Template::new(
            "retail-catalog",
            DomainType::Retail,
            "Product catalog and merchandising search",
        )
        .with_defaults(HashMap::from([
            ("embedding_model".to_string(), json!("all-MiniLM-L6-v2")),
            ("embedding_dimension".to_string(), json!(384)),
            ("llm_model".to_string(), json!("gpt-4o-mini")),
        ]))
        .with_customization(vec![
            "embedding_model".to_string(),
            "llm_model".to_string(),
        ]),
        Template::new(
            "support-desk",
            DomainType::CustomerService,
            "Customer support knowledge base with ticket-aware memory",
        )
        .with_defaults(HashMap::from([
            ("embedding_model".to_string(), json!("all-MiniLM-L6-v2")),
            ("embedding_dimension".to_string(), json!(384)),
            ("llm_model".to_string(), json!("gpt-4o-mini")),
        ]))
        .with_customization(vec!["llm_model".to_string()]),
        Template::new(
            "custom",
            DomainType::Custom,
            "Blank template for bespoke deployments",
        )
        .with_customization(vec![
            "embedding_model".to_string(),
            "embedding_dimension".to_string(),
            "llm_model".to_string(),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_domain_with_unique_names() {
        let templates = builtin_templates();
        let names: std::collections::HashSet<&str> =
            templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), templates.len());
        for domain in [
            DomainType::Fintech,
            DomainType::Healthcare,
            DomainType::Retail,
            DomainType::CustomerService,
            DomainType::Custom,
        ] {
            assert!(templates.iter().any(|t| t.domain == domain));
        }
    }
}
