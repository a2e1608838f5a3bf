//! Template catalog tools

use crate::{parse_args, ToolContext};
use async_trait::async_trait;
use ragserve_core::traits::relational::TemplateStore;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::{RagError, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// `rag_list_templates`
pub struct ListTemplates {
    ctx: ToolContext,
}

impl ListTemplates {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for ListTemplates {
    fn name(&self) -> &'static str {
        "rag_list_templates"
    }

    fn description(&self) -> &'static str {
        "List tenant provisioning templates"
    }

    async fn handle(&self, _args: Value) -> Result<Value> {
        let templates = self.ctx.repos.templates.list_templates().await?;
        let rendered: Vec<Value> = templates
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "domain": t.domain.as_str(),
                    "description": t.description,
                    "compliance_checklist": t.compliance_checklist,
                    "customization_options": t.customization_options,
                })
            })
            .collect();
        Ok(json!({ "templates": rendered, "total": rendered.len() }))
    }
}

#[derive(Debug, Deserialize)]
struct GetTemplateArgs {
    template_name: String,
}

/// `rag_get_template`
pub struct GetTemplate {
    ctx: ToolContext,
}

impl GetTemplate {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetTemplate {
    fn name(&self) -> &'static str {
        "rag_get_template"
    }

    fn description(&self) -> &'static str {
        "Fetch one provisioning template by name"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: GetTemplateArgs = parse_args(args)?;
        let template = self
            .ctx
            .repos
            .templates
            .get_template(&args.template_name)
            .await?
            .ok_or_else(|| {
                RagError::not_found(format!("template {} not found", args.template_name))
            })?;
        Ok(json!({
            "name": template.name,
            "domain": template.domain.as_str(),
            "description": template.description,
            "compliance_checklist": template.compliance_checklist,
            "default_configuration": template.default_configuration,
            "customization_options": template.customization_options,
            "created_at": template.created_at,
        }))
    }
}
