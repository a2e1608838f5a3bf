//! Backup, restore, validation, and index rebuild.
//!
//! A backup set is a timestamped directory `backup_{tenant}_{ts}` holding one
//! dump file per backend plus `manifest.json` with SHA-256 checksums.
//! Restores are gated on an explicit confirmation and always create a safety
//! backup of the current state first; a partial restore reports `partial` and
//! leaves the safety backup as the rollback path.

use crate::{parse_args, ToolContext};
use async_trait::async_trait;
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ragserve_core::context;
use ragserve_core::model::document::hash_content;
use ragserve_core::model::document::{Document, DocumentVersion};
use ragserve_core::model::tenant::TenantConfiguration;
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::keyword::{KeywordDocument, KeywordIndex};
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::{DocumentStore, TenantStore};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::{RagError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const REBUILD_CONFIRMATION_CODE: &str = "FR-BACKUP-004";
const EMBEDDING_BATCH_SIZE: usize = 100;
const COMPONENTS: &[&str] = &["postgresql", "faiss", "minio", "meilisearch"];

#[derive(Debug, Serialize, Deserialize)]
struct PostgresDump {
    documents: Vec<Document>,
    versions: Vec<DocumentVersion>,
    config: Option<TenantConfiguration>,
}

fn write_component(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(PathBuf, usize, String)> {
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)
        .map_err(|e| RagError::transient(format!("cannot write backup file {file_name}: {e}")))?;
    Ok((path, bytes.len(), hash_content(bytes)))
}

/// Produce a full backup set for the tenant; shared by the backup tool, the
/// pre-restore safety backup, and the pre-hard-delete safety backup.
pub(crate) async fn run_backup(
    ctx: &ToolContext,
    tenant_id: Uuid,
    backup_type: &str,
    location: Option<&Path>,
) -> Result<Value> {
    let degraded = backup_type == "incremental";
    if degraded {
        warn!(tenant_id = %tenant_id, "incremental backup degrades to full");
    }

    let timestamp = Utc::now();
    let backup_id = format!("backup_{tenant_id}_{}", timestamp.format("%Y%m%d%H%M%S"));
    let root = location.unwrap_or(&ctx.backup_root);
    let dir = root.join(&backup_id);
    std::fs::create_dir_all(&dir)
        .map_err(|e| RagError::transient(format!("cannot create backup directory: {e}")))?;

    let mut components = serde_json::Map::new();
    let mut total_size = 0usize;

    // postgresql: documents, versions, configuration
    let documents = ctx.repos.documents.enumerate_documents(tenant_id).await?;
    let mut versions = Vec::new();
    for doc in &documents {
        versions.extend(
            ctx.repos
                .documents
                .list_versions(tenant_id, doc.document_id)
                .await?,
        );
    }
    let config = ctx.repos.tenants.get_config(tenant_id).await?;
    let record_count = documents.len();
    let dump = PostgresDump {
        documents,
        versions,
        config,
    };
    let bytes = serde_json::to_vec_pretty(&dump)
        .map_err(|e| RagError::internal(format!("cannot serialize relational dump: {e}")))?;
    let (path, size, checksum) = write_component(&dir, "postgresql_dump.json", &bytes)?;
    total_size += size;
    components.insert(
        "postgresql".to_string(),
        json!({
            "file_path": path, "file_size": size, "checksum": checksum,
            "record_count": record_count,
        }),
    );

    // faiss: serialized index
    match ctx.vector.export_bytes(tenant_id).await? {
        Some(bytes) => {
            let (path, size, checksum) =
                write_component(&dir, &format!("tenant_{tenant_id}.index"), &bytes)?;
            total_size += size;
            components.insert(
                "faiss".to_string(),
                json!({
                    "file_path": path, "file_size": size, "checksum": checksum,
                    "status": "success",
                }),
            );
        }
        None => {
            components.insert("faiss".to_string(), json!({ "status": "skipped" }));
        }
    }

    // minio: gzip tar of the bucket
    let keys = ctx.objects.list(tenant_id, "").await?;
    if keys.is_empty() {
        components.insert("minio".to_string(), json!({ "status": "skipped" }));
    } else {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut archive = tar::Builder::new(encoder);
        let mut object_count = 0usize;
        for key in &keys {
            let Some(bytes) = ctx.objects.get(tenant_id, key).await? else {
                continue;
            };
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            archive
                .append_data(&mut header, key, bytes.as_slice())
                .map_err(|e| RagError::internal(format!("cannot archive object {key}: {e}")))?;
            object_count += 1;
        }
        let encoder = archive
            .into_inner()
            .map_err(|e| RagError::internal(format!("cannot finish object archive: {e}")))?;
        let bytes = encoder
            .finish()
            .map_err(|e| RagError::internal(format!("cannot compress object archive: {e}")))?;
        let (path, size, checksum) = write_component(&dir, "minio_objects.tar.gz", &bytes)?;
        total_size += size;
        components.insert(
            "minio".to_string(),
            json!({
                "file_path": path, "file_size": size, "checksum": checksum,
                "object_count": object_count, "status": "success",
            }),
        );
    }

    // meilisearch: indexed documents
    let keyword_docs = ctx.keyword.export_documents(tenant_id).await?;
    let document_count = keyword_docs.len();
    let bytes = serde_json::to_vec_pretty(&keyword_docs)
        .map_err(|e| RagError::internal(format!("cannot serialize keyword dump: {e}")))?;
    let (path, size, checksum) = write_component(&dir, "meilisearch_dump.json", &bytes)?;
    total_size += size;
    components.insert(
        "meilisearch".to_string(),
        json!({
            "file_path": path, "file_size": size, "checksum": checksum,
            "document_count": document_count, "status": "success",
        }),
    );

    let mut manifest = json!({
        "backup_id": backup_id,
        "tenant_id": tenant_id,
        "backup_type": "full",
        "timestamp": timestamp,
        "components": Value::Object(components),
        "total_size": total_size,
        "status": "completed",
    });
    if degraded {
        manifest["degraded_to_full"] = json!(true);
    }
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| RagError::internal(format!("cannot serialize manifest: {e}")))?;
    std::fs::write(dir.join("manifest.json"), manifest_bytes)
        .map_err(|e| RagError::transient(format!("cannot write manifest: {e}")))?;

    info!(tenant_id = %tenant_id, backup_id = %manifest["backup_id"], total_size, "backup completed");
    Ok(manifest)
}

fn load_manifest(ctx: &ToolContext, backup_id: &str) -> Result<(PathBuf, Value)> {
    let dir = ctx.backup_root.join(backup_id);
    let path = dir.join("manifest.json");
    let bytes = std::fs::read(&path)
        .map_err(|_| RagError::not_found(format!("backup {backup_id} not found")))?;
    let manifest: Value = serde_json::from_slice(&bytes)
        .map_err(|e| RagError::validation(format!("corrupt manifest for {backup_id}: {e}")))?;
    Ok((dir, manifest))
}

fn manifest_tenant(manifest: &Value) -> Result<Uuid> {
    manifest
        .get("tenant_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RagError::validation("manifest is missing tenant_id"))
}

fn component_file(manifest: &Value, component: &str) -> Option<PathBuf> {
    manifest
        .get("components")
        .and_then(|c| c.get(component))
        .and_then(|c| c.get("file_path"))
        .and_then(Value::as_str)
        .map(PathBuf::from)
}

#[derive(Debug, Deserialize)]
struct BackupArgs {
    tenant_id: Option<Uuid>,
    #[serde(default = "default_backup_type")]
    backup_type: String,
    backup_location: Option<PathBuf>,
    #[serde(default)]
    background: bool,
}

fn default_backup_type() -> String {
    "full".to_string()
}

/// `rag_backup_tenant_data`
pub struct BackupTenantData {
    ctx: ToolContext,
}

impl BackupTenantData {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for BackupTenantData {
    fn name(&self) -> &'static str {
        "rag_backup_tenant_data"
    }

    fn description(&self) -> &'static str {
        "Back up all four tenant backends"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: BackupArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        if args.backup_type != "full" && args.backup_type != "incremental" {
            return Err(RagError::validation_field(
                "backup_type must be full or incremental",
                "backup_type",
            ));
        }

        if args.background {
            let ctx = self.ctx.clone();
            let backup_type = args.backup_type;
            let location = args.backup_location;
            let job_id = Uuid::new_v4();
            context::spawn_scoped(async move {
                match run_backup(&ctx, tenant_id, &backup_type, location.as_deref()).await {
                    Ok(manifest) => {
                        info!(job_id = %job_id, backup_id = %manifest["backup_id"], "background backup finished");
                    }
                    Err(err) => {
                        warn!(job_id = %job_id, tenant_id = %tenant_id, error = %err, "background backup failed");
                    }
                }
            });
            return Ok(json!({ "job_id": job_id, "status": "started", "background": true }));
        }

        run_backup(
            &self.ctx,
            tenant_id,
            &args.backup_type,
            args.backup_location.as_deref(),
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct ValidateArgs {
    tenant_id: Option<Uuid>,
    backup_id: String,
    #[serde(default = "default_validation_type")]
    validation_type: String,
}

fn default_validation_type() -> String {
    "full".to_string()
}

/// `rag_validate_backup`
pub struct ValidateBackup {
    ctx: ToolContext,
}

impl ValidateBackup {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for ValidateBackup {
    fn name(&self) -> &'static str {
        "rag_validate_backup"
    }

    fn description(&self) -> &'static str {
        "Validate a backup set's integrity"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: ValidateArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        if !["full", "integrity", "completeness"].contains(&args.validation_type.as_str()) {
            return Err(RagError::validation_field(
                "validation_type must be full, integrity, or completeness",
                "validation_type",
            ));
        }

        let (_, manifest) = load_manifest(&self.ctx, &args.backup_id)?;
        let mut checks = serde_json::Map::new();
        let mut passed = true;

        // Structure and tenant binding
        let structure_ok = manifest.get("backup_id").is_some()
            && manifest.get("components").is_some()
            && manifest.get("timestamp").is_some();
        checks.insert("structure".to_string(), json!(structure_ok));
        let tenant_ok = manifest_tenant(&manifest).is_ok_and(|t| t == tenant_id);
        checks.insert("tenant_match".to_string(), json!(tenant_ok));
        passed &= structure_ok && tenant_ok;

        if args.validation_type != "integrity" {
            // Completeness: every component present
            let complete = COMPONENTS.iter().all(|c| {
                manifest
                    .get("components")
                    .and_then(|m| m.get(*c))
                    .is_some()
            });
            checks.insert("completeness".to_string(), json!(complete));
            passed &= complete;
        }

        if args.validation_type != "completeness" {
            // File existence + checksum recomputation over non-skipped parts
            let mut files_ok = true;
            let mut checksums_ok = true;
            for component in COMPONENTS {
                let Some(path) = component_file(&manifest, component) else {
                    continue;
                };
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        let expected = manifest["components"][component]["checksum"]
                            .as_str()
                            .unwrap_or_default();
                        if hash_content(&bytes) != expected {
                            checksums_ok = false;
                        }
                    }
                    Err(_) => files_ok = false,
                }
            }
            checks.insert("files_exist".to_string(), json!(files_ok));
            checks.insert("checksums".to_string(), json!(checksums_ok));
            passed &= files_ok && checksums_ok;
        }

        Ok(json!({
            "backup_id": args.backup_id,
            "validation": {
                "status": if passed { "passed" } else { "failed" },
                "validation_type": args.validation_type,
                "checks": Value::Object(checks),
            },
        }))
    }
}

#[derive(Debug, Deserialize)]
struct RestoreArgs {
    tenant_id: Option<Uuid>,
    backup_id: String,
    #[serde(default = "default_backup_type")]
    restore_type: String,
    #[serde(default)]
    confirmation: bool,
    #[serde(default)]
    background: bool,
}

/// `rag_restore_tenant_data`
pub struct RestoreTenantData {
    ctx: ToolContext,
}

impl RestoreTenantData {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    async fn restore_postgresql(ctx: &ToolContext, tenant_id: Uuid, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)
            .map_err(|e| RagError::transient(format!("cannot read relational dump: {e}")))?;
        let dump: PostgresDump = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::validation(format!("corrupt relational dump: {e}")))?;

        ctx.repos
            .documents
            .remove_documents_for_tenant(tenant_id)
            .await?;
        let count = dump.documents.len();
        for document in dump.documents {
            ctx.repos.documents.insert_document(document).await?;
        }
        for version in dump.versions {
            ctx.repos.documents.insert_version(version).await?;
        }
        if let Some(config) = dump.config {
            ctx.repos.tenants.insert_config(config).await?;
        }
        Ok(count)
    }

    async fn restore_minio(ctx: &ToolContext, tenant_id: Uuid, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)
            .map_err(|e| RagError::transient(format!("cannot read object archive: {e}")))?;
        let decoder = GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);
        let mut restored = 0usize;
        ctx.objects.ensure_bucket(tenant_id).await?;
        let mut entries_data = Vec::new();
        for entry in archive
            .entries()
            .map_err(|e| RagError::validation(format!("corrupt object archive: {e}")))?
        {
            let mut entry =
                entry.map_err(|e| RagError::validation(format!("corrupt archive entry: {e}")))?;
            let key = entry
                .path()
                .map_err(|e| RagError::validation(format!("bad archive path: {e}")))?
                .to_string_lossy()
                .into_owned();
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| RagError::validation(format!("cannot read archive entry: {e}")))?;
            entries_data.push((key, content));
        }
        drop(archive);
        for (key, content) in entries_data {
            ctx.objects.put(tenant_id, &key, &content).await?;
            restored += 1;
        }
        Ok(restored)
    }

    async fn restore_meilisearch(ctx: &ToolContext, tenant_id: Uuid, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)
            .map_err(|e| RagError::transient(format!("cannot read keyword dump: {e}")))?;
        let docs: Vec<KeywordDocument> = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::validation(format!("corrupt keyword dump: {e}")))?;
        let count = docs.len();
        ctx.keyword.delete_index(tenant_id).await?;
        ctx.keyword.ensure_index(tenant_id).await?;
        ctx.keyword.import_documents(tenant_id, docs).await?;
        Ok(count)
    }

    /// Safety backup, then per-component restore. A component failure marks
    /// the run `partial`; the safety backup is the rollback path.
    async fn run_restore(
        ctx: &ToolContext,
        tenant_id: Uuid,
        backup_id: &str,
        restore_type: &str,
        manifest: &Value,
    ) -> Result<Value> {
        let safety = run_backup(ctx, tenant_id, "full", None).await?;
        let safety_backup_id = safety["backup_id"].as_str().unwrap_or_default().to_string();

        let mut component_status = serde_json::Map::new();
        let mut any_failed = false;

        if let Some(path) = component_file(manifest, "postgresql") {
            match Self::restore_postgresql(ctx, tenant_id, &path).await {
                Ok(count) => {
                    component_status.insert(
                        "postgresql".to_string(),
                        json!({"status": "success", "records_restored": count}),
                    );
                }
                Err(err) => {
                    any_failed = true;
                    component_status.insert(
                        "postgresql".to_string(),
                        json!({"status": "failed", "error": err.to_string()}),
                    );
                }
            }
        } else {
            component_status.insert("postgresql".to_string(), json!({"status": "skipped"}));
        }

        if let Some(path) = component_file(manifest, "faiss") {
            let outcome = match std::fs::read(&path) {
                Ok(bytes) => ctx.vector.import_bytes(tenant_id, &bytes).await,
                Err(e) => Err(RagError::transient(format!("cannot read index file: {e}"))),
            };
            match outcome {
                Ok(()) => {
                    component_status.insert("faiss".to_string(), json!({"status": "success"}));
                }
                Err(err) => {
                    any_failed = true;
                    component_status.insert(
                        "faiss".to_string(),
                        json!({"status": "failed", "error": err.to_string()}),
                    );
                }
            }
        } else {
            component_status.insert("faiss".to_string(), json!({"status": "skipped"}));
        }

        if let Some(path) = component_file(manifest, "minio") {
            match Self::restore_minio(ctx, tenant_id, &path).await {
                Ok(count) => {
                    component_status.insert(
                        "minio".to_string(),
                        json!({"status": "success", "objects_restored": count}),
                    );
                }
                Err(err) => {
                    any_failed = true;
                    component_status.insert(
                        "minio".to_string(),
                        json!({"status": "failed", "error": err.to_string()}),
                    );
                }
            }
        } else {
            component_status.insert("minio".to_string(), json!({"status": "skipped"}));
        }

        if let Some(path) = component_file(manifest, "meilisearch") {
            match Self::restore_meilisearch(ctx, tenant_id, &path).await {
                Ok(count) => {
                    component_status.insert(
                        "meilisearch".to_string(),
                        json!({"status": "success", "documents_restored": count}),
                    );
                }
                Err(err) => {
                    any_failed = true;
                    component_status.insert(
                        "meilisearch".to_string(),
                        json!({"status": "failed", "error": err.to_string()}),
                    );
                }
            }
        } else {
            component_status.insert("meilisearch".to_string(), json!({"status": "skipped"}));
        }

        let status = if any_failed { "partial" } else { "completed" };
        info!(
            tenant_id = %tenant_id,
            backup_id,
            status,
            "restore finished"
        );
        Ok(json!({
            "backup_id": backup_id,
            "restore_type": restore_type,
            "status": status,
            "components": Value::Object(component_status),
            "safety_backup_id": safety_backup_id,
        }))
    }
}

#[async_trait]
impl ToolHandler for RestoreTenantData {
    fn name(&self) -> &'static str {
        "rag_restore_tenant_data"
    }

    fn description(&self) -> &'static str {
        "Restore a tenant from a backup set"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: RestoreArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        if !args.confirmation {
            return Err(RagError::validation_field(
                "restore requires confirmation=true",
                "confirmation",
            ));
        }

        let (_, manifest) = load_manifest(&self.ctx, &args.backup_id)?;
        if manifest_tenant(&manifest)? != tenant_id {
            return Err(RagError::validation(format!(
                "backup {} belongs to a different tenant",
                args.backup_id
            )));
        }

        if args.background {
            let ctx = self.ctx.clone();
            let job_id = Uuid::new_v4();
            context::spawn_scoped(async move {
                match Self::run_restore(
                    &ctx,
                    tenant_id,
                    &args.backup_id,
                    &args.restore_type,
                    &manifest,
                )
                .await
                {
                    Ok(result) => {
                        info!(job_id = %job_id, status = %result["status"], "background restore finished");
                    }
                    Err(err) => {
                        warn!(job_id = %job_id, tenant_id = %tenant_id, error = %err, "background restore failed");
                    }
                }
            });
            return Ok(json!({ "job_id": job_id, "status": "started", "background": true }));
        }

        Self::run_restore(
            &self.ctx,
            tenant_id,
            &args.backup_id,
            &args.restore_type,
            &manifest,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct RebuildArgs {
    tenant_id: Option<Uuid>,
    #[serde(default = "default_index_type")]
    index_type: String,
    #[serde(default = "default_backup_type")]
    rebuild_type: String,
    confirmation_code: Option<String>,
    #[serde(default)]
    background: bool,
}

fn default_index_type() -> String {
    "FAISS".to_string()
}

/// `rag_rebuild_index`
pub struct RebuildIndex {
    ctx: ToolContext,
}

impl RebuildIndex {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    /// Re-embed every live document and build a fresh index, validating the
    /// final count against the expectation with 10% tolerance.
    async fn rebuild(ctx: &ToolContext, tenant_id: Uuid) -> Result<Value> {
        let documents = ctx.repos.documents.enumerate_documents(tenant_id).await?;
        let expected = documents.len();

        let mut entries: Vec<(Uuid, Vec<f32>)> = Vec::with_capacity(expected);
        let mut dimension = 0usize;
        for batch in documents.chunks(EMBEDDING_BATCH_SIZE) {
            for doc in batch {
                let content = match ctx
                    .objects
                    .get(tenant_id, &format!("documents/{}", doc.document_id))
                    .await?
                {
                    Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    None => {
                        warn!(document_id = %doc.document_id, "object missing during rebuild");
                        continue;
                    }
                };
                let embedding = ctx.embedder.embed(&content, tenant_id).await?;
                dimension = embedding.len();
                entries.push((doc.document_id, embedding));
            }
            info!(
                tenant_id = %tenant_id,
                processed = entries.len(),
                total = expected,
                "rebuild batch complete"
            );
        }

        let processed = entries.len();
        let index_size = if processed == 0 {
            0
        } else {
            ctx.vector.rebuild(tenant_id, dimension, entries).await?
        };
        let tolerance = expected / 10;
        let integrity_validated = index_size.abs_diff(expected) <= tolerance;
        if !integrity_validated {
            warn!(
                tenant_id = %tenant_id,
                index_size,
                expected,
                "rebuilt index size outside tolerance"
            );
        }

        Ok(json!({
            "documents_processed": processed,
            "index_size": index_size,
            "expected_documents": expected,
            "integrity_validated": integrity_validated,
        }))
    }
}

#[async_trait]
impl ToolHandler for RebuildIndex {
    fn name(&self) -> &'static str {
        "rag_rebuild_index"
    }

    fn description(&self) -> &'static str {
        "Rebuild the tenant vector index"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: RebuildArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;

        if args.confirmation_code.as_deref() != Some(REBUILD_CONFIRMATION_CODE) {
            return Err(RagError::validation_field(
                format!("index rebuild requires confirmation_code {REBUILD_CONFIRMATION_CODE}"),
                "confirmation_code",
            ));
        }
        if args.index_type != "FAISS" {
            return Err(RagError::validation_field(
                "only the FAISS index type is supported",
                "index_type",
            ));
        }
        let degraded = args.rebuild_type == "incremental";
        if degraded {
            warn!(tenant_id = %tenant_id, "incremental rebuild degrades to full");
        }

        if args.background {
            let ctx = self.ctx.clone();
            let job_id = Uuid::new_v4();
            context::spawn_scoped(async move {
                match Self::rebuild(&ctx, tenant_id).await {
                    Ok(result) => {
                        info!(job_id = %job_id, tenant_id = %tenant_id, result = %result, "background rebuild finished");
                    }
                    Err(err) => {
                        warn!(job_id = %job_id, tenant_id = %tenant_id, error = %err, "background rebuild failed");
                    }
                }
            });
            return Ok(json!({ "job_id": job_id, "status": "started", "background": true }));
        }

        let mut result = Self::rebuild(&self.ctx, tenant_id).await?;
        if degraded {
            result["degraded_to_full"] = json!(true);
        }
        Ok(result)
    }
}
