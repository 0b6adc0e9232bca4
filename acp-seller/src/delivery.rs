//! On-disk delivery artifacts.
//!
//! Every job gets its own directory under the delivery root:
//!
//! ```text
//! <deliveryRoot>/
//!   <jobId>/
//!     JOB_SNAPSHOT.json
//!     INTAKE_REQUEST.md           (needs-info path)
//!     REPORT.md                   (delivered path)
//!     <offering-specific files>
//! ```
//!
//! Structured deliverable values reference these files with `file://`
//! URIs so buyers can locate artifacts without further negotiation.

use crate::errors::SellerResult;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE: &str = "JOB_SNAPSHOT.json";
pub const INTAKE_FILE: &str = "INTAKE_REQUEST.md";
pub const REPORT_FILE: &str = "REPORT.md";

/// Resolve the delivery root directory.
///
/// `ACP_DELIVERY_ROOT` wins when set. Otherwise, a process running from a
/// `skills/<name>` checkout writes to the workspace root two levels up;
/// anything else writes next to the working directory.
pub fn resolve_delivery_root() -> PathBuf {
    if let Ok(root) = std::env::var("ACP_DELIVERY_ROOT") {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base = match cwd.parent() {
        Some(parent) if parent.file_name().is_some_and(|n| n == "skills") => {
            parent.parent().map(Path::to_path_buf).unwrap_or(cwd)
        }
        _ => cwd,
    };
    base.join("deliverables").join("acp-delivery")
}

/// Create the delivery root and the per-job directory, returning the
/// absolute job directory path.
pub async fn ensure_job_dir(delivery_root: &Path, job_id: u64) -> SellerResult<PathBuf> {
    let job_dir = delivery_root.join(job_id.to_string());
    tokio::fs::create_dir_all(&job_dir).await?;
    Ok(tokio::fs::canonicalize(&job_dir).await?)
}

/// Write a text artifact; a trailing newline is enforced. Returns the
/// absolute file path.
pub async fn write_text_file(job_dir: &Path, name: &str, content: &str) -> SellerResult<PathBuf> {
    let path = job_dir.join(name);
    let mut body = content.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Write a pretty-printed JSON artifact. Returns the absolute file path.
pub async fn write_json_file<T: Serialize>(
    job_dir: &Path,
    name: &str,
    value: &T,
) -> SellerResult<PathBuf> {
    let path = job_dir.join(name);
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Keys whose values are absent, null, or whitespace-only strings.
pub fn missing_required_fields(req: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter(|k| match req.get(**k) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(|k| k.to_string())
        .collect()
}

/// `file://`-scheme URL for an absolute path.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn file_refs(files: &[PathBuf]) -> Value {
    Value::Array(
        files
            .iter()
            .map(|p| {
                json!({
                    "filename": p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                    "path": p.display().to_string(),
                    "uri": file_uri(p),
                })
            })
            .collect(),
    )
}

/// Structured deliverable for the needs-info path: the buyer must supply
/// the listed fields; the intake artifact spells out what is missing.
pub fn build_needs_info_value(
    job_id: u64,
    offering: &str,
    job_dir: &Path,
    files: &[PathBuf],
    intake: &Path,
    missing: &[String],
) -> Value {
    json!({
        "status": "needs_info",
        "jobId": job_id,
        "offering": offering,
        "localPath": job_dir.display().to_string(),
        "filesWritten": files.len(),
        "fileRefs": file_refs(files),
        "missingFields": missing,
        "intakeFile": intake.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        "intakePath": intake.display().to_string(),
        "intakeUri": file_uri(intake),
    })
}

/// Structured deliverable for the delivered path, pointing at the report.
pub fn build_written_value(
    job_id: u64,
    offering: &str,
    job_dir: &Path,
    files: &[PathBuf],
    report: &Path,
) -> Value {
    json!({
        "status": "written",
        "jobId": job_id,
        "offering": offering,
        "localPath": job_dir.display().to_string(),
        "filesWritten": files.len(),
        "fileRefs": file_refs(files),
        "reportFile": report.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        "reportPath": report.display().to_string(),
        "reportUri": file_uri(report),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn job_dir_is_created_recursively() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("delivery");
        let job_dir = ensure_job_dir(&root, 123).await.unwrap();
        assert!(job_dir.is_dir());
        assert!(job_dir.ends_with("123"));
        assert!(job_dir.is_absolute());
    }

    #[tokio::test]
    async fn text_files_end_with_exactly_one_newline() {
        let tmp = TempDir::new().unwrap();
        let path = write_text_file(tmp.path(), "REPORT.md", "# Done").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "# Done\n");

        let path = write_text_file(tmp.path(), "NOTE.md", "already\n").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "already\n");
    }

    #[tokio::test]
    async fn json_files_are_pretty_printed() {
        let tmp = TempDir::new().unwrap();
        let path = write_json_file(tmp.path(), "JOB_SNAPSHOT.json", &json!({"jobId": 1}))
            .await
            .unwrap();
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.contains("\n  \"jobId\": 1"));
    }

    #[test]
    fn missing_fields_treat_blank_as_absent() {
        let req = json!({
            "apiDescription": "Build /health",
            "budget": "   ",
            "deadline": null,
        });
        let missing = missing_required_fields(
            req.as_object().unwrap(),
            &["apiDescription", "budget", "deadline", "contact"],
        );
        assert_eq!(missing, vec!["budget", "deadline", "contact"]);
    }

    #[test]
    fn needs_info_value_references_the_intake_artifact() {
        let job_dir = PathBuf::from("/tmp/delivery/9");
        let intake = job_dir.join(INTAKE_FILE);
        let files = vec![intake.clone()];
        let value = build_needs_info_value(
            9,
            "typescript_api_development",
            &job_dir,
            &files,
            &intake,
            &["apiDescription".to_string()],
        );
        assert_eq!(value["status"], "needs_info");
        assert_eq!(value["jobId"], 9);
        assert_eq!(value["filesWritten"], 1);
        assert_eq!(value["intakeFile"], "INTAKE_REQUEST.md");
        assert_eq!(
            value["intakeUri"],
            "file:///tmp/delivery/9/INTAKE_REQUEST.md"
        );
        assert_eq!(value["fileRefs"][0]["filename"], "INTAKE_REQUEST.md");
    }

    #[test]
    fn written_value_references_the_report() {
        let job_dir = PathBuf::from("/tmp/delivery/9");
        let report = job_dir.join(REPORT_FILE);
        let value = build_written_value(9, "research", &job_dir, &[report.clone()], &report);
        assert_eq!(value["status"], "written");
        assert_eq!(value["reportFile"], "REPORT.md");
        assert_eq!(value["reportUri"], "file:///tmp/delivery/9/REPORT.md");
    }
}
