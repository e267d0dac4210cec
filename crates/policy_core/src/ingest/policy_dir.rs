use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{DocumentMetadata, PolicyDocument};
use crate::error::AppError;

const POLICY_FILE_SUFFIX: &str = ".txt";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyLoadReport {
    pub documents: Vec<PolicyDocument>,
    /// Policy files that matched but could not be read. The load continues past them.
    pub skipped: Vec<SkippedFile>,
}

/// Title-case the way policy names are displayed: the first cased character after
/// any uncased character is upper-cased, every other cased character lower-cased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        let cased = ch.is_lowercase() || ch.is_uppercase();
        if cased && prev_cased {
            out.extend(ch.to_lowercase());
        } else if cased {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_cased = cased;
    }
    out
}

/// `remote_work_policy.txt` -> `Remote Work Policy`.
pub fn policy_name_from_file_name(file_name: &str) -> String {
    let stem = file_name
        .strip_suffix(POLICY_FILE_SUFFIX)
        .unwrap_or(file_name);
    title_case(&stem.replace('_', " "))
}

/// Synthetic header placed before a policy's content so every chunk cut from the top
/// of the file names the policy it belongs to.
pub fn policy_header(policy_name: &str) -> String {
    format!(
        "POLICY NAME: {policy_name}\nPOLICY CATEGORY: {policy_name}\nTHIS DOCUMENT DESCRIBES THE {}.\n\n",
        policy_name.to_uppercase()
    )
}

fn is_policy_file(path: &Path, file_name: &str) -> bool {
    file_name.ends_with(POLICY_FILE_SUFFIX) && path.is_file()
}

/// Load every `*.txt` file in `dir` as a policy document, in filename order.
pub fn load_policy_dir(dir: &Path) -> Result<PolicyLoadReport, AppError> {
    if !dir.exists() {
        return Err(
            AppError::new("LOAD_DIR_NOT_FOUND", "Policy directory does not exist")
                .with_details(format!("path={}", dir.display())),
        );
    }
    if !dir.is_dir() {
        return Err(
            AppError::new("LOAD_DIR_NOT_FOUND", "Policy path is not a directory")
                .with_details(format!("path={}", dir.display())),
        );
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::new("LOAD_DIR_UNREADABLE", "Failed to read policy directory")
            .with_details(format!("path={}; err={}", dir.display(), e))
    })?;

    let mut report = PolicyLoadReport::default();
    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), err = %e, "Skipping unreadable directory entry");
                report.skipped.push(SkippedFile {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if is_policy_file(&path, &file_name) {
            candidates.push((file_name, path));
        } else {
            debug!(path = %path.display(), "Ignoring non-policy file");
        }
    }

    // Stable ordering so identical directories always produce identical documents.
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    for (file_name, path) in candidates {
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "Skipping unreadable policy file");
                report.skipped.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let policy_name = policy_name_from_file_name(&file_name);
        let mut text = policy_header(&policy_name);
        text.push_str(&content);

        report.documents.push(PolicyDocument {
            text,
            metadata: DocumentMetadata {
                source: path.display().to_string(),
                policy_type: policy_name,
            },
        });
    }

    if report.documents.is_empty() {
        warn!(dir = %dir.display(), "No policy documents found; every question will get the fallback answer");
    }
    info!(
        dir = %dir.display(),
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        "Loaded policy documents"
    );
    Ok(report)
}

pub fn load_documents(dir: &Path) -> Result<Vec<PolicyDocument>, AppError> {
    Ok(load_policy_dir(dir)?.documents)
}
