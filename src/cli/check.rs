//! Check command for the Crane operator
//!
//! Loads every operand bundle from a manifest directory and classifies each
//! document the way the operator would, without talking to a cluster.

use anyhow::Result;
use crane_operator::controller::images::ImageResolver;
use crane_operator::controller::manifest::{is_blank, ManifestSource};
use crane_operator::controller::operand::OperandCatalog;
use crane_operator::controller::reconciler::{classify, ClassifiedDocument, ReconcilerError};
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of checking one bundle
#[derive(Debug)]
struct BundleReport {
    manifest: String,
    documents: Vec<ClassifiedDocument>,
    error: Option<ReconcilerError>,
}

/// Check every bundle of the Crane catalog
pub async fn check_command(manifest_dir: PathBuf, install_namespace: String) -> Result<()> {
    println!("► checking bundles in {}", manifest_dir.display());

    let reports = check_bundles(&ManifestSource::new(manifest_dir), &install_namespace).await;
    let mut failed = 0;

    for report in &reports {
        match &report.error {
            None => println!(
                "✔ {} ({} documents)",
                report.manifest,
                report.documents.len()
            ),
            Some(err) => {
                failed += 1;
                println!("✗ {}: {err}", report.manifest);
            }
        }
        for doc in &report.documents {
            println!("    [{}] {} ({})", doc.index, doc.key, doc.key.api_version());
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!("{failed} bundle(s) failed the check"));
    }
    println!("✅ all bundles passed");
    Ok(())
}

async fn check_bundles(source: &ManifestSource, install_namespace: &str) -> Vec<BundleReport> {
    let catalog = OperandCatalog::crane(Arc::new(ImageResolver::default()));
    let mut reports = Vec::with_capacity(catalog.len());

    for operand in &catalog {
        let mut report = BundleReport {
            manifest: operand.manifest.clone(),
            documents: Vec::new(),
            error: None,
        };

        match source.load(&operand.manifest).await {
            Ok(blocks) => {
                for (index, block) in blocks.iter().enumerate() {
                    if is_blank(block) {
                        continue;
                    }
                    match classify(&operand.manifest, index, block, install_namespace) {
                        Ok(doc) => report.documents.push(doc),
                        Err(err) => {
                            report.error = Some(err);
                            break;
                        }
                    }
                }
            }
            Err(err) => report.error = Some(err.into()),
        }

        reports.push(report);
    }

    reports
}
