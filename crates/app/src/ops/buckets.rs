use clap::Args;
use common::bucket::{BucketMismatch, BucketStats, DumpReport, FileState, MismatchKind};
use common::prelude::MessageError;

use super::format_time;
use crate::op::{Op, OpContext};
use crate::state::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMode {
    Stats,
    Dump,
    Audit,
}

/// Parse a bucket mode: `stats`, `dump` or `audit`
pub fn parse_bucket_mode(mode: &str) -> Result<BucketMode, String> {
    match mode {
        "stats" => Ok(BucketMode::Stats),
        "dump" => Ok(BucketMode::Dump),
        "audit" => Ok(BucketMode::Audit),
        other => Err(format!(
            "unknown mode '{}', expected stats, dump or audit",
            other
        )),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BucketsError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Messaging(#[from] MessageError),
}

fn format_file(file: FileState) -> String {
    match file {
        FileState::Size(size) => format!("{} bytes", size),
        FileState::EmptyBucket => "Empty bucket.".to_string(),
        FileState::FileNotFound => "File not found.".to_string(),
        FileState::Orphaned(size) => format!("{} bytes, no tokens", size),
    }
}

fn format_stats(stats: &BucketStats) -> String {
    let mut lines: Vec<String> = stats
        .buckets
        .iter()
        .map(|bucket| {
            format!(
                "Bucket {} ({}): {} messages, hash {}, last changed {}, {}",
                bucket.timestamp,
                format_time(bucket.timestamp),
                bucket.messages,
                hex::encode(bucket.combined_hash),
                format_time(bucket.last_changed),
                format_file(bucket.file)
            )
        })
        .collect();
    lines.push(format!(
        "Buckets: {}, Messages: {}, Size: {} bytes",
        stats.total_buckets(),
        stats.total_messages,
        stats.total_bytes
    ));
    lines.join("\n")
}

fn format_dump(report: &DumpReport) -> String {
    let mut out = format!(
        "Removed {} bucket files, evicted {} buckets.",
        report.files_removed, report.buckets_evicted
    );
    if report.failures > 0 {
        out.push_str(&format!(
            " {} files could not be removed, see the log.",
            report.failures
        ));
    }
    out
}

fn format_audit(mismatches: &[BucketMismatch]) -> String {
    if mismatches.is_empty() {
        return "All buckets consistent with their files.".to_string();
    }
    mismatches
        .iter()
        .map(|mismatch| match mismatch.kind {
            MismatchKind::FileWithoutTokens => {
                format!("Bucket {}: file present but no tokens", mismatch.timestamp)
            }
            MismatchKind::TokensWithoutFile => format!(
                "Bucket {}: {} tokens but no file",
                mismatch.timestamp, mismatch.tokens
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Args, Debug, Clone)]
pub struct Buckets {
    /// stats | dump | audit
    #[arg(default_value = "stats", value_parser = parse_bucket_mode)]
    pub mode: BucketMode,
}

#[async_trait::async_trait]
impl Op for Buckets {
    type Error = BucketsError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        Ok(match self.mode {
            BucketMode::Stats => format_stats(&service.bucket_stats()?),
            BucketMode::Dump => format_dump(&service.bucket_dump()?),
            BucketMode::Audit => format_audit(&service.bucket_audit()?),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanBuckets;

#[async_trait::async_trait]
impl Op for ScanBuckets {
    type Error = BucketsError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (_, service) = ctx.service()?;
        let indexed = service.rescan_buckets()?;
        Ok(format!("Scan buckets completed, {} messages indexed.", indexed))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use common::bucket::BucketStat;

    #[test]
    fn test_parse_bucket_mode() {
        assert_eq!(parse_bucket_mode("stats"), Ok(BucketMode::Stats));
        assert_eq!(parse_bucket_mode("dump"), Ok(BucketMode::Dump));
        assert_eq!(parse_bucket_mode("audit"), Ok(BucketMode::Audit));
        assert!(parse_bucket_mode("purge").is_err());
    }

    #[test]
    fn test_format_stats_totals() {
        let stats = BucketStats {
            buckets: vec![BucketStat {
                timestamp: 3600,
                messages: 2,
                combined_hash: [0; 32],
                last_changed: 3700,
                file: FileState::Size(512),
            }],
            total_messages: 2,
            total_bytes: 512,
        };
        let out = format_stats(&stats);
        assert!(out.contains("Bucket 3600 (1970-01-01 01:00:00 UTC): 2 messages"));
        assert!(out.ends_with("Buckets: 1, Messages: 2, Size: 512 bytes"));
    }

    #[test]
    fn test_format_audit() {
        assert_eq!(format_audit(&[]), "All buckets consistent with their files.");
        let out = format_audit(&[BucketMismatch {
            timestamp: 7200,
            tokens: 0,
            kind: MismatchKind::FileWithoutTokens,
        }]);
        assert_eq!(out, "Bucket 7200: file present but no tokens");
    }
}
