//! Retention job runner.
//!
//! The core never schedules itself; cron (or a human) invokes this binary:
//!
//!   missionctl-jobs <archive|compress|cleanup|tier-info> [--dry-run] [--db PATH]
//!
//! The job outcome is printed to stdout as JSON. Exit code 0 on success,
//! 1 on a job failure, 2 on a usage error.

use std::path::PathBuf;
use std::process::ExitCode;

use missionctl::db::LedgerDb;
use missionctl::error::ServiceError;
use missionctl::services::retention;

const USAGE: &str =
    "usage: missionctl-jobs <archive|compress|cleanup|tier-info> [--dry-run] [--db PATH]";

struct Args {
    job: String,
    dry_run: bool,
    db_path: Option<PathBuf>,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut job = None;
    let mut dry_run = false;
    let mut db_path = None;

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--db" => {
                let path = iter
                    .next()
                    .ok_or_else(|| "--db requires a path".to_string())?;
                db_path = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown flag: {other}"));
            }
            other => {
                if job.is_some() {
                    return Err(format!("unexpected argument: {other}"));
                }
                job = Some(other.to_string());
            }
        }
    }

    Ok(Args {
        job: job.ok_or_else(|| "missing job name".to_string())?,
        dry_run,
        db_path,
    })
}

fn run(args: &Args) -> Result<String, ServiceError> {
    let db = match &args.db_path {
        Some(path) => LedgerDb::open_at(path.clone())?,
        None => LedgerDb::open()?,
    };

    let json = match args.job.as_str() {
        "archive" => serde_json::to_string_pretty(&retention::archive(&db, args.dry_run)?),
        "compress" => serde_json::to_string_pretty(&retention::compress(&db, args.dry_run)?),
        "cleanup" => serde_json::to_string_pretty(&retention::cleanup(&db, args.dry_run)?),
        "tier-info" => serde_json::to_string_pretty(&retention::tier_info(&db)?),
        other => {
            return Err(ServiceError::Validation(format!("unknown job: {other}")));
        }
    };
    json.map_err(|e| ServiceError::Inconsistency(format!("failed to encode job result: {e}")))
}

fn main() -> ExitCode {
    env_logger::init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(ServiceError::Validation(msg)) => {
            eprintln!("{msg}\n{USAGE}");
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{} failed: {e}", args.job);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_and_flags() {
        let args = parse_args(&[
            "archive".to_string(),
            "--dry-run".to_string(),
            "--db".to_string(),
            "/tmp/x.db".to_string(),
        ])
        .unwrap();
        assert_eq!(args.job, "archive");
        assert!(args.dry_run);
        assert_eq!(args.db_path.as_deref(), Some(std::path::Path::new("/tmp/x.db")));
    }

    #[test]
    fn missing_job_is_an_error() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&["--dry-run".to_string()]).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_args(&["archive".to_string(), "--fast".to_string()]).is_err());
    }
}
