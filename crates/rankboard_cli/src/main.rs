//! Maintenance CLI for rankboard databases.
//!
//! ```text
//! rankboard_cli                      print core version
//! rankboard_cli audit <db>           report rank gaps and duplicates
//! rankboard_cli renumber <db> <id>   rewrite one container densely
//! ```
//!
//! Logs go to `$RANKBOARD_LOG_DIR`, or `rankboard` under the temp dir.

use rankboard_core::engine::DensityReport;
use rankboard_core::{
    core_version, default_log_level, init_logging, open_db, MoveService, SqliteRankStore,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

const LOG_DIR_ENV: &str = "RANKBOARD_LOG_DIR";

fn main() -> ExitCode {
    let log_dir = resolve_log_dir(std::env::var_os(LOG_DIR_ENV));
    if let Err(message) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("warning: logging disabled: {message}");
    }

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(String::as_str).collect::<Vec<_>>();
    let result = match args.as_slice() {
        [] | ["version"] => {
            println!("rankboard_core version={}", core_version());
            Ok(true)
        }
        ["audit", db_path] => audit(Path::new(db_path)),
        ["renumber", db_path, container_id] => renumber(Path::new(db_path), container_id),
        _ => {
            eprintln!("usage: rankboard_cli [version | audit <db> | renumber <db> <container_id>]");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            log::error!("event=cli_command module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_log_dir(configured: Option<OsString>) -> PathBuf {
    configured
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("rankboard"))
}

/// Returns `Ok(false)` when any container is not dense.
fn audit(db_path: &Path) -> Result<bool, String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let store = SqliteRankStore::try_new(&conn).map_err(|err| err.to_string())?;
    let service = MoveService::new(store);

    let mut all_dense = true;
    for container in service.list_containers().map_err(|err| err.to_string())? {
        let report = service
            .audit_density(container.id)
            .map_err(|err| err.to_string())?;
        all_dense &= report.is_dense();
        println!("{}", describe(&report));
    }
    Ok(all_dense)
}

fn renumber(db_path: &Path, container_id: &str) -> Result<bool, String> {
    let container_id = Uuid::parse_str(container_id)
        .map_err(|err| format!("invalid container id `{container_id}`: {err}"))?;
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let store = SqliteRankStore::try_new(&conn).map_err(|err| err.to_string())?;
    let service = MoveService::new(store);

    let changed = service
        .renumber_container(container_id)
        .map_err(|err| err.to_string())?;
    println!("container={container_id} rows_changed={changed}");
    Ok(true)
}

fn describe(report: &DensityReport) -> String {
    if report.is_dense() {
        return format!(
            "container={} members={} dense",
            report.container_id, report.member_count
        );
    }
    format!(
        "container={} members={} missing={:?} duplicated={:?} out_of_range={:?}",
        report.container_id,
        report.member_count,
        report.missing,
        report.duplicated,
        report.out_of_range
    )
}
