use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tinytrace::analysis::ReportOptions;
use tinytrace::core::codec::{Format, RESULT_EXTENSION};
use tinytrace::runtime::Session;
use tinytrace_suite::suite;

use super::{print_report, save_results};

/// Test command: run every program of the built-in suite.
///
/// With an output directory, writes `<program>.tinytrace` per program there;
/// otherwise prints each report.
pub fn test(output_dir: Option<&Path>, report: ReportOptions) -> Result<()> {
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let session = Session::default();
    for case in suite() {
        let result = session
            .run(case.program, case.args)
            .with_context(|| format!("Suite program '{}' failed", case.program))?;

        match output_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.{}", case.program, RESULT_EXTENSION));
                save_results(&path, &result, Format::default())?;
            }
            None => {
                print_report(&result, report)?;
                println!();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinytrace::core::codec::read_results;

    #[test]
    fn test_suite_writes_one_file_per_program() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        test(Some(out.as_path()), ReportOptions::default()).unwrap();

        for program in ["binary_search", "knapsack", "dfs", "bfs"] {
            let result = read_results(out.join(format!("{}.tinytrace", program))).unwrap();
            assert_eq!(result.code_info.name, program);
            assert!(result.step_count() > 0);
        }
    }
}
