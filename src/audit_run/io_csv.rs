// Primitives for reading CSV files.

use std::fs::File;

use crate::audit_run::{io_common::make_default_id, *};

/// Reads one ballot per row.
///
/// Blank cells are kept as empty choices, the builder skips them.
pub fn read_csv_ranking(path: &str, cfs: &FileSource) -> AuditCliResult<Vec<ParsedBallot>> {
    let default_id = make_default_id(path);

    let id_idx_o = cfs.id_column_index_int()?;
    let choices_start_col = cfs.first_vote_column_index()?;
    let count_idx_o = cfs.count_column_index_int()?;

    let mut res: Vec<ParsedBallot> = Vec::new();
    let (records, row_offset) = get_records(path, cfs)?;

    for (idx, line_r) in records.enumerate() {
        let lineno = idx + row_offset;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let id = if let Some(id_idx) = id_idx_o {
            line.get(id_idx)
                .context(CsvLineTooShortSnafu { path, lineno })?
                .to_string()
        } else {
            default_id(lineno)
        };

        let count: u64 = if let Some(count_idx) = count_idx_o {
            let cell = line
                .get(count_idx)
                .context(CsvLineTooShortSnafu { path, lineno })?
                .trim();
            cell.parse::<u64>().ok().context(CsvCountSnafu {
                path,
                lineno,
                value: cell,
            })?
        } else {
            1
        };

        let choices: Vec<String> = line
            .iter()
            .enumerate()
            .skip(choices_start_col)
            .filter(|(col, _)| Some(*col) != count_idx_o && Some(*col) != id_idx_o)
            .map(|(_, s)| s.trim().to_string())
            .collect();
        debug!(
            "read_csv_ranking: lineno: {:?} id: {} count: {} row: {:?}",
            lineno, id, count, &choices
        );

        res.push(ParsedBallot {
            id: Some(id),
            count,
            choices,
        });
    }
    info!("read_csv_ranking: {} rows read from {}", res.len(), path);
    Ok(res)
}

fn get_records(
    path: &str,
    cfs: &FileSource,
) -> AuditCliResult<(csv::StringRecordsIntoIter<File>, usize)> {
    let first_row = cfs.first_vote_row_index()?;
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();
    // Rows are numbered from 1, as in spreadsheets.
    for _ in 1..first_row {
        _ = records.next();
    }
    Ok((records, first_row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata(name: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn read_with_counts() {
        let config = read_config(&testdata("counts_config.json")).unwrap();
        let cfs = &config.cvr_file_sources[0];
        let ballots = read_csv_ranking(&testdata(&cfs.file_path), cfs).unwrap();
        assert_eq!(ballots.len(), 3);
        assert_eq!(
            ballots[0],
            ParsedBallot {
                id: Some("b1".to_string()),
                count: 5,
                choices: vec!["Alice".to_string(), "Bob".to_string(), "".to_string()],
            }
        );
        assert_eq!(ballots[2].count, 2);
        assert_eq!(ballots[2].choices[0], "Carol");
    }

    #[test]
    fn default_ids_and_counts() {
        let cfs = FileSource::simple_csv("unanimous.csv");
        let ballots = read_csv_ranking(&testdata("unanimous.csv"), &cfs).unwrap();
        assert_eq!(ballots.len(), 30);
        assert!(ballots.iter().all(|b| b.count == 1));
        assert_eq!(ballots[0].id, Some("unanimous.csv-00000001".to_string()));
        assert_eq!(
            crate::audit_run::io_common::candidates_from_ballots(&ballots),
            vec!["Alice".to_string(), "Bob".to_string(), "Carol".to_string()]
        );
    }

    #[test]
    fn bad_count() {
        let cfs = FileSource::simple_csv("bad_count.csv");
        let js = r#"{"provider": "csv", "filePath": "bad_count.csv",
            "firstVoteColumnIndex": 2, "countColumnIndex": 1}"#;
        let cfs_count: FileSource = serde_json::from_str(js).unwrap();
        assert!(read_csv_ranking(&testdata("bad_count.csv"), &cfs).is_ok());
        assert!(matches!(
            read_csv_ranking(&testdata("bad_count.csv"), &cfs_count),
            Err(AuditCliError::CsvCount { lineno: 2, .. })
        ));
    }

    #[test]
    fn missing_file() {
        let cfs = FileSource::simple_csv("nope.csv");
        assert!(matches!(
            read_csv_ranking(&testdata("nope.csv"), &cfs),
            Err(AuditCliError::CsvOpen { .. })
        ));
    }
}
