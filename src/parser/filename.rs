//! Filename grammar: run-date suffixing and storage path decoding.
//!
//! Attachments encode their destination directory in the filename itself:
//! everything before `_<keyword>` is a `_`-separated list of path segments.
//!
//! ```text
//! folder1_folder2_report_KEY_20180901_02-Sep-2018.csv
//! \___________________/
//!   folder1/folder2/report/
//! ```

use chrono::NaiveDate;

use crate::error::{RelayError, Result};
use crate::model::destination::DerivedDestination;

/// `strftime` format of the date suffix (e.g. `02-Sep-2018`).
pub const DATE_SUFFIX_FORMAT: &str = "%d-%b-%Y";

/// Decode the storage destination encoded in `filename`.
///
/// Splits at the first occurrence of `"_" + keyword`. The match is
/// case-sensitive and uses the keyword exactly as configured, even though
/// selection matched case-insensitively. A missing delimiter, an empty
/// segment, or a `.`/`..` segment is a [`RelayError::MalformedFilename`].
pub fn decode(filename: &str, keyword: &str) -> Result<DerivedDestination> {
    if keyword.is_empty() {
        return Err(RelayError::malformed(filename, "keyword is empty"));
    }

    let delimiter = format!("_{keyword}");
    let (prefix, _) = filename.split_once(&delimiter).ok_or_else(|| {
        RelayError::malformed(
            filename,
            format!("keyword delimiter '{delimiter}' not found"),
        )
    })?;

    let segments: Vec<String> = prefix.split('_').map(String::from).collect();
    for (idx, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(RelayError::malformed(
                filename,
                format!("empty path segment at position {idx}"),
            ));
        }
        if segment == "." || segment == ".." {
            return Err(RelayError::malformed(
                filename,
                format!("relative path segment '{segment}'"),
            ));
        }
    }

    Ok(DerivedDestination {
        segments,
        filename: filename.to_string(),
    })
}

/// Insert `_<run date>` immediately before the extension of `filename`.
///
/// `name.ext` becomes `name_02-Sep-2018.ext`; a name without an extension
/// gets the suffix appended. Leading dots (`.profile`) do not start an extension.
pub fn dated_filename(filename: &str, run_date: NaiveDate) -> String {
    let (stem, ext) = split_extension(filename);
    format!("{stem}_{}{ext}", run_date.format(DATE_SUFFIX_FORMAT))
}

/// Split `name` into `(stem, ".ext")`, looking only at the last path component.
fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind(['/', '\\']).map(|p| p + 1).unwrap_or(0);
    let base = &name[base_start..];

    match base.rfind('.') {
        Some(pos) if !base[..pos].chars().all(|c| c == '.') => {
            let split = base_start + pos;
            (&name[..split], &name[split..])
        }
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sep_2_2018() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 9, 2).unwrap()
    }

    #[test]
    fn test_decode_splits_prefix_into_segments() {
        let d = decode("folder1_folder2_report_KEY_20180901.csv", "KEY").unwrap();
        assert_eq!(d.segments, vec!["folder1", "folder2", "report"]);
        assert_eq!(d.storage_path(), "folder1/folder2/report/");
        assert_eq!(d.filename, "folder1_folder2_report_KEY_20180901.csv");
    }

    #[test]
    fn test_decode_uses_first_delimiter() {
        let d = decode("a_b_KEY_c_KEY_d.csv", "KEY").unwrap();
        assert_eq!(d.segments, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_single_segment() {
        let d = decode("reports_S3upload_20180901.csv", "S3upload").unwrap();
        assert_eq!(d.storage_path(), "reports/");
    }

    #[test]
    fn test_decode_missing_delimiter_fails() {
        let err = decode("invoice.csv", "KEY").unwrap_err();
        assert!(matches!(err, RelayError::MalformedFilename { ref filename, .. } if filename == "invoice.csv"));
    }

    #[test]
    fn test_decode_is_case_sensitive() {
        // Selection is case-insensitive, but the split honours the configured casing.
        assert!(decode("folder_key_1.csv", "KEY").is_err());
        assert!(decode("folder_KEY_1.csv", "KEY").is_ok());
    }

    #[test]
    fn test_decode_keyword_without_underscore_fails() {
        assert!(decode("folderKEY_1.csv", "KEY").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_segments() {
        assert!(decode("a__b_KEY.csv", "KEY").is_err());
        assert!(decode("_a_KEY.csv", "KEY").is_err());
        assert!(decode("_KEY.csv", "KEY").is_err());
    }

    #[test]
    fn test_decode_rejects_relative_segments() {
        assert!(decode(".._etc_KEY.csv", "KEY").is_err());
        assert!(decode("a_._KEY.csv", "KEY").is_err());
    }

    #[test]
    fn test_decode_empty_keyword_fails() {
        assert!(decode("a_b.csv", "").is_err());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let name = "x_y_KEY_z.pdf";
        assert_eq!(decode(name, "KEY").unwrap(), decode(name, "KEY").unwrap());
    }

    #[test]
    fn test_dated_filename_before_extension() {
        assert_eq!(
            dated_filename("folder1_folder2_report_KEY_20180901.csv", sep_2_2018()),
            "folder1_folder2_report_KEY_20180901_02-Sep-2018.csv"
        );
    }

    #[test]
    fn test_dated_filename_only_last_extension() {
        assert_eq!(
            dated_filename("data_KEY.tar.gz", sep_2_2018()),
            "data_KEY.tar_02-Sep-2018.gz"
        );
    }

    #[test]
    fn test_dated_filename_without_extension() {
        assert_eq!(dated_filename("a_KEY", sep_2_2018()), "a_KEY_02-Sep-2018");
        assert_eq!(dated_filename(".hidden", sep_2_2018()), ".hidden_02-Sep-2018");
    }

    #[test]
    fn test_dated_name_keeps_suffix_out_of_path() {
        let dated = dated_filename("folder1_folder2_report_KEY_20180901.csv", sep_2_2018());
        let d = decode(&dated, "KEY").unwrap();
        assert_eq!(d.storage_path(), "folder1/folder2/report/");
        assert_eq!(
            d.object_key(),
            "folder1/folder2/report/folder1_folder2_report_KEY_20180901_02-Sep-2018.csv"
        );
    }
}
