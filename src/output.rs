use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;
use thiserror::Error;

use crate::address::AddressSet;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// `addresses-<timestamp>.csv` inside `dir`.
pub fn default_output_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("addresses-{}.csv", timestamp))
}

/// Writes one address per record, in the set's iteration order.
pub fn write_addresses(path: &Path, addresses: &AddressSet) -> Result<usize, OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for address in addresses {
        writer.write_record([address])?;
    }
    writer.flush()?;

    info!("Wrote {} addresses to {}", addresses.len(), path.display());
    Ok(addresses.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_address_per_line_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("addresses.csv");
        let addresses: AddressSet = ["b@y.com", "Jan jan@x.com", "a@x.com"]
            .into_iter()
            .map(String::from)
            .collect();

        let written = write_addresses(&path, &addresses).unwrap();
        assert_eq!(written, 3);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Jan jan@x.com\na@x.com\nb@y.com\n");
    }

    #[test]
    fn commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.csv");
        let addresses: AddressSet = ["odd,name@x.com".to_string()].into_iter().collect();

        write_addresses(&path, &addresses).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"odd,name@x.com\"\n");
    }

    #[test]
    fn default_path_is_timestamped_csv() {
        let path = default_output_path(Path::new("/tmp"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("addresses-"));
        assert!(name.ends_with(".csv"));
    }
}
