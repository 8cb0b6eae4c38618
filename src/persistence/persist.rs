use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::import::{decode_import, ImportedGraph};

pub const JSON_FILE_NAME: &str = "family_tree.json";
pub const CSV_FILE_NAME: &str = "family_tree.csv";
pub const PDF_FILE_NAME: &str = "family_tree.pdf";

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("part");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Write an export file named `file_name` into `dir`, creating the directory first.
pub fn write_export(dir: &Path, file_name: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    atomic_write(&path, data)?;
    log::info!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(path)
}

pub fn read_to_string(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(buf)
}

/// Read and decode an import file. I/O failures and format errors both surface here.
pub fn load_import(path: &Path) -> anyhow::Result<ImportedGraph> {
    let text = read_to_string(path)?;
    let graph = decode_import(&text)?;
    log::info!("decoded {} node(s), {} edge(s) from {}", graph.nodes.len(), graph.edges.len(), path.display());
    Ok(graph)
}
