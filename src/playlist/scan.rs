use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::audio::decoders::{ParseOptions, WaveReader};
use crate::error::PlaylistError;
use crate::models::Track;
use crate::playlist::PlaylistStore;

/// Whether `path` carries a `.wav` extension, in any letter case
pub fn is_wav_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Walk `root` depth-first and collect every parseable `.wav` file.
///
/// Entries of each directory are visited in file-name order. Subdirectories
/// are only entered when `recursive` is set.
pub fn discover(root: &Path, recursive: bool, max_path_len: usize) -> Result<PlaylistStore, PlaylistError> {
    let mut store = PlaylistStore::new();

    let entries = read_sorted(root).map_err(|source| PlaylistError::DirectoryUnreadable {
        path: root.display().to_string(),
        source,
    })?;
    visit(entries, recursive, max_path_len, &mut store);

    debug!("found {} tracks under {}", store.len(), root.display());
    Ok(store)
}

fn read_sorted(dir: &Path) -> std::io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn visit(entries: Vec<fs::DirEntry>, recursive: bool, max_path_len: usize, store: &mut PlaylistStore) {
    for entry in entries {
        let path = entry.path();

        let path_len = path.as_os_str().len();
        if path_len > max_path_len {
            let err = PlaylistError::PathTooLong {
                path: path.display().to_string(),
                len: path_len,
                max: max_path_len,
            };
            warn!("skipping: {}", err);
            continue;
        }

        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            if !recursive {
                continue;
            }
            match read_sorted(&path) {
                Ok(children) => visit(children, recursive, max_path_len, store),
                Err(e) => warn!("skipping unreadable directory {}: {}", path.display(), e),
            }
            continue;
        }

        if !is_wav_file(&path) || !path.is_file() {
            continue;
        }

        match load_track(&path) {
            Ok(track) => store.push(track),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
}

fn load_track(path: &Path) -> Result<Track, crate::error::WaveError> {
    let wave = WaveReader::open(path, ParseOptions::metadata())?;

    let byte_rate = wave.fmt.map(|f| f.byte_rate).unwrap_or(0);
    let data_size = wave.data_size().unwrap_or(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Track::new(
        path.to_path_buf(),
        name,
        Track::duration_from_header(data_size, byte_rate),
    ))
}
