use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::{
    error::{Error, Result},
    util::files_with_extension,
};

/// Tiles smaller than this carry no raster data.
pub const DEFAULT_SIZE_THRESHOLD: u64 = 557_480;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedTile {
    pub tif: PathBuf,
    pub size: u64,
    /// World file removed along with the tile, if there was one.
    pub world_file: Option<PathBuf>,
}

/// Deletes `.tif` tiles below `threshold` bytes together with their `.tfw` world files.
#[instrument(level = "debug")]
pub fn prune_empty_tiles(folder: &Path, threshold: u64) -> Result<Vec<PrunedTile>> {
    let tiles = files_with_extension(folder, &["tif"])?;
    tracing::info!("Found {} TIFs in {}", tiles.len(), folder.display());
    let world_files = files_with_extension(folder, &["tfw"])?;

    let mut pruned = Vec::new();
    for tif in tiles {
        let size = std::fs::metadata(&tif)
            .map_err(|err| Error::io(&tif, err))?
            .len();
        if size >= threshold {
            continue;
        }
        std::fs::remove_file(&tif).map_err(|err| Error::io(&tif, err))?;
        tracing::info!("{}: {size} bytes (deleted)", tif.display());

        let world_file = world_files
            .iter()
            .find(|tfw| tfw.file_stem() == tif.file_stem())
            .cloned();
        if let Some(tfw) = &world_file {
            std::fs::remove_file(tfw).map_err(|err| Error::io(tfw, err))?;
        }
        pruned.push(PrunedTile {
            tif,
            size,
            world_file,
        });
    }
    Ok(pruned)
}

/// Writes the names of the deleted tiles to `<folder>/log.txt`.
pub fn write_prune_log(folder: &Path, pruned: &[PrunedTile]) -> Result<PathBuf> {
    let path = folder.join("log.txt");
    let mut file = std::fs::File::create(&path).map_err(|err| Error::io(&path, err))?;
    let mut body = String::from("Empty TIFs:\n");
    for tile in pruned {
        if let Some(name) = tile.tif.file_name() {
            body.push_str(&name.to_string_lossy());
            body.push('\n');
        }
    }
    file.write_all(body.as_bytes())
        .map_err(|err| Error::io(&path, err))?;
    Ok(path)
}
