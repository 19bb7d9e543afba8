use anyhow::{Context, Result};
use hexwfc_core::protocol::TileRecord;
use hexwfc_core::{OffsetCoord, SolveResponse};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Writes the responses as a pretty-printed JSON array, to `output_path` or
/// stdout.
pub fn save_responses(responses: &[SolveResponse], output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            log::info!("Writing {} responses to {:?}", responses.len(), path);
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            write_responses(responses, io::BufWriter::new(file))
        }
        None => write_responses(responses, io::stdout().lock()),
    }
}

fn write_responses(responses: &[SolveResponse], mut writer: impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, responses)
        .context("Failed to serialize responses")?;
    writeln!(writer)?;
    writer.flush().context("Failed to flush output")?;
    Ok(())
}

/// Odd-row offset bounds `(min, max)` of a set of tiles.
pub fn offset_bounds(tiles: &[TileRecord]) -> Option<(OffsetCoord, OffsetCoord)> {
    tiles
        .iter()
        .map(|tile| tile.coord().to_offset())
        .fold(None, |bounds, offset| {
            Some(match bounds {
                None => (offset, offset),
                Some((min, max)) => (
                    OffsetCoord {
                        col: min.col.min(offset.col),
                        row: min.row.min(offset.row),
                    },
                    OffsetCoord {
                        col: max.col.max(offset.col),
                        row: max.row.max(offset.row),
                    },
                ),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexwfc_core::CubeCoord;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_save_responses_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let responses = vec![SolveResponse::from_error(3, "bad request")];
        save_responses(&responses, Some(&path)).unwrap();

        let written: Vec<SolveResponse> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, responses);
    }

    #[test]
    fn test_offset_bounds() {
        assert!(offset_bounds(&[]).is_none());
        let tiles: Vec<TileRecord> = CubeCoord::within_radius(CubeCoord::ORIGIN, 1)
            .into_iter()
            .map(|coord| TileRecord::new(coord, "GRASS", 0, 0))
            .collect();
        let (min, max) = offset_bounds(&tiles).unwrap();
        assert_eq!((min.col, min.row), (-1, -1));
        assert_eq!((max.col, max.row), (1, 1));
    }
}
