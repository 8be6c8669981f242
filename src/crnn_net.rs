use std::path::{Path, PathBuf};

use float_ord::FloatOrd;
use image::{imageops::FilterType, DynamicImage};
use ndarray::{ArrayView2, Axis, Ix2};
use ort::{inputs, Session};
use tracing::instrument;

use crate::{
    error::OracleError,
    oracle::Allowlist,
    session::{self, SessionOptions, ShapeProfile},
    util::subtract_mean_normalize,
    ExecutionProvider, TextLine,
};

const MEAN_VALUES: [f32; 3] = [0.5, 0.5, 0.5];
const NORM_VALUES: [f32; 3] = [2.0, 2.0, 2.0];
const DEST_HEIGHT: u32 = 48;

/// CRNN line recognizer with CTC decoding.
pub struct CrnnNet {
    session: Session,
    keys: Vec<String>,
}

impl CrnnNet {
    #[instrument(level = "debug", skip(providers))]
    pub fn init(
        model_path: &Path,
        keys_path: &Path,
        threads: usize,
        providers: &[ExecutionProvider],
        cache_path: Option<PathBuf>,
    ) -> ort::Result<Self> {
        let session = session::load(
            model_path,
            &SessionOptions {
                threads,
                providers,
                cache_path,
                profile: ShapeProfile {
                    min: format!("x:1x3x{DEST_HEIGHT}x1"),
                    opt: format!("x:1x3x{DEST_HEIGHT}x256"),
                    max: format!("x:1x3x{DEST_HEIGHT}x{}", u16::MAX),
                },
            },
        )?;

        let keys =
            std::fs::read_to_string(keys_path).map_err(|_| ort::Error::FileDoesNotExist {
                filename: keys_path.to_path_buf(),
            })?;
        Ok(Self {
            session,
            keys: ctc_keys(&keys),
        })
    }

    #[instrument(level = "trace", skip(self, image))]
    pub fn get_text_line(
        &self,
        image: &DynamicImage,
        allowlist: Allowlist,
    ) -> Result<TextLine, OracleError> {
        let scale = DEST_HEIGHT as f32 / image.height().max(1) as f32;
        let dest_width = ((image.width() as f32 * scale) as u32).clamp(1, u16::MAX as u32);
        let image = image.resize_exact(dest_width, DEST_HEIGHT, FilterType::Lanczos3);

        let tensor_values =
            subtract_mean_normalize(&image, &MEAN_VALUES, &NORM_VALUES).insert_axis(Axis(0));
        let outputs = self.session.run(inputs!["x" => tensor_values]?)?;
        let (_, output_tensor) = outputs
            .first_key_value()
            .ok_or_else(|| OracleError::Decode("recognizer produced no output".into()))?;
        let output_tensor = output_tensor.try_extract_tensor::<f32>()?;
        log::trace!("Output tensor size: {:?}", output_tensor.dim());

        // (1, time steps, classes)
        let output = output_tensor
            .index_axis_move(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|err| OracleError::Decode(format!("recognizer output: {err}")))?;

        Ok(decode(&self.keys, output, allowlist))
    }
}

/// Class table of the model: blank first, then the key file, then space.
fn ctc_keys(key_file: &str) -> Vec<String> {
    ["#".to_string()]
        .into_iter()
        .chain(key_file.lines().map(|line| line.to_string()))
        .chain([" ".to_string()])
        .collect()
}

/// Greedy CTC decoding restricted to `allowlist`.
///
/// Classes outside the allowlist are ignored when picking the best class of a
/// time step, so a `5` that looks like an `S` still reads as the best digit.
/// Blanks separate characters and repeated classes collapse into one.
fn decode(keys: &[String], scores: ArrayView2<f32>, allowlist: Allowlist) -> TextLine {
    let allowed = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            i == 0 || {
                let mut chars = key.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if allowlist.contains(c))
            }
        })
        .collect::<Vec<_>>();

    let mut text = String::new();
    let mut character_scores = Vec::new();
    let mut previous = 0;
    for step in scores.outer_iter() {
        let best = step
            .indexed_iter()
            .filter(|(i, _)| allowed.get(*i).copied().unwrap_or(false))
            .max_by_key(|(_, score)| FloatOrd(**score));
        let Some((index, score)) = best else {
            continue;
        };
        if index != 0 && index != previous {
            text.push_str(&keys[index]);
            character_scores.push(*score);
        }
        previous = index;
    }

    TextLine {
        text,
        character_scores,
    }
}
