use geo::Polygon;

/// One ranked recognition for a region.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bounds: Polygon<f32>,
    pub text: String,
    pub confidence: f32,
}

impl Candidate {
    /// Candidate covering the whole crop, for oracles that don't localize text.
    pub fn whole(width: u32, height: u32, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bounds: crop_bounds(width, height),
            text: text.into(),
            confidence,
        }
    }
}

/// Polygon covering a whole `width` x `height` image.
pub fn crop_bounds(width: u32, height: u32) -> Polygon<f32> {
    let (w, h) = (width as f32, height as f32);
    Polygon::new(
        vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].into(),
        vec![],
    )
}

#[derive(Debug, Clone)]
pub struct TextBox {
    pub score: f32,
    pub rect: Polygon<f32>,
}

#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub character_scores: Vec<f32>,
}

impl TextLine {
    /// Mean character probability, zero for an empty line.
    pub fn confidence(&self) -> f32 {
        if self.character_scores.is_empty() {
            return 0.0;
        }
        self.character_scores.iter().sum::<f32>() / self.character_scores.len() as f32
    }
}
