use serde::Serialize;

/// Views at which a segment starts fading and gets struck through.
pub const FADE_START_VIEWS: u32 = 10;
/// Views at which a segment is fully transparent.
pub const HIDDEN_VIEWS: u32 = 20;

/// Opacity for a segment that has been heard `views` times.
///
/// Fully visible below [`FADE_START_VIEWS`], then a linear ramp down to zero
/// at [`HIDDEN_VIEWS`].
pub fn opacity(views: u32) -> f32 {
    if views < FADE_START_VIEWS {
        return 1.0;
    }
    if views < HIDDEN_VIEWS {
        let ramp = (HIDDEN_VIEWS - FADE_START_VIEWS) as f32;
        return 1.0 - (views - FADE_START_VIEWS) as f32 / ramp;
    }
    0.0
}

pub fn strike(views: u32) -> bool {
    views >= FADE_START_VIEWS
}

pub fn is_hidden(views: u32) -> bool {
    views >= HIDDEN_VIEWS
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FadeStyle {
    pub opacity: f32,
    pub strike_through: bool,
}

impl FadeStyle {
    pub fn for_views(views: u32) -> Self {
        Self {
            opacity: opacity(views),
            strike_through: strike(views),
        }
    }
}
