use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Options for reducing a request path to a low-cardinality label value.
///
/// The transforms run in a fixed order: query removal, then segment
/// slicing, then numeric segment removal. Each step sees the output of
/// the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathCuttingConfig {
    /// Drop everything from the first `?` onward.
    pub remove_query: bool,

    /// Drop segments made only of digits and commas, such as `123` or `4,5`.
    pub remove_numeric_segments: bool,

    /// Keep only the `/`-separated segments with index in `[min, max)`.
    pub slice_bounds: Option<(usize, usize)>,
}

impl PathCuttingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_removed(mut self) -> Self {
        self.remove_query = true;
        self
    }

    pub fn with_numeric_segments_removed(mut self) -> Self {
        self.remove_numeric_segments = true;
        self
    }

    pub fn with_slice(mut self, min: usize, max: usize) -> Self {
        self.slice_bounds = Some((min, max));
        self
    }

    /// Applies the configured transforms to `path`.
    ///
    /// Borrows from the input when nothing needs to be rebuilt.
    pub fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str> {
        let path = if self.remove_query {
            strip_query(path)
        } else {
            path
        };

        let mut path = Cow::Borrowed(path);
        if let Some((min, max)) = self.slice_bounds {
            path = Cow::Owned(slice_segments(&path, min, max));
        }
        if self.remove_numeric_segments {
            path = Cow::Owned(drop_numeric_segments(&path));
        }
        path
    }
}

/// Normalizes `path` with `config`, or returns it unchanged when no config is given.
pub fn normalize<'a>(path: &'a str, config: Option<&PathCuttingConfig>) -> Cow<'a, str> {
    match config {
        Some(config) => config.normalize(path),
        None => Cow::Borrowed(path),
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(head, _)| head)
}

fn slice_segments(path: &str, min: usize, max: usize) -> String {
    // split always yields at least one segment
    let segments: Vec<&str> = path.split('/').collect();
    let min = min.min(segments.len() - 1);
    let max = max.min(segments.len());
    if max <= min {
        return String::new();
    }
    segments[min..max].join("/")
}

fn drop_numeric_segments(path: &str) -> String {
    path.split('/')
        .filter(|seg| !is_numeric_segment(seg))
        .collect::<Vec<_>>()
        .join("/")
}

fn is_numeric_segment(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit() || b == b',')
}
