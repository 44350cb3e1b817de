//! Xtream JSON to entry mapper
//!
//! Each element of a `get_live_streams`, `get_vod_streams` or `get_series`
//! collection becomes one [`ParsedEntry`] whose URL is synthesized as
//! `{server}/{live|movie|series}/{username}/{password}/{id}.{extension}`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{fragment, ParseError, ParseMode, ParsedEntry};
use crate::services::xtream::{
    XtreamCategory, XtreamCredentials, XtreamLiveStream, XtreamSeries, XtreamVodStream,
};

const DEFAULT_CONTAINER: &str = "mp4";

/// The three Xtream stream collections, in sync order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XtreamKind {
    Live,
    Vod,
    Series,
}

impl XtreamKind {
    pub const ALL: [XtreamKind; 3] = [XtreamKind::Live, XtreamKind::Vod, XtreamKind::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            XtreamKind::Live => "live",
            XtreamKind::Vod => "vod",
            XtreamKind::Series => "series",
        }
    }

    pub fn streams_action(&self) -> &'static str {
        match self {
            XtreamKind::Live => "get_live_streams",
            XtreamKind::Vod => "get_vod_streams",
            XtreamKind::Series => "get_series",
        }
    }

    pub fn categories_action(&self) -> &'static str {
        match self {
            XtreamKind::Live => "get_live_categories",
            XtreamKind::Vod => "get_vod_categories",
            XtreamKind::Series => "get_series_categories",
        }
    }
}

/// Maps raw collection elements of one kind to entries
pub struct XtreamMapper {
    kind: XtreamKind,
    credentials: XtreamCredentials,
    categories: HashMap<String, String>,
    live_extension: String,
    mode: ParseMode,
    dropped: usize,
}

impl XtreamMapper {
    pub fn new(
        kind: XtreamKind,
        credentials: XtreamCredentials,
        categories: &[XtreamCategory],
        live_extension: &str,
        mode: ParseMode,
    ) -> Self {
        let categories = categories
            .iter()
            .map(|c| (c.category_id.clone(), c.category_name.clone()))
            .collect();

        Self {
            kind,
            credentials,
            categories,
            live_extension: live_extension.to_string(),
            mode,
            dropped: 0,
        }
    }

    pub fn kind(&self) -> XtreamKind {
        self.kind
    }

    /// Elements skipped so far (lenient mode only)
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Map one element. Returns `Ok(None)` for a skipped element.
    pub fn map(&mut self, element: Value) -> Result<Option<ParsedEntry>, ParseError> {
        let result = match self.kind {
            XtreamKind::Live => self.decode::<XtreamLiveStream>(&element).map(|s| self.map_live(s)),
            XtreamKind::Vod => self.decode::<XtreamVodStream>(&element).map(|s| self.map_vod(s)),
            XtreamKind::Series => self.decode::<XtreamSeries>(&element).map(|s| self.map_series(s)),
        };

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(_) if !self.mode.is_strict() => {
                self.dropped += 1;
                debug!(kind = self.kind.as_str(), element = %fragment(&element.to_string()), "Skipping malformed Xtream element");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn decode<T: DeserializeOwned>(&self, element: &Value) -> Result<T, ParseError> {
        T::deserialize(element).map_err(|e| ParseError::Json {
            collection: self.kind.streams_action().to_string(),
            message: e.to_string(),
            fragment: fragment(&element.to_string()),
        })
    }

    /// Resolve a category id, unknown ids map to an empty group
    fn group(&self, category_id: Option<&str>) -> String {
        category_id
            .and_then(|id| self.categories.get(id))
            .cloned()
            .unwrap_or_default()
    }

    fn map_live(&self, stream: XtreamLiveStream) -> ParsedEntry {
        let name = stream.name.unwrap_or_default();
        ParsedEntry {
            id: stream.epg_channel_id.unwrap_or_default(),
            title: name.clone(),
            name,
            group: self.group(stream.category_id.as_deref()),
            cover: stream.stream_icon.unwrap_or_default(),
            url: self.credentials.live_url(stream.stream_id, &self.live_extension),
            duration: -1.0,
        }
    }

    fn map_vod(&self, stream: XtreamVodStream) -> ParsedEntry {
        let name = stream.name.unwrap_or_default();
        let extension = container(stream.container_extension.as_deref());
        ParsedEntry {
            id: String::new(),
            title: name.clone(),
            name,
            group: self.group(stream.category_id.as_deref()),
            cover: stream.stream_icon.unwrap_or_default(),
            url: self.credentials.vod_url(stream.stream_id, extension),
            duration: -1.0,
        }
    }

    fn map_series(&self, series: XtreamSeries) -> ParsedEntry {
        let name = series.name.unwrap_or_default();
        let extension = container(series.container_extension.as_deref());
        ParsedEntry {
            id: String::new(),
            title: name.clone(),
            name,
            group: self.group(series.category_id.as_deref()),
            cover: series.cover.unwrap_or_default(),
            url: self.credentials.series_url(series.series_id, extension),
            duration: -1.0,
        }
    }
}

fn container(extension: Option<&str>) -> &str {
    match extension.map(str::trim) {
        Some(ext) if !ext.is_empty() => ext,
        _ => DEFAULT_CONTAINER,
    }
}
